/// Error of a set of predictions measured against their targets.
///
/// Percentage error is `|prediction - target| / |target| * 100`. Targets equal to
/// zero have no defined percentage error and are left out of the percentage
/// figures (they still count towards the RMSE).
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionError {
    /// Root mean squared error over all pairs.
    pub rmse: f64,
    /// Mean percentage error, `None` if no target was non-zero.
    pub mean_percent: Option<f64>,
    /// Maximum percentage error, `None` if no target was non-zero.
    pub max_percent: Option<f64>,
    /// Number of pairs that contributed a percentage error.
    pub percent_count: usize,
}

impl PredictionError {
    /// Computes the error of `predictions` against `targets`.
    ///
    /// # Panics
    ///
    /// Panics if the slices have different lengths.
    ///
    /// # Examples
    ///
    /// ```
    /// # use buildcost_stats::error::PredictionError;
    /// let error = PredictionError::new(&[90.0, 110.0, 5.0], &[100.0, 100.0, 0.0]);
    /// assert_eq!(error.mean_percent, Some(10.0));
    /// assert_eq!(error.max_percent, Some(10.0));
    /// assert_eq!(error.percent_count, 2);
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn new(predictions: &[f64], targets: &[f64]) -> Self {
        assert_eq!(predictions.len(), targets.len());

        let rmse = if predictions.is_empty() {
            0.0
        } else {
            let sum_sq = std::iter::zip(predictions, targets)
                .map(|(p, y)| (p - y).powi(2))
                .sum::<f64>();
            (sum_sq / predictions.len() as f64).sqrt()
        };

        let percents = std::iter::zip(predictions, targets)
            .filter(|(_, y)| **y != 0.0)
            .map(|(p, y)| (p - y).abs() / y.abs() * 100.0)
            .collect::<Vec<_>>();
        let percent_count = percents.len();
        let (mean_percent, max_percent) = if percents.is_empty() {
            (None, None)
        } else {
            let mean = percents.iter().sum::<f64>() / percent_count as f64;
            let max = percents.iter().copied().fold(f64::MIN, f64::max);
            (Some(mean), Some(max))
        };

        Self {
            rmse,
            mean_percent,
            max_percent,
            percent_count,
        }
    }
}
