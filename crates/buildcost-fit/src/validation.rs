//! Post-fit diagnostics.

use buildcost_stats::{descriptive::DescriptiveStats, error::PredictionError};

use crate::observation::ObservationSet;

/// A fit passes validation when its mean percentage error is below this.
pub const PASS_THRESHOLD_PERCENT: f64 = 5.0;

/// How well a fitted weight vector reproduces the observed targets.
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub error: PredictionError,
    pub targets: Option<DescriptiveStats>,
    pub predictions: Option<DescriptiveStats>,
    pub weights: Option<DescriptiveStats>,
}

impl Validation {
    /// Compares the predictions `X · weights` with the observed targets.
    #[must_use]
    pub fn new(observations: &ObservationSet, weights: &[f64]) -> Self {
        let predictions = observations.design().predict(weights);
        let targets = observations.targets();
        Self {
            error: PredictionError::new(&predictions, targets),
            targets: DescriptiveStats::new(targets.iter().copied()),
            predictions: DescriptiveStats::new(predictions),
            weights: DescriptiveStats::new(weights.iter().copied()),
        }
    }

    /// Whether the mean percentage error is below [`PASS_THRESHOLD_PERCENT`].
    ///
    /// A group without any non-zero target has no percentage error and fails.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.error
            .mean_percent
            .is_some_and(|mean| mean < PASS_THRESHOLD_PERCENT)
    }
}

#[cfg(test)]
mod tests {
    use buildcost_model::{AttributeSet, BuildRecord, ValueRange};

    use super::*;

    fn observations(targets: [f64; 2]) -> ObservationSet {
        let records = [
            BuildRecord::new(80, [("A", 30)], targets[0]),
            BuildRecord::new(80, [("A", 40)], targets[1]),
        ];
        ObservationSet::build(&records, 80, &AttributeSet::new(["A"]), ValueRange::DISPLAY).unwrap()
    }

    #[test]
    fn test_exact_fit_passes() {
        let obs = observations([10.0, 20.0]);
        let mut weights = vec![0.0; 75];
        weights[5] = 10.0;
        weights[15] = 20.0;
        let validation = Validation::new(&obs, &weights);
        assert_eq!(validation.error.rmse, 0.0);
        assert!(validation.passed());
        assert_eq!(validation.predictions.unwrap().max, 20.0);
    }

    #[test]
    fn test_large_error_fails() {
        let obs = observations([99.0, 99.0]);
        let validation = Validation::new(&obs, &[0.0; 75]);
        assert_eq!(validation.error.mean_percent, Some(100.0));
        assert!(!validation.passed());
    }

    #[test]
    fn test_zero_targets_fail() {
        let obs = observations([0.0, 0.0]);
        let validation = Validation::new(&obs, &[0.0; 75]);
        assert_eq!(validation.error.mean_percent, None);
        assert!(!validation.passed());
    }
}
