//! Pairwise interaction correction on top of a known weight table.
//!
//! The per-value table alone leaves some spread in the totals of builds that
//! should cost the same. This fit explains the remainder with one weight per
//! unordered attribute pair, whose feature is the product of the two scaled
//! values `(v_i / scale) * (v_j / scale)`, by ridge regression of
//! `target_mean - base_total` on those features:
//!
//! ```text
//! (XᵀX + λI) w = Xᵀ (target_mean - base)
//! ```

use buildcost_model::{AttributeSet, BuildRecord, GroupLookup, WeightTable};
use buildcost_stats::descriptive::DescriptiveStats;
use nalgebra::{DMatrix, DVector};

pub const DEFAULT_TARGET_MEAN: f64 = 1721.0;
pub const DEFAULT_RIDGE: f64 = 1e-2;
pub const DEFAULT_SCALE: f64 = 99.0;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum InteractionError {
    #[display("no build has both a weight table entry and every attribute value")]
    NoBuilds,
    #[display("normal equations are not positive definite (ridge {ridge})")]
    Singular { ridge: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionConfig {
    /// Total every build is pulled towards.
    pub target_mean: f64,
    /// Ridge strength `λ`.
    pub ridge: f64,
    /// Divisor applied to attribute values before they are multiplied.
    pub scale: f64,
    pub lookup: GroupLookup,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            target_mean: DEFAULT_TARGET_MEAN,
            ridge: DEFAULT_RIDGE,
            scale: DEFAULT_SCALE,
            lookup: GroupLookup::Exact,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionWeight {
    pub first: String,
    pub second: String,
    pub weight: f64,
}

#[derive(Debug, Clone)]
pub struct InteractionFit {
    /// Builds used by the regression.
    pub builds: usize,
    /// Builds left out for lack of a table entry or an attribute value.
    pub skipped: usize,
    /// Interaction weights, largest magnitude first.
    pub weights: Vec<InteractionWeight>,
    /// Totals from the weight table alone.
    pub base: DescriptiveStats,
    /// Totals after adding the interaction terms.
    pub adjusted: DescriptiveStats,
}

/// Every unordered pair `(i, j)` with `i < j`, in row-major order.
///
/// ```
/// use buildcost_fit::interaction::attribute_pairs;
///
/// assert_eq!(attribute_pairs(3), vec![(0, 1), (0, 2), (1, 2)]);
/// assert_eq!(attribute_pairs(21).len(), 210);
/// ```
#[must_use]
pub fn attribute_pairs(attribute_count: usize) -> Vec<(usize, usize)> {
    (0..attribute_count)
        .flat_map(|i| (i + 1..attribute_count).map(move |j| (i, j)))
        .collect()
}

/// Fits one interaction weight per attribute pair.
///
/// # Errors
///
/// Returns [`InteractionError::NoBuilds`] if no record can be priced by `table`,
/// and [`InteractionError::Singular`] if the regularized normal equations cannot
/// be factorized.
pub fn fit_interactions(
    records: &[BuildRecord],
    table: &WeightTable,
    attributes: &AttributeSet,
    config: &InteractionConfig,
) -> Result<InteractionFit, InteractionError> {
    let pairs = attribute_pairs(attributes.len());

    let mut base = Vec::new();
    let mut features = Vec::new();
    for record in records {
        let Some(values) = attributes
            .iter()
            .map(|name| record.value(name).map(f64::from))
            .collect::<Option<Vec<_>>>()
        else {
            continue;
        };
        let Some(total) = table.build_cost(record, attributes, config.lookup) else {
            continue;
        };
        base.push(total);
        features.extend(
            pairs
                .iter()
                .map(|&(i, j)| (values[i] / config.scale) * (values[j] / config.scale)),
        );
    }
    if base.is_empty() {
        return Err(InteractionError::NoBuilds);
    }

    let x = DMatrix::from_row_slice(base.len(), pairs.len(), &features);
    let base_vec = DVector::from_column_slice(&base);
    let y = base_vec.map(|b| config.target_mean - b);

    let normal = x.transpose() * &x + DMatrix::identity(pairs.len(), pairs.len()) * config.ridge;
    let rhs = x.transpose() * y;
    let solution = normal
        .cholesky()
        .ok_or(InteractionError::Singular {
            ridge: config.ridge,
        })?
        .solve(&rhs);

    let adjusted = &base_vec + &x * &solution;

    let mut weights = pairs
        .iter()
        .zip(solution.iter())
        .map(|(&(i, j), &weight)| InteractionWeight {
            first: attributes.names()[i].clone(),
            second: attributes.names()[j].clone(),
            weight,
        })
        .collect::<Vec<_>>();
    weights.sort_by(|a, b| b.weight.abs().total_cmp(&a.weight.abs()));

    Ok(InteractionFit {
        builds: base.len(),
        skipped: records.len() - base.len(),
        weights,
        base: DescriptiveStats::new(base.iter().copied()).ok_or(InteractionError::NoBuilds)?,
        adjusted: DescriptiveStats::new(adjusted.iter().copied())
            .ok_or(InteractionError::NoBuilds)?,
    })
}
