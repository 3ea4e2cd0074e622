//! Soft shape constraints on per-value weight sequences.
//!
//! Per-value weights are otherwise free and would happily fit noise. Two
//! expectations about the hidden table are encoded as quadratic penalties over
//! each attribute's sequence (ordered by increasing value):
//!
//! - **Monotonicity**: raising an attribute never gets cheaper. Every backward
//!   step `w[i] > w[i + 1]` costs `mono_penalty * (w[i] - w[i + 1])²`.
//! - **Smoothness**: the cost per point does not jump wildly between adjacent
//!   values. Every step larger than `smooth_allowance` costs
//!   `smooth_weight * (|w[i + 1] - w[i]| - smooth_allowance)²`.

use crate::observation::ParameterIndex;

pub const DEFAULT_MONO_PENALTY: f64 = 1e3;
pub const DEFAULT_SMOOTH_ALLOWANCE: f64 = 100.0;
pub const DEFAULT_SMOOTH_WEIGHT: f64 = 10.0;

/// Monotonicity and smoothness penalty over every attribute's weight sequence.
///
/// # Example
///
/// ```
/// use buildcost_fit::{observation::ParameterIndex, penalty::ConstraintPenalty};
/// use buildcost_model::ValueRange;
///
/// let index = ParameterIndex::new(1, ValueRange::new(25, 27));
/// let penalty = ConstraintPenalty::default();
/// assert_eq!(penalty.evaluate(&[0.0, 5.0, 5.0], &index), 0.0);
/// assert_eq!(penalty.evaluate(&[0.0, 5.0, 3.0], &index), 1e3 * 4.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintPenalty {
    /// Scale of the squared decrease of each backward step.
    pub mono_penalty: f64,
    /// Largest step between adjacent values that is not penalized.
    pub smooth_allowance: f64,
    /// Scale of the squared excess of each oversized step.
    pub smooth_weight: f64,
}

impl Default for ConstraintPenalty {
    fn default() -> Self {
        Self {
            mono_penalty: DEFAULT_MONO_PENALTY,
            smooth_allowance: DEFAULT_SMOOTH_ALLOWANCE,
            smooth_weight: DEFAULT_SMOOTH_WEIGHT,
        }
    }
}

impl ConstraintPenalty {
    /// Total penalty of `weights`, summed over all attributes.
    #[must_use]
    pub fn evaluate(&self, weights: &[f64], index: &ParameterIndex) -> f64 {
        (0..index.attribute_count())
            .map(|attribute| {
                let columns = index.attribute_columns(attribute);
                weights[columns]
                    .windows(2)
                    .map(|pair| self.step_penalty(pair[0], pair[1]).0)
                    .sum::<f64>()
            })
            .sum()
    }

    /// Computes the penalty and adds `scale` times its gradient to `gradient`.
    ///
    /// Returns the unscaled penalty.
    pub fn accumulate_gradient(
        &self,
        weights: &[f64],
        index: &ParameterIndex,
        scale: f64,
        gradient: &mut [f64],
    ) -> f64 {
        assert_eq!(weights.len(), gradient.len());
        let mut total = 0.0;
        for attribute in 0..index.attribute_count() {
            let columns = index.attribute_columns(attribute);
            for i in columns.start..columns.end - 1 {
                let (penalty, d_next) = self.step_penalty(weights[i], weights[i + 1]);
                total += penalty;
                gradient[i + 1] += scale * d_next;
                gradient[i] -= scale * d_next;
            }
        }
        total
    }

    /// Penalty of one step `current → next` and its derivative with respect to
    /// `next` (the derivative with respect to `current` is its negation).
    fn step_penalty(&self, current: f64, next: f64) -> (f64, f64) {
        let mut penalty = 0.0;
        let mut d_next = 0.0;

        if next < current {
            let decrease = current - next;
            penalty += self.mono_penalty * decrease * decrease;
            d_next -= 2.0 * self.mono_penalty * decrease;
        }

        let diff = next - current;
        let excess = diff.abs() - self.smooth_allowance;
        if excess > 0.0 {
            penalty += self.smooth_weight * excess * excess;
            d_next += 2.0 * self.smooth_weight * excess * diff.signum();
        }

        (penalty, d_next)
    }
}
