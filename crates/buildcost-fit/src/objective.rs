//! The composite objective minimized by the weight fit.
//!
//! ```text
//! primary_loss(X, y, w)
//!     + l2         * ||w||²
//!     + prior      * ||w - prior||²        (only with a prior)
//!     + constraint * penalty(w)
//! ```
//!
//! # Primary loss
//!
//! Most datasets are builds that all share the same overall rating, so the target
//! is a constant whose cost-scale value is unknown. Matching it exactly is
//! meaningless; what matters is that the model prices all of those builds the
//! same. The default [`LossPolicy::Variance`] therefore minimizes the variance of
//! the predictions around their own mean and ignores the target values, even when
//! they differ between builds. [`LossPolicy::Auto`] and [`LossPolicy::Mse`] fit
//! the targets themselves.

use crate::{observation::ObservationSet, penalty::ConstraintPenalty};

pub const DEFAULT_L2: f64 = 0.001;
pub const DEFAULT_CONSTRAINT_WEIGHT: f64 = 0.1;
pub const DEFAULT_PRIOR_WEIGHT: f64 = 2.0;

/// Targets closer than this are treated as identical by [`LossPolicy::Auto`].
pub const CONSTANT_TARGET_TOLERANCE: f64 = 1e-9;

/// A differentiable function minimized by [`crate::solver`].
pub trait Objective {
    /// Number of parameters.
    fn dimension(&self) -> usize;

    /// Evaluates the objective at `x` and writes its gradient to `gradient`.
    fn value_and_gradient(&self, x: &[f64], gradient: &mut [f64]) -> f64;

    fn value(&self, x: &[f64]) -> f64 {
        let mut gradient = vec![0.0; self.dimension()];
        self.value_and_gradient(x, &mut gradient)
    }
}

/// How the primary loss is chosen.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, derive_more::FromStr)]
pub enum LossPolicy {
    /// Always prediction variance, whatever the targets are.
    #[default]
    Variance,
    /// Prediction variance if all targets are identical, mean squared error otherwise.
    Auto,
    /// Always mean squared error against the targets.
    Mse,
}

impl LossPolicy {
    /// Resolves the policy for a concrete observation set.
    #[must_use]
    pub fn resolve(self, observations: &ObservationSet) -> PrimaryLoss {
        match self {
            Self::Variance => PrimaryLoss::Variance,
            Self::Mse => PrimaryLoss::MeanSquaredError,
            Self::Auto => {
                if observations.targets_constant(CONSTANT_TARGET_TOLERANCE) {
                    PrimaryLoss::Variance
                } else {
                    PrimaryLoss::MeanSquaredError
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum PrimaryLoss {
    #[display("prediction variance")]
    Variance,
    #[display("mean squared error")]
    MeanSquaredError,
}

/// Strengths of the terms added to the primary loss.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectiveWeights {
    pub l2: f64,
    pub constraint: f64,
    pub prior: f64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            l2: DEFAULT_L2,
            constraint: DEFAULT_CONSTRAINT_WEIGHT,
            prior: DEFAULT_PRIOR_WEIGHT,
        }
    }
}

/// Value of each objective term at one point, already scaled by its weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectiveTerms {
    pub primary: f64,
    pub l2: f64,
    pub prior: f64,
    pub constraint: f64,
}

impl ObjectiveTerms {
    #[must_use]
    pub fn total(&self) -> f64 {
        self.primary + self.l2 + self.prior + self.constraint
    }
}

/// Primary loss plus L2, prior-deviation and constraint terms for one group.
#[derive(Debug)]
pub struct CompositeObjective<'a> {
    observations: &'a ObservationSet,
    prior: Option<&'a [f64]>,
    penalty: ConstraintPenalty,
    weights: ObjectiveWeights,
    loss: PrimaryLoss,
}

impl<'a> CompositeObjective<'a> {
    #[must_use]
    pub fn new(
        observations: &'a ObservationSet,
        prior: Option<&'a [f64]>,
        penalty: ConstraintPenalty,
        weights: ObjectiveWeights,
        loss: PrimaryLoss,
    ) -> Self {
        if let Some(prior) = prior {
            assert_eq!(prior.len(), observations.index().len());
        }
        Self {
            observations,
            prior,
            penalty,
            weights,
            loss,
        }
    }

    #[must_use]
    pub fn loss(&self) -> PrimaryLoss {
        self.loss
    }

    /// Breaks the objective at `x` down into its terms.
    #[must_use]
    pub fn terms(&self, x: &[f64]) -> ObjectiveTerms {
        let mut gradient = vec![0.0; x.len()];
        self.evaluate(x, &mut gradient)
    }

    /// Residual of each row under the primary loss: deviation from the mean
    /// prediction for variance, deviation from the target for MSE.
    fn residuals(&self, predictions: &[f64]) -> Vec<f64> {
        match self.loss {
            PrimaryLoss::Variance => {
                #[expect(clippy::cast_precision_loss)]
                let mean = predictions.iter().sum::<f64>() / predictions.len() as f64;
                predictions.iter().map(|p| p - mean).collect()
            }
            PrimaryLoss::MeanSquaredError => std::iter::zip(predictions, self.observations.targets())
                .map(|(p, y)| p - y)
                .collect(),
        }
    }

    fn evaluate(&self, x: &[f64], gradient: &mut [f64]) -> ObjectiveTerms {
        assert_eq!(x.len(), gradient.len());
        gradient.fill(0.0);

        let design = self.observations.design();
        let predictions = design.predict(x);
        let primary = if predictions.is_empty() {
            0.0
        } else {
            // The mean term of the variance drops out of the gradient because the
            // residuals sum to zero.
            let residuals = self.residuals(&predictions);
            #[expect(clippy::cast_precision_loss)]
            let n = residuals.len() as f64;
            for (row, r) in design.rows().zip(&residuals) {
                for &column in row {
                    gradient[column] += 2.0 * r / n;
                }
            }
            residuals.iter().map(|r| r * r).sum::<f64>() / n
        };

        let mut l2 = 0.0;
        for (g, w) in gradient.iter_mut().zip(x) {
            l2 += w * w;
            *g += 2.0 * self.weights.l2 * w;
        }

        let mut prior_sq = 0.0;
        if let Some(prior) = self.prior {
            for ((g, w), p) in gradient.iter_mut().zip(x).zip(prior) {
                let d = w - p;
                prior_sq += d * d;
                *g += 2.0 * self.weights.prior * d;
            }
        }

        let penalty = self.penalty.accumulate_gradient(
            x,
            self.observations.index(),
            self.weights.constraint,
            gradient,
        );

        ObjectiveTerms {
            primary,
            l2: self.weights.l2 * l2,
            prior: self.weights.prior * prior_sq,
            constraint: self.weights.constraint * penalty,
        }
    }
}

impl Objective for CompositeObjective<'_> {
    fn dimension(&self) -> usize {
        self.observations.index().len()
    }

    fn value_and_gradient(&self, x: &[f64], gradient: &mut [f64]) -> f64 {
        self.evaluate(x, gradient).total()
    }
}
