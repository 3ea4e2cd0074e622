//! Per-group weight fitting.
//!
//! Groups (heights) are independent: [`fit_group`] is a pure function of one
//! group's observations, the optional prior and the configuration, and
//! [`fit_groups`] simply runs it for every group on its own thread.

use std::{num::NonZeroUsize, thread};

use buildcost_model::{AttributeSet, BuildRecord, GroupWeights, ValueRange, WeightTable};

use crate::{
    assemble::assemble,
    objective::{CompositeObjective, LossPolicy, ObjectiveTerms, ObjectiveWeights, PrimaryLoss},
    observation::{ObservationSet, group_keys},
    penalty::ConstraintPenalty,
    prior::prior_vector,
    solver::{Minimization, SolverOptions, minimize_nonnegative},
    validation::Validation,
};

/// Starting value of every weight when no prior is available.
pub const DEFAULT_INITIAL_WEIGHT: f64 = 50.0;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum FitError {
    #[display("no build records with a usable group key")]
    NoGroups,
    #[display(
        "optimized window {window_min}..={window_max} is outside the display range {display_min}..={display_max}"
    )]
    WindowOutsideDisplay {
        window_min: u32,
        window_max: u32,
        display_min: u32,
        display_max: u32,
    },
}

/// Everything that parameterizes a fit.
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub attributes: AttributeSet,
    /// Values whose weights are optimized.
    pub window: ValueRange,
    /// Values covered by the output table.
    pub display: ValueRange,
    pub penalty: ConstraintPenalty,
    pub weights: ObjectiveWeights,
    pub loss: LossPolicy,
    pub solver: SolverOptions,
    pub initial_weight: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            attributes: AttributeSet::default(),
            window: ValueRange::DISPLAY,
            display: ValueRange::DISPLAY,
            penalty: ConstraintPenalty::default(),
            weights: ObjectiveWeights::default(),
            loss: LossPolicy::default(),
            solver: SolverOptions::default(),
            initial_weight: DEFAULT_INITIAL_WEIGHT,
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<(), FitError> {
        if !self.display.contains_range(self.window) {
            return Err(FitError::WindowOutsideDisplay {
                window_min: self.window.min(),
                window_max: self.window.max(),
                display_min: self.display.min(),
                display_max: self.display.max(),
            });
        }
        Ok(())
    }
}

/// Outcome of fitting one group.
#[derive(Debug, Clone)]
pub struct GroupFit {
    pub group_key: u32,
    /// Number of builds in the group.
    pub builds: usize,
    pub prior_used: bool,
    pub loss: PrimaryLoss,
    /// Objective terms at the returned point.
    pub terms: ObjectiveTerms,
    /// Raw solver output, indexed like the group's parameter index.
    pub minimization: Minimization,
    pub validation: Validation,
    /// The assembled display-range weights written to the table.
    pub weights: GroupWeights,
}

/// Outcome of fitting every group.
#[derive(Debug, Clone)]
pub struct FitRun {
    pub table: WeightTable,
    /// Per-group results in ascending group key order.
    pub groups: Vec<GroupFit>,
}

/// Fits the weights of a single group.
///
/// The warm start is the prior projected onto the group's parameter index when
/// `prior` has an entry for the group, and [`FitConfig::initial_weight`]
/// everywhere otherwise.
///
/// # Panics
///
/// Panics if `observations` was not built with `config.attributes` and
/// `config.window`, or if the window lies outside the display range.
#[must_use]
pub fn fit_group(
    observations: &ObservationSet,
    prior: Option<&WeightTable>,
    config: &FitConfig,
) -> GroupFit {
    let index = *observations.index();
    assert_eq!(index.attribute_count(), config.attributes.len());
    assert_eq!(index.window(), config.window);

    let group_key = observations.group_key();
    let prior_weights = prior_vector(prior, group_key, &config.attributes, &index, config.display);
    let loss = config.loss.resolve(observations);
    let objective = CompositeObjective::new(
        observations,
        prior_weights.as_deref(),
        config.penalty,
        config.weights,
        loss,
    );

    let x0 = prior_weights
        .clone()
        .unwrap_or_else(|| vec![config.initial_weight; index.len()]);
    let minimization = minimize_nonnegative(&objective, x0, &config.solver);
    let terms = objective.terms(&minimization.x);
    let validation = Validation::new(observations, &minimization.x);
    let weights = assemble(
        &minimization.x,
        &index,
        &config.attributes,
        prior.and_then(|table| table.group(group_key)),
        config.display,
    );

    GroupFit {
        group_key,
        builds: observations.len(),
        prior_used: prior_weights.is_some(),
        loss,
        terms,
        minimization,
        validation,
        weights,
    }
}

/// Fits every group found in `records`, one thread per group and at most
/// [`thread::available_parallelism`] groups at a time.
///
/// # Errors
///
/// Returns [`FitError::WindowOutsideDisplay`] for an invalid configuration and
/// [`FitError::NoGroups`] if `records` is empty.
pub fn fit_groups(
    records: &[BuildRecord],
    prior: Option<&WeightTable>,
    config: &FitConfig,
) -> Result<FitRun, FitError> {
    config.validate()?;

    let observations = group_keys(records)
        .into_iter()
        .filter_map(|key| ObservationSet::build(records, key, &config.attributes, config.window))
        .collect::<Vec<_>>();
    if observations.is_empty() {
        return Err(FitError::NoGroups);
    }

    let workers = thread::available_parallelism().map_or(1, NonZeroUsize::get);
    let mut slots = observations.iter().map(|_| None).collect::<Vec<_>>();
    for (batch, batch_slots) in observations.chunks(workers).zip(slots.chunks_mut(workers)) {
        thread::scope(|s| {
            for (obs, slot) in batch.iter().zip(batch_slots) {
                s.spawn(move || {
                    *slot = Some(fit_group(obs, prior, config));
                });
            }
        });
    }
    let groups = slots.into_iter().flatten().collect::<Vec<GroupFit>>();

    let mut table = WeightTable::new();
    for fit in &groups {
        table.insert(fit.group_key, fit.weights.clone());
    }
    Ok(FitRun { table, groups })
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_distr::Normal;
    use rand_pcg::Pcg32;

    use super::*;

    fn single_attribute_config(window: ValueRange) -> FitConfig {
        FitConfig {
            attributes: AttributeSet::new(["A"]),
            window,
            ..FitConfig::default()
        }
    }

    /// Builds whose target is an increasing function of a single attribute, with
    /// a little noise.
    fn increasing_builds(rng: &mut Pcg32, count: usize) -> Vec<BuildRecord> {
        let noise = Normal::new(0.0, 0.5).unwrap();
        (0..count)
            .map(|_| {
                let value: u32 = rng.random_range(26..=34);
                let true_cost = 5.0 * f64::from(value - 25) + 0.5 * f64::from(value - 25).powi(2);
                BuildRecord::new(80, [("A", value)], true_cost + rng.sample(noise))
            })
            .collect()
    }

    fn l2_distance(a: &[f64], b: &[f64]) -> f64 {
        std::iter::zip(a, b)
            .map(|(x, y)| (x - y).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// Uses the MSE loss: under the default variance loss with no prior every
    /// weight shrinks towards zero, so the recovered shape says nothing.
    #[test]
    fn test_increasing_cost_recovers_monotone_weights() {
        let mut rng = Pcg32::seed_from_u64(42);
        let records = increasing_builds(&mut rng, 200);
        let config = FitConfig {
            loss: LossPolicy::Mse,
            ..single_attribute_config(ValueRange::new(25, 34))
        };
        let obs = ObservationSet::build(&records, 80, &config.attributes, config.window).unwrap();
        let fit = fit_group(&obs, None, &config);

        assert!(fit.minimization.termination.is_converged());
        let x = &fit.minimization.x;
        for pair in x[1..].windows(2) {
            assert!(pair[1] >= pair[0] - 1e-3, "not monotone: {x:?}");
        }
        assert!(fit.validation.passed());
    }

    #[test]
    fn test_prior_from_same_data_is_a_fixed_point() {
        let mut rng = Pcg32::seed_from_u64(7);
        let records = increasing_builds(&mut rng, 200);
        let config = FitConfig {
            loss: LossPolicy::Mse,
            ..single_attribute_config(ValueRange::new(25, 34))
        };
        let first = fit_groups(&records, None, &config).unwrap();

        let obs = ObservationSet::build(&records, 80, &config.attributes, config.window).unwrap();
        let second = fit_group(&obs, Some(&first.table), &config);
        assert!(second.prior_used);

        let prior = prior_vector(
            Some(&first.table),
            80,
            &config.attributes,
            obs.index(),
            config.display,
        )
        .unwrap();
        let distance = l2_distance(&second.minimization.x, &prior);
        assert!(distance < 0.5, "moved {distance} away from the prior");
    }

    #[test]
    fn test_identical_targets_give_equal_totals() {
        let mut rng = Pcg32::seed_from_u64(3);
        let attributes = AttributeSet::new(["A", "B", "C"]);
        let records = (0..40)
            .map(|_| {
                let values = attributes
                    .iter()
                    .map(|name| (name, rng.random_range(25..=99_u32)))
                    .collect::<Vec<_>>();
                BuildRecord::new(78, values, 99.0)
            })
            .collect::<Vec<_>>();
        let config = FitConfig {
            attributes,
            ..FitConfig::default()
        };
        let run = fit_groups(&records, None, &config).unwrap();
        let fit = &run.groups[0];

        assert_eq!(fit.loss, PrimaryLoss::Variance);
        let predictions = fit.validation.predictions.as_ref().unwrap();
        assert!(predictions.variance < 1e-3, "variance {}", predictions.variance);
    }

    #[test]
    fn test_two_builds_end_to_end() {
        let records = [
            BuildRecord::new(80, [("A", 30)], 99.0),
            BuildRecord::new(80, [("A", 40)], 99.0),
        ];
        let config = single_attribute_config(ValueRange::DISPLAY);
        let run = fit_groups(&records, None, &config).unwrap();
        assert_eq!(run.groups.len(), 1);

        let fit = &run.groups[0];
        let x = &fit.minimization.x;
        let obs = ObservationSet::build(&records, 80, &config.attributes, config.window).unwrap();
        let index = obs.index();
        let w30 = x[index.column(0, 30).unwrap()];
        let w40 = x[index.column(0, 40).unwrap()];
        assert!((w30 - w40).abs() < 1e-6);
        assert!(w40 >= w30 - 1e-9);

        let a = run.table.group(80).unwrap().attribute("A").unwrap();
        assert_eq!(a.len(), 75);
        assert_eq!(a[0], Some(0.0));
    }

    #[test]
    fn test_groups_are_fitted_independently() {
        let records = [
            BuildRecord::new(76, [("A", 30)], 99.0),
            BuildRecord::new(84, [("A", 40)], 98.0),
            BuildRecord::new(76, [("A", 35)], 99.0),
        ];
        let config = single_attribute_config(ValueRange::new(25, 50));
        let run = fit_groups(&records, None, &config).unwrap();

        let keys = run.groups.iter().map(|g| g.group_key).collect::<Vec<_>>();
        assert_eq!(keys, vec![76, 84]);
        assert_eq!(run.groups[0].builds, 2);
        assert_eq!(run.groups[1].builds, 1);
        assert_eq!(run.table.len(), 2);
    }

    #[test]
    fn test_more_groups_than_threads_keep_key_order() {
        let workers = thread::available_parallelism().map_or(1, NonZeroUsize::get);
        let keys = (0..u32::try_from(2 * workers + 1).unwrap())
            .map(|i| 60 + i)
            .collect::<Vec<_>>();
        let records = keys
            .iter()
            .rev()
            .map(|&key| BuildRecord::new(key, [("A", 27)], 99.0))
            .collect::<Vec<_>>();
        let config = single_attribute_config(ValueRange::new(25, 28));
        let run = fit_groups(&records, None, &config).unwrap();

        let fitted = run.groups.iter().map(|g| g.group_key).collect::<Vec<_>>();
        assert_eq!(fitted, keys);
        assert_eq!(run.table.len(), keys.len());
    }

    #[test]
    fn test_no_records_is_an_error() {
        let result = fit_groups(&[], None, &FitConfig::default());
        assert!(matches!(result, Err(FitError::NoGroups)));
    }

    #[test]
    fn test_window_outside_display_is_rejected() {
        let config = FitConfig {
            window: ValueRange::new(20, 60),
            ..FitConfig::default()
        };
        let records = [BuildRecord::new(80, [("Block", 30)], 99.0)];
        assert!(matches!(
            fit_groups(&records, None, &config),
            Err(FitError::WindowOutsideDisplay { window_min: 20, .. })
        ));
    }
}
