use std::path::PathBuf;

use anyhow::bail;
use buildcost_fit::{
    fit::{FitConfig, GroupFit, fit_groups},
    objective::LossPolicy,
    observation::group_keys,
    solver::{DEFAULT_MAX_ITERATIONS, SolverOptions},
    validation::PASS_THRESHOLD_PERCENT,
};
use buildcost_model::{AttributeSet, ValueRange};

use crate::{
    ingest::{self, DEFAULT_TOTAL_CONSTANT, IngestOptions, TargetKind},
    util::{self, Output},
};

const DEFAULT_OVERALL: u32 = 99;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ReverseEngineerArg {
    /// Build CSV with a height column and one column per attribute
    input: PathBuf,
    /// Previous weight table used as warm start and for values outside the window
    #[arg(long)]
    prior: Option<PathBuf>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
    /// Only fit builds with this overall rating
    #[arg(long, default_value_t = DEFAULT_OVERALL)]
    overall: u32,
    /// Fit builds of every overall rating
    #[arg(long, conflicts_with = "overall")]
    any_overall: bool,
    /// Value each build is fitted against
    #[arg(long, value_enum, default_value_t = TargetKind::Rating)]
    target: TargetKind,
    /// Total cost of every build when the CSV has no total cost column
    #[arg(long, default_value_t = DEFAULT_TOTAL_CONSTANT)]
    total_constant: f64,
    /// Lowest attribute value whose weight is optimized
    #[arg(long, default_value_t = ValueRange::DISPLAY.min())]
    window_min: u32,
    /// Highest attribute value whose weight is optimized
    #[arg(long, default_value_t = ValueRange::DISPLAY.max())]
    window_max: u32,
    /// Primary loss: variance, auto or mse
    #[arg(long, default_value = "variance")]
    loss: LossPolicy,
    /// Iteration ceiling of the optimizer for each height
    #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,
}

impl ReverseEngineerArg {
    fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            target: self.target,
            total_constant: self.total_constant,
        }
    }
}

pub(crate) fn run(arg: &ReverseEngineerArg) -> anyhow::Result<()> {
    let ReverseEngineerArg {
        input,
        prior,
        output,
        overall,
        any_overall,
        target: _,
        total_constant: _,
        window_min,
        window_max,
        loss,
        max_iterations,
    } = arg;

    if window_min > window_max {
        bail!("--window-min {window_min} is greater than --window-max {window_max}");
    }

    let attributes = AttributeSet::default();

    eprintln!("Loading build data from {}...", input.display());
    let mut loaded = ingest::read_builds_file(input, &attributes, &arg.ingest_options())?;
    eprintln!("Loaded {} builds", loaded.records.len());
    loaded.report_dropped();

    if !any_overall {
        loaded.retain_overall(*overall);
        eprintln!(
            "Filtered to {} builds with overall={overall}",
            loaded.records.len()
        );
    }

    let heights = group_keys(&loaded.records);
    if heights.is_empty() {
        bail!("No builds left to fit");
    }
    eprintln!("Heights: {heights:?}");

    let prior = prior.as_deref().and_then(util::read_prior);

    let config = FitConfig {
        attributes,
        window: ValueRange::new(*window_min, *window_max),
        loss: *loss,
        solver: SolverOptions {
            max_iterations: *max_iterations,
            ..SolverOptions::default()
        },
        ..FitConfig::default()
    };
    eprintln!(
        "Optimizing values {}..={} for {} attributes ({} parameters per height)...",
        config.window.min(),
        config.window.max(),
        config.attributes.len(),
        config.window.len() * config.attributes.len(),
    );

    let run = fit_groups(&loaded.records, prior.as_ref(), &config)?;
    for group in &run.groups {
        report_group(group, &config);
    }

    let mut failed = run
        .groups
        .iter()
        .filter(|g| !g.validation.passed())
        .map(|g| g.group_key)
        .peekable();
    if failed.peek().is_some() {
        eprintln!();
        eprintln!(
            "warning: validation failed for heights {:?}",
            failed.collect::<Vec<_>>()
        );
    }

    Output::save_json(&run.table, output.clone())?;

    eprintln!();
    eprintln!("Weights saved successfully");
    if let Some(path) = output {
        eprintln!("  Path: {}", path.display());
    }
    eprintln!("  Heights: {}", run.table.len());

    Ok(())
}

fn report_group(group: &GroupFit, config: &FitConfig) {
    let GroupFit {
        group_key,
        builds,
        prior_used,
        loss,
        terms,
        minimization,
        validation,
        weights: _,
    } = group;

    eprintln!();
    eprintln!("Height {group_key}\":");
    eprintln!("  Builds: {builds}");
    if *prior_used {
        eprintln!("  Start:  prior weights");
    } else {
        eprintln!("  Start:  {} for every weight (no prior)", config.initial_weight);
    }
    eprintln!("  Loss:   {loss}");
    eprintln!(
        "  Solver: {} after {} iterations ({} evaluations)",
        minimization.termination, minimization.iterations, minimization.evaluations
    );
    if !minimization.termination.is_converged() {
        eprintln!(
            "  warning: optimizer did not converge ({}), keeping the best weights found",
            minimization.termination
        );
    }
    eprintln!(
        "  Objective: {:.4} (loss {:.4}, l2 {:.4}, prior {:.4}, constraints {:.4})",
        terms.total(),
        terms.primary,
        terms.l2,
        terms.prior,
        terms.constraint
    );

    let error = &validation.error;
    eprintln!("  RMSE: {:.2}", error.rmse);
    match (error.mean_percent, error.max_percent) {
        (Some(mean), Some(max)) => {
            eprintln!("  Mean error: {mean:.2}%, max error: {max:.2}%");
        }
        _ => eprintln!("  Percentage error undefined: every target is zero"),
    }
    if let (Some(targets), Some(predictions)) = (&validation.targets, &validation.predictions) {
        eprintln!(
            "  Targets:     min {:.1}, max {:.1}, mean {:.1}",
            targets.min, targets.max, targets.mean
        );
        eprintln!(
            "  Predictions: min {:.1}, max {:.1}, mean {:.1}, std {:.3}",
            predictions.min, predictions.max, predictions.mean, predictions.std_dev
        );
    }
    if let Some(weights) = &validation.weights {
        eprintln!(
            "  Weights:     min {:.2}, max {:.2}, mean {:.2}",
            weights.min, weights.max, weights.mean
        );
    }

    if validation.passed() {
        eprintln!("  Validation passed");
    } else {
        eprintln!("  warning: validation failed (mean error not below {PASS_THRESHOLD_PERCENT}%)");
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Debug, Parser)]
    struct Cli {
        #[clap(flatten)]
        arg: ReverseEngineerArg,
    }

    fn parse(args: &[&str]) -> ReverseEngineerArg {
        Cli::try_parse_from(std::iter::once("reverse-engineer").chain(args.iter().copied()))
            .unwrap()
            .arg
    }

    const BUILDS: &str = "height,close shot,block,overall,total weight\n80,60,70,99,1721\n";

    #[test]
    fn test_overall_rating_is_the_default_target() {
        let arg = parse(&["builds.csv"]);
        assert_eq!(arg.target, TargetKind::Rating);

        let attributes = AttributeSet::new(["Close Shot", "Block"]);
        let loaded =
            ingest::load_builds(BUILDS.as_bytes(), &attributes, &arg.ingest_options()).unwrap();
        assert_eq!(loaded.records[0].target, 99.0);
    }

    #[test]
    fn test_total_cost_target_is_opt_in() {
        let arg = parse(&["builds.csv", "--target", "total-cost"]);
        let attributes = AttributeSet::new(["Close Shot", "Block"]);
        let loaded =
            ingest::load_builds(BUILDS.as_bytes(), &attributes, &arg.ingest_options()).unwrap();
        assert_eq!(loaded.records[0].target, 1721.0);
    }
}
