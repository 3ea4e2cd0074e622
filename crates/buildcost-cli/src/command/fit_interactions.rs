use std::path::PathBuf;

use anyhow::Context;
use buildcost_fit::interaction::{
    DEFAULT_RIDGE, DEFAULT_TARGET_MEAN, InteractionConfig, InteractionWeight, fit_interactions,
};
use buildcost_model::{AttributeSet, GroupLookup};
use buildcost_stats::descriptive::DescriptiveStats;
use serde::Serialize;

use crate::{
    ingest::{self, IngestOptions},
    util::{self, Output},
};

const DEFAULT_OVERALL: u32 = 99;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct FitInteractionsArg {
    /// Build CSV with a height column and one column per attribute
    input: PathBuf,
    /// Weight table JSON file
    #[arg(long)]
    weights: PathBuf,
    /// Only use builds with this overall rating
    #[arg(long, default_value_t = DEFAULT_OVERALL)]
    overall: u32,
    /// Total every build should reach
    #[arg(long, default_value_t = DEFAULT_TARGET_MEAN)]
    target_mean: f64,
    /// Ridge strength of the regression
    #[arg(long, default_value_t = DEFAULT_RIDGE)]
    ridge: f64,
    /// Use the closest known height for builds whose height is not in the table
    #[arg(long)]
    nearest_height: bool,
    /// Also save the interaction weights as JSON to this path
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct PairWeight<'a> {
    first: &'a str,
    second: &'a str,
    weight: f64,
}

impl<'a> From<&'a InteractionWeight> for PairWeight<'a> {
    fn from(w: &'a InteractionWeight) -> Self {
        Self {
            first: &w.first,
            second: &w.second,
            weight: w.weight,
        }
    }
}

fn format_totals(stats: &DescriptiveStats) -> String {
    format!(
        "mean={:.1}, std={:.1}, min={:.1}, max={:.1}",
        stats.mean, stats.std_dev, stats.min, stats.max
    )
}

pub(crate) fn run(arg: &FitInteractionsArg) -> anyhow::Result<()> {
    let FitInteractionsArg {
        input,
        weights,
        overall,
        target_mean,
        ridge,
        nearest_height,
        output,
    } = arg;

    let attributes = AttributeSet::default();
    eprintln!("Loading weights from {}...", weights.display());
    let table = util::read_weight_table(weights)?;

    eprintln!("Loading builds from {}...", input.display());
    let mut loaded = ingest::read_builds_file(input, &attributes, &IngestOptions::total_cost())?;
    loaded.report_dropped();
    loaded.retain_overall(*overall);
    eprintln!("Loaded {} builds with overall={overall}", loaded.records.len());

    let config = InteractionConfig {
        target_mean: *target_mean,
        ridge: *ridge,
        lookup: if *nearest_height {
            GroupLookup::Nearest
        } else {
            GroupLookup::Exact
        },
        ..InteractionConfig::default()
    };
    let fit = fit_interactions(&loaded.records, &table, &attributes, &config)
        .context("Failed to fit interaction weights")?;
    if fit.skipped > 0 {
        eprintln!(
            "warning: {} builds could not be priced by the weight table and were skipped",
            fit.skipped
        );
    }

    println!("Base totals: {}", format_totals(&fit.base));
    println!();
    println!("Top interaction weights (sorted by absolute weight):");
    for w in &fit.weights {
        println!("  ({}, {}): {:.3}", w.first, w.second, w.weight);
    }
    println!();
    println!("Totals after interaction adjustment:");
    println!("  {}", format_totals(&fit.adjusted));

    if output.is_some() {
        let pairs = fit.weights.iter().map(PairWeight::from).collect::<Vec<_>>();
        Output::save_json(&pairs, output.clone())?;
    }

    Ok(())
}
