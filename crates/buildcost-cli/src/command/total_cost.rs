use std::path::PathBuf;

use buildcost_model::{AttributeSet, BuildRecord, GroupLookup, WeightTable};
use buildcost_stats::descriptive::DescriptiveStats;
use serde::Serialize;

use crate::{
    ingest::{self, IngestOptions},
    util::{self, Output},
};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct TotalCostArg {
    /// Build CSV with a height column and one column per attribute
    input: PathBuf,
    /// Weight table JSON file
    #[arg(long)]
    weights: PathBuf,
    /// Only price builds with this overall rating
    #[arg(long)]
    overall: Option<u32>,
    /// Price builds with an unknown height using the closest known height
    #[arg(long)]
    nearest_height: bool,
    /// Also save the per-build results as JSON to this path
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct BuildCost {
    position: Option<String>,
    height: u32,
    overall: Option<u32>,
    total_cost: f64,
}

fn price_builds(
    records: &[BuildRecord],
    table: &WeightTable,
    attributes: &AttributeSet,
    lookup: GroupLookup,
) -> Vec<BuildCost> {
    records
        .iter()
        .filter_map(|record| {
            let total_cost = table.build_cost(record, attributes, lookup)?;
            Some(BuildCost {
                position: record.position.clone(),
                height: record.group_key,
                overall: record.overall,
                total_cost,
            })
        })
        .collect()
}

pub(crate) fn run(arg: &TotalCostArg) -> anyhow::Result<()> {
    let TotalCostArg {
        input,
        weights,
        overall,
        nearest_height,
        output,
    } = arg;

    let attributes = AttributeSet::default();
    eprintln!("Loading weights from {}...", weights.display());
    let table = util::read_weight_table(weights)?;

    eprintln!("Loading builds from {}...", input.display());
    let mut loaded = ingest::read_builds_file(input, &attributes, &IngestOptions::total_cost())?;
    eprintln!("Loaded {} builds", loaded.records.len());
    loaded.report_dropped();

    if let Some(overall) = overall {
        loaded.retain_overall(*overall);
        eprintln!(
            "Filtered to {} builds with overall={overall}",
            loaded.records.len()
        );
    }
    if loaded.records.is_empty() {
        eprintln!("No builds found matching criteria");
        return Ok(());
    }

    let lookup = if *nearest_height {
        GroupLookup::Nearest
    } else {
        GroupLookup::Exact
    };
    let results = price_builds(&loaded.records, &table, &attributes, lookup);
    let unpriced = loaded.records.len() - results.len();
    if unpriced > 0 {
        eprintln!("warning: {unpriced} builds have a height missing from the weight table");
    }
    let Some(stats) = DescriptiveStats::new(results.iter().map(|r| r.total_cost)) else {
        eprintln!("Could not calculate the total cost of any build");
        return Ok(());
    };

    println!("Results for {} builds:", results.len());
    println!("{}", "-".repeat(48));
    println!("{:<10} {:<8} {:<8} {:>15}", "Position", "Height", "Overall", "Total Cost");
    println!("{}", "-".repeat(48));
    for r in &results {
        let height = format!("{}\"", r.height);
        let overall = r.overall.map_or_else(|| "-".to_owned(), |o| o.to_string());
        println!(
            "{:<10} {height:<8} {overall:<8} {:>15.0}",
            r.position.as_deref().unwrap_or("Unknown"),
            r.total_cost
        );
    }
    println!("{}", "-".repeat(48));
    println!();
    println!("Statistics:");
    println!("  Mean:   {:.0}", stats.mean);
    println!("  Median: {:.0}", stats.median);
    println!("  Min:    {:.0}", stats.min);
    println!("  Max:    {:.0}", stats.max);
    println!("  Std:    {:.0}", stats.std_dev);
    if let Some(overall) = overall {
        println!();
        println!(
            "Suggested total cost constant for overall={overall}: {:.0}",
            stats.mean
        );
    }

    if output.is_some() {
        Output::save_json(&results, output.clone())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use buildcost_model::GroupWeights;

    use super::*;

    #[test]
    fn test_price_builds_skips_unknown_heights() {
        let attributes = AttributeSet::new(["A", "B"]);
        let mut group = GroupWeights::new();
        group.insert("A", vec![Some(0.0), Some(10.0), Some(20.0)]);
        let mut table = WeightTable::new();
        table.insert(80, group);

        let records = [
            BuildRecord::new(80, [("A", 27), ("B", 99)], 0.0),
            BuildRecord::new(83, [("A", 26), ("B", 99)], 0.0),
        ];
        let exact = price_builds(&records, &table, &attributes, GroupLookup::Exact);
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].total_cost, 30.0);

        let nearest = price_builds(&records, &table, &attributes, GroupLookup::Nearest);
        assert_eq!(nearest.len(), 2);
        assert_eq!(nearest[1].height, 83);
        assert_eq!(nearest[1].total_cost, 10.0);
    }
}
