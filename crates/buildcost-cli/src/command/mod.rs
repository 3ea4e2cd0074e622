use clap::{Parser, Subcommand};

use self::{
    convert_weights::ConvertWeightsArg, fit_interactions::FitInteractionsArg,
    reverse_engineer::ReverseEngineerArg, total_cost::TotalCostArg, vc_weights::VcWeightsArg,
};

mod convert_weights;
mod fit_interactions;
mod reverse_engineer;
mod total_cost;
mod vc_weights;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// What to run
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Recover per-value attribute weights from a CSV of builds
    ReverseEngineer(#[clap(flatten)] ReverseEngineerArg),
    /// Compute the total cost of every build with a known weight table
    TotalCost(#[clap(flatten)] TotalCostArg),
    /// Fill a weight template interactively from cumulative costs
    VcWeights(#[clap(flatten)] VcWeightsArg),
    /// Convert a long or wide weight sheet into a weight table
    ConvertWeights(#[clap(flatten)] ConvertWeightsArg),
    /// Fit pairwise interaction weights on top of a weight table
    FitInteractions(#[clap(flatten)] FitInteractionsArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::ReverseEngineer(arg) => reverse_engineer::run(&arg)?,
        Mode::TotalCost(arg) => total_cost::run(&arg)?,
        Mode::VcWeights(arg) => vc_weights::run(&arg)?,
        Mode::ConvertWeights(arg) => convert_weights::run(&arg)?,
        Mode::FitInteractions(arg) => fit_interactions::run(&arg)?,
    }
    Ok(())
}
