use clap::{Parser, Subcommand};

use self::{estimate::EstimateArg, identify::IdentifyArg};

mod estimate;
mod identify;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// What mode to run the program in
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Sample a table's feature column and identify normalization parameters
    Identify(#[clap(flatten)] IdentifyArg),
    /// Identify normalization parameters from pre-aggregated sample rows
    Estimate(#[clap(flatten)] EstimateArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Identify(arg) => identify::run(&arg)?,
        Mode::Estimate(arg) => estimate::run(&arg)?,
    }
    Ok(())
}
