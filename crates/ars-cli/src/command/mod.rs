use clap::{Parser, Subcommand};

use self::{
    evaluate::EvaluateArg, inspect::InspectArg, rewards::RewardsArg, train::TrainArg,
};

mod evaluate;
mod inspect;
mod rewards;
mod train;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Train a linear policy with augmented random search
    Train(#[clap(flatten)] TrainArg),
    /// Play a trained policy without perturbation
    Evaluate(#[clap(flatten)] EvaluateArg),
    /// Summarize a checkpoint
    Inspect(#[clap(flatten)] InspectArg),
    /// Export the evaluation-reward history of a checkpoint as CSV
    Rewards(#[clap(flatten)] RewardsArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Train(arg) => train::run(&arg)?,
        Mode::Evaluate(arg) => evaluate::run(&arg)?,
        Mode::Inspect(arg) => inspect::run(&arg)?,
        Mode::Rewards(arg) => rewards::run(&arg)?,
    }
    Ok(())
}
