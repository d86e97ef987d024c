use std::path::PathBuf;

use crate::util::{self, Output};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct RewardsArg {
    /// Checkpoint file path
    checkpoint: PathBuf,
    /// Output CSV file path (stdout if omitted)
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &RewardsArg) -> anyhow::Result<()> {
    let RewardsArg { checkpoint, output } = arg;
    let checkpoint = util::load_checkpoint(checkpoint)?;

    let mut output = Output::from_output_path(output.clone())?;
    output.write_csv(&["step", "reward"], reward_rows(&checkpoint.reward))?;
    if let Output::File { .. } = output {
        eprintln!(
            "Wrote {} rewards to {}",
            checkpoint.reward.len(),
            output.display_path()
        );
    }
    Ok(())
}

fn reward_rows(rewards: &[f64]) -> impl Iterator<Item = [String; 2]> + '_ {
    rewards
        .iter()
        .enumerate()
        .map(|(step, reward)| [step.to_string(), reward.to_string()])
}
