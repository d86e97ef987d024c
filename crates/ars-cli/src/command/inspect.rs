use std::path::PathBuf;

use ars_stats::descriptive::DescriptiveStats;
use ars_training::normalizer::VARIANCE_FLOOR;

use crate::util;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct InspectArg {
    /// Checkpoint file path
    checkpoint: PathBuf,
}

pub(crate) fn run(arg: &InspectArg) -> anyhow::Result<()> {
    let InspectArg { checkpoint } = arg;
    let checkpoint = util::load_checkpoint(checkpoint)?;
    let hp = util::checkpoint_hyperparams(&checkpoint)?;

    eprintln!("Run: {}", checkpoint.hyperparam);
    eprintln!("  Saved at: {}", checkpoint.saved_at);
    eprintln!("  Steps completed: {} / {}", checkpoint.step + 1, hp.nb_steps());
    eprintln!("  Learning rate: {}", hp.learning_rate());
    eprintln!("  Noise: {}", hp.noise());
    eprintln!(
        "  Directions: {} best of {}",
        hp.nb_best_directions(),
        hp.nb_directions()
    );
    eprintln!("  Normalization: {}", hp.normalization());

    let (rows, cols) = checkpoint.param.shape();
    eprintln!("Policy: {rows} actions x {cols} observations");
    for (action, row) in checkpoint.param.iter_rows().enumerate() {
        let weights = row.iter().map(|w| format!("{w:+.4}")).collect::<Vec<_>>();
        eprintln!("  Action #{action}: [{}]", weights.join(", "));
    }

    match &checkpoint.normalizer {
        Some(stats) => {
            eprintln!("Normalizer: {} states observed", stats.count());
            for (i, (mean, var)) in stats
                .mean()
                .iter()
                .zip(stats.variance(VARIANCE_FLOOR))
                .enumerate()
            {
                eprintln!("  Dim #{i}: mean={mean:+.4}, var={var:.4}");
            }
        }
        None => eprintln!("Normalizer: none"),
    }

    if let Some(stats) = DescriptiveStats::new(checkpoint.reward.iter().copied()) {
        eprintln!("Evaluation reward over {} steps:", stats.count);
        eprintln!(
            "  mean={:.3}, std_dev={:.3}, min={:.3}, median={:.3}, max={:.3}",
            stats.mean, stats.std_dev, stats.min, stats.median, stats.max
        );
        if let Some(last) = checkpoint.reward.last() {
            eprintln!("  last={last:.3}");
        }
    }
    Ok(())
}
