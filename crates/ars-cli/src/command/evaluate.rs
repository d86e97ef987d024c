use std::path::PathBuf;

use anyhow::Context as _;
use ars_env::{EnvKind, Environment as _, TimeLimit};
use ars_stats::descriptive::DescriptiveStats;
use ars_training::{
    checkpoint::Checkpoint,
    hyperparams::Hyperparams,
    normalizer::Normalizer,
    policy::{Direction, LinearPolicy},
    rollout,
};

use crate::util;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct EvaluateArg {
    /// Checkpoint file path
    checkpoint: PathBuf,
    /// Environment the policy was trained on
    #[arg(long, default_value = "cartpole")]
    env: EnvKind,
    /// Number of episodes to play
    #[arg(long, default_value_t = 10)]
    episodes: usize,
    /// Seed of the first episode's environment
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

pub(crate) fn run(arg: &EvaluateArg) -> anyhow::Result<()> {
    let EvaluateArg {
        checkpoint,
        env,
        episodes,
        seed,
    } = arg;

    eprintln!("Loading checkpoint from {}...", checkpoint.display());
    let checkpoint = util::load_checkpoint(checkpoint)?;
    let hp = util::checkpoint_hyperparams(&checkpoint)?;
    eprintln!("Loaded run {} at step #{}", checkpoint.hyperparam, checkpoint.step);

    let rewards = evaluate(&checkpoint, &hp, *env, *episodes, *seed)?;
    for (i, reward) in rewards.iter().enumerate() {
        eprintln!("  Episode #{i}: {reward:.3}");
    }
    if let Some(stats) = DescriptiveStats::new(rewards) {
        eprintln!(
            "Reward: mean={:.3}, std_dev={:.3}, min={:.3}, median={:.3}, max={:.3}",
            stats.mean, stats.std_dev, stats.min, stats.median, stats.max
        );
    }
    Ok(())
}

/// Plays `episodes` unperturbed episodes and returns their rewards.
///
/// Every episode starts from the checkpoint's normalizer statistics, so what
/// one episode observes does not leak into the next.
fn evaluate(
    checkpoint: &Checkpoint,
    hp: &Hyperparams,
    kind: EnvKind,
    episodes: usize,
    seed: u64,
) -> anyhow::Result<Vec<f64>> {
    let sample = kind.make(seed);
    let (observation_dim, action_count) = (sample.observation_dim(), sample.action_count());
    checkpoint
        .param
        .check_shape(action_count, observation_dim)
        .with_context(|| format!("Checkpoint does not fit {}", kind.name()))?;

    let normalizer = match &checkpoint.normalizer {
        Some(stats) => Normalizer::from_stats(hp, stats.clone()),
        None => Normalizer::new(hp, observation_dim),
    };
    anyhow::ensure!(
        normalizer.dim() == observation_dim,
        "Checkpoint normalizer has dimension {}, {} observes {}",
        normalizer.dim(),
        kind.name(),
        observation_dim
    );
    let policy = LinearPolicy::with_theta(hp, checkpoint.param.clone());

    (0..episodes)
        .map(|i| {
            let mut env = TimeLimit::new(
                kind.make(seed.wrapping_add(i as u64)),
                hp.episode_length(),
            );
            let mut normalizer = normalizer.clone();
            rollout::explore(&mut env, &mut normalizer, &policy, None, Direction::None)
                .with_context(|| format!("Episode #{i} failed"))
        })
        .collect()
}
