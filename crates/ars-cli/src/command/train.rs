use std::path::PathBuf;

use anyhow::{Context as _, bail};
use ars_env::{EnvKind, Environment as _, TimeLimit};
use ars_training::{
    checkpoint::checkpoint_path,
    hyperparams::{Hyperparams, HyperparamsConfig, NormalizationMode},
    trainer::Trainer,
};
use rand_pcg::Pcg64;

use crate::util;

/// Per-field overrides applied on top of the defaults or `--config`.
#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct HyperparamArgs {
    /// Number of training steps
    #[arg(long)]
    nb_steps: Option<usize>,
    /// Maximum number of environment steps per episode
    #[arg(long)]
    episode_length: Option<usize>,
    /// Step size of the parameter update
    #[arg(long)]
    learning_rate: Option<f64>,
    /// Number of directions sampled per step
    #[arg(long)]
    nb_directions: Option<usize>,
    /// Number of best directions used for the update
    #[arg(long)]
    nb_best_directions: Option<usize>,
    /// Exploration noise
    #[arg(long)]
    noise: Option<f64>,
    /// Random seed
    #[arg(long)]
    seed: Option<u64>,
    /// State normalization mode (v1 or v2)
    #[arg(long)]
    normalization: Option<NormalizationMode>,
}

impl HyperparamArgs {
    fn apply(&self, config: &mut HyperparamsConfig) {
        let Self {
            nb_steps,
            episode_length,
            learning_rate,
            nb_directions,
            nb_best_directions,
            noise,
            seed,
            normalization,
        } = self;
        if let Some(v) = nb_steps {
            config.nb_steps = *v;
        }
        if let Some(v) = episode_length {
            config.episode_length = *v;
        }
        if let Some(v) = learning_rate {
            config.learning_rate = *v;
        }
        if let Some(v) = nb_directions {
            config.nb_directions = *v;
        }
        if let Some(v) = nb_best_directions {
            config.nb_best_directions = *v;
        }
        if let Some(v) = noise {
            config.noise = *v;
        }
        if let Some(v) = seed {
            config.seed = *v;
        }
        if let Some(v) = normalization {
            config.normalization = *v;
        }
    }
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct TrainArg {
    /// Environment to train on (cartpole, mountaincar, targetaction)
    #[arg(long, default_value = "cartpole")]
    env: EnvKind,
    /// JSON file with hyperparameters; missing fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,
    #[clap(flatten)]
    hyperparams: HyperparamArgs,
    /// Directory under which checkpoints are written
    #[arg(long, default_value = "exp/ars/trained_policy")]
    out_dir: PathBuf,
    /// Number of rollout workers, each with its own environment
    #[arg(long, default_value_t = 1)]
    jobs: usize,
    /// Continue from the existing checkpoint of the same run
    #[arg(long)]
    resume: bool,
}

pub(crate) fn run(arg: &TrainArg) -> anyhow::Result<()> {
    let TrainArg {
        env,
        config,
        hyperparams,
        out_dir,
        jobs,
        resume,
    } = arg;
    if *jobs == 0 {
        bail!("--jobs must be at least 1");
    }

    let mut config: HyperparamsConfig = match config {
        Some(path) => util::read_json_file("hyperparameter", path)?,
        None => HyperparamsConfig::default(),
    };
    hyperparams.apply(&mut config);
    let hp = Hyperparams::new(config).context("Invalid hyperparameters")?;

    let mut envs = (0..*jobs)
        .map(|i| TimeLimit::new(env.make(hp.seed().wrapping_add(i as u64)), hp.episode_length()))
        .collect::<Vec<_>>();
    let observation_dim = envs[0].observation_dim();
    let action_count = envs[0].action_count();

    let path = checkpoint_path(out_dir, env.name(), &hp.signature());
    eprintln!("Environment: {}", env.name());
    eprintln!("  Observation dim: {observation_dim}");
    eprintln!("  Action count: {action_count}");
    eprintln!("Run: {}", hp.signature());
    eprintln!("  Checkpoint: {}", path.display());
    eprintln!("  Workers: {jobs}");

    let trainer = if *resume && path.exists() {
        let checkpoint = util::load_checkpoint(&path)?;
        let next_step = checkpoint.step + 1;
        eprintln!("Resuming at step #{next_step}");
        Trainer::resume(
            hp,
            checkpoint,
            observation_dim,
            action_count,
            direction_rng(&hp, next_step),
        )
        .with_context(|| format!("Cannot resume from {}", path.display()))?
    } else {
        if *resume {
            eprintln!("No checkpoint to resume from, starting a new run");
        }
        Trainer::new(hp, observation_dim, action_count, direction_rng(&hp, 0))
            .context("Cannot build a policy for this environment")?
    };
    let mut trainer = trainer.with_checkpoint_path(&path);
    trainer.train(&mut envs)?;

    eprintln!("Training finished after {} steps", trainer.next_step());
    if let Some(last) = trainer.history().last() {
        eprintln!("  Last evaluation reward: {last:.3}");
    }
    eprintln!("  Checkpoint: {}", path.display());
    Ok(())
}

/// Direction RNG for a run entering `next_step`.
///
/// The seed fixes the generator state and `next_step` selects the PCG stream,
/// so every `(seed, next_step)` pair draws its own sequence. A resumed run
/// never replays the directions of a run with another seed, and resuming the
/// same checkpoint twice draws the same directions. It does not continue the
/// sequence the interrupted run would have drawn.
fn direction_rng(hp: &Hyperparams, next_step: usize) -> Pcg64 {
    Pcg64::new(u128::from(hp.seed()), next_step as u128)
}

#[cfg(test)]
mod tests {
    use rand::RngCore as _;

    use super::*;

    #[test]
    fn test_overrides_only_given_fields() {
        let args = HyperparamArgs {
            nb_directions: Some(4),
            normalization: Some(NormalizationMode::V1),
            ..HyperparamArgs::default()
        };
        let mut config = HyperparamsConfig::default();
        args.apply(&mut config);
        assert_eq!(
            config,
            HyperparamsConfig {
                nb_directions: 4,
                normalization: NormalizationMode::V1,
                ..HyperparamsConfig::default()
            }
        );
    }

    #[test]
    fn test_train_and_resume_target_action() {
        let dir = tempfile::tempdir().unwrap();
        let mut arg = TrainArg {
            env: EnvKind::TargetAction,
            config: None,
            hyperparams: HyperparamArgs {
                nb_steps: Some(3),
                episode_length: Some(5),
                nb_directions: Some(4),
                nb_best_directions: Some(2),
                ..HyperparamArgs::default()
            },
            out_dir: dir.path().to_owned(),
            jobs: 2,
            resume: false,
        };
        run(&arg).unwrap();

        let path = dir
            .path()
            .join("TargetAction")
            .join("3_5_0.02_4_2_0.02_1_v2.json");
        let checkpoint = util::load_checkpoint(&path).unwrap();
        assert_eq!(checkpoint.step, 2);
        assert_eq!(checkpoint.reward.len(), 3);

        arg.resume = true;
        run(&arg).unwrap();
        let resumed = util::load_checkpoint(&path).unwrap();
        assert_eq!(resumed.step, 2);
        assert_eq!(resumed.reward, checkpoint.reward);
    }

    fn draws(mut rng: Pcg64) -> Vec<u64> {
        (0..4).map(|_| rng.next_u64()).collect()
    }

    fn seeded(seed: u64) -> Hyperparams {
        Hyperparams::new(HyperparamsConfig {
            seed,
            ..HyperparamsConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_resumed_stream_differs_from_other_seeds() {
        let resumed = draws(direction_rng(&seeded(1), 1));
        assert_ne!(resumed, draws(direction_rng(&seeded(2), 0)));
        assert_ne!(resumed, draws(direction_rng(&seeded(1), 0)));
        assert_eq!(resumed, draws(direction_rng(&seeded(1), 1)));
    }

    #[test]
    fn test_rejects_zero_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let arg = TrainArg {
            env: EnvKind::TargetAction,
            config: None,
            hyperparams: HyperparamArgs::default(),
            out_dir: dir.path().to_owned(),
            jobs: 0,
            resume: false,
        };
        assert!(run(&arg).is_err());
    }
}
