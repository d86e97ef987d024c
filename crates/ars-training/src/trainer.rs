//! Training loop of augmented random search.
//!
//! # One Training Step
//!
//! 1. **Sample** - draw `nb_directions` perturbation directions
//! 2. **Explore** - run one episode per direction with `theta + noise·delta`,
//!    then one per direction with `theta - noise·delta`
//! 3. **Scale** - `sigma_r` = standard deviation of all `2·nb_directions` rewards
//! 4. **Select** - rank directions by `max(r_pos, r_neg)` and keep the best
//!    `nb_best_directions` (ties go to the lower index)
//! 5. **Update** - move `theta` along the selected directions
//! 6. **Evaluate** - one unperturbed episode, for monitoring only
//! 7. **Persist** - append the evaluation reward to the history and rewrite
//!    the checkpoint
//!
//! # Parallelization
//!
//! The rollouts of step 2 only share the normalizer. When the trainer is given
//! more than one environment, the rollouts are spread over scoped threads, one
//! per environment. Each worker normalizes with a [fork](Normalizer::fork) of
//! the shared statistics and the forks' observations are merged back (in worker
//! order) after every rollout of the step has finished. With a single
//! environment every rollout observes directly into the shared normalizer, in
//! order.
//!
//! Directions are always sampled on the calling thread, so for a fixed seed the
//! sampled directions do not depend on the number of workers.

use std::{
    panic,
    path::{Path, PathBuf},
    thread,
};

use ars_env::{EnvError, Environment};
use ars_stats::descriptive::DescriptiveStats;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::{
    checkpoint::{Checkpoint, CheckpointError},
    hyperparams::Hyperparams,
    matrix::{Matrix, ShapeError},
    normalizer::Normalizer,
    policy::{Direction, LinearPolicy, RolloutRecord, UpdateOutcome},
    rollout::explore,
};

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum TrainError {
    #[display("rollout failed: {_0}")]
    Environment(EnvError),
    #[display("{_0}")]
    Checkpoint(CheckpointError),
    #[display("checkpoint does not fit the environment: {_0}")]
    Shape(ShapeError),
    #[from(ignore)]
    #[display("checkpoint was written by run {found}, expected {expected}")]
    SignatureMismatch { expected: String, found: String },
    #[from(ignore)]
    #[display("normalizer statistics have {found} dimensions, expected {expected}")]
    NormalizerShape { expected: usize, found: usize },
    #[from(ignore)]
    #[display("checkpoint of step {step} holds {found} rewards, expected {expected}")]
    HistoryLength {
        step: usize,
        expected: usize,
        found: usize,
    },
    #[from(ignore)]
    #[display(
        "policy needs at least one input and one action, got {observation_dim} × {action_count}"
    )]
    EmptyPolicy {
        observation_dim: usize,
        action_count: usize,
    },
    #[from(ignore)]
    #[display("no environment to run rollouts in")]
    NoEnvironment,
}

/// Summary of one completed training step.
#[derive(Debug, Clone)]
pub struct StepReport {
    /// Index of the step (0-based).
    pub step: usize,
    /// Reward of the unperturbed rollout after the update.
    pub evaluation_reward: f64,
    /// Standard deviation of the `2·nb_directions` exploration rewards.
    pub sigma_r: f64,
    /// Indices of the selected directions, best first.
    pub best_directions: Vec<usize>,
    pub update: UpdateOutcome,
    /// Statistics of all exploration rewards of the step.
    pub rollout_stats: DescriptiveStats,
}

/// Ranks directions by `max(r_pos, r_neg)` and returns the indices of the best
/// `count`, best first.
///
/// Equal scores keep their original order, so ties go to the lower index.
///
/// # Example
///
/// ```
/// use ars_training::trainer::select_best_directions;
///
/// let positive = [1.0, 5.0, 2.0, 5.0];
/// let negative = [4.0, 0.0, 2.0, -1.0];
/// assert_eq!(select_best_directions(&positive, &negative, 3), vec![1, 3, 0]);
/// ```
///
/// # Panics
///
/// Panics if the reward slices have different lengths.
#[must_use]
pub fn select_best_directions(positive: &[f64], negative: &[f64], count: usize) -> Vec<usize> {
    assert_eq!(positive.len(), negative.len());
    let scores: Vec<f64> = positive
        .iter()
        .zip(negative)
        .map(|(p, n)| f64::max(*p, *n))
        .collect();
    let mut order: Vec<usize> = (0..scores.len()).collect();
    // stable sort: equal scores stay in index order
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order.truncate(count);
    order
}

fn check_dims(observation_dim: usize, action_count: usize) -> Result<(), TrainError> {
    if observation_dim == 0 || action_count == 0 {
        return Err(TrainError::EmptyPolicy {
            observation_dim,
            action_count,
        });
    }
    Ok(())
}

/// One perturbed rollout to run during a step.
#[derive(Debug, Clone, Copy)]
struct RolloutTask {
    direction_index: usize,
    direction: Direction,
}

/// Coordinates training of a [`LinearPolicy`].
///
/// # Example
///
/// ```
/// use ars_env::{TargetAction, TimeLimit};
/// use ars_training::{
///     hyperparams::{Hyperparams, HyperparamsConfig, NormalizationMode},
///     trainer::Trainer,
/// };
/// use rand::SeedableRng as _;
/// use rand_pcg::Pcg64;
///
/// let hp = Hyperparams::new(HyperparamsConfig {
///     nb_steps: 5,
///     episode_length: 1,
///     nb_directions: 4,
///     nb_best_directions: 2,
///     normalization: NormalizationMode::V1,
///     ..HyperparamsConfig::default()
/// })
/// .unwrap();
/// let mut envs = [TimeLimit::new(TargetAction::new(vec![1.0, -1.0], 2, 0), 1)];
/// let mut trainer = Trainer::new(hp, 2, 2, Pcg64::seed_from_u64(hp.seed())).unwrap();
/// trainer.train(&mut envs).unwrap();
/// assert_eq!(trainer.history().len(), 5);
/// ```
#[derive(Debug)]
pub struct Trainer<R> {
    hp: Hyperparams,
    policy: LinearPolicy,
    normalizer: Normalizer,
    rng: R,
    history: Vec<f64>,
    checkpoint_path: Option<PathBuf>,
}

impl<R> Trainer<R>
where
    R: Rng,
{
    /// Creates a trainer with a zero policy and empty normalizer statistics.
    ///
    /// `rng` drives direction sampling and is the only randomness the trainer
    /// uses. Both dimensions must be positive.
    pub fn new(
        hp: Hyperparams,
        observation_dim: usize,
        action_count: usize,
        rng: R,
    ) -> Result<Self, TrainError> {
        check_dims(observation_dim, action_count)?;
        Ok(Self {
            policy: LinearPolicy::new(&hp, observation_dim, action_count),
            normalizer: Normalizer::new(&hp, observation_dim),
            hp,
            rng,
            history: vec![],
            checkpoint_path: None,
        })
    }

    /// Continues a run from its checkpoint.
    ///
    /// The checkpoint must carry the signature of `hp` and weights of shape
    /// `action_count × observation_dim`, and its reward history must cover
    /// every step up to `checkpoint.step`. Training resumes at
    /// `checkpoint.step + 1`. A checkpoint without normalizer statistics
    /// restarts them empty.
    pub fn resume(
        hp: Hyperparams,
        checkpoint: Checkpoint,
        observation_dim: usize,
        action_count: usize,
        rng: R,
    ) -> Result<Self, TrainError> {
        check_dims(observation_dim, action_count)?;
        let expected = hp.signature();
        if checkpoint.hyperparam != expected {
            return Err(TrainError::SignatureMismatch {
                expected,
                found: checkpoint.hyperparam,
            });
        }
        checkpoint.param.check_shape(action_count, observation_dim)?;
        let normalizer = match checkpoint.normalizer {
            Some(stats) if stats.dim() != observation_dim => {
                return Err(TrainError::NormalizerShape {
                    expected: observation_dim,
                    found: stats.dim(),
                });
            }
            Some(stats) => Normalizer::from_stats(&hp, stats),
            None => Normalizer::new(&hp, observation_dim),
        };

        let completed = checkpoint.step + 1;
        if checkpoint.reward.len() < completed {
            return Err(TrainError::HistoryLength {
                step: checkpoint.step,
                expected: completed,
                found: checkpoint.reward.len(),
            });
        }
        let mut history = checkpoint.reward;
        history.truncate(completed);
        Ok(Self {
            policy: LinearPolicy::with_theta(&hp, checkpoint.param),
            normalizer,
            hp,
            rng,
            history,
            checkpoint_path: None,
        })
    }

    /// Rewrites the checkpoint at `path` after every step.
    #[must_use]
    pub fn with_checkpoint_path<P>(mut self, path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        self.checkpoint_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn hyperparams(&self) -> &Hyperparams {
        &self.hp
    }

    #[must_use]
    pub fn policy(&self) -> &LinearPolicy {
        &self.policy
    }

    #[must_use]
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Evaluation reward of every completed step.
    #[must_use]
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    /// Index of the next step to run.
    #[must_use]
    pub fn next_step(&self) -> usize {
        self.history.len()
    }

    #[must_use]
    pub fn checkpoint_path(&self) -> Option<&Path> {
        self.checkpoint_path.as_deref()
    }

    /// Runs the remaining steps up to `nb_steps`.
    pub fn train<E>(&mut self, envs: &mut [E]) -> Result<(), TrainError>
    where
        E: Environment + Send,
    {
        info!(
            signature = %self.hp.signature(),
            first_step = self.next_step(),
            workers = envs.len(),
            "training started"
        );
        while self.next_step() < self.hp.nb_steps() {
            let report = self.step(envs)?;
            info!(
                step = report.step,
                reward = report.evaluation_reward,
                sigma_r = report.sigma_r,
                best_rollout = report.rollout_stats.max,
                "step completed"
            );
        }
        info!(steps = self.history.len(), "training finished");
        Ok(())
    }

    /// Runs one training step (see the module documentation).
    ///
    /// With one environment the rollouts run sequentially on the calling
    /// thread; with more they run in parallel, one worker per environment. The
    /// unperturbed evaluation always uses `envs[0]`.
    pub fn step<E>(&mut self, envs: &mut [E]) -> Result<StepReport, TrainError>
    where
        E: Environment + Send,
    {
        if envs.is_empty() {
            return Err(TrainError::NoEnvironment);
        }
        let step = self.next_step();
        let nb_directions = self.hp.nb_directions();

        let deltas = self.policy.sample_deltas(&mut self.rng);
        let tasks: Vec<RolloutTask> = [Direction::Positive, Direction::Negative]
            .into_iter()
            .flat_map(|direction| {
                (0..nb_directions).map(move |direction_index| RolloutTask {
                    direction_index,
                    direction,
                })
            })
            .collect();

        let rewards = if envs.len() == 1 {
            self.run_sequential(&mut envs[0], &tasks, &deltas)?
        } else {
            self.run_parallel(envs, &tasks, &deltas)?
        };
        let (positive_rewards, negative_rewards) = rewards.split_at(nb_directions);

        let rollout_stats = DescriptiveStats::new(rewards.iter().copied())
            .expect("at least one direction is sampled per step");
        let sigma_r = rollout_stats.std_dev;

        let best_directions = select_best_directions(
            positive_rewards,
            negative_rewards,
            self.hp.nb_best_directions(),
        );
        let rollouts: Vec<RolloutRecord<'_>> = best_directions
            .iter()
            .map(|&k| RolloutRecord {
                positive_reward: positive_rewards[k],
                negative_reward: negative_rewards[k],
                delta: &deltas[k],
            })
            .collect();

        let update = self.policy.update(&rollouts, sigma_r);
        if update.is_skipped() {
            warn!(
                step,
                reward = rollout_stats.mean,
                "all rollout rewards are equal; skipping update"
            );
        }

        let evaluation_reward = explore(
            &mut envs[0],
            &mut self.normalizer,
            &self.policy,
            None,
            Direction::None,
        )?;
        self.history.push(evaluation_reward);

        if let Some(path) = &self.checkpoint_path {
            self.policy.save(
                path,
                &self.hp,
                step,
                &self.history,
                Some(&self.normalizer),
            )?;
        }

        Ok(StepReport {
            step,
            evaluation_reward,
            sigma_r,
            best_directions,
            update,
            rollout_stats,
        })
    }

    fn run_sequential<E>(
        &mut self,
        env: &mut E,
        tasks: &[RolloutTask],
        deltas: &[Matrix],
    ) -> Result<Vec<f64>, EnvError>
    where
        E: Environment,
    {
        tasks
            .iter()
            .map(|task| {
                let reward = explore(
                    env,
                    &mut self.normalizer,
                    &self.policy,
                    Some(&deltas[task.direction_index]),
                    task.direction,
                )?;
                debug!(
                    direction_index = task.direction_index,
                    direction = %task.direction,
                    reward,
                    "rollout finished"
                );
                Ok(reward)
            })
            .collect()
    }

    fn run_parallel<E>(
        &mut self,
        envs: &mut [E],
        tasks: &[RolloutTask],
        deltas: &[Matrix],
    ) -> Result<Vec<f64>, EnvError>
    where
        E: Environment + Send,
    {
        let workers = envs.len().min(tasks.len());
        let policy = &self.policy;
        let normalizer = &self.normalizer;

        let outputs = thread::scope(|s| {
            let handles: Vec<_> = envs
                .iter_mut()
                .take(workers)
                .enumerate()
                .map(|(worker, env)| {
                    let mut filter = normalizer.fork();
                    s.spawn(move || -> Result<_, EnvError> {
                        let mut rewards = vec![];
                        for (i, task) in tasks.iter().enumerate().skip(worker).step_by(workers) {
                            let reward = explore(
                                env,
                                &mut filter,
                                policy,
                                Some(&deltas[task.direction_index]),
                                task.direction,
                            )?;
                            debug!(
                                worker,
                                direction_index = task.direction_index,
                                direction = %task.direction,
                                reward,
                                "rollout finished"
                            );
                            rewards.push((i, reward));
                        }
                        Ok((rewards, filter.into_pending()))
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|e| panic::resume_unwind(e)))
                .collect::<Vec<_>>()
        });

        let mut rewards = vec![0.0; tasks.len()];
        let mut pending = Vec::with_capacity(outputs.len());
        for output in outputs {
            let (worker_rewards, worker_stats) = output?;
            for (i, reward) in worker_rewards {
                rewards[i] = reward;
            }
            pending.push(worker_stats);
        }
        for stats in &pending {
            self.normalizer.merge(stats);
        }
        Ok(rewards)
    }
}
