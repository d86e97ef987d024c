//! Linear policy trained by augmented random search.
//!
//! The policy is a single weight matrix `theta` (actions × observations). An
//! action is scored as `theta · state`; training perturbs `theta` along random
//! directions, compares the rewards of the `+` and `-` perturbations and moves
//! `theta` towards the better side.
//!
//! # Update Rule
//!
//! ```text
//! theta += learning_rate / (nb_best_directions · sigma_r) · Σ (r_pos − r_neg) · delta
//! ```
//!
//! where the sum runs over the selected (best) directions and `sigma_r` is the
//! standard deviation of the rewards of *all* sampled directions. Dividing by
//! `sigma_r` keeps the step size independent of the reward scale.

use std::path::Path;

use chrono::Utc;
use rand::Rng;

use crate::{
    checkpoint::{Checkpoint, CheckpointError},
    hyperparams::Hyperparams,
    matrix::Matrix,
    normalizer::Normalizer,
};

/// Which side of a perturbation a rollout evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::IsVariant)]
pub enum Direction {
    /// Unperturbed policy.
    #[display("none")]
    None,
    /// `theta + noise·delta`
    #[display("positive")]
    Positive,
    /// `theta - noise·delta`
    #[display("negative")]
    Negative,
}

impl Direction {
    /// Sign applied to the perturbation: `0`, `+1` or `-1`.
    #[must_use]
    pub fn sign(self) -> f64 {
        match self {
            Self::None => 0.0,
            Self::Positive => 1.0,
            Self::Negative => -1.0,
        }
    }
}

/// Rewards of the two rollouts sampled along one direction.
#[derive(Debug, Clone, Copy)]
pub struct RolloutRecord<'a> {
    pub positive_reward: f64,
    pub negative_reward: f64,
    pub delta: &'a Matrix,
}

/// What [`LinearPolicy::update`] did.
#[derive(Debug, Clone, Copy, PartialEq, derive_more::IsVariant)]
pub enum UpdateOutcome {
    /// `theta` moved by a step scaled with `factor = lr / (b · sigma_r)`.
    Applied { factor: f64 },
    /// All sampled rewards were equal (or their spread was not finite); the
    /// step is undefined and `theta` was left unchanged.
    Skipped { sigma_r: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinearPolicy {
    theta: Matrix,
    learning_rate: f64,
    noise: f64,
    nb_directions: usize,
    nb_best_directions: usize,
}

impl LinearPolicy {
    /// Creates a zero-initialized policy for `observation_dim` inputs and
    /// `action_count` outputs.
    #[must_use]
    pub fn new(hp: &Hyperparams, observation_dim: usize, action_count: usize) -> Self {
        Self::with_theta(hp, Matrix::zeros(action_count, observation_dim))
    }

    /// Creates a policy with the given weights (e.g. restored from a
    /// checkpoint).
    #[must_use]
    pub fn with_theta(hp: &Hyperparams, theta: Matrix) -> Self {
        Self {
            theta,
            learning_rate: hp.learning_rate(),
            noise: hp.noise(),
            nb_directions: hp.nb_directions(),
            nb_best_directions: hp.nb_best_directions(),
        }
    }

    #[must_use]
    pub fn theta(&self) -> &Matrix {
        &self.theta
    }

    #[must_use]
    pub fn observation_dim(&self) -> usize {
        self.theta.cols()
    }

    #[must_use]
    pub fn action_count(&self) -> usize {
        self.theta.rows()
    }

    /// Scores every action for a (normalized) state.
    ///
    /// With [`Direction::None`] or without `delta` this is `theta · state`;
    /// otherwise `(theta ± noise·delta) · state`.
    ///
    /// # Panics
    ///
    /// Panics if `state` or `delta` do not match the policy's shape.
    #[must_use]
    pub fn evaluate(&self, state: &[f64], delta: Option<&Matrix>, direction: Direction) -> Vec<f64> {
        let offset = delta
            .filter(|_| !direction.is_none())
            .map(|delta| (delta, self.noise * direction.sign()));
        self.theta.mul_vec_offset(state, offset)
    }

    /// Samples `nb_directions` fresh perturbation directions with i.i.d.
    /// standard-normal entries.
    pub fn sample_deltas<R>(&self, rng: &mut R) -> Vec<Matrix>
    where
        R: Rng + ?Sized,
    {
        let (rows, cols) = self.theta.shape();
        (0..self.nb_directions)
            .map(|_| Matrix::standard_normal(rows, cols, rng))
            .collect()
    }

    /// Moves `theta` along the selected directions.
    ///
    /// `sigma_r` must be the standard deviation over the rewards of every
    /// sampled direction. A zero or non-finite `sigma_r` leaves `theta`
    /// untouched and reports [`UpdateOutcome::Skipped`].
    #[expect(clippy::cast_precision_loss)]
    pub fn update(&mut self, rollouts: &[RolloutRecord<'_>], sigma_r: f64) -> UpdateOutcome {
        if sigma_r == 0.0 || !sigma_r.is_finite() {
            return UpdateOutcome::Skipped { sigma_r };
        }

        let (rows, cols) = self.theta.shape();
        let mut step = Matrix::zeros(rows, cols);
        for r in rollouts {
            step.add_scaled(r.positive_reward - r.negative_reward, r.delta);
        }
        let factor = self.learning_rate / (self.nb_best_directions as f64 * sigma_r);
        self.theta.add_scaled(factor, &step);
        UpdateOutcome::Applied { factor }
    }

    /// Snapshots `theta` together with the run's progress.
    #[must_use]
    pub fn to_checkpoint(
        &self,
        hp: &Hyperparams,
        step: usize,
        reward: &[f64],
        normalizer: Option<&Normalizer>,
    ) -> Checkpoint {
        Checkpoint {
            param: self.theta.clone(),
            step,
            reward: reward.to_vec(),
            hyperparam: hp.signature(),
            normalizer: normalizer.map(|n| n.stats().clone()),
            saved_at: Utc::now(),
        }
    }

    /// Writes a checkpoint to `path`, overwriting the previous one.
    pub fn save(
        &self,
        path: &Path,
        hp: &Hyperparams,
        step: usize,
        reward: &[f64],
        normalizer: Option<&Normalizer>,
    ) -> Result<(), CheckpointError> {
        self.to_checkpoint(hp, step, reward, normalizer).save(path)
    }
}
