//! Environments for training linear policies with augmented random search.
//!
//! The optimizer never looks inside an environment: it only resets it, feeds it
//! discrete actions and sums the rewards it returns. This crate defines that
//! contract ([`Environment`]) together with the pieces a training run needs
//! around it:
//!
//! - [`TimeLimit`] - caps the number of steps per episode
//! - [`CartPole`] - classic pole balancing (4 observations, 2 actions)
//! - [`MountainCar`] - under-powered car on a hill (2 observations, 3 actions)
//! - [`TargetAction`] - deterministic one-action-is-right stub for tests
//! - [`EnvKind`] - name-based construction for command-line use
//!
//! # Example
//!
//! ```
//! use ars_env::{CartPole, Environment as _, TimeLimit};
//!
//! let mut env = TimeLimit::new(CartPole::with_seed(7), 200);
//! let mut state = env.reset().unwrap();
//! let mut total = 0.0;
//! loop {
//!     let action = usize::from(state[2] > 0.0);
//!     let t = env.step(action).unwrap();
//!     total += t.reward;
//!     if t.done() {
//!         break;
//!     }
//!     state = t.observation;
//! }
//! assert!(total >= 1.0);
//! ```

pub use self::{
    cart_pole::CartPole, kind::EnvKind, mountain_car::MountainCar, target_action::TargetAction,
    time_limit::TimeLimit,
};

mod cart_pole;
mod kind;
mod mountain_car;
mod target_action;
mod time_limit;

/// Failure raised by an environment.
///
/// None of these are recoverable by the optimizer; they abort the training run.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum EnvError {
    #[display("invalid action {action}: environment has {action_count} actions")]
    InvalidAction { action: usize, action_count: usize },
    #[display("observation has {actual} dimensions, expected {expected}")]
    ObservationShape { expected: usize, actual: usize },
    #[display("step called after the episode finished; reset first")]
    EpisodeFinished,
    #[display("environment failure: {message}")]
    Failed { message: String },
}

/// Result of advancing an environment by one action.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Observation after the action.
    pub observation: Vec<f64>,
    /// Reward for the action, unmodified.
    pub reward: f64,
    /// The environment reached a terminal state.
    pub terminated: bool,
    /// The episode was cut short by an external limit (see [`TimeLimit`]).
    pub truncated: bool,
}

impl Transition {
    /// Returns `true` if the episode is over for either reason.
    #[must_use]
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// A sequential-decision environment with vector observations and discrete
/// actions.
pub trait Environment {
    /// Length of every observation vector. Fixed for the environment's lifetime.
    fn observation_dim(&self) -> usize;

    /// Number of discrete actions; valid actions are `0..action_count()`.
    fn action_count(&self) -> usize;

    /// Starts a new episode and returns the initial observation.
    fn reset(&mut self) -> Result<Vec<f64>, EnvError>;

    /// Applies `action` and advances the environment by one step.
    fn step(&mut self, action: usize) -> Result<Transition, EnvError>;
}

impl<E> Environment for Box<E>
where
    E: Environment + ?Sized,
{
    fn observation_dim(&self) -> usize {
        (**self).observation_dim()
    }

    fn action_count(&self) -> usize {
        (**self).action_count()
    }

    fn reset(&mut self) -> Result<Vec<f64>, EnvError> {
        (**self).reset()
    }

    fn step(&mut self, action: usize) -> Result<Transition, EnvError> {
        (**self).step(action)
    }
}

fn check_action(action: usize, action_count: usize) -> Result<(), EnvError> {
    if action < action_count {
        Ok(())
    } else {
        Err(EnvError::InvalidAction {
            action,
            action_count,
        })
    }
}
