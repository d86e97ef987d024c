//! Augmented random search for linear policies.
//!
//! This crate trains a linear policy for a discrete-action environment with a
//! gradient-free, finite-difference search: the policy weights are perturbed
//! along random directions, each perturbation is scored by playing full
//! episodes, and the weights move towards the directions that scored best.
//!
//! # How Training Works
//!
//! 1. **Perturb** - Sample random directions with the same shape as the weights
//! 2. **Explore** - Play one episode with `theta + noise·delta` and one with
//!    `theta - noise·delta` for every direction
//! 3. **Select** - Keep the directions whose better side scored highest
//! 4. **Update** - Step along the selected directions, scaled by the reward
//!    standard deviation
//! 5. **Evaluate** - Play one unperturbed episode and record its reward
//! 6. **Persist** - Rewrite the checkpoint
//!
//! # Architecture
//!
//! ```text
//! Trainer
//!     ↓ samples directions from / updates
//! LinearPolicy
//!     ↓ scored inside
//! explore (one episode)
//!     ↓ feeds every visited state through
//! Normalizer (running mean/variance, shared by the whole run)
//!     ↓ and steps
//! Environment (ars-env)
//! ```
//!
//! The normalizer and the policy never call each other; [`rollout::explore`]
//! wires them together.
//!
//! # Normalization Modes
//!
//! - **v1** - states are fed to the policy unchanged (basic random search)
//! - **v2** - states are whitened with running statistics; see [`normalizer`]
//!
//! # Example
//!
//! ```rust,no_run
//! use ars_env::{CartPole, TimeLimit};
//! use ars_training::{
//!     checkpoint::checkpoint_path,
//!     hyperparams::{Hyperparams, HyperparamsConfig},
//!     trainer::Trainer,
//! };
//! use rand::SeedableRng as _;
//! use rand_pcg::Pcg64;
//! # use std::path::Path;
//!
//! let hp = Hyperparams::new(HyperparamsConfig::default())?;
//! let mut envs: Vec<_> = (0..4)
//!     .map(|i| TimeLimit::new(CartPole::with_seed(hp.seed() + i), hp.episode_length()))
//!     .collect();
//! let path = checkpoint_path(Path::new("exp"), "CartPole", &hp.signature());
//! let mut trainer =
//!     Trainer::new(hp, 4, 2, Pcg64::seed_from_u64(hp.seed()))?.with_checkpoint_path(path);
//! trainer.train(&mut envs)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Current Limitations
//!
//! - **Linear policies only**: the search space is a single weight matrix
//! - **Discrete actions only**: the action is the argmax of the action scores
//! - **No reward shaping**: episode rewards are summed as returned
//! - **Single process**: rollouts can use threads but not multiple machines

pub mod checkpoint;
pub mod hyperparams;
pub mod matrix;
pub mod normalizer;
pub mod policy;
pub mod rollout;
pub mod trainer;
