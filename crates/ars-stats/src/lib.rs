//! Statistical utilities for augmented random search.
//!
//! This crate provides the two kinds of statistics the optimizer relies on:
//!
//! - **Descriptive statistics**: summarize a finished batch of values (e.g. the
//!   rollout rewards of one training step, or a whole reward history)
//! - **Running statistics**: a streaming per-dimension mean/variance accumulator
//!   that can be merged with accumulators filled on other threads
//!
//! # Modules
//!
//! - [`descriptive`]: Descriptive statistics for summarizing datasets
//! - [`running`]: Welford-style streaming mean/variance with pooled merge
//!
//! # Examples
//!
//! ## Computing descriptive statistics
//!
//! ```
//! use ars_stats::descriptive::DescriptiveStats;
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let stats = DescriptiveStats::new(values).unwrap();
//! assert_eq!(stats.mean, 3.0);
//! assert_eq!(stats.variance, 2.0);
//! ```
//!
//! ## Accumulating running statistics
//!
//! ```
//! use ars_stats::running::RunningStats;
//!
//! let mut stats = RunningStats::new(2);
//! stats.push(&[1.0, 10.0]);
//! stats.push(&[3.0, 30.0]);
//! assert_eq!(stats.count(), 2);
//! assert_eq!(stats.mean(), &[2.0, 20.0]);
//! ```

pub mod descriptive;
pub mod running;
