//! Streaming per-dimension mean and variance.
//!
//! [`RunningStats`] accumulates vectors one at a time using Welford's update,
//! so the mean and variance of an unbounded stream are available at any point
//! without storing the samples. Two accumulators filled independently (e.g. on
//! different worker threads) can be combined with [`RunningStats::merge`],
//! which applies the pooled-moments formula of Chan et al.
//!
//! All dimensions share a single sample count: every pushed vector contributes
//! exactly one sample to every dimension.

use serde::{Deserialize, Serialize};

/// Welford accumulator over fixed-dimension vectors.
///
/// # Example
///
/// ```
/// use ars_stats::running::RunningStats;
///
/// let mut left = RunningStats::new(1);
/// left.push(&[1.0]);
/// left.push(&[2.0]);
///
/// let mut right = RunningStats::new(1);
/// right.push(&[3.0]);
/// right.push(&[4.0]);
///
/// left.merge(&right);
/// assert_eq!(left.count(), 4);
/// assert_eq!(left.mean(), &[2.5]);
/// assert_eq!(left.variance(0.0), vec![1.25]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRunningStats")]
pub struct RunningStats {
    count: u64,
    mean: Vec<f64>,
    mean_diff: Vec<f64>,
}

#[derive(Deserialize)]
struct RawRunningStats {
    count: u64,
    mean: Vec<f64>,
    mean_diff: Vec<f64>,
}

impl TryFrom<RawRunningStats> for RunningStats {
    type Error = String;

    fn try_from(raw: RawRunningStats) -> Result<Self, Self::Error> {
        if raw.mean.len() != raw.mean_diff.len() {
            return Err(format!(
                "running statistics dimension mismatch: mean has {} entries, mean_diff has {}",
                raw.mean.len(),
                raw.mean_diff.len()
            ));
        }
        Ok(Self {
            count: raw.count,
            mean: raw.mean,
            mean_diff: raw.mean_diff,
        })
    }
}

impl RunningStats {
    /// Creates an empty accumulator for vectors of length `dim`.
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self {
            count: 0,
            mean: vec![0.0; dim],
            mean_diff: vec![0.0; dim],
        }
    }

    /// Returns the vector length this accumulator was created for.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Number of vectors observed so far (identical for every dimension).
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Returns `true` if no vector has been observed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Running mean of each dimension. All zeros before the first sample.
    #[must_use]
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Sum of squared deviations from the mean, per dimension.
    #[must_use]
    pub fn mean_diff(&self) -> &[f64] {
        &self.mean_diff
    }

    /// Population variance of each dimension, clamped from below to `floor`.
    ///
    /// Before the first sample every dimension reports `floor`.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn variance(&self, floor: f64) -> Vec<f64> {
        if self.count == 0 {
            return vec![floor; self.dim()];
        }
        let n = self.count as f64;
        self.mean_diff.iter().map(|m| (m / n).max(floor)).collect()
    }

    /// Adds one vector to the accumulator.
    ///
    /// # Panics
    ///
    /// Panics if `x` does not have the accumulator's dimension.
    #[expect(clippy::cast_precision_loss)]
    pub fn push(&mut self, x: &[f64]) {
        assert_eq!(x.len(), self.dim(), "observation dimension mismatch");
        self.count += 1;
        let n = self.count as f64;
        for ((mean, mean_diff), &x) in self.mean.iter_mut().zip(&mut self.mean_diff).zip(x) {
            let last_mean = *mean;
            *mean += (x - last_mean) / n;
            *mean_diff += (x - last_mean) * (x - *mean);
        }
    }

    /// Folds the samples summarized by `other` into `self`.
    ///
    /// The result is the same (up to rounding) as if every vector pushed into
    /// `other` had been pushed into `self`.
    ///
    /// # Panics
    ///
    /// Panics if the two accumulators have different dimensions.
    #[expect(clippy::cast_precision_loss)]
    pub fn merge(&mut self, other: &Self) {
        assert_eq!(self.dim(), other.dim(), "observation dimension mismatch");
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            self.clone_from(other);
            return;
        }

        let na = self.count as f64;
        let nb = other.count as f64;
        let n = na + nb;
        for i in 0..self.dim() {
            let delta = other.mean[i] - self.mean[i];
            self.mean[i] += delta * nb / n;
            self.mean_diff[i] += other.mean_diff[i] + delta * delta * na * nb / n;
        }
        self.count += other.count;
    }
}
