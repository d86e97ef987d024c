//! Running state normalization.
//!
//! Every state a rollout visits is first fed to the normalizer and then
//! rescaled by it, so the statistics keep improving for the whole run. The
//! statistics are shared by all rollouts of a run; see
//! [`Normalizer::fork`] for how parallel rollouts keep that sharing without
//! contending on a single accumulator.

use ars_stats::running::RunningStats;

use crate::hyperparams::{Hyperparams, NormalizationMode};

/// Lower bound on the per-dimension variance used for rescaling.
///
/// Dimensions that never vary (or have been seen only once) are divided by
/// `sqrt(VARIANCE_FLOOR)` instead of a vanishing standard deviation.
pub const VARIANCE_FLOOR: f64 = 1e-2;

/// Something that learns from visited states and rescales them.
pub trait StateFilter {
    /// Records one visited state.
    fn observe(&mut self, state: &[f64]);

    /// Rescales `state` with the statistics recorded so far.
    fn normalize(&self, state: &[f64]) -> Vec<f64>;
}

/// Running mean/variance normalizer for one training run.
///
/// # Example
///
/// ```
/// use ars_training::{
///     hyperparams::{Hyperparams, HyperparamsConfig},
///     normalizer::{Normalizer, StateFilter as _},
/// };
///
/// let hp = Hyperparams::new(HyperparamsConfig::default()).unwrap();
/// let mut normalizer = Normalizer::new(&hp, 2);
/// normalizer.observe(&[3.0, -1.0]);
/// assert_eq!(normalizer.normalize(&[3.0, -1.0]), vec![0.0, 0.0]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Normalizer {
    mode: NormalizationMode,
    stats: RunningStats,
}

impl Normalizer {
    #[must_use]
    pub fn new(hp: &Hyperparams, dim: usize) -> Self {
        Self {
            mode: hp.normalization(),
            stats: RunningStats::new(dim),
        }
    }

    /// Restores a normalizer from previously accumulated statistics.
    #[must_use]
    pub fn from_stats(hp: &Hyperparams, stats: RunningStats) -> Self {
        Self {
            mode: hp.normalization(),
            stats,
        }
    }

    #[must_use]
    pub fn mode(&self) -> NormalizationMode {
        self.mode
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.stats.dim()
    }

    /// Number of states observed so far, identical for every dimension.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.stats.count()
    }

    #[must_use]
    pub fn mean(&self) -> &[f64] {
        self.stats.mean()
    }

    /// Per-dimension variance, never below [`VARIANCE_FLOOR`].
    #[must_use]
    pub fn variance(&self) -> Vec<f64> {
        self.stats.variance(VARIANCE_FLOOR)
    }

    #[must_use]
    pub fn stats(&self) -> &RunningStats {
        &self.stats
    }

    /// Creates a worker-local view for rollouts that run concurrently.
    ///
    /// The fork normalizes with a snapshot of the current statistics plus
    /// whatever the worker itself observes. The worker's own observations are
    /// also collected separately, to be folded back with [`Normalizer::merge`]
    /// once every rollout of the step has finished.
    #[must_use]
    pub fn fork(&self) -> ForkedNormalizer {
        ForkedNormalizer {
            view: self.clone(),
            pending: RunningStats::new(self.dim()),
        }
    }

    /// Folds statistics collected elsewhere (typically by a fork) into this
    /// normalizer.
    pub fn merge(&mut self, pending: &RunningStats) {
        self.stats.merge(pending);
    }
}

impl StateFilter for Normalizer {
    fn observe(&mut self, state: &[f64]) {
        self.stats.push(state);
    }

    fn normalize(&self, state: &[f64]) -> Vec<f64> {
        match self.mode {
            NormalizationMode::V1 => state.to_vec(),
            NormalizationMode::V2 => state
                .iter()
                .zip(self.stats.mean())
                .zip(self.variance())
                .map(|((x, mean), var)| (x - mean) / var.sqrt())
                .collect(),
        }
    }
}

/// Worker-local normalizer produced by [`Normalizer::fork`].
#[derive(Debug, Clone)]
pub struct ForkedNormalizer {
    view: Normalizer,
    pending: RunningStats,
}

impl ForkedNormalizer {
    /// Returns the statistics observed by this fork alone.
    #[must_use]
    pub fn into_pending(self) -> RunningStats {
        self.pending
    }
}

impl StateFilter for ForkedNormalizer {
    fn observe(&mut self, state: &[f64]) {
        self.view.observe(state);
        self.pending.push(state);
    }

    fn normalize(&self, state: &[f64]) -> Vec<f64> {
        self.view.normalize(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hyperparams::HyperparamsConfig;

    fn hp(normalization: NormalizationMode) -> Hyperparams {
        Hyperparams::new(HyperparamsConfig {
            normalization,
            ..HyperparamsConfig::default()
        })
        .unwrap()
    }

    fn sample_states() -> Vec<Vec<f64>> {
        (0..50)
            .map(|i| {
                let t = f64::from(i);
                vec![t.sin() * 100.0, 1e-6 * t, 5.0, -t * t]
            })
            .collect()
    }

    #[test]
    fn test_count_and_floor_invariants() {
        let mut normalizer = Normalizer::new(&hp(NormalizationMode::V2), 4);
        assert!(normalizer.variance().iter().all(|&v| v >= VARIANCE_FLOOR));
        for (k, state) in sample_states().iter().enumerate() {
            normalizer.observe(state);
            assert_eq!(normalizer.count(), k as u64 + 1);
            assert!(normalizer.variance().iter().all(|&v| v >= VARIANCE_FLOOR));
        }
        // constant dimension sits exactly on the floor
        assert_eq!(normalizer.variance()[2], VARIANCE_FLOOR);
    }

    #[test]
    fn test_v1_is_identity() {
        let mut normalizer = Normalizer::new(&hp(NormalizationMode::V1), 4);
        for state in sample_states() {
            normalizer.observe(&state);
            assert_eq!(normalizer.normalize(&state), state);
        }
        assert_eq!(normalizer.normalize(&[1e9, -3.0, 0.0, 7.5]), vec![1e9, -3.0, 0.0, 7.5]);
    }

    #[test]
    fn test_v2_single_observation_maps_to_zero() {
        let mut normalizer = Normalizer::new(&hp(NormalizationMode::V2), 3);
        normalizer.observe(&[4.0, -2.0, 1e6]);
        assert_eq!(normalizer.normalize(&[4.0, -2.0, 1e6]), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_v2_outputs_are_finite() {
        let mut normalizer = Normalizer::new(&hp(NormalizationMode::V2), 4);
        for state in sample_states() {
            normalizer.observe(&state);
            let out = normalizer.normalize(&state);
            assert!(out.iter().all(|x| x.is_finite()));
        }
    }

    #[test]
    fn test_v2_whitens_with_running_moments() {
        let mut normalizer = Normalizer::new(&hp(NormalizationMode::V2), 1);
        for x in [1.0, 2.0, 3.0, 4.0, 5.0] {
            normalizer.observe(&[x]);
        }
        // mean 3, population variance 2
        let out = normalizer.normalize(&[5.0]);
        assert!((out[0] - 2.0 / 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_forks_merge_back_to_sequential_statistics() {
        let states = sample_states();
        let mut sequential = Normalizer::new(&hp(NormalizationMode::V2), 4);
        let mut shared = sequential.clone();
        for s in &states[..10] {
            sequential.observe(s);
            shared.observe(s);
        }

        let mut left = shared.fork();
        let mut right = shared.fork();
        for (i, s) in states[10..].iter().enumerate() {
            sequential.observe(s);
            if i % 2 == 0 {
                left.observe(s);
            } else {
                right.observe(s);
            }
        }
        // forks never touch the shared statistics directly
        assert_eq!(shared.count(), 10);

        shared.merge(&left.into_pending());
        shared.merge(&right.into_pending());
        assert_eq!(shared.count(), sequential.count());
        for (a, b) in shared.mean().iter().zip(sequential.mean()) {
            assert!((a - b).abs() <= 1e-9 * b.abs().max(1.0));
        }
        for (a, b) in shared.variance().iter().zip(sequential.variance()) {
            assert!((a - b).abs() <= 1e-9 * b.abs().max(1.0));
        }
    }

    #[test]
    fn test_fork_normalizes_with_snapshot_and_own_observations() {
        let mut shared = Normalizer::new(&hp(NormalizationMode::V2), 1);
        shared.observe(&[0.0]);
        let mut fork = shared.fork();
        fork.observe(&[2.0]);
        // view has seen [0, 2]: mean 1, variance 1
        assert_eq!(fork.normalize(&[3.0]), vec![2.0]);
        assert_eq!(shared.normalize(&[3.0]), vec![3.0 / VARIANCE_FLOOR.sqrt()]);
    }
}
