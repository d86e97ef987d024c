//! Hyperparameters of a training run.
//!
//! A run is configured through [`HyperparamsConfig`], a plain serializable
//! struct that can be loaded from JSON and patched field by field. Validating
//! it with [`Hyperparams::new`] produces the immutable [`Hyperparams`] every
//! other component receives by reference.

use serde::{Deserialize, Serialize};

/// How observed states are rescaled before the policy sees them.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::FromStr,
)]
#[serde(rename_all = "lowercase")]
pub enum NormalizationMode {
    /// States are passed through unchanged (basic random search baseline).
    #[display("v1")]
    V1,
    /// States are whitened with running mean and variance.
    #[default]
    #[display("v2")]
    V2,
}

/// Raw, unvalidated hyperparameters.
///
/// Defaults match the reference configuration of the method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HyperparamsConfig {
    /// Number of training steps (policy updates).
    pub nb_steps: usize,
    /// Maximum number of environment steps per episode.
    pub episode_length: usize,
    /// Step size of the parameter update.
    pub learning_rate: f64,
    /// Number of random directions sampled per training step.
    pub nb_directions: usize,
    /// Number of top-ranked directions used for the update.
    pub nb_best_directions: usize,
    /// Scale applied to a direction when perturbing the policy.
    pub noise: f64,
    /// Seed for every random source of the run.
    pub seed: u64,
    /// State normalization mode.
    pub normalization: NormalizationMode,
}

impl Default for HyperparamsConfig {
    fn default() -> Self {
        Self {
            nb_steps: 2000,
            episode_length: 10000,
            learning_rate: 0.02,
            nb_directions: 10,
            nb_best_directions: 2,
            noise: 0.02,
            seed: 1,
            normalization: NormalizationMode::V2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum HyperparamsError {
    #[display("nb_best_directions ({best}) must not exceed nb_directions ({total})")]
    TooManyBestDirections { best: usize, total: usize },
    #[display("{name} must be positive")]
    NotPositive { name: &'static str },
    #[display("{name} must be finite, got {value}")]
    NotFinite { name: &'static str, value: f64 },
}

/// Validated, immutable hyperparameters of one training run.
///
/// # Example
///
/// ```
/// use ars_training::hyperparams::{Hyperparams, HyperparamsConfig};
///
/// let hp = Hyperparams::new(HyperparamsConfig::default()).unwrap();
/// assert_eq!(hp.signature(), "2000_10000_0.02_10_2_0.02_1_v2");
///
/// let bad = HyperparamsConfig {
///     nb_directions: 2,
///     nb_best_directions: 3,
///     ..HyperparamsConfig::default()
/// };
/// assert!(Hyperparams::new(bad).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hyperparams {
    nb_steps: usize,
    episode_length: usize,
    learning_rate: f64,
    nb_directions: usize,
    nb_best_directions: usize,
    noise: f64,
    seed: u64,
    normalization: NormalizationMode,
}

impl Hyperparams {
    pub fn new(config: HyperparamsConfig) -> Result<Self, HyperparamsError> {
        let HyperparamsConfig {
            nb_steps,
            episode_length,
            learning_rate,
            nb_directions,
            nb_best_directions,
            noise,
            seed,
            normalization,
        } = config;

        if nb_best_directions > nb_directions {
            return Err(HyperparamsError::TooManyBestDirections {
                best: nb_best_directions,
                total: nb_directions,
            });
        }
        for (name, value) in [
            ("nb_directions", nb_directions),
            ("nb_best_directions", nb_best_directions),
            ("episode_length", episode_length),
        ] {
            if value == 0 {
                return Err(HyperparamsError::NotPositive { name });
            }
        }
        for (name, value) in [("learning_rate", learning_rate), ("noise", noise)] {
            if !value.is_finite() {
                return Err(HyperparamsError::NotFinite { name, value });
            }
        }

        Ok(Self {
            nb_steps,
            episode_length,
            learning_rate,
            nb_directions,
            nb_best_directions,
            noise,
            seed,
            normalization,
        })
    }

    #[must_use]
    pub fn nb_steps(&self) -> usize {
        self.nb_steps
    }

    #[must_use]
    pub fn episode_length(&self) -> usize {
        self.episode_length
    }

    #[must_use]
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    #[must_use]
    pub fn nb_directions(&self) -> usize {
        self.nb_directions
    }

    #[must_use]
    pub fn nb_best_directions(&self) -> usize {
        self.nb_best_directions
    }

    #[must_use]
    pub fn noise(&self) -> f64 {
        self.noise
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub fn normalization(&self) -> NormalizationMode {
        self.normalization
    }

    /// Returns the configuration this set was built from.
    #[must_use]
    pub fn config(&self) -> HyperparamsConfig {
        HyperparamsConfig {
            nb_steps: self.nb_steps,
            episode_length: self.episode_length,
            learning_rate: self.learning_rate,
            nb_directions: self.nb_directions,
            nb_best_directions: self.nb_best_directions,
            noise: self.noise,
            seed: self.seed,
            normalization: self.normalization,
        }
    }

    /// Deterministic identifier of the run, used to name checkpoints.
    ///
    /// Fields are joined with `_` in declaration order and suffixed with the
    /// normalization mode, e.g. `2000_10000_0.02_10_2_0.02_1_v2`. Reals are
    /// printed in their shortest round-trip form (`1.0`, not `1`). Very small
    /// or large reals switch to exponent form without zero padding, so a
    /// learning rate of `1e-7` appears as `1e-7`, not `1e-07`.
    #[must_use]
    pub fn signature(&self) -> String {
        format!(
            "{}_{}_{:?}_{}_{}_{:?}_{}_{}",
            self.nb_steps,
            self.episode_length,
            self.learning_rate,
            self.nb_directions,
            self.nb_best_directions,
            self.noise,
            self.seed,
            self.normalization,
        )
    }
}

impl HyperparamsConfig {
    /// Recovers the configuration from a [`Hyperparams::signature`] string.
    ///
    /// Returns `None` if the string is not a well-formed signature.
    ///
    /// ```
    /// use ars_training::hyperparams::{Hyperparams, HyperparamsConfig};
    ///
    /// let hp = Hyperparams::new(HyperparamsConfig::default()).unwrap();
    /// assert_eq!(
    ///     HyperparamsConfig::from_signature(&hp.signature()),
    ///     Some(HyperparamsConfig::default())
    /// );
    /// ```
    #[must_use]
    pub fn from_signature(signature: &str) -> Option<Self> {
        let mut fields = signature.split('_');
        let config = Self {
            nb_steps: fields.next()?.parse().ok()?,
            episode_length: fields.next()?.parse().ok()?,
            learning_rate: fields.next()?.parse().ok()?,
            nb_directions: fields.next()?.parse().ok()?,
            nb_best_directions: fields.next()?.parse().ok()?,
            noise: fields.next()?.parse().ok()?,
            seed: fields.next()?.parse().ok()?,
            normalization: fields.next()?.parse().ok()?,
        };
        fields.next().is_none().then_some(config)
    }
}

impl TryFrom<HyperparamsConfig> for Hyperparams {
    type Error = HyperparamsError;

    fn try_from(config: HyperparamsConfig) -> Result<Self, Self::Error> {
        Self::new(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_more_best_than_sampled() {
        let config = HyperparamsConfig {
            nb_directions: 2,
            nb_best_directions: 3,
            ..HyperparamsConfig::default()
        };
        assert_eq!(
            Hyperparams::new(config),
            Err(HyperparamsError::TooManyBestDirections { best: 3, total: 2 })
        );
    }

    #[test]
    fn test_accepts_equal_counts() {
        let config = HyperparamsConfig {
            nb_directions: 4,
            nb_best_directions: 4,
            ..HyperparamsConfig::default()
        };
        assert!(Hyperparams::new(config).is_ok());
    }

    #[test]
    fn test_rejects_zero_counts() {
        let config = HyperparamsConfig {
            nb_best_directions: 0,
            ..HyperparamsConfig::default()
        };
        assert_eq!(
            Hyperparams::new(config),
            Err(HyperparamsError::NotPositive {
                name: "nb_best_directions"
            })
        );
    }

    #[test]
    fn test_rejects_non_finite_noise() {
        let config = HyperparamsConfig {
            noise: f64::NAN,
            ..HyperparamsConfig::default()
        };
        assert!(matches!(
            Hyperparams::new(config),
            Err(HyperparamsError::NotFinite { name: "noise", .. })
        ));
    }

    #[test]
    fn test_signature_distinguishes_modes() {
        let v1 = Hyperparams::new(HyperparamsConfig {
            nb_steps: 1000,
            episode_length: 1000,
            learning_rate: 0.025,
            nb_directions: 4,
            nb_best_directions: 2,
            noise: 0.03,
            seed: 1,
            normalization: NormalizationMode::V1,
        })
        .unwrap();
        assert_eq!(v1.signature(), "1000_1000_0.025_4_2_0.03_1_v1");

        let v2 = Hyperparams::new(HyperparamsConfig {
            normalization: NormalizationMode::V2,
            ..v1.config()
        })
        .unwrap();
        assert_eq!(v2.signature(), "1000_1000_0.025_4_2_0.03_1_v2");
    }

    #[test]
    fn test_signature_keeps_real_fraction() {
        let hp = Hyperparams::new(HyperparamsConfig {
            learning_rate: 1.0,
            ..HyperparamsConfig::default()
        })
        .unwrap();
        assert!(hp.signature().starts_with("2000_10000_1.0_"));
    }

    #[test]
    fn test_signature_exponent_form() {
        let hp = Hyperparams::new(HyperparamsConfig {
            learning_rate: 1e-7,
            noise: 2.5e20,
            ..HyperparamsConfig::default()
        })
        .unwrap();
        assert_eq!(hp.signature(), "2000_10000_1e-7_10_2_2.5e20_1_v2");
    }

    #[test]
    fn test_signature_parses_back() {
        let config = HyperparamsConfig {
            nb_steps: 7,
            episode_length: 300,
            learning_rate: 1e-7,
            nb_directions: 8,
            nb_best_directions: 8,
            noise: 0.3,
            seed: 42,
            normalization: NormalizationMode::V1,
        };
        let hp = Hyperparams::new(config.clone()).unwrap();
        assert_eq!(HyperparamsConfig::from_signature(&hp.signature()), Some(config));

        assert_eq!(HyperparamsConfig::from_signature("1_2_0.1_1_1_0.1_0"), None);
        assert_eq!(HyperparamsConfig::from_signature("1_2_0.1_1_1_0.1_0_v3"), None);
        assert_eq!(HyperparamsConfig::from_signature("1_2_0.1_1_1_0.1_0_v1_x"), None);
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: HyperparamsConfig =
            serde_json::from_str(r#"{"nb_steps": 5, "normalization": "v1"}"#).unwrap();
        assert_eq!(config.nb_steps, 5);
        assert_eq!(config.normalization, NormalizationMode::V1);
        assert_eq!(config.nb_directions, 10);

        let unknown: Result<HyperparamsConfig, _> = serde_json::from_str(r#"{"lr": 0.1}"#);
        assert!(unknown.is_err());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("v1".parse::<NormalizationMode>().unwrap(), NormalizationMode::V1);
        assert_eq!("V2".parse::<NormalizationMode>().unwrap(), NormalizationMode::V2);
        assert_eq!(NormalizationMode::V1.to_string(), "v1");
    }
}
