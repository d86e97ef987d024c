use crate::{CartPole, Environment, MountainCar, TargetAction};

/// Built-in environment selectable by name.
///
/// Parsing is case-insensitive on the variant name, so `cartpole`,
/// `mountaincar` and `targetaction` are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::FromStr)]
pub enum EnvKind {
    CartPole,
    MountainCar,
    TargetAction,
}

impl EnvKind {
    /// Stable name used to lay out checkpoint directories.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::CartPole => "CartPole",
            Self::MountainCar => "MountainCar",
            Self::TargetAction => "TargetAction",
        }
    }

    /// Builds a fresh environment whose randomness is driven by `seed`.
    #[must_use]
    pub fn make(self, seed: u64) -> Box<dyn Environment + Send> {
        match self {
            Self::CartPole => Box::new(CartPole::with_seed(seed)),
            Self::MountainCar => Box::new(MountainCar::with_seed(seed)),
            Self::TargetAction => Box::new(TargetAction::new(vec![1.0, 0.5, -0.5], 3, 0)),
        }
    }
}
