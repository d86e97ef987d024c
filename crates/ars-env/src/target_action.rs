use crate::{EnvError, Environment, Transition, check_action};

/// Deterministic stub: the observation never changes and exactly one action
/// pays a reward of `1.0`; every other action pays `0.0`.
///
/// The episode never terminates on its own, so it must be wrapped in a
/// [`TimeLimit`](crate::TimeLimit).
#[derive(Debug, Clone)]
pub struct TargetAction {
    observation: Vec<f64>,
    action_count: usize,
    target: usize,
}

impl TargetAction {
    /// # Panics
    ///
    /// Panics if `target` is not a valid action.
    #[must_use]
    pub fn new(observation: Vec<f64>, action_count: usize, target: usize) -> Self {
        assert!(target < action_count, "target action out of range");
        Self {
            observation,
            action_count,
            target,
        }
    }

    #[must_use]
    pub fn target(&self) -> usize {
        self.target
    }
}

impl Environment for TargetAction {
    fn observation_dim(&self) -> usize {
        self.observation.len()
    }

    fn action_count(&self) -> usize {
        self.action_count
    }

    fn reset(&mut self) -> Result<Vec<f64>, EnvError> {
        Ok(self.observation.clone())
    }

    fn step(&mut self, action: usize) -> Result<Transition, EnvError> {
        check_action(action, self.action_count)?;
        Ok(Transition {
            observation: self.observation.clone(),
            reward: if action == self.target { 1.0 } else { 0.0 },
            terminated: false,
            truncated: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewards_only_target() {
        let mut env = TargetAction::new(vec![0.5, -1.0], 3, 2);
        assert_eq!(env.reset().unwrap(), vec![0.5, -1.0]);
        assert_eq!(env.step(0).unwrap().reward, 0.0);
        assert_eq!(env.step(1).unwrap().reward, 0.0);
        assert_eq!(env.step(2).unwrap().reward, 1.0);
        assert!(env.step(3).is_err());
    }
}
