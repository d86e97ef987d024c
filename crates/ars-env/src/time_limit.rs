use crate::{EnvError, Environment, Transition};

/// Wraps an environment and ends every episode after at most
/// `max_episode_steps` steps.
///
/// The step that reaches the limit is returned with `truncated` set. If the
/// inner environment terminates on that same step, `terminated` is kept as
/// well.
#[derive(Debug, Clone)]
pub struct TimeLimit<E> {
    inner: E,
    max_episode_steps: usize,
    elapsed_steps: usize,
}

impl<E> TimeLimit<E> {
    /// Wraps `inner` with the given per-episode step cap.
    ///
    /// # Panics
    ///
    /// Panics if `max_episode_steps` is zero.
    pub fn new(inner: E, max_episode_steps: usize) -> Self {
        assert!(max_episode_steps > 0, "episode step limit must be positive");
        Self {
            inner,
            max_episode_steps,
            elapsed_steps: 0,
        }
    }

    /// Current step cap.
    #[must_use]
    pub fn max_episode_steps(&self) -> usize {
        self.max_episode_steps
    }

    /// Overrides the step cap. Takes effect for the running episode.
    ///
    /// # Panics
    ///
    /// Panics if `max_episode_steps` is zero.
    pub fn set_max_episode_steps(&mut self, max_episode_steps: usize) {
        assert!(max_episode_steps > 0, "episode step limit must be positive");
        self.max_episode_steps = max_episode_steps;
    }

    /// Steps taken since the last reset.
    #[must_use]
    pub fn elapsed_steps(&self) -> usize {
        self.elapsed_steps
    }

    #[must_use]
    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn into_inner(self) -> E {
        self.inner
    }
}

impl<E> Environment for TimeLimit<E>
where
    E: Environment,
{
    fn observation_dim(&self) -> usize {
        self.inner.observation_dim()
    }

    fn action_count(&self) -> usize {
        self.inner.action_count()
    }

    fn reset(&mut self) -> Result<Vec<f64>, EnvError> {
        self.elapsed_steps = 0;
        self.inner.reset()
    }

    fn step(&mut self, action: usize) -> Result<Transition, EnvError> {
        if self.elapsed_steps >= self.max_episode_steps {
            return Err(EnvError::EpisodeFinished);
        }
        let mut transition = self.inner.step(action)?;
        self.elapsed_steps += 1;
        if self.elapsed_steps >= self.max_episode_steps {
            transition.truncated = true;
        }
        Ok(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TargetAction;

    #[test]
    fn test_truncates_at_limit() {
        let mut env = TimeLimit::new(TargetAction::new(vec![1.0], 2, 0), 3);
        env.reset().unwrap();
        assert!(!env.step(0).unwrap().done());
        assert!(!env.step(0).unwrap().done());
        let last = env.step(0).unwrap();
        assert!(last.truncated);
        assert!(!last.terminated);
        assert_eq!(env.step(0), Err(EnvError::EpisodeFinished));
    }

    #[test]
    fn test_reset_restarts_count() {
        let mut env = TimeLimit::new(TargetAction::new(vec![1.0], 2, 0), 1);
        for _ in 0..3 {
            env.reset().unwrap();
            assert!(env.step(1).unwrap().truncated);
            assert_eq!(env.elapsed_steps(), 1);
        }
    }

    #[test]
    fn test_override_limit() {
        let mut env = TimeLimit::new(TargetAction::new(vec![1.0], 2, 0), 1);
        env.set_max_episode_steps(2);
        env.reset().unwrap();
        assert!(!env.step(0).unwrap().done());
        assert!(env.step(0).unwrap().done());
    }

    #[test]
    fn test_errors_pass_through() {
        let mut env = TimeLimit::new(TargetAction::new(vec![1.0], 2, 0), 5);
        env.reset().unwrap();
        assert_eq!(
            env.step(9),
            Err(EnvError::InvalidAction {
                action: 9,
                action_count: 2
            })
        );
        assert_eq!(env.elapsed_steps(), 0);
    }
}
