//! Single-episode rollouts.

use ars_env::{EnvError, Environment};
use tracing::trace;

use crate::{
    matrix::Matrix,
    normalizer::StateFilter,
    policy::{Direction, LinearPolicy},
};

/// Plays one full episode and returns its total (unmodified) reward.
///
/// Every visited state is first recorded by `normalizer`, then rescaled by it
/// and scored by `policy` (perturbed along `delta` in `direction`, if given).
/// The highest-scoring action is taken, ties going to the lowest index. The
/// episode ends when the environment reports termination or truncation; the
/// per-episode step cap is the environment's responsibility (see
/// [`ars_env::TimeLimit`]).
///
/// Any environment failure, including an observation whose length differs from
/// the policy's input size, aborts the rollout.
pub fn explore<E, N>(
    env: &mut E,
    normalizer: &mut N,
    policy: &LinearPolicy,
    delta: Option<&Matrix>,
    direction: Direction,
) -> Result<f64, EnvError>
where
    E: Environment + ?Sized,
    N: StateFilter + ?Sized,
{
    let mut state = env.reset()?;
    let mut total_reward = 0.0;
    let mut steps = 0_usize;
    loop {
        if state.len() != policy.observation_dim() {
            return Err(EnvError::ObservationShape {
                expected: policy.observation_dim(),
                actual: state.len(),
            });
        }
        normalizer.observe(&state);
        let input = normalizer.normalize(&state);
        let scores = policy.evaluate(&input, delta, direction);
        let transition = env.step(argmax(&scores))?;
        total_reward += transition.reward;
        steps += 1;
        if transition.done() {
            break;
        }
        state = transition.observation;
    }
    trace!(%direction, steps, total_reward, "episode finished");
    Ok(total_reward)
}

/// Index of the largest score; the first one wins on ties.
///
/// # Panics
///
/// Panics if `scores` is empty.
#[must_use]
pub fn argmax(scores: &[f64]) -> usize {
    assert!(!scores.is_empty(), "cannot pick an action from no scores");
    let mut best = 0;
    for (i, &s) in scores.iter().enumerate().skip(1) {
        if s > scores[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use ars_env::{TargetAction, TimeLimit, Transition};

    use super::*;
    use crate::{
        hyperparams::{Hyperparams, HyperparamsConfig, NormalizationMode},
        normalizer::Normalizer,
    };

    fn hp(normalization: NormalizationMode) -> Hyperparams {
        Hyperparams::new(HyperparamsConfig {
            noise: 0.5,
            normalization,
            ..HyperparamsConfig::default()
        })
        .unwrap()
    }

    /// Walks `1, 2, 3, ...` and pays the action index, ending after `len` steps.
    #[derive(Debug)]
    struct Counter {
        t: f64,
        len: usize,
        steps: usize,
    }

    impl Environment for Counter {
        fn observation_dim(&self) -> usize {
            1
        }

        fn action_count(&self) -> usize {
            2
        }

        fn reset(&mut self) -> Result<Vec<f64>, EnvError> {
            self.t = 1.0;
            self.steps = 0;
            Ok(vec![self.t])
        }

        fn step(&mut self, action: usize) -> Result<Transition, EnvError> {
            self.t += 1.0;
            self.steps += 1;
            Ok(Transition {
                observation: vec![self.t],
                reward: if action == 1 { 2.5 } else { -1.0 },
                terminated: self.steps >= self.len,
                truncated: false,
            })
        }
    }

    #[test]
    fn test_argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[0.0, 0.0, 0.0]), 0);
        assert_eq!(argmax(&[1.0, 3.0, 3.0]), 1);
        assert_eq!(argmax(&[-1.0, -2.0]), 0);
    }

    #[test]
    fn test_observes_every_visited_state() {
        let hp = hp(NormalizationMode::V2);
        let mut env = Counter {
            t: 0.0,
            len: 4,
            steps: 0,
        };
        let mut normalizer = Normalizer::new(&hp, 1);
        let policy = LinearPolicy::new(&hp, 1, 2);

        // zero policy: all scores tie, action 0 every step
        let reward = explore(&mut env, &mut normalizer, &policy, None, Direction::None).unwrap();
        assert_eq!(reward, -4.0);
        // states 1, 2, 3, 4 are observed; the terminal state 5 is not
        assert_eq!(normalizer.count(), 4);
        assert_eq!(normalizer.mean(), &[2.5]);
    }

    #[test]
    fn test_direction_changes_chosen_action() {
        let hp = hp(NormalizationMode::V1);
        let policy = LinearPolicy::new(&hp, 1, 2);
        let delta = Matrix::from_rows(vec![vec![-1.0], vec![1.0]]).unwrap();
        let mut normalizer = Normalizer::new(&hp, 1);

        let mut env = Counter {
            t: 0.0,
            len: 3,
            steps: 0,
        };
        let positive =
            explore(&mut env, &mut normalizer, &policy, Some(&delta), Direction::Positive).unwrap();
        let negative =
            explore(&mut env, &mut normalizer, &policy, Some(&delta), Direction::Negative).unwrap();
        assert_eq!(positive, 7.5);
        assert_eq!(negative, -3.0);
        assert_eq!(normalizer.count(), 6);
    }

    #[test]
    fn test_time_limit_ends_episode() {
        let hp = hp(NormalizationMode::V1);
        let mut env = TimeLimit::new(TargetAction::new(vec![1.0, 2.0], 2, 0), 7);
        let mut normalizer = Normalizer::new(&hp, 2);
        let policy = LinearPolicy::new(&hp, 2, 2);
        let reward = explore(&mut env, &mut normalizer, &policy, None, Direction::None).unwrap();
        assert_eq!(reward, 7.0);
    }

    #[test]
    fn test_shape_mismatch_is_an_error() {
        let hp = hp(NormalizationMode::V2);
        let mut env = TimeLimit::new(TargetAction::new(vec![1.0, 2.0, 3.0], 2, 0), 1);
        let mut normalizer = Normalizer::new(&hp, 2);
        let policy = LinearPolicy::new(&hp, 2, 2);
        assert_eq!(
            explore(&mut env, &mut normalizer, &policy, None, Direction::None),
            Err(EnvError::ObservationShape {
                expected: 2,
                actual: 3
            })
        );
        assert_eq!(normalizer.count(), 0);
    }
}
