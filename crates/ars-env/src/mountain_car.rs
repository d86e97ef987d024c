use rand::{Rng as _, SeedableRng as _};
use rand_pcg::Pcg32;

use crate::{EnvError, Environment, Transition, check_action};

const MIN_POSITION: f64 = -1.2;
const MAX_POSITION: f64 = 0.6;
const MAX_SPEED: f64 = 0.07;
const GOAL_POSITION: f64 = 0.5;
const FORCE: f64 = 0.001;
const GRAVITY: f64 = 0.0025;

/// Under-powered car in a valley that must rock back and forth to reach the
/// flag on the right hill.
///
/// Observation: `[position, velocity]`. Actions: `0` accelerate left, `1` coast,
/// `2` accelerate right. Every step pays `-1.0` until the car reaches the goal.
#[derive(Debug, Clone)]
pub struct MountainCar {
    rng: Pcg32,
    position: f64,
    velocity: f64,
    terminated: bool,
}

impl MountainCar {
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
            position: 0.0,
            velocity: 0.0,
            terminated: true,
        }
    }
}

impl Environment for MountainCar {
    fn observation_dim(&self) -> usize {
        2
    }

    fn action_count(&self) -> usize {
        3
    }

    fn reset(&mut self) -> Result<Vec<f64>, EnvError> {
        self.position = self.rng.random_range(-0.6..-0.4);
        self.velocity = 0.0;
        self.terminated = false;
        Ok(vec![self.position, self.velocity])
    }

    #[expect(clippy::cast_precision_loss)]
    fn step(&mut self, action: usize) -> Result<Transition, EnvError> {
        check_action(action, 3)?;
        if self.terminated {
            return Err(EnvError::EpisodeFinished);
        }

        let push = action as f64 - 1.0;
        self.velocity += push * FORCE - (3.0 * self.position).cos() * GRAVITY;
        self.velocity = self.velocity.clamp(-MAX_SPEED, MAX_SPEED);
        self.position += self.velocity;
        self.position = self.position.clamp(MIN_POSITION, MAX_POSITION);
        // the left wall is inelastic
        if self.position <= MIN_POSITION && self.velocity < 0.0 {
            self.velocity = 0.0;
        }
        self.terminated = self.position >= GOAL_POSITION && self.velocity >= 0.0;

        Ok(Transition {
            observation: vec![self.position, self.velocity],
            reward: -1.0,
            terminated: self.terminated,
            truncated: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_range() {
        let mut env = MountainCar::with_seed(11);
        for _ in 0..20 {
            let s = env.reset().unwrap();
            assert!((-0.6..-0.4).contains(&s[0]));
            assert_eq!(s[1], 0.0);
        }
    }

    #[test]
    fn test_velocity_bang_bang_reaches_goal() {
        let mut env = MountainCar::with_seed(1);
        let mut state = env.reset().unwrap();
        for _ in 0..1000 {
            let action = if state[1] >= 0.0 { 2 } else { 0 };
            let t = env.step(action).unwrap();
            assert_eq!(t.reward, -1.0);
            if t.terminated {
                return;
            }
            state = t.observation;
        }
        panic!("car never reached the goal");
    }
}
