use rand::{Rng as _, SeedableRng as _};
use rand_pcg::Pcg32;

use crate::{EnvError, Environment, Transition, check_action};

const GRAVITY: f64 = 9.8;
const CART_MASS: f64 = 1.0;
const POLE_MASS: f64 = 0.1;
const TOTAL_MASS: f64 = CART_MASS + POLE_MASS;
// half the pole's length
const POLE_HALF_LENGTH: f64 = 0.5;
const POLE_MASS_LENGTH: f64 = POLE_MASS * POLE_HALF_LENGTH;
const FORCE_MAG: f64 = 10.0;
const TAU: f64 = 0.02;

const THETA_THRESHOLD: f64 = 12.0 * 2.0 * std::f64::consts::PI / 360.0;
const X_THRESHOLD: f64 = 2.4;

/// Classic cart-pole balancing task.
///
/// Observation: `[x, x_dot, theta, theta_dot]`. Action `0` pushes the cart to
/// the left, action `1` to the right. Every step (including the one that
/// topples the pole) pays `1.0`. The episode terminates when the pole leans
/// more than 12 degrees or the cart leaves the track.
///
/// Integration uses explicit Euler with a 20 ms time step.
#[derive(Debug, Clone)]
pub struct CartPole {
    rng: Pcg32,
    state: [f64; 4],
    terminated: bool,
}

impl CartPole {
    /// Creates an environment whose reset states are drawn from a generator
    /// seeded with `seed`.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
            state: [0.0; 4],
            terminated: true,
        }
    }

    fn out_of_bounds(&self) -> bool {
        let [x, _, theta, _] = self.state;
        !(-X_THRESHOLD..=X_THRESHOLD).contains(&x)
            || !(-THETA_THRESHOLD..=THETA_THRESHOLD).contains(&theta)
    }
}

impl Environment for CartPole {
    fn observation_dim(&self) -> usize {
        4
    }

    fn action_count(&self) -> usize {
        2
    }

    fn reset(&mut self) -> Result<Vec<f64>, EnvError> {
        for v in &mut self.state {
            *v = self.rng.random_range(-0.05..0.05);
        }
        self.terminated = false;
        Ok(self.state.to_vec())
    }

    fn step(&mut self, action: usize) -> Result<Transition, EnvError> {
        check_action(action, 2)?;
        if self.terminated {
            return Err(EnvError::EpisodeFinished);
        }

        let [x, x_dot, theta, theta_dot] = self.state;
        let force = if action == 1 { FORCE_MAG } else { -FORCE_MAG };
        let (sin_theta, cos_theta) = theta.sin_cos();

        let temp = (force + POLE_MASS_LENGTH * theta_dot * theta_dot * sin_theta) / TOTAL_MASS;
        let theta_acc = (GRAVITY * sin_theta - cos_theta * temp)
            / (POLE_HALF_LENGTH * (4.0 / 3.0 - POLE_MASS * cos_theta * cos_theta / TOTAL_MASS));
        let x_acc = temp - POLE_MASS_LENGTH * theta_acc * cos_theta / TOTAL_MASS;

        self.state = [
            x + TAU * x_dot,
            x_dot + TAU * x_acc,
            theta + TAU * theta_dot,
            theta_dot + TAU * theta_acc,
        ];
        self.terminated = self.out_of_bounds();

        Ok(Transition {
            observation: self.state.to_vec(),
            reward: 1.0,
            terminated: self.terminated,
            truncated: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_is_seeded() {
        let mut a = CartPole::with_seed(3);
        let mut b = CartPole::with_seed(3);
        for _ in 0..5 {
            let sa = a.reset().unwrap();
            assert_eq!(sa, b.reset().unwrap());
            assert!(sa.iter().all(|v| v.abs() <= 0.05));
        }
    }

    #[test]
    fn test_constant_push_topples_pole() {
        let mut env = CartPole::with_seed(0);
        env.reset().unwrap();
        let mut steps = 0;
        loop {
            let t = env.step(1).unwrap();
            steps += 1;
            assert_eq!(t.reward, 1.0);
            if t.done() {
                assert!(t.terminated);
                break;
            }
            assert!(steps < 500, "pole never fell");
        }
        assert_eq!(env.step(0), Err(EnvError::EpisodeFinished));
    }

    #[test]
    fn test_step_before_reset_fails() {
        let mut env = CartPole::with_seed(0);
        assert_eq!(env.step(0), Err(EnvError::EpisodeFinished));
    }
}
