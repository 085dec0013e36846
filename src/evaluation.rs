//! Policy evaluation over several episodes, reported as mean and spread of
//! the undiscounted episode return.

use serde::{Deserialize, Serialize};

use crate::box_2d::rocket_lander::{Action, Observation, Outcome, RocketLander};
use crate::error::LanderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationSettings {
    pub episodes: usize,
    /// Episodes still running after this many steps are cut short and counted
    /// as truncated.
    pub max_steps: usize,
    /// Seed for the first episode; later episodes continue the same stream.
    pub seed: Option<u64>,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            episodes: 10,
            max_steps: 5000,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct EvaluationSummary {
    pub episodes: usize,
    pub mean_reward: f32,
    pub std_reward: f32,
    pub landed: usize,
    pub crashed: usize,
    pub out_of_bounds: usize,
    pub diverged: usize,
    pub truncated: usize,
}

impl EvaluationSummary {
    fn count(&mut self, outcome: Option<Outcome>) {
        match outcome {
            Some(Outcome::Landed) => self.landed += 1,
            Some(Outcome::Crashed) => self.crashed += 1,
            Some(Outcome::OutOfBounds) => self.out_of_bounds += 1,
            Some(Outcome::Diverged) => self.diverged += 1,
            None => self.truncated += 1,
        }
    }
}

/// Runs `settings.episodes` episodes with `policy` choosing every action.
pub fn evaluate<P>(
    env: &mut RocketLander,
    mut policy: P,
    settings: EvaluationSettings,
) -> Result<EvaluationSummary, LanderError>
where
    P: FnMut(&Observation) -> Action,
{
    let mut summary = EvaluationSummary {
        episodes: settings.episodes,
        ..EvaluationSummary::default()
    };
    let mut returns = Vec::with_capacity(settings.episodes);

    for episode in 0..settings.episodes {
        let seed = if episode == 0 { settings.seed } else { None };
        let (mut observation, _info) = env.reset(seed)?;
        let mut total = 0.0f64;
        let mut outcome = None;

        for _ in 0..settings.max_steps {
            let transition = env.step(policy(&observation))?;
            total += transition.reward as f64;
            observation = transition.observation;
            if transition.terminated {
                outcome = transition.info.outcome;
                break;
            }
        }

        #[cfg(feature = "logging")]
        log::debug!("evaluation episode {episode}: return {total:.1}, outcome {outcome:?}");
        summary.count(outcome);
        returns.push(total);
    }

    if !returns.is_empty() {
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        summary.mean_reward = mean as f32;
        summary.std_reward = variance.sqrt() as f32;
    }

    #[cfg(feature = "logging")]
    log::info!(
        "mean_reward={:.2} +/- {:.2} over {} episodes",
        summary.mean_reward,
        summary.std_reward,
        summary.episodes
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_policy_never_lands() {
        let mut env = RocketLander::builder().build().unwrap();
        let settings = EvaluationSettings {
            episodes: 2,
            max_steps: 3000,
            seed: Some(11),
        };
        let summary = evaluate(&mut env, |_| Action::NoOp, settings).unwrap();

        assert_eq!(summary.episodes, 2);
        assert_eq!(summary.landed, 0);
        assert_eq!(
            summary.crashed + summary.out_of_bounds + summary.diverged + summary.truncated,
            2
        );
        assert!(summary.mean_reward < 0.0);
        assert!(summary.std_reward >= 0.0);
    }

    #[test]
    fn step_cap_counts_as_truncated() {
        let mut env = RocketLander::builder().build().unwrap();
        let settings = EvaluationSettings {
            episodes: 3,
            max_steps: 5,
            seed: Some(2),
        };
        let summary = evaluate(&mut env, |_| Action::ThrustUp, settings).unwrap();
        assert_eq!(summary.truncated, 3);
        // Five ticks of full thrust burn the same fuel whatever the spawn.
        assert!(summary.mean_reward < 0.0);
    }

    #[test]
    fn seeded_evaluations_repeat() {
        let settings = EvaluationSettings {
            episodes: 2,
            max_steps: 400,
            seed: Some(5),
        };
        let policy = |obs: &Observation| {
            if obs.relative_velocity().1 < -0.05 {
                Action::ThrustUp
            } else {
                Action::NoOp
            }
        };
        let mut a = RocketLander::builder().build().unwrap();
        let mut b = RocketLander::builder().seed(99).build().unwrap();
        assert_eq!(
            evaluate(&mut a, policy, settings).unwrap(),
            evaluate(&mut b, policy, settings).unwrap()
        );
    }
}
