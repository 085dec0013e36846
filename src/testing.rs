#![cfg(test)]

use crate::box_2d::rocket_lander::{Action, Observation, RocketLander, Transition};

pub(crate) fn assert_close(actual: f32, expected: f32, tolerance: f32) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected} (within {tolerance}), got {actual}"
    );
}

/// Steps an already reset environment with `policy` until the episode ends or
/// `max_steps` transitions have been taken.
pub(crate) fn run_until_done<P>(
    env: &mut RocketLander,
    mut policy: P,
    max_steps: usize,
) -> Vec<Transition>
where
    P: FnMut(&Observation) -> Action,
{
    let mut observation = env.last_observation();
    let mut transitions = Vec::new();
    for i in 0..max_steps {
        let action = policy(&observation);
        let transition = env
            .step(action)
            .unwrap_or_else(|e| panic!("step {i} failed: {e}"));
        observation = transition.observation;
        let done = transition.terminated;
        transitions.push(transition);
        if done {
            break;
        }
    }
    transitions
}
