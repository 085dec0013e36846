//! Potential-based reward shaping and the termination decision.

use serde::{Deserialize, Serialize};

use super::collision::CollisionFlags;
use super::config::RewardConfig;
use super::observation::Observation;

/// Why an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Body contact or a leg touching down too fast.
    Crashed,
    /// Left the bounding box without hitting anything.
    OutOfBounds,
    /// Both legs held slow contact for the full commitment time.
    Landed,
    /// The integrator produced non-finite state.
    Diverged,
}

/// Mutable per-episode bookkeeping owned by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EpisodeState {
    pub contact_time: f32,
    pub prev_shaping: Option<f32>,
    pub elapsed: f32,
    pub terminal: bool,
}

impl EpisodeState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Physical facts about one completed tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub observation: Observation,
    pub flags: CollisionFlags,
    /// Main body speed in m/s relevant to touchdown checks.
    pub speed: f32,
    pub thruster_power: f32,
    pub dt: f32,
}

/// Reward for one tick, split into its parts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RewardBreakdown {
    pub potential: f32,
    pub shaping: f32,
    pub fuel_penalty: f32,
    /// Crash penalties, landing bonus or the per-tick landing reward.
    pub terminal: f32,
    pub outcome: Option<Outcome>,
}

impl RewardBreakdown {
    pub fn total(&self) -> f32 {
        self.shaping - self.fuel_penalty + self.terminal
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RewardShaper {
    config: RewardConfig,
}

impl RewardShaper {
    pub fn new(config: RewardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    /// Shaping potential: closer to the target and more legs down is better.
    pub fn potential(&self, observation: &Observation) -> f32 {
        -self.config.position_weight * observation.distance()
            + self.config.legs_weight
                * (observation.left_leg_contact() + observation.right_leg_contact())
    }

    /// Updates the potential only. Used for the priming tick of a reset, which
    /// neither pays out nor decides termination.
    pub fn prime(&self, episode: &mut EpisodeState, observation: &Observation) -> f32 {
        let potential = self.potential(observation);
        episode.prev_shaping = Some(potential);
        potential
    }

    /// Scores one tick and decides whether the episode is over. Crash checks
    /// run before the landing check.
    pub fn evaluate(&self, episode: &mut EpisodeState, tick: &TickReport) -> RewardBreakdown {
        let c = &self.config;
        let potential = self.potential(&tick.observation);
        let shaping = match episode.prev_shaping {
            Some(prev) => potential - prev,
            None => 0.0,
        };
        episode.prev_shaping = Some(potential);
        episode.elapsed += tick.dt;

        let mut breakdown = RewardBreakdown {
            potential,
            shaping,
            fuel_penalty: c.fuel_cost * tick.thruster_power,
            terminal: 0.0,
            outcome: None,
        };

        let flags = &tick.flags;
        let (x, y) = tick.observation.relative_position();
        let out_of_bounds = x.abs() > 1.0 || y.abs() > 1.0;
        let hard_touchdown = flags.any_leg() && tick.speed > c.crash_velocity_threshold;

        if flags.body || hard_touchdown || out_of_bounds {
            let impact = flags.body || flags.terrain;
            breakdown.terminal = c.crash_penalty + if impact { c.impact_penalty } else { 0.0 };
            breakdown.outcome = Some(if flags.body || hard_touchdown {
                Outcome::Crashed
            } else {
                Outcome::OutOfBounds
            });
            episode.contact_time = 0.0;
            episode.terminal = true;
            return breakdown;
        }

        if flags.both_legs() && tick.speed < c.crash_velocity_threshold {
            episode.contact_time += tick.dt;
            if episode.contact_time > c.commitment_duration {
                breakdown.terminal = c.landing_bonus;
                breakdown.outcome = Some(Outcome::Landed);
                episode.terminal = true;
            } else {
                breakdown.terminal = c.landing_tick_reward;
            }
        } else {
            episode.contact_time = 0.0;
        }
        breakdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::assert_close;

    const DT: f32 = 0.5;

    fn report(position: (f32, f32), flags: CollisionFlags, speed: f32) -> TickReport {
        let contact = |c: bool| if c { 1.0 } else { 0.0 };
        TickReport {
            observation: Observation::from_array([
                position.0,
                position.1,
                0.0,
                0.0,
                0.0,
                0.0,
                contact(flags.left_leg),
                contact(flags.right_leg),
            ]),
            flags,
            speed,
            thruster_power: 0.0,
            dt: DT,
        }
    }

    fn legs_down() -> CollisionFlags {
        CollisionFlags {
            left_leg: true,
            right_leg: true,
            ..CollisionFlags::default()
        }
    }

    #[test]
    fn first_tick_has_no_shaping() {
        let shaper = RewardShaper::new(RewardConfig::default());
        let mut episode = EpisodeState::new();
        let breakdown = shaper.evaluate(&mut episode, &report((0.3, 0.4), CollisionFlags::default(), 0.0));
        assert_eq!(breakdown.shaping, 0.0);
        assert_close(breakdown.potential, -500.0, 1e-3);
        assert_eq!(episode.prev_shaping, Some(breakdown.potential));
        assert_eq!(breakdown.outcome, None);
    }

    #[test]
    fn shaping_telescopes() {
        let shaper = RewardShaper::new(RewardConfig::default());
        let mut episode = EpisodeState::new();
        let path = [(0.6, -0.8), (0.5, -0.6), (0.3, -0.5), (0.1, -0.2), (0.0, -0.1)];
        let mut sum = 0.0f64;
        let mut first = None;
        let mut last = 0.0;
        for position in path {
            let breakdown = shaper.evaluate(&mut episode, &report(position, CollisionFlags::default(), 0.0));
            first.get_or_insert(breakdown.potential);
            last = breakdown.potential;
            sum += breakdown.shaping as f64;
        }
        let expected = (last - first.unwrap()) as f64;
        assert!((sum - expected).abs() < 1e-3, "sum {sum}, expected {expected}");
    }

    #[test]
    fn fuel_is_charged_every_tick() {
        let shaper = RewardShaper::new(RewardConfig::default());
        let mut episode = EpisodeState::new();
        let mut tick = report((0.0, -0.5), CollisionFlags::default(), 0.0);
        tick.thruster_power = 0.5;
        let breakdown = shaper.evaluate(&mut episode, &tick);
        assert_close(breakdown.fuel_penalty, 50.0, 1e-5);
        assert_close(breakdown.total(), -50.0, 1e-5);
    }

    #[test]
    fn contact_timer_resets_when_contact_is_lost() {
        let shaper = RewardShaper::new(RewardConfig::default());
        let mut episode = EpisodeState::new();

        shaper.evaluate(&mut episode, &report((0.0, 0.0), legs_down(), 0.0));
        shaper.evaluate(&mut episode, &report((0.0, 0.0), legs_down(), 0.0));
        assert_close(episode.contact_time, 2.0 * DT, 1e-6);

        let one_leg = CollisionFlags {
            left_leg: true,
            ..CollisionFlags::default()
        };
        shaper.evaluate(&mut episode, &report((0.0, 0.0), one_leg, 0.0));
        assert_eq!(episode.contact_time, 0.0);

        shaper.evaluate(&mut episode, &report((0.0, 0.0), legs_down(), 0.0));
        assert_close(episode.contact_time, DT, 1e-6);
    }

    #[test]
    fn fast_both_legs_contact_does_not_count_as_landing() {
        let shaper = RewardShaper::new(RewardConfig::default());
        let mut episode = EpisodeState::new();
        episode.contact_time = 1.0;
        let breakdown = shaper.evaluate(&mut episode, &report((0.0, 0.0), legs_down(), 50.0));
        assert_eq!(breakdown.outcome, Some(Outcome::Crashed));
        assert_eq!(episode.contact_time, 0.0);
    }

    #[test]
    fn landing_commits_after_duration() {
        let config = RewardConfig {
            commitment_duration: 1.2,
            ..RewardConfig::default()
        };
        let shaper = RewardShaper::new(config.clone());
        let mut episode = EpisodeState::new();

        let mut outcomes = Vec::new();
        for _ in 0..3 {
            let breakdown = shaper.evaluate(&mut episode, &report((0.0, 0.0), legs_down(), 0.1));
            outcomes.push((breakdown.outcome, breakdown.terminal));
        }
        assert_eq!(outcomes[0], (None, config.landing_tick_reward));
        assert_eq!(outcomes[1], (None, config.landing_tick_reward));
        assert_eq!(outcomes[2], (Some(Outcome::Landed), config.landing_bonus));
        assert!(episode.terminal);
    }

    #[test]
    fn body_contact_is_a_crash_with_impact_penalty() {
        let config = RewardConfig::default();
        let shaper = RewardShaper::new(config.clone());
        let mut episode = EpisodeState::new();
        let flags = CollisionFlags {
            body: true,
            ..CollisionFlags::default()
        };
        let breakdown = shaper.evaluate(&mut episode, &report((0.0, 0.0), flags, 0.0));
        assert_eq!(breakdown.outcome, Some(Outcome::Crashed));
        assert_eq!(breakdown.terminal, config.crash_penalty + config.impact_penalty);
        assert!(episode.terminal);
    }

    #[test]
    fn leaving_the_box_is_penalised_without_impact() {
        let config = RewardConfig::default();
        let shaper = RewardShaper::new(config.clone());
        let mut episode = EpisodeState::new();
        let breakdown = shaper.evaluate(&mut episode, &report((-1.01, -0.2), CollisionFlags::default(), 0.0));
        assert_eq!(breakdown.outcome, Some(Outcome::OutOfBounds));
        assert_eq!(breakdown.terminal, config.crash_penalty);

        let mut episode = EpisodeState::new();
        let breakdown = shaper.evaluate(&mut episode, &report((0.0, 1.2), CollisionFlags::default(), 0.0));
        assert_eq!(breakdown.outcome, Some(Outcome::OutOfBounds));
    }

    #[test]
    fn crash_takes_precedence_over_landing() {
        let shaper = RewardShaper::new(RewardConfig::default());
        let mut episode = EpisodeState::new();
        let flags = CollisionFlags {
            body: true,
            ..legs_down()
        };
        let breakdown = shaper.evaluate(&mut episode, &report((0.0, 0.0), flags, 0.0));
        assert_eq!(breakdown.outcome, Some(Outcome::Crashed));
    }
}
