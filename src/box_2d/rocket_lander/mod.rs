use box2d_rs::b2_math::*;
use box2d_rs::b2_world::*;

use bon::bon;
use candle_core::{Device, Tensor};
use rand::distr::uniform::SampleRange;
use rand::distr::uniform::SampleUniform;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::error::LanderError;
use crate::gym::{Discrete, Gym, Space, StepInfo};

mod action;
mod bodies;
mod collision;
mod config;
mod observation;
mod reward;

pub use action::{Action, ThrusterInput};
pub use bodies::{BodyState, RocketState, Scene, ShapeId};
pub use collision::{CollisionFlags, CollisionTracker};
pub use config::{
    FIXED_TICK, LEG_LIMIT_MARGIN, LEG_MASS_FRACTION, LanderConfig, PlanetGeometry, RewardConfig,
    SpawnArea, VehicleGeometry,
};
pub use observation::{Observation, ObservationEncoder, wrap_angle};
pub use reward::{EpisodeState, Outcome, RewardBreakdown, RewardShaper, TickReport};

use bodies::{Planet, Rocket, UserDataTypes};

/// Random stream owned by one environment. Unseeded instances draw their own
/// seed from the OS, so no two instances ever share a stream.
struct EnvRng(StdRng);

impl EnvRng {
    fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(s) => EnvRng(StdRng::seed_from_u64(s)),
            None => EnvRng(StdRng::from_os_rng()),
        }
    }

    fn random_range<T, R>(&mut self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.0.random_range(range)
    }
}

/// Initial pose of the main body, relative to the pad center.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Spawn {
    pub x: f32,
    /// Height of the main body's center above the pad center.
    pub altitude: f32,
    pub velocity: (f32, f32),
    pub angle: f32,
    pub angular_velocity: f32,
}

impl Spawn {
    /// Upright and at rest.
    pub fn at(x: f32, altitude: f32) -> Self {
        Self {
            x,
            altitude,
            ..Self::default()
        }
    }

    /// Upright on the pad with both feet touching it.
    pub fn landed(config: &LanderConfig) -> Self {
        let (x, altitude) = config.landing_target();
        Self::at(x, altitude)
    }

    pub fn with_velocity(mut self, vx: f32, vy: f32) -> Self {
        self.velocity = (vx, vy);
        self
    }

    fn body_state(&self) -> BodyState {
        BodyState {
            position: (self.x, self.altitude),
            velocity: self.velocity,
            angle: self.angle,
            angular_velocity: self.angular_velocity,
        }
    }
}

/// Lifecycle of an environment instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Running,
    Terminated(Outcome),
}

/// Diagnostics returned alongside every observation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Info {
    pub elapsed: f32,
    pub contact_time: f32,
    pub potential: f32,
    pub shaping_reward: f32,
    pub fuel_penalty: f32,
    pub terminal_reward: f32,
    pub legs_on_pad: bool,
    pub outcome: Option<Outcome>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub observation: Observation,
    pub reward: f32,
    pub terminated: bool,
    /// Always false: episodes end only through `terminated`.
    pub truncated: bool,
    pub info: Info,
}

/// One physics world and everything living in it.
struct Simulation {
    world: B2worldPtr<UserDataTypes>,
    rocket: Rocket,
    planet: Planet,
    tracker: Rc<RefCell<CollisionTracker>>,
}

impl Simulation {
    fn build(config: &LanderConfig, spawn: &Spawn) -> Self {
        let world = B2world::<UserDataTypes>::new(B2vec2::new(0.0, config.gravity));
        let tracker = Rc::new(RefCell::new(CollisionTracker::new()));
        world.borrow_mut().set_contact_listener(tracker.clone());

        let planet = Planet::build(&world, &config.planet);
        let rocket = Rocket::build(&world, &config.vehicle, &spawn.body_state());
        Self {
            world,
            rocket,
            planet,
            tracker,
        }
    }

    fn legs_on_pad(&self) -> bool {
        let tracker = self.tracker.borrow();
        [ShapeId::LeftLeg, ShapeId::RightLeg]
            .iter()
            .all(|leg| tracker.contacts_of(*leg).contains(&ShapeId::Pad))
    }

    fn destroy(self) {
        self.rocket.destroy(&self.world);
        self.planet.destroy(&self.world);
    }
}

struct TickResult {
    observation: Observation,
    breakdown: RewardBreakdown,
    legs_on_pad: bool,
}

/// A rocket with two spring-loaded landing legs descending onto a pad.
///
/// ## Action Space
/// Discrete(4):
/// - 0: engine off
/// - 1: full thrust, gimbal centered
/// - 2: full thrust, gimbal pushing toward -x
/// - 3: full thrust, gimbal pushing toward +x
///
/// ## Observation Space
/// Eight `f32` values, see [`Observation`].
///
/// Each instance owns its own physics world and random stream. `step` after a
/// terminal transition is rejected; call `reset` to start over.
pub struct RocketLander {
    config: LanderConfig,
    encoder: ObservationEncoder,
    shaper: RewardShaper,
    target: (f32, f32),
    sim: Option<Simulation>,
    episode: EpisodeState,
    phase: Phase,
    last_observation: Observation,
    /// Fastest main body speed seen since spawn that no evaluated tick has
    /// checked yet. The priming tick can stop a rocket spawned in contact, so
    /// the first evaluated tick still has to see the spawn speed.
    impact_speed: f32,
    rng: EnvRng,
    device: Device,
}

#[bon]
impl RocketLander {
    #[builder]
    pub fn new(
        #[builder(default)] config: LanderConfig,
        #[builder(default = Device::Cpu)] device: Device,
        seed: Option<u64>,
    ) -> Result<Self, LanderError> {
        config.validate()?;

        Ok(Self {
            encoder: ObservationEncoder::new(config.distance_scale, config.velocity_scale),
            shaper: RewardShaper::new(config.reward.clone()),
            target: config.landing_target(),
            config,
            sim: None,
            episode: EpisodeState::new(),
            phase: Phase::Uninitialized,
            last_observation: Observation::default(),
            impact_speed: 0.0,
            rng: EnvRng::new(seed),
            device,
        })
    }
}

impl RocketLander {
    pub fn config(&self) -> &LanderConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn episode(&self) -> &EpisodeState {
        &self.episode
    }

    /// Most recent finite observation.
    pub fn last_observation(&self) -> Observation {
        self.last_observation
    }

    /// Landing target: where the main body sits when resting on the pad.
    pub fn target(&self) -> (f32, f32) {
        self.target
    }

    pub fn rocket_state(&self) -> Option<RocketState> {
        self.sim.as_ref().map(|sim| sim.rocket.state())
    }

    /// Leg hinge angles relative to the main body, left first.
    pub fn leg_angles(&self) -> Option<[f32; 2]> {
        self.sim.as_ref().map(|sim| sim.rocket.leg_angles())
    }

    pub fn collision_flags(&self) -> Option<CollisionFlags> {
        self.sim.as_ref().map(|sim| sim.tracker.borrow().flags())
    }

    /// Shapes that touched `shape` during the last tick.
    pub fn contacts_of(&self, shape: ShapeId) -> BTreeSet<ShapeId> {
        self.sim
            .as_ref()
            .map(|sim| sim.tracker.borrow().contacts_of(shape))
            .unwrap_or_default()
    }

    /// Read-only snapshot of everything drawable.
    pub fn scene(&self) -> Option<Scene> {
        self.sim.as_ref().map(|sim| {
            let (pad, terrain) = sim.planet.outlines();
            let (body, legs) = sim.rocket.outlines();
            let (engine_mount, exhaust_direction) = sim.rocket.exhaust();
            Scene {
                pad,
                terrain,
                body,
                legs,
                engine_mount,
                exhaust_direction,
                thruster: sim.rocket.last_thrust(),
            }
        })
    }

    /// Starts a new episode from a random spawn. A seed re-seeds this
    /// instance's random stream; without one the stream simply continues.
    pub fn reset(&mut self, seed: Option<u64>) -> Result<(Observation, Info), LanderError> {
        if let Some(s) = seed {
            self.rng = EnvRng::new(Some(s));
        }
        let (x_lo, x_hi) = self.config.spawn.x_range;
        let (alt_lo, alt_hi) = self.config.spawn.altitude_range;
        let spawn = Spawn::at(
            self.rng.random_range(x_lo..x_hi),
            self.rng.random_range(alt_lo..alt_hi),
        );
        #[cfg(feature = "logging")]
        log::debug!("reset: seed={seed:?} spawn=({:.2}, {:.2})", spawn.x, spawn.altitude);
        self.reset_to(spawn)
    }

    /// Starts a new episode from an explicit pose.
    ///
    /// The world is rebuilt from scratch and one engine-off tick is run to
    /// produce the first observation and prime the shaping potential. That
    /// priming tick neither pays a reward nor ends the episode; its speeds are
    /// judged by the first `step`.
    pub fn reset_to(&mut self, spawn: Spawn) -> Result<(Observation, Info), LanderError> {
        self.destroy();
        self.sim = Some(Simulation::build(&self.config, &spawn));
        self.episode = EpisodeState::new();
        self.phase = Phase::Running;
        self.impact_speed = spawn.body_state().speed();

        let tick = self.advance(ThrusterInput::OFF, self.config.tick, false)?;
        if let Some(outcome) = tick.breakdown.outcome {
            self.phase = Phase::Terminated(outcome);
        }
        let info = self.info(&tick);
        Ok((tick.observation, info))
    }

    /// Advances one fixed offline tick.
    pub fn step(&mut self, action: Action) -> Result<Transition, LanderError> {
        self.step_for(action, self.config.tick)
    }

    /// Advances by a caller-chosen tick, e.g. wall-clock frame time when
    /// playing interactively.
    pub fn step_for(&mut self, action: Action, dt: f32) -> Result<Transition, LanderError> {
        self.step_with(action.thruster_input(), dt)
    }

    /// Advances with a continuous engine command. Out-of-range inputs are
    /// clamped before they reach the rocket.
    pub fn step_with(&mut self, input: ThrusterInput, dt: f32) -> Result<Transition, LanderError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(LanderError::InvalidTimestep(dt));
        }
        match self.phase {
            Phase::Uninitialized => return Err(LanderError::NotReset),
            Phase::Terminated(_outcome) => {
                #[cfg(feature = "logging")]
                log::warn!(
                    "step() called after the episode ended ({_outcome:?}); call reset() first"
                );
                return Err(LanderError::EpisodeTerminated);
            }
            Phase::Running => {}
        }

        let tick = self.advance(input, dt, true)?;
        let info = self.info(&tick);
        if let Some(outcome) = tick.breakdown.outcome {
            self.phase = Phase::Terminated(outcome);
            #[cfg(feature = "logging")]
            log::info!(
                "episode ended: {outcome:?} after {:.2}s (terminal reward {:.1})",
                self.episode.elapsed,
                tick.breakdown.terminal
            );
        }

        Ok(Transition {
            observation: tick.observation,
            reward: tick.breakdown.total(),
            terminated: tick.breakdown.outcome.is_some(),
            truncated: false,
            info,
        })
    }

    /// Runs one physics tick: thrust, springs, integration, contacts,
    /// observation, reward.
    fn advance(
        &mut self,
        input: ThrusterInput,
        dt: f32,
        evaluate: bool,
    ) -> Result<TickResult, LanderError> {
        let sim = self.sim.as_mut().ok_or(LanderError::NotReset)?;

        let clamped = input.clamped();
        if clamped != input {
            #[cfg(feature = "logging")]
            log::debug!("thruster input {input:?} clamped to {clamped:?}");
        }

        let speed_before = sim.rocket.state().body.speed();
        sim.tracker.borrow_mut().begin_tick();
        sim.rocket.thrust(clamped);
        sim.rocket.apply_leg_springs();
        sim.world.borrow_mut().step(
            dt,
            self.config.velocity_iterations,
            self.config.position_iterations,
        );
        let flags = sim.tracker.borrow_mut().refresh();
        let legs_on_pad = sim.legs_on_pad();

        let state = sim.rocket.state();
        let observation = self.encoder.encode(&state, self.target, &flags);

        if !state.is_finite() || !observation.is_finite() {
            #[cfg(feature = "logging")]
            log::error!(
                "physics diverged after {:.2}s: {state:?}; terminating episode",
                self.episode.elapsed
            );
            self.episode.elapsed += dt;
            self.episode.terminal = true;
            let breakdown = RewardBreakdown {
                potential: self.episode.prev_shaping.unwrap_or_default(),
                fuel_penalty: self.config.reward.fuel_cost * clamped.power,
                outcome: Some(Outcome::Diverged),
                ..RewardBreakdown::default()
            };
            return Ok(TickResult {
                observation: self.last_observation,
                breakdown,
                legs_on_pad: false,
            });
        }

        let speed = self
            .impact_speed
            .max(speed_before)
            .max(state.body.speed());
        let breakdown = if evaluate {
            self.impact_speed = 0.0;
            let report = TickReport {
                observation,
                flags,
                speed,
                thruster_power: clamped.power,
                dt,
            };
            self.shaper.evaluate(&mut self.episode, &report)
        } else {
            self.impact_speed = speed;
            self.episode.elapsed += dt;
            RewardBreakdown {
                potential: self.shaper.prime(&mut self.episode, &observation),
                ..RewardBreakdown::default()
            }
        };

        self.last_observation = observation;
        Ok(TickResult {
            observation,
            breakdown,
            legs_on_pad,
        })
    }

    fn info(&self, tick: &TickResult) -> Info {
        Info {
            elapsed: self.episode.elapsed,
            contact_time: self.episode.contact_time,
            potential: tick.breakdown.potential,
            shaping_reward: tick.breakdown.shaping,
            fuel_penalty: tick.breakdown.fuel_penalty,
            terminal_reward: tick.breakdown.terminal,
            legs_on_pad: tick.legs_on_pad,
            outcome: tick.breakdown.outcome,
        }
    }

    fn destroy(&mut self) {
        if let Some(sim) = self.sim.take() {
            sim.destroy();
        }
    }
}

impl Drop for RocketLander {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl Gym for RocketLander {
    type Error = LanderError;

    fn get_name(&self) -> &str {
        "RocketLander"
    }

    fn reset(&mut self) -> Result<Tensor, Self::Error> {
        let (observation, _info) = RocketLander::reset(self, None)?;
        Ok(observation.to_tensor(&self.device)?)
    }

    fn step(&mut self, action: Tensor) -> Result<StepInfo, Self::Error> {
        let action = Action::try_from(action.to_vec0::<u32>()?)?;
        let transition = RocketLander::step(self, action)?;
        Ok(StepInfo {
            state: transition.observation.to_tensor(&self.device)?,
            reward: transition.reward,
            done: transition.terminated,
            truncated: transition.truncated,
        })
    }

    fn observation_space(&self) -> Box<dyn Space> {
        Box::new(Observation::space())
    }

    fn action_space(&self) -> Box<dyn Space> {
        Box::new(Discrete::new(Action::COUNT))
    }
}
