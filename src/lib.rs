//! A rocket with spring-loaded landing legs, descending onto a pad under
//! box2d physics, packaged as an episodic reinforcement learning environment.

pub mod box_2d;
pub mod error;
pub mod evaluation;
pub mod gym;
pub(crate) mod testing;

#[cfg(feature = "rendering")]
pub mod rendering;

pub use box_2d::rocket_lander::{
    Action, Info, LanderConfig, Observation, Outcome, RocketLander, Spawn, Transition,
};
pub use error::LanderError;
