use std::f32::consts::PI;

use candle_core::{Device, Tensor};

use super::bodies::RocketState;
use super::collision::CollisionFlags;
use crate::gym::BoxSpace;

/// Normalized view of the rocket handed to the agent:
/// `[dx, dy, vx, vy, angle, angular_velocity, left_leg, right_leg]`, where
/// `(dx, dy)` points from the rocket to the landing target.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Observation([f32; Observation::LEN]);

impl Observation {
    pub const LEN: usize = 8;

    pub fn from_array(values: [f32; Observation::LEN]) -> Self {
        Self(values)
    }

    pub fn as_array(&self) -> &[f32; Observation::LEN] {
        &self.0
    }

    pub fn relative_position(&self) -> (f32, f32) {
        (self.0[0], self.0[1])
    }

    pub fn relative_velocity(&self) -> (f32, f32) {
        (self.0[2], self.0[3])
    }

    pub fn angle(&self) -> f32 {
        self.0[4]
    }

    pub fn angular_velocity(&self) -> f32 {
        self.0[5]
    }

    pub fn left_leg_contact(&self) -> f32 {
        self.0[6]
    }

    pub fn right_leg_contact(&self) -> f32 {
        self.0[7]
    }

    pub fn distance(&self) -> f32 {
        let (x, y) = self.relative_position();
        (x * x + y * y).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    pub fn to_tensor(&self, device: &Device) -> Result<Tensor, candle_core::Error> {
        Tensor::from_vec(self.0.to_vec(), vec![Self::LEN], device)
    }

    /// Declared observation bounds.
    pub fn space() -> BoxSpace {
        let low = vec![-1.5, -1.5, -1.5, -1.5, -PI, -PI, 0.0, 0.0];
        let high = vec![1.5, 1.5, 1.5, 1.5, PI, PI, 1.0, 1.0];
        BoxSpace::new(low, high)
    }
}

/// Wraps an unbounded engine angle into (-pi, pi].
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped == -PI { PI } else { wrapped }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservationEncoder {
    pub distance_scale: f32,
    pub velocity_scale: f32,
}

impl ObservationEncoder {
    pub fn new(distance_scale: f32, velocity_scale: f32) -> Self {
        Self {
            distance_scale,
            velocity_scale,
        }
    }

    pub fn encode(
        &self,
        rocket: &RocketState,
        target: (f32, f32),
        flags: &CollisionFlags,
    ) -> Observation {
        let body = &rocket.body;
        let contact = |c: bool| if c { 1.0 } else { 0.0 };
        Observation([
            (target.0 - body.position.0) / self.distance_scale,
            (target.1 - body.position.1) / self.distance_scale,
            body.velocity.0 / self.velocity_scale,
            body.velocity.1 / self.velocity_scale,
            wrap_angle(body.angle),
            body.angular_velocity,
            contact(flags.left_leg),
            contact(flags.right_leg),
        ])
    }
}
