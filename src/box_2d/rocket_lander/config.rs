use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::LanderError;

/// How far a leg may swing away from its rest angle, in radians.
pub const LEG_LIMIT_MARGIN: f32 = PI / 36.0;

/// Fraction of the empty mass carried by each landing leg.
pub const LEG_MASS_FRACTION: f32 = 0.08;

/// Offline tick length: two thirds of a 60 FPS frame.
pub const FIXED_TICK: f32 = 2.0 / (3.0 * 60.0);

/// Dimensions and actuator limits of the rocket. Lengths in meters, masses in
/// kilograms, forces in newtons, angles in radians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleGeometry {
    pub width: f32,
    pub height: f32,
    pub empty_mass: f32,
    pub leg_mass_fraction: f32,
    pub leg_length: f32,
    pub leg_width: f32,
    /// Relative angle between a deployed leg and the main body.
    pub legs_rest_angle: f32,
    pub max_thruster_angle: f32,
    pub max_thruster_force: f32,
    pub leg_spring_stiffness: f32,
    pub leg_spring_damping: f32,
    pub friction: f32,
}

impl Default for VehicleGeometry {
    fn default() -> Self {
        Self {
            width: 3.7,
            height: 47.7,
            empty_mass: 25_600.0,
            leg_mass_fraction: LEG_MASS_FRACTION,
            leg_length: 12.0,
            leg_width: 0.6,
            legs_rest_angle: PI / 6.0,
            max_thruster_angle: PI / 18.0,
            max_thruster_force: 845_000.0,
            leg_spring_stiffness: 1.0e7,
            leg_spring_damping: 1.0e6,
            friction: 0.6,
        }
    }
}

impl VehicleGeometry {
    pub fn main_body_mass(&self) -> f32 {
        (1.0 - 2.0 * self.leg_mass_fraction) * self.empty_mass
    }

    pub fn leg_mass(&self) -> f32 {
        self.leg_mass_fraction * self.empty_mass
    }

    /// Engine mount in body-local coordinates.
    pub fn engine_mount(&self) -> (f32, f32) {
        (0.0, -self.height / 2.0)
    }

    /// Leg hinge in body-local coordinates. `side` is -1 for left, +1 for right.
    pub fn leg_pivot(&self, side: f32) -> (f32, f32) {
        (side * self.width / 2.0, -self.height / 2.0)
    }

    /// Target angle of a leg relative to the main body.
    pub fn leg_rest_angle(&self, side: f32) -> f32 {
        side * self.legs_rest_angle
    }

    /// Leg center in body-local coordinates when the leg sits at rest.
    pub fn leg_center(&self, side: f32) -> (f32, f32) {
        let (px, py) = self.leg_pivot(side);
        let angle = self.leg_rest_angle(side);
        let half = self.leg_length / 2.0;
        (px + half * angle.sin(), py - half * angle.cos())
    }

    /// Height of the main body's center above the ground when the rocket
    /// stands upright with both feet touching.
    pub fn landed_clearance(&self) -> f32 {
        let rest = self.legs_rest_angle;
        self.height / 2.0 + self.leg_length * rest.cos() + self.leg_width / 2.0 * rest.sin()
    }

    fn validate(&self) -> Result<(), LanderError> {
        let positive = [
            ("width", self.width),
            ("height", self.height),
            ("empty_mass", self.empty_mass),
            ("leg_length", self.leg_length),
            ("leg_width", self.leg_width),
            ("max_thruster_force", self.max_thruster_force),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(LanderError::InvalidConfig(format!(
                    "vehicle.{name} must be finite and > 0 (got {value})"
                )));
            }
        }
        let non_negative = [
            ("max_thruster_angle", self.max_thruster_angle),
            ("leg_spring_stiffness", self.leg_spring_stiffness),
            ("leg_spring_damping", self.leg_spring_damping),
            ("friction", self.friction),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(LanderError::InvalidConfig(format!(
                    "vehicle.{name} must be finite and >= 0 (got {value})"
                )));
            }
        }
        if !(self.leg_mass_fraction > 0.0 && self.leg_mass_fraction < 0.5) {
            return Err(LanderError::InvalidConfig(format!(
                "vehicle.leg_mass_fraction must be in (0, 0.5) (got {})",
                self.leg_mass_fraction
            )));
        }
        if !(self.legs_rest_angle > LEG_LIMIT_MARGIN && self.legs_rest_angle < PI / 2.0) {
            return Err(LanderError::InvalidConfig(format!(
                "vehicle.legs_rest_angle must be in (pi/36, pi/2) (got {})",
                self.legs_rest_angle
            )));
        }
        Ok(())
    }
}

/// Static landing site: a pad sitting on a much wider terrain slab. The pad
/// center is the world origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanetGeometry {
    pub pad_width: f32,
    pub pad_height: f32,
    pub terrain_width: f32,
    pub terrain_height: f32,
    pub friction: f32,
}

impl Default for PlanetGeometry {
    fn default() -> Self {
        Self {
            pad_width: 30.0,
            pad_height: 2.0,
            terrain_width: 1200.0,
            terrain_height: 20.0,
            friction: 0.8,
        }
    }
}

impl PlanetGeometry {
    pub fn pad_top(&self) -> f32 {
        self.pad_height / 2.0
    }

    pub fn terrain_top(&self) -> f32 {
        -self.pad_height / 2.0
    }

    /// Center of the terrain slab, in the pad frame.
    pub fn terrain_center(&self) -> (f32, f32) {
        (0.0, self.terrain_top() - self.terrain_height / 2.0)
    }

    fn validate(&self) -> Result<(), LanderError> {
        let positive = [
            ("pad_width", self.pad_width),
            ("pad_height", self.pad_height),
            ("terrain_width", self.terrain_width),
            ("terrain_height", self.terrain_height),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(LanderError::InvalidConfig(format!(
                    "planet.{name} must be finite and > 0 (got {value})"
                )));
            }
        }
        if self.terrain_width < self.pad_width {
            return Err(LanderError::InvalidConfig(
                "planet.terrain_width must be at least planet.pad_width".to_string(),
            ));
        }
        Ok(())
    }
}

/// Shaping weights, penalties and landing thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub position_weight: f32,
    pub legs_weight: f32,
    pub fuel_cost: f32,
    /// Main body speed (m/s) above which leg contact counts as a crash.
    pub crash_velocity_threshold: f32,
    pub crash_penalty: f32,
    /// Added on top of `crash_penalty` when the body or the terrain was hit.
    pub impact_penalty: f32,
    pub landing_bonus: f32,
    pub landing_tick_reward: f32,
    /// Seconds both legs must stay in slow contact before the landing counts.
    pub commitment_duration: f32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            position_weight: 1000.0,
            legs_weight: 10.0,
            fuel_cost: 100.0,
            crash_velocity_threshold: 5.0,
            crash_penalty: -1000.0,
            impact_penalty: -1000.0,
            landing_bonus: 1000.0,
            landing_tick_reward: 100.0,
            commitment_duration: 5.0,
        }
    }
}

/// Rectangle, relative to the pad center, in which episodes start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnArea {
    pub x_range: (f32, f32),
    /// Height of the main body's center above the pad center.
    pub altitude_range: (f32, f32),
}

impl Default for SpawnArea {
    fn default() -> Self {
        Self {
            x_range: (-100.0, 100.0),
            altitude_range: (100.0, 200.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanderConfig {
    pub gravity: f32,
    /// Tick length used by `RocketLander::step`.
    pub tick: f32,
    pub velocity_iterations: i32,
    pub position_iterations: i32,
    /// Meters mapped to 1.0 in the observation; also the episode bounds.
    pub distance_scale: f32,
    /// m/s mapped to 1.0 in the observation.
    pub velocity_scale: f32,
    pub vehicle: VehicleGeometry,
    pub planet: PlanetGeometry,
    pub reward: RewardConfig,
    pub spawn: SpawnArea,
}

impl Default for LanderConfig {
    fn default() -> Self {
        Self {
            gravity: -9.81,
            tick: FIXED_TICK,
            velocity_iterations: 60,
            position_iterations: 20,
            distance_scale: 250.0,
            velocity_scale: 100.0,
            vehicle: VehicleGeometry::default(),
            planet: PlanetGeometry::default(),
            reward: RewardConfig::default(),
            spawn: SpawnArea::default(),
        }
    }
}

impl LanderConfig {
    /// Parses a JSON document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, LanderError> {
        let config: LanderConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Main body position of a rocket standing upright on the pad center.
    pub fn landing_target(&self) -> (f32, f32) {
        (0.0, self.planet.pad_top() + self.vehicle.landed_clearance())
    }

    pub fn validate(&self) -> Result<(), LanderError> {
        if !(self.gravity.is_finite() && self.gravity < 0.0) {
            return Err(LanderError::InvalidConfig(format!(
                "gravity must be finite and < 0 (got {})",
                self.gravity
            )));
        }
        if !(self.tick.is_finite() && self.tick > 0.0) {
            return Err(LanderError::InvalidConfig(format!(
                "tick must be finite and > 0 (got {})",
                self.tick
            )));
        }
        if self.velocity_iterations < 1 || self.position_iterations < 1 {
            return Err(LanderError::InvalidConfig(
                "solver iterations must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("distance_scale", self.distance_scale),
            ("velocity_scale", self.velocity_scale),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(LanderError::InvalidConfig(format!(
                    "{name} must be finite and > 0 (got {value})"
                )));
            }
        }
        let (x_lo, x_hi) = self.spawn.x_range;
        let (alt_lo, alt_hi) = self.spawn.altitude_range;
        if !(x_lo < x_hi && alt_lo < alt_hi) {
            return Err(LanderError::InvalidConfig(
                "spawn ranges must be non-empty (low < high)".to_string(),
            ));
        }
        let threshold = self.reward.crash_velocity_threshold;
        if !(threshold.is_finite() && threshold > 0.0) {
            return Err(LanderError::InvalidConfig(format!(
                "reward.crash_velocity_threshold must be finite and > 0 (got {threshold})"
            )));
        }
        if !(self.reward.commitment_duration.is_finite() && self.reward.commitment_duration >= 0.0)
        {
            return Err(LanderError::InvalidConfig(
                "reward.commitment_duration must be finite and >= 0".to_string(),
            ));
        }
        self.vehicle.validate()?;
        self.planet.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mass_partition_adds_up() {
        let v = VehicleGeometry::default();
        let total = v.main_body_mass() + 2.0 * v.leg_mass();
        assert!((total - v.empty_mass).abs() < 1e-2);
        assert!((v.leg_mass() - 0.08 * v.empty_mass).abs() < 1e-3);
    }

    #[test]
    fn leg_center_is_mirrored() {
        let v = VehicleGeometry::default();
        let (lx, ly) = v.leg_center(-1.0);
        let (rx, ry) = v.leg_center(1.0);
        assert!((lx + rx).abs() < 1e-5);
        assert!((ly - ry).abs() < 1e-5);
        assert!(rx > v.width / 2.0, "deployed legs point outward");
        assert!(ry < -v.height / 2.0, "deployed legs hang below the body");
    }

    #[test]
    fn default_config_is_valid() {
        LanderConfig::default().validate().unwrap();
    }

    #[test]
    fn json_overrides_keep_other_defaults() {
        let config =
            LanderConfig::from_json(r#"{ "gravity": -3.7, "reward": { "fuel_cost": 5.0 } }"#)
                .unwrap();
        assert_eq!(config.gravity, -3.7);
        assert_eq!(config.reward.fuel_cost, 5.0);
        assert_eq!(config.reward.landing_bonus, RewardConfig::default().landing_bonus);
        assert_eq!(config.vehicle, VehicleGeometry::default());
    }

    #[test]
    fn rejects_bad_geometry() {
        let mut config = LanderConfig::default();
        config.vehicle.leg_mass_fraction = 0.6;
        assert!(matches!(
            config.validate(),
            Err(LanderError::InvalidConfig(_))
        ));

        let mut config = LanderConfig::default();
        config.vehicle.width = -1.0;
        assert!(config.validate().is_err());

        let mut config = LanderConfig::default();
        config.spawn.x_range = (10.0, -10.0);
        assert!(config.validate().is_err());

        for threshold in [f32::NAN, 0.0, -5.0] {
            let mut config = LanderConfig::default();
            config.reward.crash_velocity_threshold = threshold;
            assert!(matches!(
                config.validate(),
                Err(LanderError::InvalidConfig(_))
            ));
        }

        assert!(LanderConfig::from_json(r#"{ "tick": 0.0 }"#).is_err());
        assert!(matches!(
            LanderConfig::from_json("not json"),
            Err(LanderError::Json(_))
        ));
    }
}
