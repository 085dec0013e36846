use serde::{Deserialize, Serialize};

use crate::error::LanderError;

/// The four discrete commands an agent can issue each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    NoOp = 0,
    ThrustUp = 1,
    /// Full thrust with the gimbal deflected so the rocket is pushed toward -x.
    ThrustUpLeft = 2,
    /// Full thrust with the gimbal deflected so the rocket is pushed toward +x.
    ThrustUpRight = 3,
}

impl Action {
    pub const COUNT: u32 = 4;

    pub const ALL: [Action; 4] = [
        Action::NoOp,
        Action::ThrustUp,
        Action::ThrustUpLeft,
        Action::ThrustUpRight,
    ];

    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn thruster_input(self) -> ThrusterInput {
        match self {
            Action::NoOp => ThrusterInput::OFF,
            Action::ThrustUp => ThrusterInput::new(1.0, 0.0),
            Action::ThrustUpLeft => ThrusterInput::new(1.0, 1.0),
            Action::ThrustUpRight => ThrusterInput::new(1.0, -1.0),
        }
    }
}

impl TryFrom<u32> for Action {
    type Error = LanderError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Action::ALL
            .get(value as usize)
            .copied()
            .ok_or(LanderError::InvalidAction(value))
    }
}

/// Continuous engine command: `power` in [0, 1], gimbal `vector` in [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ThrusterInput {
    pub power: f32,
    pub vector: f32,
}

impl ThrusterInput {
    pub const OFF: ThrusterInput = ThrusterInput {
        power: 0.0,
        vector: 0.0,
    };

    pub fn new(power: f32, vector: f32) -> Self {
        Self { power, vector }
    }

    /// Clamps both components into their declared ranges. Non-finite values
    /// collapse to zero.
    pub fn clamped(self) -> Self {
        let fix = |v: f32, lo: f32, hi: f32| if v.is_finite() { v.clamp(lo, hi) } else { 0.0 };
        Self {
            power: fix(self.power, 0.0, 1.0),
            vector: fix(self.vector, -1.0, 1.0),
        }
    }

    pub fn is_in_range(&self) -> bool {
        (0.0..=1.0).contains(&self.power) && (-1.0..=1.0).contains(&self.vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_every_index() {
        for (i, action) in Action::ALL.iter().enumerate() {
            assert_eq!(Action::try_from(i as u32).unwrap(), *action);
            assert_eq!(action.index(), i as u32);
        }
        assert!(matches!(
            Action::try_from(4),
            Err(LanderError::InvalidAction(4))
        ));
    }

    #[test]
    fn side_thrusts_mirror_each_other() {
        let left = Action::ThrustUpLeft.thruster_input();
        let right = Action::ThrustUpRight.thruster_input();
        assert_eq!(left.power, right.power);
        assert_eq!(left.vector, -right.vector);
        assert_eq!(Action::NoOp.thruster_input(), ThrusterInput::OFF);
    }

    #[test]
    fn clamping_pins_inputs_to_range() {
        let input = ThrusterInput::new(3.0, -7.0).clamped();
        assert_eq!(input, ThrusterInput::new(1.0, -1.0));
        let input = ThrusterInput::new(f32::NAN, f32::INFINITY).clamped();
        assert_eq!(input, ThrusterInput::OFF);
        assert!(ThrusterInput::new(0.5, 0.2).is_in_range());
        assert!(!ThrusterInput::new(-0.1, 0.0).is_in_range());
    }
}
