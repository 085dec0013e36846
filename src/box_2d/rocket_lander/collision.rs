use box2d_rs::b2_collision::*;
use box2d_rs::b2_contact::*;
use box2d_rs::b2_world_callbacks::*;

use std::collections::{BTreeSet, HashSet};

use super::bodies::{ShapeId, UserDataTypes};

/// Per-tick contact state of the tracked shapes. Never sticky: every flag is
/// recomputed from scratch after each physics tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollisionFlags {
    /// Main body touching the pad or the terrain.
    pub body: bool,
    pub left_leg: bool,
    pub right_leg: bool,
    /// Terrain touched by any part of the rocket.
    pub terrain: bool,
}

impl CollisionFlags {
    pub fn any_leg(&self) -> bool {
        self.left_leg || self.right_leg
    }

    pub fn both_legs(&self) -> bool {
        self.left_leg && self.right_leg
    }
}

/// Records which shapes touched during the current tick.
///
/// The engine reports every touching contact through `pre_solve` once per
/// step (rocket bodies never sleep), so clearing the pair set before a step
/// and reading it afterwards yields exactly the contacts of that tick.
#[derive(Debug, Default)]
pub struct CollisionTracker {
    pairs: HashSet<(ShapeId, ShapeId)>,
    flags: CollisionFlags,
}

impl CollisionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the previous tick's contacts.
    pub fn begin_tick(&mut self) {
        self.pairs.clear();
        self.flags = CollisionFlags::default();
    }

    pub fn record(&mut self, a: ShapeId, b: ShapeId) {
        if a == b {
            return;
        }
        let pair = if a <= b { (a, b) } else { (b, a) };
        self.pairs.insert(pair);
    }

    /// Derives the flags for the tick that just completed.
    pub fn refresh(&mut self) -> CollisionFlags {
        let touches_planet = |shape: ShapeId| {
            self.contacts_of(shape)
                .iter()
                .any(|other| other.is_planet())
        };
        let flags = CollisionFlags {
            body: touches_planet(ShapeId::Body),
            left_leg: touches_planet(ShapeId::LeftLeg),
            right_leg: touches_planet(ShapeId::RightLeg),
            terrain: self
                .contacts_of(ShapeId::Terrain)
                .iter()
                .any(|other| other.is_rocket()),
        };
        self.flags = flags;
        flags
    }

    pub fn flags(&self) -> CollisionFlags {
        self.flags
    }

    /// Shapes touching `shape` during the last tick.
    pub fn contacts_of(&self, shape: ShapeId) -> BTreeSet<ShapeId> {
        self.pairs
            .iter()
            .filter_map(|&(a, b)| {
                if a == shape {
                    Some(b)
                } else if b == shape {
                    Some(a)
                } else {
                    None
                }
            })
            .collect()
    }
}

impl B2contactListener<UserDataTypes> for CollisionTracker {
    fn begin_contact(&mut self, _contact: &mut dyn B2contactDynTrait<UserDataTypes>) {}

    fn end_contact(&mut self, _contact: &mut dyn B2contactDynTrait<UserDataTypes>) {}

    fn pre_solve(
        &mut self,
        contact: &mut dyn B2contactDynTrait<UserDataTypes>,
        _old_manifold: &B2manifold,
    ) {
        let fixture_a = contact.get_base().get_fixture_a();
        let fixture_b = contact.get_base().get_fixture_b();
        let body_a = fixture_a.borrow().get_body();
        let body_b = fixture_b.borrow().get_body();
        let id_a = body_a.borrow().get_user_data();
        let id_b = body_b.borrow().get_user_data();
        if let (Some(a), Some(b)) = (id_a, id_b) {
            self.record(a, b);
        }
    }

    fn post_solve(
        &mut self,
        _contact: &mut dyn B2contactDynTrait<UserDataTypes>,
        _impulse: &B2contactImpulse,
    ) {
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_follow_recorded_pairs() {
        let mut tracker = CollisionTracker::new();
        tracker.begin_tick();
        tracker.record(ShapeId::Pad, ShapeId::LeftLeg);
        tracker.record(ShapeId::RightLeg, ShapeId::Terrain);
        let flags = tracker.refresh();
        assert_eq!(
            flags,
            CollisionFlags {
                body: false,
                left_leg: true,
                right_leg: true,
                terrain: true,
            }
        );
        assert!(flags.both_legs());
        assert_eq!(
            tracker.contacts_of(ShapeId::LeftLeg),
            BTreeSet::from([ShapeId::Pad])
        );
        assert_eq!(
            tracker.contacts_of(ShapeId::Terrain),
            BTreeSet::from([ShapeId::RightLeg])
        );
    }

    #[test]
    fn flags_do_not_carry_over_between_ticks() {
        let mut tracker = CollisionTracker::new();
        tracker.begin_tick();
        tracker.record(ShapeId::Body, ShapeId::Pad);
        assert!(tracker.refresh().body);

        tracker.begin_tick();
        assert_eq!(tracker.refresh(), CollisionFlags::default());
        assert!(tracker.contacts_of(ShapeId::Body).is_empty());
    }

    #[test]
    fn pad_contact_is_not_terrain_contact() {
        let mut tracker = CollisionTracker::new();
        tracker.begin_tick();
        tracker.record(ShapeId::LeftLeg, ShapeId::Pad);
        tracker.record(ShapeId::Pad, ShapeId::RightLeg);
        let flags = tracker.refresh();
        assert!(flags.both_legs());
        assert!(!flags.terrain);
        assert!(!flags.body);
    }
}
