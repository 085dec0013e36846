//! Rigid bodies of the rocket and the landing site.
//!
//! Domain types hold `BodyPtr` handles into a world owned by the environment;
//! nothing here extends the engine's body type.

use box2d_rs::b2_body::*;
use box2d_rs::b2_fixture::*;
use box2d_rs::b2_joint::*;
use box2d_rs::b2_math::*;
use box2d_rs::b2_world::*;
use box2d_rs::b2rs_common::UserDataType;
use box2d_rs::joints::b2_revolute_joint::*;
use box2d_rs::shapes::b2_polygon_shape::*;

use std::cell::RefCell;
use std::rc::Rc;

use super::action::ThrusterInput;
use super::config::{LEG_LIMIT_MARGIN, PlanetGeometry, VehicleGeometry};

/// Negative group: rocket parts never collide with each other.
const ROCKET_GROUP: i16 = -1;

/// Left leg first, then right leg.
pub(crate) const SIDES: [f32; 2] = [-1.0, 1.0];

/// Identifies every body the environment creates. Stored as body user data so
/// contact events can be mapped back to domain shapes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeId {
    #[default]
    Terrain,
    Pad,
    Body,
    LeftLeg,
    RightLeg,
}

impl ShapeId {
    pub fn is_rocket(self) -> bool {
        matches!(self, ShapeId::Body | ShapeId::LeftLeg | ShapeId::RightLeg)
    }

    pub fn is_planet(self) -> bool {
        matches!(self, ShapeId::Terrain | ShapeId::Pad)
    }
}

#[derive(Default, Copy, Clone, Debug, PartialEq)]
pub struct UserDataTypes;
impl UserDataType for UserDataTypes {
    type Fixture = i32;
    type Body = ShapeId;
    type Joint = i32;
}

/// Kinematic state of one rigid body in the pad frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BodyState {
    pub position: (f32, f32),
    pub velocity: (f32, f32),
    pub angle: f32,
    pub angular_velocity: f32,
}

impl BodyState {
    pub fn speed(&self) -> f32 {
        (self.velocity.0 * self.velocity.0 + self.velocity.1 * self.velocity.1).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.position.0.is_finite()
            && self.position.1.is_finite()
            && self.velocity.0.is_finite()
            && self.velocity.1.is_finite()
            && self.angle.is_finite()
            && self.angular_velocity.is_finite()
    }

    fn of(body: &BodyPtr<UserDataTypes>) -> Self {
        let body = body.borrow();
        let position = body.get_position();
        let velocity = body.get_linear_velocity();
        Self {
            position: (position.x, position.y),
            velocity: (velocity.x, velocity.y),
            angle: body.get_angle(),
            angular_velocity: body.get_angular_velocity(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RocketState {
    pub body: BodyState,
    pub left_leg: BodyState,
    pub right_leg: BodyState,
}

impl RocketState {
    pub fn is_finite(&self) -> bool {
        self.body.is_finite() && self.left_leg.is_finite() && self.right_leg.is_finite()
    }
}

/// World-space outlines of everything drawable, plus the engine command of the
/// last tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub pad: [(f32, f32); 4],
    pub terrain: [(f32, f32); 4],
    pub body: [(f32, f32); 4],
    pub legs: [[(f32, f32); 4]; 2],
    pub engine_mount: (f32, f32),
    /// Unit vector along which the exhaust leaves the nozzle.
    pub exhaust_direction: (f32, f32),
    pub thruster: ThrusterInput,
}

fn rotate((x, y): (f32, f32), angle: f32) -> (f32, f32) {
    let (sin, cos) = angle.sin_cos();
    (x * cos - y * sin, x * sin + y * cos)
}

fn to_world(origin: (f32, f32), angle: f32, local: (f32, f32)) -> (f32, f32) {
    let (x, y) = rotate(local, angle);
    (origin.0 + x, origin.1 + y)
}

fn box_corners(state: &BodyState, hx: f32, hy: f32) -> [(f32, f32); 4] {
    [(-hx, hy), (hx, hy), (hx, -hy), (-hx, -hy)]
        .map(|corner| to_world(state.position, state.angle, corner))
}

fn box_fixture(hx: f32, hy: f32, density: f32, friction: f32) -> B2fixtureDef<UserDataTypes> {
    let mut shape = B2polygonShape::default();
    shape.set_as_box(hx, hy);

    let mut fixture_def = B2fixtureDef::default();
    fixture_def.shape = Some(Rc::new(RefCell::new(shape)));
    fixture_def.density = density;
    fixture_def.friction = friction;
    fixture_def.restitution = 0.0;
    fixture_def
}

fn dynamic_body(
    world: &B2worldPtr<UserDataTypes>,
    id: ShapeId,
    state: &BodyState,
) -> BodyPtr<UserDataTypes> {
    let mut body_def = B2bodyDef::default();
    body_def.body_type = B2bodyType::B2DynamicBody;
    body_def.position.set(state.position.0, state.position.1);
    body_def.angle = state.angle;
    body_def.linear_velocity = B2vec2::new(state.velocity.0, state.velocity.1);
    body_def.angular_velocity = state.angular_velocity;
    // Resting contacts must keep reporting every tick.
    body_def.allow_sleep = false;
    body_def.user_data = Some(id);
    B2world::create_body(world.clone(), &body_def)
}

fn static_body(
    world: &B2worldPtr<UserDataTypes>,
    id: ShapeId,
    center: (f32, f32),
) -> BodyPtr<UserDataTypes> {
    let mut body_def = B2bodyDef::default();
    body_def.body_type = B2bodyType::B2StaticBody;
    body_def.position.set(center.0, center.1);
    body_def.user_data = Some(id);
    B2world::create_body(world.clone(), &body_def)
}

/// The vehicle: a rectangular main body and two hinged, spring-loaded legs.
pub(crate) struct Rocket {
    body: BodyPtr<UserDataTypes>,
    legs: [BodyPtr<UserDataTypes>; 2],
    joints: Vec<B2jointPtr<UserDataTypes>>,
    geometry: VehicleGeometry,
    last_thrust: ThrusterInput,
}

impl Rocket {
    /// Builds the rocket with its main body at `initial`; legs start at their
    /// rest angle and move rigidly with the body.
    pub fn build(
        world: &B2worldPtr<UserDataTypes>,
        geometry: &VehicleGeometry,
        initial: &BodyState,
    ) -> Self {
        let g = geometry;
        let body = dynamic_body(world, ShapeId::Body, initial);
        let mut fixture_def = box_fixture(
            g.width / 2.0,
            g.height / 2.0,
            g.main_body_mass() / (g.width * g.height),
            g.friction,
        );
        fixture_def.filter.group_index = ROCKET_GROUP;
        B2body::create_fixture(body.clone(), &fixture_def);

        let mut joints = Vec::with_capacity(2);
        let legs = SIDES.map(|side| {
            let id = if side < 0.0 {
                ShapeId::LeftLeg
            } else {
                ShapeId::RightLeg
            };
            let offset = rotate(g.leg_center(side), initial.angle);
            let omega = initial.angular_velocity;
            let leg_state = BodyState {
                position: (
                    initial.position.0 + offset.0,
                    initial.position.1 + offset.1,
                ),
                velocity: (
                    initial.velocity.0 - omega * offset.1,
                    initial.velocity.1 + omega * offset.0,
                ),
                angle: initial.angle + g.leg_rest_angle(side),
                angular_velocity: omega,
            };
            let leg = dynamic_body(world, id, &leg_state);

            let mut fixture_def = box_fixture(
                g.leg_width / 2.0,
                g.leg_length / 2.0,
                g.leg_mass() / (g.leg_width * g.leg_length),
                g.friction,
            );
            fixture_def.filter.group_index = ROCKET_GROUP;
            B2body::create_fixture(leg.clone(), &fixture_def);

            // Pivot at the body's lower corner, limited around the rest angle.
            let (pivot_x, pivot_y) = g.leg_pivot(side);
            let rest = g.leg_rest_angle(side);
            let mut joint_def = B2revoluteJointDef::default();
            joint_def.base.body_a = Some(body.clone());
            joint_def.base.body_b = Some(leg.clone());
            joint_def.base.collide_connected = false;
            joint_def.local_anchor_a = B2vec2::new(pivot_x, pivot_y);
            joint_def.local_anchor_b = B2vec2::new(0.0, g.leg_length / 2.0);
            joint_def.reference_angle = 0.0;
            joint_def.enable_limit = true;
            joint_def.lower_angle = rest - LEG_LIMIT_MARGIN;
            joint_def.upper_angle = rest + LEG_LIMIT_MARGIN;

            let joint_def_enum = B2JointDefEnum::RevoluteJoint(joint_def);
            joints.push(world.borrow_mut().create_joint(&joint_def_enum));
            leg
        });

        Self {
            body,
            legs,
            joints,
            geometry: g.clone(),
            last_thrust: ThrusterInput::OFF,
        }
    }

    /// Applies the engine force for the coming tick at the engine mount. The
    /// gimbal rotates the thrust away from the body's up axis, so any deflection
    /// also produces a torque.
    pub fn thrust(&mut self, input: ThrusterInput) {
        self.last_thrust = input;
        let g = &self.geometry;
        let magnitude = g.max_thruster_force * input.power;
        if magnitude == 0.0 {
            return;
        }
        let gimbal = g.max_thruster_angle * input.vector;

        let mut body = self.body.borrow_mut();
        let angle = body.get_angle();
        let position = body.get_position();
        let (dx, dy) = rotate((-gimbal.sin(), gimbal.cos()), angle);
        let (px, py) = to_world((position.x, position.y), angle, g.engine_mount());
        body.apply_force(
            B2vec2::new(dx * magnitude, dy * magnitude),
            B2vec2::new(px, py),
            true,
        );
    }

    /// Damped rotary springs pulling each leg toward its rest angle. Torques are
    /// applied in equal and opposite pairs so the springs are internal forces.
    pub fn apply_leg_springs(&self) {
        let g = &self.geometry;
        let (body_angle, body_omega) = {
            let body = self.body.borrow();
            (body.get_angle(), body.get_angular_velocity())
        };

        let mut reaction = 0.0;
        for (leg, side) in self.legs.iter().zip(SIDES) {
            let mut leg = leg.borrow_mut();
            let relative_angle = leg.get_angle() - body_angle;
            let relative_omega = leg.get_angular_velocity() - body_omega;
            let torque = -g.leg_spring_stiffness * (relative_angle - g.leg_rest_angle(side))
                - g.leg_spring_damping * relative_omega;
            leg.apply_torque(torque, true);
            reaction -= torque;
        }
        self.body.borrow_mut().apply_torque(reaction, true);
    }

    pub fn state(&self) -> RocketState {
        RocketState {
            body: BodyState::of(&self.body),
            left_leg: BodyState::of(&self.legs[0]),
            right_leg: BodyState::of(&self.legs[1]),
        }
    }

    pub fn last_thrust(&self) -> ThrusterInput {
        self.last_thrust
    }

    /// Relative angle of each leg to the main body, left first.
    pub fn leg_angles(&self) -> [f32; 2] {
        let state = self.state();
        [
            state.left_leg.angle - state.body.angle,
            state.right_leg.angle - state.body.angle,
        ]
    }

    pub fn outlines(&self) -> ([(f32, f32); 4], [[(f32, f32); 4]; 2]) {
        let g = &self.geometry;
        let state = self.state();
        let body = box_corners(&state.body, g.width / 2.0, g.height / 2.0);
        let legs = [state.left_leg, state.right_leg]
            .map(|leg| box_corners(&leg, g.leg_width / 2.0, g.leg_length / 2.0));
        (body, legs)
    }

    /// Engine mount position and exhaust direction in the pad frame.
    pub fn exhaust(&self) -> ((f32, f32), (f32, f32)) {
        let g = &self.geometry;
        let state = self.state().body;
        let gimbal = g.max_thruster_angle * self.last_thrust.vector;
        let mount = to_world(state.position, state.angle, g.engine_mount());
        let (dx, dy) = rotate((-gimbal.sin(), gimbal.cos()), state.angle);
        (mount, (-dx, -dy))
    }

    pub fn destroy(self, world: &B2worldPtr<UserDataTypes>) {
        for joint in self.joints {
            world.borrow_mut().destroy_joint(joint);
        }
        world.borrow_mut().destroy_body(self.body);
        for leg in self.legs {
            world.borrow_mut().destroy_body(leg);
        }
    }
}

/// Immovable landing pad on top of a wide terrain slab.
pub(crate) struct Planet {
    pad: BodyPtr<UserDataTypes>,
    terrain: BodyPtr<UserDataTypes>,
    geometry: PlanetGeometry,
}

impl Planet {
    pub fn build(world: &B2worldPtr<UserDataTypes>, geometry: &PlanetGeometry) -> Self {
        let pad = static_body(world, ShapeId::Pad, (0.0, 0.0));
        let fixture_def = box_fixture(
            geometry.pad_width / 2.0,
            geometry.pad_height / 2.0,
            0.0,
            geometry.friction,
        );
        B2body::create_fixture(pad.clone(), &fixture_def);

        let terrain = static_body(world, ShapeId::Terrain, geometry.terrain_center());
        let fixture_def = box_fixture(
            geometry.terrain_width / 2.0,
            geometry.terrain_height / 2.0,
            0.0,
            geometry.friction,
        );
        B2body::create_fixture(terrain.clone(), &fixture_def);

        Self {
            pad,
            terrain,
            geometry: geometry.clone(),
        }
    }

    pub fn outlines(&self) -> ([(f32, f32); 4], [(f32, f32); 4]) {
        let g = &self.geometry;
        let pad = box_corners(&BodyState::of(&self.pad), g.pad_width / 2.0, g.pad_height / 2.0);
        let terrain = box_corners(
            &BodyState::of(&self.terrain),
            g.terrain_width / 2.0,
            g.terrain_height / 2.0,
        );
        (pad, terrain)
    }

    pub fn destroy(self, world: &B2worldPtr<UserDataTypes>) {
        world.borrow_mut().destroy_body(self.pad);
        world.borrow_mut().destroy_body(self.terrain);
    }
}
