//! Rigid-body engine boundary
//!
//! The solver itself is rapier2d and is treated as a black box. The rest of the
//! crate only sees opaque `BodyHandle`s, `BodyTag`s stored on each body, and the
//! `RawContact`s reported by `PhysicsWorld::step`. All nalgebra conversion stays
//! in this module.

use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

use glam::Vec2;
use rapier2d::prelude::*;

fn to_na(v: Vec2) -> nalgebra::Vector2<f32> {
    nalgebra::Vector2::new(v.x, v.y)
}

fn from_na(v: &nalgebra::Vector2<f32>) -> Vec2 {
    Vec2::new(v.x, v.y)
}

/// Engine-assigned opaque body handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(RigidBodyHandle);

/// Domain identity attached to every body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyTag {
    /// Arena boundary
    Boundary,
    /// Racer by index
    Racer(usize),
    /// Custom wall by stable id
    Wall(u32),
    /// The win-zone sensor
    WinZone,
}

impl BodyTag {
    fn encode(self) -> u128 {
        let (kind, payload): (u128, u128) = match self {
            BodyTag::Boundary => (1, 0),
            BodyTag::Racer(i) => (2, i as u128),
            BodyTag::Wall(id) => (3, id as u128),
            BodyTag::WinZone => (4, 0),
        };
        (kind << 64) | payload
    }

    fn decode(data: u128) -> Option<Self> {
        let payload = (data & u64::MAX as u128) as u64;
        match data >> 64 {
            1 => Some(BodyTag::Boundary),
            2 => Some(BodyTag::Racer(payload as usize)),
            3 => Some(BodyTag::Wall(payload as u32)),
            4 => Some(BodyTag::WinZone),
            _ => None,
        }
    }
}

/// Engine-reported body category used by contact classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Dynamic,
    Static,
    Kinematic,
    Sensor,
}

/// Collision geometry, in body-local coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Box { half: Vec2 },
    Triangle { a: Vec2, b: Vec2, c: Vec2 },
}

/// Surface properties of a fixture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub restitution: f32,
    pub friction: f32,
    pub density: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            restitution: 1.0,
            friction: 0.0,
            density: 1.0,
        }
    }
}

/// Description of a body to create
#[derive(Debug, Clone)]
pub struct BodySpec {
    pub kind: BodyKind,
    pub tag: BodyTag,
    pub position: Vec2,
    pub angle: f32,
    pub velocity: Vec2,
    pub angular_velocity: f32,
    pub shape: Shape,
    pub material: Material,
    pub bullet: bool,
    pub fixed_rotation: bool,
}

impl BodySpec {
    pub fn new(kind: BodyKind, tag: BodyTag, shape: Shape) -> Self {
        Self {
            kind,
            tag,
            position: Vec2::ZERO,
            angle: 0.0,
            velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            shape,
            material: Material::default(),
            bullet: false,
            fixed_rotation: false,
        }
    }

    pub fn at(mut self, position: Vec2, angle: f32) -> Self {
        self.position = position;
        self.angle = angle;
        self
    }

    pub fn moving(mut self, velocity: Vec2, angular_velocity: f32) -> Self {
        self.velocity = velocity;
        self.angular_velocity = angular_velocity;
        self
    }

    pub fn material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn bullet(mut self, bullet: bool) -> Self {
        self.bullet = bullet;
        self
    }

    pub fn fixed_rotation(mut self, fixed: bool) -> Self {
        self.fixed_rotation = fixed;
        self
    }
}

/// One side of a reported contact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactBody {
    pub tag: BodyTag,
    pub kind: BodyKind,
}

/// A contact-begin event as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawContact {
    pub a: ContactBody,
    pub b: ContactBody,
    /// World-space contact point
    pub point: Vec2,
    /// World-space normal pointing from `a` toward `b`
    pub normal: Vec2,
}

struct ContactCollector {
    started: Mutex<Vec<RawContact>>,
}

impl ContactCollector {
    fn new() -> Self {
        Self {
            started: Mutex::new(Vec::new()),
        }
    }

    fn drain(&self) -> Vec<RawContact> {
        std::mem::take(&mut *self.started.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

fn contact_body(bodies: &RigidBodySet, colliders: &ColliderSet, h: ColliderHandle) -> Option<ContactBody> {
    let collider = colliders.get(h)?;
    let body = bodies.get(collider.parent()?)?;
    let tag = BodyTag::decode(body.user_data)?;
    let kind = if collider.is_sensor() {
        BodyKind::Sensor
    } else if body.is_dynamic() {
        BodyKind::Dynamic
    } else if body.is_kinematic() {
        BodyKind::Kinematic
    } else {
        BodyKind::Static
    };
    Some(ContactBody { tag, kind })
}

impl EventHandler for ContactCollector {
    fn handle_collision_event(
        &self,
        bodies: &RigidBodySet,
        colliders: &ColliderSet,
        event: CollisionEvent,
        contact_pair: Option<&ContactPair>,
    ) {
        let CollisionEvent::Started(h1, h2, _) = event else {
            return;
        };
        let (Some(a), Some(b)) = (
            contact_body(bodies, colliders, h1),
            contact_body(bodies, colliders, h2),
        ) else {
            return;
        };

        // Sensors carry no manifold; fall back to the midpoint of the two colliders
        let midpoint = match (colliders.get(h1), colliders.get(h2)) {
            (Some(c1), Some(c2)) => {
                (from_na(c1.translation()) + from_na(c2.translation())) * 0.5
            }
            _ => Vec2::ZERO,
        };
        let (mut point, mut normal) = (midpoint, Vec2::ZERO);
        if let Some(pair) = contact_pair {
            if let Some(manifold) = pair.manifolds.iter().find(|m| !m.points.is_empty()) {
                let sign = if pair.collider1 == h1 { 1.0 } else { -1.0 };
                normal = from_na(&manifold.data.normal) * sign;
                if let Some(c1) = colliders.get(pair.collider1) {
                    let p = c1.position() * manifold.points[0].local_p1;
                    point = Vec2::new(p.x, p.y);
                }
            }
        }

        self.started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RawContact { a, b, point, normal });
    }

    fn handle_contact_force_event(
        &self,
        _dt: f32,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: f32,
    ) {
    }
}

/// The 2D world: bodies, fixtures, stepping and contact reporting
pub struct PhysicsWorld {
    gravity: nalgebra::Vector2<f32>,
    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    collector: ContactCollector,
    steps: u64,
}

impl std::fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("bodies", &self.bodies.len())
            .field("colliders", &self.colliders.len())
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

impl PhysicsWorld {
    pub fn new(gravity: Vec2, velocity_iterations: usize, position_iterations: usize) -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.num_solver_iterations =
            NonZeroUsize::new(velocity_iterations).unwrap_or(NonZeroUsize::MIN);
        integration_parameters.num_internal_stabilization_iterations = position_iterations;

        Self {
            gravity: to_na(gravity),
            integration_parameters,
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            collector: ContactCollector::new(),
            steps: 0,
        }
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = to_na(gravity);
    }

    /// Number of `step` calls so far
    pub fn step_count(&self) -> u64 {
        self.steps
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Advance the world by `dt` and return the contacts that began during it
    pub fn step(&mut self, dt: f32) -> Vec<RawContact> {
        self.integration_parameters.dt = dt;
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &self.collector,
        );
        self.steps += 1;
        self.collector.drain()
    }

    pub fn create_body(&mut self, spec: &BodySpec) -> BodyHandle {
        let body_type = match spec.kind {
            BodyKind::Dynamic => RigidBodyType::Dynamic,
            BodyKind::Kinematic => RigidBodyType::KinematicPositionBased,
            BodyKind::Static | BodyKind::Sensor => RigidBodyType::Fixed,
        };
        let rb = RigidBodyBuilder::new(body_type)
            .translation(to_na(spec.position))
            .rotation(spec.angle)
            .linvel(to_na(spec.velocity))
            .angvel(spec.angular_velocity)
            .ccd_enabled(spec.bullet)
            .locked_axes(if spec.fixed_rotation {
                LockedAxes::ROTATION_LOCKED
            } else {
                LockedAxes::empty()
            })
            .user_data(spec.tag.encode())
            .build();
        let handle = self.bodies.insert(rb);
        self.attach(handle, spec.shape, spec.material, spec.kind == BodyKind::Sensor);
        BodyHandle(handle)
    }

    fn attach(&mut self, body: RigidBodyHandle, shape: Shape, material: Material, sensor: bool) {
        let builder = match shape {
            Shape::Box { half } => ColliderBuilder::cuboid(half.x.max(0.005), half.y.max(0.005)),
            Shape::Triangle { a, b, c } => ColliderBuilder::triangle(
                point![a.x, a.y],
                point![b.x, b.y],
                point![c.x, c.y],
            ),
        };
        let collider = builder
            .sensor(sensor)
            .restitution(material.restitution)
            .restitution_combine_rule(CoefficientCombineRule::Max)
            .friction(material.friction)
            .friction_combine_rule(CoefficientCombineRule::Min)
            .density(material.density)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        self.colliders
            .insert_with_parent(collider, body, &mut self.bodies);
    }

    /// Destroy every fixture on the body and attach a fresh one
    pub fn replace_shape(&mut self, h: BodyHandle, shape: Shape, material: Material) {
        let Some(rb) = self.bodies.get(h.0) else {
            return;
        };
        let old: Vec<ColliderHandle> = rb.colliders().to_vec();
        let sensor = old
            .first()
            .and_then(|c| self.colliders.get(*c))
            .is_some_and(|c| c.is_sensor());
        for c in old {
            self.colliders
                .remove(c, &mut self.island_manager, &mut self.bodies, true);
        }
        self.attach(h.0, shape, material, sensor);
    }

    /// Update surface properties of every fixture on the body
    pub fn set_material(&mut self, h: BodyHandle, material: Material) {
        let Some(rb) = self.bodies.get(h.0) else {
            return;
        };
        for c in rb.colliders().to_vec() {
            if let Some(collider) = self.colliders.get_mut(c) {
                collider.set_restitution(material.restitution);
                collider.set_friction(material.friction);
                collider.set_density(material.density);
            }
        }
    }

    pub fn remove_body(&mut self, h: BodyHandle) {
        self.bodies.remove(
            h.0,
            &mut self.island_manager,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    pub fn contains(&self, h: BodyHandle) -> bool {
        self.bodies.contains(h.0)
    }

    pub fn position(&self, h: BodyHandle) -> Vec2 {
        self.bodies
            .get(h.0)
            .map(|rb| from_na(rb.translation()))
            .unwrap_or(Vec2::ZERO)
    }

    pub fn angle(&self, h: BodyHandle) -> f32 {
        self.bodies
            .get(h.0)
            .map(|rb| rb.rotation().angle())
            .unwrap_or(0.0)
    }

    pub fn velocity(&self, h: BodyHandle) -> Vec2 {
        self.bodies
            .get(h.0)
            .map(|rb| from_na(rb.linvel()))
            .unwrap_or(Vec2::ZERO)
    }

    pub fn set_velocity(&mut self, h: BodyHandle, vel: Vec2) {
        if let Some(rb) = self.bodies.get_mut(h.0) {
            rb.set_linvel(to_na(vel), true);
        }
    }

    pub fn angular_velocity(&self, h: BodyHandle) -> f32 {
        self.bodies.get(h.0).map(|rb| rb.angvel()).unwrap_or(0.0)
    }

    pub fn set_angular_velocity(&mut self, h: BodyHandle, w: f32) {
        if let Some(rb) = self.bodies.get_mut(h.0) {
            rb.set_angvel(w, true);
        }
    }

    pub fn apply_torque_impulse(&mut self, h: BodyHandle, torque: f32) {
        if let Some(rb) = self.bodies.get_mut(h.0) {
            rb.apply_torque_impulse(torque, true);
        }
    }

    /// Teleport a body
    pub fn set_transform(&mut self, h: BodyHandle, pos: Vec2, angle: f32) {
        if let Some(rb) = self.bodies.get_mut(h.0) {
            rb.set_position(nalgebra::Isometry2::new(to_na(pos), angle), true);
        }
    }

    /// Target pose a kinematic body reaches at the end of the next step
    pub fn set_kinematic_target(&mut self, h: BodyHandle, pos: Vec2, angle: f32) {
        if let Some(rb) = self.bodies.get_mut(h.0) {
            rb.set_next_kinematic_position(nalgebra::Isometry2::new(to_na(pos), angle));
        }
    }

    pub fn set_enabled(&mut self, h: BodyHandle, enabled: bool) {
        if let Some(rb) = self.bodies.get_mut(h.0) {
            rb.set_enabled(enabled);
        }
    }

    pub fn is_enabled(&self, h: BodyHandle) -> bool {
        self.bodies.get(h.0).is_some_and(|rb| rb.is_enabled())
    }

    pub fn set_fixed_rotation(&mut self, h: BodyHandle, fixed: bool) {
        if let Some(rb) = self.bodies.get_mut(h.0) {
            rb.lock_rotations(fixed, true);
        }
    }
}
