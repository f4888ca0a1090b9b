//! Walls: geometry variant plus optional behaviors
//!
//! A wall is a box or a spike. Expansion, kinematic motion and
//! destructibility are independent components attached only when used.
//! `WallDef` is the flat record used by the builder API and the level file.

use glam::Vec2;

use super::crush::Aabb;
use crate::physics::{BodyHandle, Shape};

/// Collision geometry family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WallShape {
    #[default]
    Box,
    /// Isosceles triangle, base at +y, tip at -y (before rotation)
    Spike,
}

impl WallShape {
    pub fn from_index(i: i32) -> Self {
        if i == 1 { WallShape::Spike } else { WallShape::Box }
    }

    pub fn index(self) -> i32 {
        match self {
            WallShape::Box => 0,
            WallShape::Spike => 1,
        }
    }

    /// Local-space vertices for a `size` (width, height)
    pub fn local_points(self, size: Vec2) -> Vec<Vec2> {
        let h = size * 0.5;
        match self {
            WallShape::Box => vec![
                Vec2::new(-h.x, -h.y),
                Vec2::new(h.x, -h.y),
                Vec2::new(h.x, h.y),
                Vec2::new(-h.x, h.y),
            ],
            WallShape::Spike => vec![Vec2::new(-h.x, h.y), Vec2::new(h.x, h.y), Vec2::new(0.0, -h.y)],
        }
    }

    /// Physics shape for a `size`
    pub fn physics_shape(self, size: Vec2) -> Shape {
        let h = size * 0.5;
        match self {
            WallShape::Box => Shape::Box { half: h },
            WallShape::Spike => Shape::Triangle {
                a: Vec2::new(-h.x, h.y),
                b: Vec2::new(h.x, h.y),
                c: Vec2::new(0.0, -h.y),
            },
        }
    }
}

/// Axis an expanding wall grows along
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpansionAxis {
    X,
    Y,
    #[default]
    Both,
}

impl ExpansionAxis {
    pub fn from_index(i: i32) -> Self {
        match i {
            0 => ExpansionAxis::X,
            1 => ExpansionAxis::Y,
            _ => ExpansionAxis::Both,
        }
    }

    pub fn index(self) -> i32 {
        match self {
            ExpansionAxis::X => 0,
            ExpansionAxis::Y => 1,
            ExpansionAxis::Both => 2,
        }
    }

    /// Unit growth per axis
    pub fn mask(self) -> Vec2 {
        match self {
            ExpansionAxis::X => Vec2::new(1.0, 0.0),
            ExpansionAxis::Y => Vec2::new(0.0, 1.0),
            ExpansionAxis::Both => Vec2::ONE,
        }
    }
}

/// Linear growth after a delay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Expansion {
    pub delay: f32,
    /// Meters per second on each growing axis
    pub speed: f32,
    pub axis: ExpansionAxis,
    /// 0 means unbounded
    pub max_size: f32,
    pub stop_on_contact: bool,
    /// Stable id of the wall to stop against; `None` stops against any wall
    pub stop_target: Option<u32>,
    pub time_alive: f32,
    /// Growth halted for good
    pub halted: bool,
}

impl Expansion {
    /// Size after growing for `dt`, or `None` while delayed or halted
    pub fn grown_size(&self, size: Vec2, dt: f32) -> Option<Vec2> {
        if self.halted || self.time_alive < self.delay {
            return None;
        }
        let mut next = size + self.axis.mask() * self.speed * dt;
        if self.max_size > 0.0 {
            let mask = self.axis.mask();
            if mask.x > 0.0 {
                next.x = next.x.min(self.max_size.max(size.x));
            }
            if mask.y > 0.0 {
                next.y = next.y.min(self.max_size.max(size.y));
            }
        }
        Some(next)
    }

    /// Whether every growing axis is at the cap
    pub fn at_max(&self, size: Vec2) -> bool {
        if self.max_size <= 0.0 {
            return false;
        }
        let mask = self.axis.mask();
        (mask.x == 0.0 || size.x >= self.max_size) && (mask.y == 0.0 || size.y >= self.max_size)
    }
}

/// How a kinematic wall is currently moving
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionMode {
    /// Shuttling between the two waypoints
    Waypoints { towards_b: bool },
    /// Waypoints abandoned; bouncing with a fixed velocity
    FreeBounce { velocity: Vec2 },
}

/// Kinematic platform motion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    pub point_a: Vec2,
    pub point_b: Vec2,
    pub speed: f32,
    /// Turn around when about to touch another wall
    pub reverse_on_contact: bool,
    /// Switch to free bouncing on first predicted contact (one-way)
    pub free_bounce: bool,
    pub mode: MotionMode,
}

impl Motion {
    pub fn new(point_a: Vec2, point_b: Vec2, speed: f32) -> Self {
        Self {
            point_a,
            point_b,
            speed,
            reverse_on_contact: false,
            free_bounce: false,
            mode: MotionMode::Waypoints { towards_b: true },
        }
    }

    /// Whether still following waypoints
    pub fn towards_b(&self) -> bool {
        matches!(self.mode, MotionMode::Waypoints { towards_b: true })
    }
}

/// Hit points for a breakable wall
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destructible {
    pub max_hits: i32,
    /// Hits remaining before the wall breaks
    pub hits_left: i32,
    /// Show remaining hits as a number instead of pips
    pub show_text: bool,
}

/// Flat wall description (builder input and level record)
#[derive(Debug, Clone, PartialEq)]
pub struct WallDef {
    pub pos: Vec2,
    pub size: Vec2,
    pub sound_id: i32,
    pub color_index: usize,
    pub expandable: bool,
    pub expansion_delay: f32,
    pub expansion_speed: f32,
    pub expansion_axis: i32,
    pub stop_on_contact: bool,
    pub stop_target: i32,
    pub max_size: f32,
    pub shape: WallShape,
    pub rotation: f32,
    pub deadly: bool,
    pub moving: bool,
    pub point_a: Vec2,
    pub point_b: Vec2,
    pub move_speed: f32,
    pub reverse_on_contact: bool,
    pub free_bounce: bool,
    pub destructible: bool,
    pub max_hits: i32,
    pub current_hits: i32,
    pub text_for_hp: bool,
}

impl Default for WallDef {
    fn default() -> Self {
        Self {
            pos: Vec2::ZERO,
            size: Vec2::ONE,
            sound_id: 0,
            color_index: 0,
            expandable: false,
            expansion_delay: 2.0,
            expansion_speed: 0.5,
            expansion_axis: 2,
            stop_on_contact: false,
            stop_target: -1,
            max_size: 0.0,
            shape: WallShape::Box,
            rotation: 0.0,
            deadly: false,
            moving: false,
            point_a: Vec2::ZERO,
            point_b: Vec2::ZERO,
            move_speed: 3.0,
            reverse_on_contact: false,
            free_bounce: false,
            destructible: false,
            max_hits: 3,
            current_hits: 3,
            text_for_hp: false,
        }
    }
}

impl WallDef {
    /// A plain static box
    pub fn rect(pos: Vec2, size: Vec2) -> Self {
        Self {
            pos,
            size,
            ..Default::default()
        }
    }

    pub fn with_sound(mut self, sound_id: i32) -> Self {
        self.sound_id = sound_id;
        self
    }

    pub fn spike(mut self, rotation: f32) -> Self {
        self.shape = WallShape::Spike;
        self.rotation = rotation;
        self
    }

    pub fn deadly(mut self) -> Self {
        self.deadly = true;
        self
    }

    pub fn destructible(mut self, max_hits: i32) -> Self {
        self.destructible = true;
        self.max_hits = max_hits;
        self.current_hits = max_hits;
        self
    }

    pub fn expanding(mut self, delay: f32, speed: f32, axis: ExpansionAxis, max_size: f32) -> Self {
        self.expandable = true;
        self.expansion_delay = delay;
        self.expansion_speed = speed;
        self.expansion_axis = axis.index();
        self.max_size = max_size;
        self
    }

    /// Stop growing on contact; `target` is a wall index at the time the wall is added
    pub fn stop_on(mut self, target: Option<usize>) -> Self {
        self.stop_on_contact = true;
        self.stop_target = target.map(|t| t as i32).unwrap_or(-1);
        self
    }

    pub fn moving_between(mut self, a: Vec2, b: Vec2, speed: f32) -> Self {
        self.moving = true;
        self.point_a = a;
        self.point_b = b;
        self.move_speed = speed;
        self
    }

    pub fn reverse_on_contact(mut self) -> Self {
        self.reverse_on_contact = true;
        self
    }

    pub fn free_bounce(mut self) -> Self {
        self.free_bounce = true;
        self
    }
}

/// A live wall in the arena
#[derive(Debug, Clone)]
pub struct Wall {
    /// Stable id (survives index shifts on removal)
    pub id: u32,
    pub body: BodyHandle,
    pub pos: Vec2,
    pub size: Vec2,
    pub rotation: f32,
    pub shape: WallShape,
    pub deadly: bool,
    pub color_index: usize,
    pub sound_id: i32,
    pub flash_timer: f32,
    pub expansion: Option<Expansion>,
    pub motion: Option<Motion>,
    pub destructible: Option<Destructible>,
}

impl Wall {
    /// Build the bookkeeping record for `def`; the body already exists.
    /// `stop_target` is the resolved id for `def.stop_target`.
    pub fn from_def(id: u32, body: BodyHandle, def: &WallDef, stop_target: Option<u32>) -> Self {
        let expansion = def.expandable.then(|| Expansion {
            delay: def.expansion_delay,
            speed: def.expansion_speed,
            axis: ExpansionAxis::from_index(def.expansion_axis),
            max_size: def.max_size,
            stop_on_contact: def.stop_on_contact,
            stop_target,
            time_alive: 0.0,
            halted: false,
        });
        let motion = def.moving.then(|| Motion {
            reverse_on_contact: def.reverse_on_contact,
            free_bounce: def.free_bounce,
            ..Motion::new(def.point_a, def.point_b, def.move_speed)
        });
        let destructible = def.destructible.then(|| {
            let max_hits = def.max_hits.max(1);
            let hits_left = if def.current_hits > 0 {
                def.current_hits.min(max_hits)
            } else {
                max_hits
            };
            Destructible {
                max_hits,
                hits_left,
                show_text: def.text_for_hp,
            }
        });
        Self {
            id,
            body,
            pos: def.pos,
            size: def.size,
            rotation: def.rotation,
            shape: def.shape,
            deadly: def.deadly,
            color_index: def.color_index,
            sound_id: def.sound_id,
            flash_timer: 0.0,
            expansion,
            motion,
            destructible,
        }
    }

    /// Flatten back into a level record. The stop target is left unset since
    /// the record refers to walls by index.
    pub fn to_def(&self) -> WallDef {
        let mut def = WallDef {
            pos: self.pos,
            size: self.size,
            sound_id: self.sound_id,
            color_index: self.color_index,
            shape: self.shape,
            rotation: self.rotation,
            deadly: self.deadly,
            ..Default::default()
        };
        if let Some(e) = &self.expansion {
            def.expandable = true;
            def.expansion_delay = e.delay;
            def.expansion_speed = e.speed;
            def.expansion_axis = e.axis.index();
            def.stop_on_contact = e.stop_on_contact;
            def.max_size = e.max_size;
        }
        if let Some(m) = &self.motion {
            def.moving = true;
            def.point_a = m.point_a;
            def.point_b = m.point_b;
            def.move_speed = m.speed;
            def.reverse_on_contact = m.reverse_on_contact;
            def.free_bounce = m.free_bounce;
        }
        if let Some(d) = &self.destructible {
            def.destructible = true;
            def.max_hits = d.max_hits;
            def.current_hits = d.hits_left;
            def.text_for_hp = d.show_text;
        }
        def
    }

    /// Kinematic bodies are needed for moving walls
    pub fn is_kinematic(&self) -> bool {
        self.motion.is_some()
    }

    pub fn physics_shape(&self) -> Shape {
        self.shape.physics_shape(self.size)
    }

    pub fn aabb(&self) -> Aabb {
        self.aabb_at(self.pos, self.size)
    }

    /// Bounds if the wall were at `pos` with `size`
    pub fn aabb_at(&self, pos: Vec2, size: Vec2) -> Aabb {
        Aabb::from_points(pos, self.rotation, &self.shape.local_points(size))
    }

    /// World-space outline for rendering
    pub fn world_points(&self) -> Vec<Vec2> {
        self.shape
            .local_points(self.size)
            .into_iter()
            .map(|p| self.pos + crate::rotate(p, self.rotation))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expansion_waits_for_delay() {
        let mut e = Expansion {
            delay: 1.0,
            speed: 2.0,
            axis: ExpansionAxis::X,
            max_size: 0.0,
            stop_on_contact: false,
            stop_target: None,
            time_alive: 0.5,
            halted: false,
        };
        assert_eq!(e.grown_size(Vec2::ONE, 0.5), None);
        e.time_alive = 1.0;
        let next = e.grown_size(Vec2::ONE, 0.5).unwrap();
        assert!((next.x - 2.0).abs() < 1e-6);
        assert!((next.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_expansion_caps_at_max() {
        let e = Expansion {
            delay: 0.0,
            speed: 10.0,
            axis: ExpansionAxis::Both,
            max_size: 3.0,
            stop_on_contact: false,
            stop_target: None,
            time_alive: 0.0,
            halted: false,
        };
        let next = e.grown_size(Vec2::new(2.5, 1.0), 1.0).unwrap();
        assert_eq!(next, Vec2::new(3.0, 3.0));
        assert!(e.at_max(next));
    }

    #[test]
    fn test_spike_bounds() {
        let pts = WallShape::Spike.local_points(Vec2::new(2.0, 1.0));
        let b = Aabb::from_points(Vec2::ZERO, 0.0, &pts);
        assert_eq!(b.min, Vec2::new(-1.0, -0.5));
        assert_eq!(b.max, Vec2::new(1.0, 0.5));
    }

    #[test]
    fn test_axis_roundtrip() {
        for axis in [ExpansionAxis::X, ExpansionAxis::Y, ExpansionAxis::Both] {
            assert_eq!(ExpansionAxis::from_index(axis.index()), axis);
        }
        assert_eq!(WallShape::from_index(1), WallShape::Spike);
        assert_eq!(WallShape::from_index(7), WallShape::Box);
    }
}
