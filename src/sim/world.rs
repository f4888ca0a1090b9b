//! Simulation state and its editing interface
//!
//! `Simulation` owns the physics world plus every racer, wall and the win
//! zone. Configuration is fixed at construction; tunables change only through
//! the setters below. The per-tick state machine lives in `tick.rs`.

use std::path::Path;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::contact::{ContactEvent, TickContacts};
use super::level::{Level, LevelConfig, RacerDef, WinZoneDef};
use super::song::Song;
use super::state::{GamePhase, Particle, Racer, RacerStatus, SimEvent, WinZone};
use super::wall::{Wall, WallDef, WallShape};
use crate::consts::{BOUNDARY_HALF_THICKNESS, GRAVITY};
use crate::error::LevelError;
use crate::physics::{BodyKind, BodySpec, BodyTag, Material, PhysicsWorld, Shape};
use crate::polar_to_cartesian;
use crate::settings::{SimConfig, Tunables};

/// Offset applied to duplicated walls so the copy is visible
const DUPLICATE_OFFSET: Vec2 = Vec2::new(1.0, 1.0);

/// Separate stream for visual-only randomness
const FX_SEED_SALT: u64 = 0x5eed_f00d;

/// The whole simulated arena
#[derive(Debug)]
pub struct Simulation {
    config: SimConfig,
    pub(crate) tunables: Tunables,
    pub(crate) physics: PhysicsWorld,
    pub(crate) rng: Pcg32,
    pub(crate) fx_rng: Pcg32,
    pub(crate) racers: Vec<Racer>,
    pub(crate) walls: Vec<Wall>,
    pub(crate) win_zone: WinZone,
    pub(crate) phase: GamePhase,
    pub(crate) winner: Option<usize>,
    pub(crate) finish_order: Vec<usize>,
    pub(crate) particles: Vec<Particle>,
    pub(crate) events: Vec<SimEvent>,
    pub(crate) contacts: TickContacts,
    pub(crate) injected: Vec<ContactEvent>,
    pub(crate) song: Option<Song>,
    next_wall_id: u32,
    pub(crate) time_ticks: u64,
}

impl Simulation {
    /// Build the arena: boundary, racers and win zone
    pub fn new(config: SimConfig, tunables: Tunables) -> Self {
        let gravity = if tunables.enable_gravity {
            Vec2::new(0.0, GRAVITY)
        } else {
            Vec2::ZERO
        };
        let mut physics =
            PhysicsWorld::new(gravity, config.velocity_iterations, config.position_iterations);

        create_boundary(&mut physics, config.world_width(), config.world_height());

        let win_pos = config.win_zone_pos;
        let win_size = config.win_zone_size;
        let win_body = physics.create_body(
            &BodySpec::new(BodyKind::Sensor, BodyTag::WinZone, Shape::Box { half: win_size * 0.5 })
                .at(win_pos, 0.0),
        );

        let mut sim = Self {
            rng: Pcg32::seed_from_u64(config.seed),
            fx_rng: Pcg32::seed_from_u64(config.seed ^ FX_SEED_SALT),
            config,
            tunables,
            physics,
            racers: Vec::new(),
            walls: Vec::new(),
            win_zone: WinZone {
                body: win_body,
                pos: win_pos,
                size: win_size,
                glow: false,
            },
            phase: GamePhase::Running,
            winner: None,
            finish_order: Vec::new(),
            particles: Vec::new(),
            events: Vec::new(),
            contacts: TickContacts::default(),
            injected: Vec::new(),
            song: None,
            next_wall_id: 1,
            time_ticks: 0,
        };
        sim.spawn_racers();
        log::info!(
            "Arena {:.1}x{:.1} m with {} racers (seed {})",
            sim.config.world_width(),
            sim.config.world_height(),
            sim.racers.len(),
            sim.config.seed
        );
        sim
    }

    // ----- accessors -----

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn tunables(&self) -> &Tunables {
        &self.tunables
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn is_game_over(&self) -> bool {
        self.phase == GamePhase::GameOver
    }

    pub fn winner(&self) -> Option<usize> {
        self.winner
    }

    /// Racer indices in the order they finished
    pub fn finish_order(&self) -> &[usize] {
        &self.finish_order
    }

    pub fn racers(&self) -> &[Racer] {
        &self.racers
    }

    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    pub fn win_zone(&self) -> &WinZone {
        &self.win_zone
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn song(&self) -> Option<&Song> {
        self.song.as_ref()
    }

    /// Ticks executed so far (monotonic)
    pub fn tick_count(&self) -> u64 {
        self.time_ticks
    }

    /// Physics steps executed so far
    pub fn physics_steps(&self) -> u64 {
        self.physics.step_count()
    }

    pub fn racer_position(&self, index: usize) -> Option<Vec2> {
        self.racers.get(index).map(|r| self.physics.position(r.body))
    }

    pub fn racer_velocity(&self, index: usize) -> Option<Vec2> {
        self.racers.get(index).map(|r| self.physics.velocity(r.body))
    }

    pub fn racer_angular_velocity(&self, index: usize) -> Option<f32> {
        self.racers
            .get(index)
            .map(|r| self.physics.angular_velocity(r.body))
    }

    /// Take every event produced since the last call
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    /// Queue a contact to be handled on the next tick as if the engine reported it
    pub fn inject_contact(&mut self, event: ContactEvent) {
        self.injected.push(event);
    }

    // ----- lifecycle -----

    pub fn pause(&mut self) {
        if self.phase == GamePhase::Running {
            self.phase = GamePhase::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.phase == GamePhase::Paused {
            self.phase = GamePhase::Running;
        }
    }

    pub fn toggle_pause(&mut self) {
        match self.phase {
            GamePhase::Running => self.phase = GamePhase::Paused,
            GamePhase::Paused => self.phase = GamePhase::Running,
            GamePhase::GameOver => {}
        }
    }

    /// Respawn every racer and leave game over
    pub fn reset_racers(&mut self) {
        for racer in self.racers.drain(..) {
            self.physics.remove_body(racer.body);
        }
        self.spawn_racers();
        self.phase = GamePhase::Running;
        self.winner = None;
        self.finish_order.clear();
        self.particles.clear();
        self.contacts.clear();
        self.injected.clear();
        if let Some(song) = &mut self.song {
            song.rewind();
        }
        log::info!("Racers reset at tick {}", self.time_ticks);
    }

    fn racer_material(&self) -> Material {
        Material {
            restitution: self.tunables.restitution,
            friction: self.tunables.friction,
            density: 1.0,
        }
    }

    fn racer_shape(&self) -> Shape {
        Shape::Box {
            half: Vec2::splat(self.tunables.racer_size * 0.5),
        }
    }

    fn spawn_racers(&mut self) {
        let w = self.config.world_width();
        let h = self.config.world_height();
        let count = self.config.racer_count;
        for i in 0..count {
            let pos = Vec2::new(w / (count as f32 + 1.0) * (i as f32 + 1.0), h * 0.5);
            let angle = self.rng.random_range(0.0..std::f32::consts::TAU);
            let heading = self.rng.random_range(0.0..std::f32::consts::TAU);
            let spin = self.rng.random_range(-5.0..=5.0);
            let spec = BodySpec::new(BodyKind::Dynamic, BodyTag::Racer(i), self.racer_shape())
                .at(pos, angle)
                .moving(polar_to_cartesian(self.tunables.target_speed, heading), spin)
                .material(self.racer_material())
                .bullet(true)
                .fixed_rotation(self.tunables.fixed_rotation);
            let body = self.physics.create_body(&spec);
            let mut racer = Racer::new(i, body);
            racer.pos = pos;
            racer.angle = angle;
            racer.vel = spec.velocity;
            self.racers.push(racer);
        }
    }

    // ----- tunables -----

    pub fn set_target_speed(&mut self, speed: f32) {
        self.tunables.target_speed = speed.max(0.0);
    }

    pub fn set_enforce_speed(&mut self, enabled: bool) {
        self.tunables.enforce_speed = enabled;
    }

    pub fn set_gravity_enabled(&mut self, enabled: bool) {
        self.tunables.enable_gravity = enabled;
        let g = if enabled {
            Vec2::new(0.0, GRAVITY)
        } else {
            Vec2::ZERO
        };
        self.physics.set_gravity(g);
    }

    pub fn set_chaos(&mut self, enabled: bool) {
        self.tunables.enable_chaos = enabled;
    }

    pub fn set_chaos_params(&mut self, chance: f32, boost: f32) {
        self.tunables.chaos_chance = chance.clamp(0.0, 1.0);
        self.tunables.chaos_boost = boost.max(0.0);
    }

    pub fn set_stop_on_first_win(&mut self, stop: bool) {
        self.tunables.stop_on_first_win = stop;
    }

    /// Resize every racer fixture
    pub fn update_racer_size(&mut self, size: f32) {
        self.tunables.racer_size = size.max(0.05);
        let shape = self.racer_shape();
        let material = self.racer_material();
        for racer in &self.racers {
            self.physics.replace_shape(racer.body, shape, material);
        }
    }

    pub fn update_restitution(&mut self, restitution: f32) {
        self.tunables.restitution = restitution.max(0.0);
        self.retune_racers();
    }

    pub fn update_friction(&mut self, friction: f32) {
        self.tunables.friction = friction.max(0.0);
        self.retune_racers();
    }

    pub fn update_fixed_rotation(&mut self, fixed: bool) {
        self.tunables.fixed_rotation = fixed;
        for racer in &self.racers {
            self.physics.set_fixed_rotation(racer.body, fixed);
        }
    }

    fn retune_racers(&mut self) {
        let material = self.racer_material();
        for racer in &self.racers {
            self.physics.set_material(racer.body, material);
        }
    }

    pub fn update_win_zone(&mut self, pos: Vec2, size: Vec2, glow: bool) {
        self.win_zone.pos = pos;
        self.win_zone.size = size;
        self.win_zone.glow = glow;
        self.physics.set_transform(self.win_zone.body, pos, 0.0);
        self.physics.replace_shape(
            self.win_zone.body,
            Shape::Box { half: size * 0.5 },
            Material::default(),
        );
    }

    // ----- walls -----

    /// Index of the wall with stable `id`
    pub fn wall_index(&self, id: u32) -> Option<usize> {
        self.walls.iter().position(|w| w.id == id)
    }

    /// Create a wall and return its index. A stop target in `def` names one
    /// of the walls already present.
    pub fn add_wall(&mut self, def: WallDef) -> usize {
        let target = usize::try_from(def.stop_target)
            .ok()
            .and_then(|i| self.walls.get(i))
            .map(|w| w.id);
        self.add_wall_targeting(def, target)
    }

    fn add_wall_targeting(&mut self, def: WallDef, stop_target: Option<u32>) -> usize {
        let id = self.next_wall_id;
        self.next_wall_id += 1;
        let kind = if def.moving {
            BodyKind::Kinematic
        } else {
            BodyKind::Static
        };
        let spec = BodySpec::new(kind, BodyTag::Wall(id), def.shape.physics_shape(def.size))
            .at(def.pos, def.rotation);
        let body = self.physics.create_body(&spec);
        self.walls.push(Wall::from_def(id, body, &def, stop_target));
        log::debug!("Added wall {} at ({:.2}, {:.2})", id, def.pos.x, def.pos.y);
        self.walls.len() - 1
    }

    /// Change geometry, sound, shape and rotation; the fixture is rebuilt
    pub fn update_wall(
        &mut self,
        index: usize,
        pos: Vec2,
        size: Vec2,
        sound_id: i32,
        shape: WallShape,
        rotation: f32,
    ) {
        let Some(wall) = self.walls.get_mut(index) else {
            return;
        };
        wall.pos = pos;
        wall.size = size;
        wall.sound_id = sound_id;
        wall.shape = shape;
        wall.rotation = rotation;
        self.physics.set_transform(wall.body, pos, rotation);
        self.physics
            .replace_shape(wall.body, wall.physics_shape(), Material::default());
    }

    pub fn update_wall_color(&mut self, index: usize, color_index: usize) {
        if let Some(wall) = self.walls.get_mut(index) {
            wall.color_index = color_index;
        }
    }

    /// Level record for `wall`, with its stop target mapped back to an index
    fn wall_def(&self, wall: &Wall) -> WallDef {
        let mut def = wall.to_def();
        def.stop_target = wall
            .expansion
            .and_then(|e| e.stop_target)
            .and_then(|id| self.wall_index(id))
            .map_or(-1, |i| i as i32);
        def
    }

    /// Copy a wall with a small offset; returns the new index
    pub fn duplicate_wall(&mut self, index: usize) -> Option<usize> {
        let mut def = self.wall_def(self.walls.get(index)?);
        def.pos += DUPLICATE_OFFSET;
        if def.moving {
            def.point_a += DUPLICATE_OFFSET;
            def.point_b += DUPLICATE_OFFSET;
        }
        Some(self.add_wall(def))
    }

    pub fn remove_wall(&mut self, index: usize) {
        if index >= self.walls.len() {
            return;
        }
        let wall = self.walls.remove(index);
        self.physics.remove_body(wall.body);
        log::debug!("Removed wall {}", wall.id);
    }

    pub fn clear_walls(&mut self) {
        for wall in self.walls.drain(..) {
            self.physics.remove_body(wall.body);
        }
    }

    // ----- persistence -----

    /// Snapshot the arena as a level
    pub fn to_level(&self) -> Level {
        Level {
            config: Some(LevelConfig {
                speed: self.tunables.target_speed,
                racer_size: self.tunables.racer_size,
                restitution: self.tunables.restitution,
                chaos: self.tunables.enable_chaos,
                stop_on_first_win: self.tunables.stop_on_first_win,
            }),
            win_zone: Some(WinZoneDef {
                pos: self.win_zone.pos,
                size: self.win_zone.size,
                glow: self.win_zone.glow,
            }),
            walls: self.walls.iter().map(|w| self.wall_def(w)).collect(),
            racers: self
                .racers
                .iter()
                .map(|r| RacerDef {
                    id: r.index,
                    pos: Some(self.physics.position(r.body)),
                    vel: Some(self.physics.velocity(r.body)),
                    angle: Some(self.physics.angle(r.body)),
                    angular_vel: Some(self.physics.angular_velocity(r.body)),
                })
                .collect(),
        }
    }

    /// Replace the arena contents with `level`
    pub fn apply_level(&mut self, level: &Level) {
        if let Some(c) = &level.config {
            self.set_target_speed(c.speed);
            self.set_chaos(c.chaos);
            self.set_stop_on_first_win(c.stop_on_first_win);
            self.tunables.racer_size = c.racer_size.max(0.05);
            self.tunables.restitution = c.restitution.max(0.0);
        }
        if let Some(z) = &level.win_zone {
            self.update_win_zone(z.pos, z.size, z.glow);
        }
        self.clear_walls();
        // Walls get consecutive ids, so file indices map onto them directly
        let first_id = self.next_wall_id;
        let count = level.walls.len();
        for def in &level.walls {
            let target = usize::try_from(def.stop_target)
                .ok()
                .filter(|&i| i < count)
                .map(|i| first_id + i as u32);
            self.add_wall_targeting(def.clone(), target);
        }
        self.reset_racers();
        for def in &level.racers {
            let Some(racer) = self.racers.get_mut(def.id) else {
                continue;
            };
            let body = racer.body;
            let pos = def.pos.unwrap_or_else(|| self.physics.position(body));
            let angle = def.angle.unwrap_or_else(|| self.physics.angle(body));
            let vel = def.vel.unwrap_or_else(|| self.physics.velocity(body));
            let spin = def
                .angular_vel
                .unwrap_or_else(|| self.physics.angular_velocity(body));
            racer.pos = pos;
            racer.angle = angle;
            racer.vel = vel;
            racer.clear_trail();
            self.physics.set_transform(body, pos, angle);
            self.physics.set_velocity(body, vel);
            self.physics.set_angular_velocity(body, spin);
        }
    }

    /// Load a level file; on any error the current arena is untouched
    pub fn load_map(&mut self, path: &Path) -> Result<(), LevelError> {
        let level = Level::load(path).inspect_err(|e| log::warn!("Map not loaded: {}", e))?;
        self.apply_level(&level);
        log::info!(
            "Loaded map {} ({} walls, {} racer records)",
            path.display(),
            level.walls.len(),
            level.racers.len()
        );
        Ok(())
    }

    pub fn save_map(&self, path: &Path) -> Result<(), LevelError> {
        self.to_level().save(path)?;
        log::info!("Saved map to {}", path.display());
        Ok(())
    }

    /// Load a song; a missing file keeps the previous one
    pub fn load_song(&mut self, path: &Path) -> Result<(), LevelError> {
        let song = Song::load(path).inspect_err(|e| log::warn!("Song not loaded: {}", e))?;
        log::info!("Loaded song with {} notes", song.len());
        self.song = Some(song);
        Ok(())
    }

    pub fn set_song(&mut self, song: Option<Song>) {
        self.song = song;
    }

    // ----- helpers shared with the tick -----

    /// Whether the racer at `index` is still in play
    pub fn racer_active(&self, index: usize) -> bool {
        self.racers
            .get(index)
            .is_some_and(|r| r.status.is_active())
    }

    pub(crate) fn all_racers_terminal(&self) -> bool {
        self.racers.iter().all(|r| r.status.is_terminal())
    }

    pub(crate) fn status_of(&self, index: usize) -> Option<RacerStatus> {
        self.racers.get(index).map(|r| r.status)
    }
}

/// Four static boxes centred on the arena edges
fn create_boundary(physics: &mut PhysicsWorld, width: f32, height: f32) {
    let t = BOUNDARY_HALF_THICKNESS;
    let sides = [
        (Vec2::new(width * 0.5, height), Vec2::new(width * 0.5, t)),
        (Vec2::new(width * 0.5, 0.0), Vec2::new(width * 0.5, t)),
        (Vec2::new(0.0, height * 0.5), Vec2::new(t, height * 0.5)),
        (Vec2::new(width, height * 0.5), Vec2::new(t, height * 0.5)),
    ];
    for (pos, half) in sides {
        physics.create_body(
            &BodySpec::new(BodyKind::Static, BodyTag::Boundary, Shape::Box { half }).at(pos, 0.0),
        );
    }
}
