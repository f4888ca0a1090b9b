//! Fixed timestep simulation tick
//!
//! One call to `Simulation::step` advances walls, physics and every racer by
//! exactly one tick. Order within a tick:
//!
//! 1. wall expansion and kinematic platforms (with crush checks)
//! 2. physics step, contact classification
//! 3. contact resolution: chaos, deadly walls, wall hits, win zone
//! 4. racer update: finish countdown, speed and spin upkeep, trails
//! 5. game-over check, particles, wall visuals

use std::collections::BTreeSet;
use std::f32::consts::{FRAC_PI_2, TAU};

use glam::Vec2;
use rand::Rng;

use super::contact::WallRef;
use super::crush::{Aabb, is_crushed};
use super::state::{DeathCause, GamePhase, Particle, RacerStatus, SimEvent, SoundCue};
use super::wall::MotionMode;
use super::world::Simulation;
use crate::consts::*;
use crate::physics::Material;
use crate::{polar_to_cartesian, rotate};

/// Finish countdown slack so an exact number of ticks reaches the delay
const FINISH_EPSILON: f32 = 1e-4;

impl Simulation {
    /// Advance the simulation by one fixed timestep
    pub fn step(&mut self, dt: f32) {
        // Don't tick if paused or game over
        if self.phase != GamePhase::Running {
            return;
        }

        self.contacts.clear();

        self.update_expanding_walls(dt);
        self.update_moving_walls(dt);

        let raw = self.physics.step(dt);
        self.contacts.extend_raw(&raw);
        for event in std::mem::take(&mut self.injected) {
            self.contacts.record(event);
        }

        self.resolve_contacts();
        self.update_racers(dt);
        self.check_all_terminal();
        self.update_particles(dt);
        self.update_wall_visuals(dt);

        self.time_ticks += 1;
    }

    fn racer_aabb(&self, index: usize) -> Option<Aabb> {
        let racer = self.racers.get(index)?;
        let half = Vec2::splat(self.tunables.racer_size * 0.5);
        Some(Aabb::from_rotated_rect(
            self.physics.position(racer.body),
            half,
            self.physics.angle(racer.body),
        ))
    }

    /// Kill every live racer the wall at `wall_index` overlaps past the threshold
    fn crush_check(&mut self, wall_index: usize) {
        let Some(wall) = self.walls.get(wall_index) else {
            return;
        };
        let wall_box = wall.aabb();
        let wall_id = wall.id;
        let threshold = self.config().crush_threshold;
        for i in 0..self.racers.len() {
            if !self.racer_active(i) {
                continue;
            }
            let Some(racer_box) = self.racer_aabb(i) else {
                continue;
            };
            if is_crushed(&racer_box, &wall_box, threshold) {
                self.kill_racer(i, DeathCause::Crushed { wall: wall_id });
            }
        }
    }

    /// Freeze a racer in place and mark it dead
    pub(crate) fn kill_racer(&mut self, index: usize, cause: DeathCause) {
        let Some(racer) = self.racers.get_mut(index) else {
            return;
        };
        if !racer.status.is_active() {
            return;
        }
        let pos = self.physics.position(racer.body);
        racer.status = RacerStatus::Dead;
        racer.death_pos = Some(pos);
        racer.pos = pos;
        racer.vel = Vec2::ZERO;
        self.physics.set_velocity(racer.body, Vec2::ZERO);
        self.physics.set_angular_velocity(racer.body, 0.0);
        self.physics.set_enabled(racer.body, false);
        log::debug!("Racer {} died at ({:.2}, {:.2}): {:?}", index, pos.x, pos.y, cause);
        self.events.push(SimEvent::RacerDied {
            racer: index,
            cause,
            position: pos,
        });
    }

    fn update_expanding_walls(&mut self, dt: f32) {
        for i in 0..self.walls.len() {
            let Some(mut exp) = self.walls[i].expansion else {
                continue;
            };
            exp.time_alive += dt;

            let wall = &self.walls[i];
            let Some(next) = exp.grown_size(wall.size, dt) else {
                self.walls[i].expansion = Some(exp);
                continue;
            };

            if exp.stop_on_contact {
                let predicted = wall.aabb_at(wall.pos, next);
                let blocked = self.walls.iter().enumerate().any(|(j, other)| {
                    j != i
                        && exp.stop_target.is_none_or(|t| t == other.id)
                        && predicted.intersects(&other.aabb(), EXPANSION_CLEARANCE)
                });
                if blocked {
                    exp.halted = true;
                    log::debug!("Wall {} stopped expanding on contact", wall.id);
                    self.walls[i].expansion = Some(exp);
                    continue;
                }
            }

            let grew = next != wall.size;
            if exp.at_max(next) {
                exp.halted = true;
            }
            let wall = &mut self.walls[i];
            wall.expansion = Some(exp);
            if grew {
                wall.size = next;
                self.physics
                    .replace_shape(wall.body, wall.physics_shape(), Material::default());
                self.crush_check(i);
            }
        }
    }

    /// Whether a box leaves the playable interior
    fn outside_arena(&self, b: &Aabb) -> bool {
        let t = BOUNDARY_HALF_THICKNESS;
        let w = self.config().world_width();
        let h = self.config().world_height();
        b.min.x < t || b.min.y < t || b.max.x > w - t || b.max.y > h - t
    }

    fn update_moving_walls(&mut self, dt: f32) {
        for i in 0..self.walls.len() {
            let Some(mut motion) = self.walls[i].motion else {
                continue;
            };
            let wall = &self.walls[i];
            let pos = wall.pos;

            let (mut next, mut mode) = match motion.mode {
                MotionMode::Waypoints { towards_b } => {
                    let target = if towards_b { motion.point_b } else { motion.point_a };
                    let to = target - pos;
                    let dist = to.length();
                    let travel = motion.speed * dt;
                    if dist <= travel {
                        (target, MotionMode::Waypoints { towards_b: !towards_b })
                    } else {
                        (pos + to / dist * travel, motion.mode)
                    }
                }
                MotionMode::FreeBounce { velocity } => (pos + velocity * dt, motion.mode),
            };

            if motion.reverse_on_contact || motion.free_bounce {
                let predicted = wall.aabb_at(next, wall.size);
                let hits_wall = self.walls.iter().enumerate().any(|(j, other)| {
                    j != i && predicted.intersects(&other.aabb(), MOVING_CLEARANCE)
                });
                let free = matches!(motion.mode, MotionMode::FreeBounce { .. });
                let hits_edge = free && self.outside_arena(&predicted);
                if hits_wall || hits_edge {
                    if motion.free_bounce {
                        let velocity = match motion.mode {
                            MotionMode::FreeBounce { velocity } => velocity,
                            MotionMode::Waypoints { towards_b } => {
                                let target = if towards_b { motion.point_b } else { motion.point_a };
                                (target - pos).normalize_or_zero() * motion.speed
                            }
                        };
                        if !free {
                            log::debug!("Wall {} switched to free bounce", wall.id);
                        }
                        mode = MotionMode::FreeBounce { velocity: -velocity };
                    } else if let MotionMode::Waypoints { towards_b } = motion.mode {
                        mode = MotionMode::Waypoints { towards_b: !towards_b };
                    }
                    next = pos;
                }
            }

            motion.mode = mode;
            let moved = next != pos;
            let wall = &mut self.walls[i];
            wall.motion = Some(motion);
            wall.pos = next;
            self.physics
                .set_kinematic_target(wall.body, next, wall.rotation);
            if moved {
                self.crush_check(i);
            }
        }
    }

    /// Apply this tick's classified contacts
    fn resolve_contacts(&mut self) {
        let contacts = std::mem::take(&mut self.contacts);

        // Chaos perturbation
        let mut boosted = BTreeSet::new();
        if self.tunables.enable_chaos {
            for &r in &contacts.chaos {
                if !self.racer_active(r) {
                    continue;
                }
                if self.rng.random::<f32>() < self.tunables.chaos_chance {
                    let body = self.racers[r].body;
                    let turn = self.rng.random_range(-FRAC_PI_2..=FRAC_PI_2);
                    let vel = self.physics.velocity(body);
                    self.physics
                        .set_velocity(body, rotate(vel, turn) * self.tunables.chaos_boost);
                    boosted.insert(r);
                    self.events.push(SimEvent::ChaosKick { racer: r });
                }
            }
        }

        // Deaths come before any win processing
        for &(racer, wall) in &contacts.touches {
            let Some(id) = wall.id() else {
                continue;
            };
            let deadly = self
                .wall_index(id)
                .is_some_and(|idx| self.walls[idx].deadly);
            if deadly {
                self.kill_racer(racer, DeathCause::Deadly { wall: id });
            }
        }

        // Wall hits: feedback, sounds, destructible counters
        let world_width = self.config().world_width();
        let mut destroyed = Vec::new();
        for (&wall_ref, impact) in &contacts.walls_hit {
            self.events.push(SimEvent::WallHit {
                racer: impact.racer,
                wall: wall_ref.id(),
                point: impact.point,
                normal: impact.normal,
            });
            let gain = if boosted.contains(&impact.racer) {
                self.tunables.chaos_boost
            } else {
                1.0
            };

            let WallRef::Custom(id) = wall_ref else {
                self.spawn_sparks(impact.point, impact.normal, [200, 200, 210]);
                continue;
            };
            let Some(idx) = self.wall_index(id) else {
                continue;
            };
            let color = self.config().palette_color(self.walls[idx].color_index);
            self.spawn_sparks(impact.point, impact.normal, color);

            let wall = &mut self.walls[idx];
            wall.flash_timer = WALL_FLASH_TIME;
            if wall.sound_id > 0 {
                let cue = match self.song.as_mut().and_then(|s| s.next_note()) {
                    Some(note) => SoundCue::Note(note),
                    None => SoundCue::Tone(wall.sound_id.clamp(1, 8) as u8),
                };
                let pan = ((impact.point.x / world_width) * 2.0 - 1.0).clamp(-1.0, 1.0);
                self.events.push(SimEvent::Sound { cue, gain, pan });
            }
            if let Some(d) = &mut wall.destructible {
                d.hits_left -= 1;
                if d.hits_left <= 0 {
                    destroyed.push(id);
                }
            }
        }
        for id in destroyed {
            self.destroy_wall(id);
        }

        // Win zone: first contact starts the countdown
        for &r in &contacts.win_zone {
            if self.status_of(r) == Some(RacerStatus::Alive) {
                let racer = &mut self.racers[r];
                racer.status = RacerStatus::Finishing;
                racer.finish_timer = 0.0;
                log::debug!("Racer {} entered the win zone", r);
                self.events.push(SimEvent::RacerFinishing { racer: r });
            }
        }

        self.contacts = contacts;
    }

    /// Break a destructible wall: debris, one event, then removal
    fn destroy_wall(&mut self, id: u32) {
        let Some(idx) = self.wall_index(id) else {
            return;
        };
        let wall = &self.walls[idx];
        let position = wall.pos;
        let color = self.config().palette_color(wall.color_index);
        let extent = wall.size * 0.5;
        for _ in 0..24 {
            if self.particles.len() >= MAX_PARTICLES {
                break;
            }
            let offset = Vec2::new(
                self.fx_rng.random_range(-1.0..=1.0) * extent.x,
                self.fx_rng.random_range(-1.0..=1.0) * extent.y,
            );
            let angle = self.fx_rng.random_range(0.0..TAU);
            let speed = self.fx_rng.random_range(2.0..6.0);
            self.particles.push(Particle {
                pos: position + offset,
                vel: polar_to_cartesian(speed, angle),
                color,
                life: 1.0,
                size: self.fx_rng.random_range(0.1..0.3),
            });
        }
        self.events.push(SimEvent::DebrisSpawned { wall: id, position });
        log::debug!("Wall {} destroyed", id);
        self.remove_wall(idx);
    }

    /// Short burst along the contact normal
    fn spawn_sparks(&mut self, point: Vec2, normal: Vec2, color: [u8; 3]) {
        let base = normal.y.atan2(normal.x);
        for _ in 0..4 {
            if self.particles.len() >= MAX_PARTICLES {
                return;
            }
            let angle = base + self.fx_rng.random_range(-0.6..0.6);
            let speed = self.fx_rng.random_range(3.0..8.0);
            self.particles.push(Particle {
                pos: point,
                vel: polar_to_cartesian(speed, angle),
                color,
                life: 0.6,
                size: 0.12,
            });
        }
    }

    fn update_racers(&mut self, dt: f32) {
        let finish_delay = self.config().finish_delay;
        for i in 0..self.racers.len() {
            let body = self.racers[i].body;

            if self.racers[i].status == RacerStatus::Finishing {
                let racer = &mut self.racers[i];
                racer.finish_timer += dt;
                if racer.finish_timer + FINISH_EPSILON >= finish_delay {
                    racer.status = RacerStatus::Finished;
                    racer.pos = self.physics.position(body);
                    racer.vel = Vec2::ZERO;
                    self.physics.set_velocity(body, Vec2::ZERO);
                    self.physics.set_angular_velocity(body, 0.0);
                    self.physics.set_enabled(body, false);
                    self.finish_order.push(i);
                    log::info!("Racer {} finished at tick {}", i, self.time_ticks);
                    self.events.push(SimEvent::RacerFinished { racer: i });

                    if self.tunables.stop_on_first_win && self.phase == GamePhase::Running {
                        self.winner = Some(i);
                        self.phase = GamePhase::GameOver;
                        log::info!("Game over, winner: racer {}", i);
                        self.events.push(SimEvent::GameOver { winner: Some(i) });
                    }
                }
            }

            if !self.racers[i].status.is_active() {
                continue;
            }

            if self.tunables.enforce_speed {
                self.enforce_speed(body);
            }

            let w = self.physics.angular_velocity(body);
            if !self.tunables.fixed_rotation && w.abs() < MIN_SPIN {
                let nudge = if w > 0.0 { SPIN_NUDGE } else { -SPIN_NUDGE };
                self.physics.apply_torque_impulse(body, nudge);
            }

            let pos = self.physics.position(body);
            let racer = &mut self.racers[i];
            racer.pos = pos;
            racer.angle = self.physics.angle(body);
            racer.vel = self.physics.velocity(body);
            racer.record_trail(pos);
        }
    }

    /// Keep speed inside `[target, target + SPEED_BAND]`
    fn enforce_speed(&mut self, body: crate::physics::BodyHandle) {
        let target = self.tunables.target_speed;
        let vel = self.physics.velocity(body);
        let speed = vel.length();
        if speed >= target && speed <= target + SPEED_BAND {
            return;
        }
        let dir = if speed > 1e-4 {
            vel / speed
        } else {
            polar_to_cartesian(1.0, self.rng.random_range(0.0..TAU))
        };
        self.physics.set_velocity(body, dir * target);
    }

    /// End the session once nobody is left in play
    fn check_all_terminal(&mut self) {
        if self.phase != GamePhase::Running || !self.all_racers_terminal() {
            return;
        }
        self.phase = GamePhase::GameOver;
        self.winner = None;
        log::info!(
            "Game over, all racers done (finish order {:?})",
            self.finish_order
        );
        self.events.push(SimEvent::GameOver { winner: None });
    }

    fn update_particles(&mut self, dt: f32) {
        for p in &mut self.particles {
            p.update(dt);
        }
        self.particles.retain(|p| p.life > 0.0);
    }

    /// Decay per-wall flash timers
    pub fn update_wall_visuals(&mut self, dt: f32) {
        for wall in &mut self.walls {
            wall.flash_timer = (wall.flash_timer - dt).max(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{SimConfig, Tunables};
    use crate::sim::contact::ContactEvent;
    use crate::sim::wall::{ExpansionAxis, WallDef};

    fn sim() -> Simulation {
        Simulation::new(SimConfig::default(), Tunables::default())
    }

    fn wall_hit(racer: usize, wall: u32) -> ContactEvent {
        ContactEvent::WallHit {
            racer,
            wall: WallRef::Custom(wall),
            point: Vec2::new(6.0, 6.0),
            normal: Vec2::new(0.0, -1.0),
        }
    }

    #[test]
    fn test_tick_counter_and_pause() {
        let mut s = sim();
        s.step(SIM_DT);
        assert_eq!(s.tick_count(), 1);
        s.pause();
        s.step(SIM_DT);
        assert_eq!(s.tick_count(), 1);
        assert_eq!(s.physics_steps(), 1);
        s.resume();
        s.step(SIM_DT);
        assert_eq!(s.tick_count(), 2);
    }

    #[test]
    fn test_deadly_wall_kills_and_freezes() {
        let mut s = sim();
        let idx = s.add_wall(WallDef::rect(Vec2::new(2.0, 2.0), Vec2::ONE).deadly());
        let id = s.walls()[idx].id;
        s.inject_contact(wall_hit(1, id));
        s.step(SIM_DT);
        assert_eq!(s.racers()[1].status, RacerStatus::Dead);
        let tomb = s.racers()[1].death_pos.unwrap();
        for _ in 0..10 {
            s.step(SIM_DT);
        }
        assert!((s.racer_position(1).unwrap() - tomb).length() < 1e-5);
        assert!(s
            .drain_events()
            .iter()
            .any(|e| matches!(e, SimEvent::RacerDied { racer: 1, .. })));
    }

    #[test]
    fn test_death_beats_win_in_same_tick() {
        let mut s = sim();
        let idx = s.add_wall(WallDef::rect(Vec2::new(2.0, 2.0), Vec2::ONE).deadly());
        let id = s.walls()[idx].id;
        s.inject_contact(ContactEvent::WinZone { racer: 0 });
        s.inject_contact(wall_hit(0, id));
        s.step(SIM_DT);
        assert_eq!(s.racers()[0].status, RacerStatus::Dead);
        for _ in 0..60 {
            s.step(SIM_DT);
        }
        assert_eq!(s.racers()[0].status, RacerStatus::Dead);
        assert!(s.finish_order().is_empty());
    }

    #[test]
    fn test_wall_hit_sound_and_flash() {
        let mut s = sim();
        let idx = s.add_wall(WallDef::rect(Vec2::new(2.0, 2.0), Vec2::ONE).with_sound(3));
        let id = s.walls()[idx].id;
        s.inject_contact(wall_hit(0, id));
        s.inject_contact(wall_hit(2, id));
        s.step(SIM_DT);
        let sounds: Vec<_> = s
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, SimEvent::Sound { .. }))
            .collect();
        // one sound per wall per tick
        assert_eq!(sounds.len(), 1);
        assert!(matches!(
            sounds[0],
            SimEvent::Sound {
                cue: SoundCue::Tone(3),
                ..
            }
        ));
        assert!(s.walls()[idx].flash_timer > 0.0);
    }

    #[test]
    fn test_song_replaces_tone() {
        let mut s = sim();
        s.set_song(Some(crate::sim::Song::from_notes(vec![72, 74])));
        let idx = s.add_wall(WallDef::rect(Vec2::new(2.0, 2.0), Vec2::ONE).with_sound(1));
        let id = s.walls()[idx].id;
        for _ in 0..3 {
            s.inject_contact(wall_hit(0, id));
            s.step(SIM_DT);
        }
        let notes: Vec<_> = s
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                SimEvent::Sound {
                    cue: SoundCue::Note(n),
                    ..
                } => Some(n),
                _ => None,
            })
            .collect();
        assert_eq!(notes, vec![72, 74, 72]);
    }

    #[test]
    fn test_expanding_wall_crushes_racer() {
        let mut s = sim();
        s.set_enforce_speed(false);
        let target = s.racer_position(0).unwrap();
        let idx = s.add_wall(
            WallDef::rect(target, Vec2::splat(0.1)).expanding(0.0, 60.0, ExpansionAxis::Both, 3.0),
        );
        s.step(SIM_DT);
        assert_eq!(s.racers()[0].status, RacerStatus::Dead);
        let wall_id = s.walls()[idx].id;
        assert!(s.drain_events().iter().any(|e| matches!(
            e,
            SimEvent::RacerDied {
                racer: 0,
                cause: DeathCause::Crushed { wall },
                ..
            } if *wall == wall_id
        )));
    }

    #[test]
    fn test_expansion_stops_at_target() {
        let mut s = sim();
        s.add_wall(WallDef::rect(Vec2::new(6.0, 3.0), Vec2::new(1.0, 1.0)));
        let a = s.add_wall(
            WallDef::rect(Vec2::new(3.0, 3.0), Vec2::new(1.0, 1.0))
                .expanding(0.0, 6.0, ExpansionAxis::X, 0.0)
                .stop_on(Some(0)),
        );
        for _ in 0..120 {
            s.step(SIM_DT);
        }
        let w = &s.walls()[a];
        assert!(w.expansion.unwrap().halted);
        // right edge of the growing wall stays left of the target's left edge
        assert!(w.pos.x + w.size.x * 0.5 < 5.5);
    }

    #[test]
    fn test_expansion_target_survives_earlier_removal() {
        let mut s = sim();
        s.add_wall(WallDef::rect(Vec2::new(20.0, 20.0), Vec2::ONE));
        s.add_wall(WallDef::rect(Vec2::new(6.0, 3.0), Vec2::new(1.0, 1.0)));
        s.add_wall(
            WallDef::rect(Vec2::new(3.0, 3.0), Vec2::new(1.0, 1.0))
                .expanding(0.0, 6.0, ExpansionAxis::X, 0.0)
                .stop_on(Some(1)),
        );
        let target_id = s.walls()[1].id;
        s.update_win_zone(Vec2::new(-10.0, -10.0), Vec2::ONE, false);

        // Indices shift down by one; the expander still knows its target
        s.remove_wall(0);
        assert_eq!(s.walls()[1].expansion.unwrap().stop_target, Some(target_id));
        assert_eq!(s.to_level().walls[1].stop_target, 0);

        for _ in 0..120 {
            s.step(SIM_DT);
        }
        let w = &s.walls()[1];
        assert!(w.expansion.unwrap().halted);
        assert!(w.pos.x + w.size.x * 0.5 < 5.5);
    }

    /// Platform shuttling right from (3, 20) towards (9, 20), with a block in the way
    fn blocked_platform(def: impl FnOnce(WallDef) -> WallDef) -> (Simulation, usize) {
        let mut s = sim();
        // nobody finishes while the platform runs
        s.update_win_zone(Vec2::new(-10.0, -10.0), Vec2::ONE, false);
        s.add_wall(WallDef::rect(Vec2::new(6.5, 20.0), Vec2::ONE));
        let idx = s.add_wall(def(WallDef::rect(Vec2::new(3.0, 20.0), Vec2::new(1.0, 0.5))
            .moving_between(Vec2::new(3.0, 20.0), Vec2::new(9.0, 20.0), 6.0)));
        (s, idx)
    }

    #[test]
    fn test_platform_reverses_before_contact() {
        let (mut s, idx) = blocked_platform(WallDef::reverse_on_contact);
        let mut max_x = f32::MIN;
        let mut reversed_at = None;
        for tick in 0..40 {
            s.step(SIM_DT);
            let w = &s.walls()[idx];
            max_x = max_x.max(w.pos.x);
            if reversed_at.is_none() && !w.motion.unwrap().towards_b() {
                reversed_at = Some(tick);
            }
        }
        // the block's left edge is at 6.0; B at 9.0 is never reached
        assert!(max_x + 0.5 < 6.0, "reached {max_x}");
        assert!(reversed_at.is_some());
        let w = &s.walls()[idx];
        assert!(matches!(w.motion.unwrap().mode, MotionMode::Waypoints { towards_b: false }));
        assert!(w.pos.x < 5.0);
    }

    #[test]
    fn test_free_bounce_never_returns_to_waypoints() {
        let (mut s, idx) = blocked_platform(WallDef::free_bounce);
        let mut switched = false;
        for _ in 0..60 {
            s.step(SIM_DT);
            let mode = s.walls()[idx].motion.unwrap().mode;
            if switched {
                assert!(matches!(mode, MotionMode::FreeBounce { .. }));
            }
            switched |= matches!(mode, MotionMode::FreeBounce { .. });
        }
        assert!(switched);
        let w = &s.walls()[idx];
        let MotionMode::FreeBounce { velocity } = w.motion.unwrap().mode else {
            panic!("expected free bounce");
        };
        assert!(velocity.x < 0.0);
        // moved past waypoint A without turning around
        assert!(w.pos.x < 2.5, "at {}", w.pos.x);
    }

    #[test]
    fn test_free_bounce_rebounds_at_arena_edge() {
        let (mut s, idx) = blocked_platform(WallDef::free_bounce);
        let mut min_x = f32::MAX;
        for _ in 0..90 {
            s.step(SIM_DT);
            min_x = min_x.min(s.walls()[idx].pos.x);
        }
        // left boundary face is at 0.5; the platform is 1 m wide
        assert!(min_x - 0.5 >= BOUNDARY_HALF_THICKNESS - 1e-4, "reached {min_x}");
        let MotionMode::FreeBounce { velocity } = s.walls()[idx].motion.unwrap().mode else {
            panic!("expected free bounce");
        };
        assert!(velocity.x > 0.0);
    }

    #[test]
    fn test_moving_wall_crushes_racer() {
        let mut s = sim();
        let target = s.racer_position(0).unwrap();
        let start = target - Vec2::new(2.0, 0.0);
        let idx = s.add_wall(WallDef::rect(start, Vec2::splat(3.0)).moving_between(
            start,
            target + Vec2::new(2.0, 0.0),
            60.0,
        ));
        let wall_id = s.walls()[idx].id;
        s.step(SIM_DT);
        assert_eq!(s.racers()[0].status, RacerStatus::Dead);
        assert!(s.drain_events().iter().any(|e| matches!(
            e,
            SimEvent::RacerDied {
                racer: 0,
                cause: DeathCause::Crushed { wall },
                ..
            } if *wall == wall_id
        )));
        assert!(s.racers()[1..].iter().all(|r| r.status == RacerStatus::Alive));
    }

    #[test]
    fn test_moving_wall_shuttles() {
        let mut s = sim();
        let idx = s.add_wall(
            WallDef::rect(Vec2::new(3.0, 20.0), Vec2::new(1.0, 0.5)).moving_between(
                Vec2::new(3.0, 20.0),
                Vec2::new(5.0, 20.0),
                6.0,
            ),
        );
        for _ in 0..25 {
            s.step(SIM_DT);
        }
        // 2 m at 6 m/s reaches B after about 20 ticks, then heads back
        let w = &s.walls()[idx];
        assert!(!w.motion.unwrap().towards_b());
        assert!(w.pos.x > 4.4 && w.pos.x < 4.7, "at {}", w.pos.x);
    }

    #[test]
    fn test_mode_b_ends_when_all_terminal() {
        let mut s = sim();
        s.set_stop_on_first_win(false);
        let idx = s.add_wall(WallDef::rect(Vec2::new(2.0, 2.0), Vec2::ONE).deadly());
        let id = s.walls()[idx].id;
        s.inject_contact(ContactEvent::WinZone { racer: 3 });
        s.step(SIM_DT);
        for _ in 0..40 {
            s.step(SIM_DT);
        }
        assert_eq!(s.racers()[3].status, RacerStatus::Finished);
        assert_eq!(s.phase(), GamePhase::Running);
        for r in 0..3 {
            s.inject_contact(wall_hit(r, id));
        }
        s.step(SIM_DT);
        assert_eq!(s.phase(), GamePhase::GameOver);
        assert_eq!(s.winner(), None);
        assert_eq!(s.finish_order(), &[3]);
    }

    #[test]
    fn test_speed_enforced() {
        let mut s = sim();
        for _ in 0..30 {
            s.step(SIM_DT);
        }
        for i in 0..4 {
            let speed = s.racer_velocity(i).unwrap().length();
            assert!(speed >= 8.0 - 1e-3 && speed <= 8.5 + 1e-3, "racer {i} at {speed}");
        }
    }
}
