//! Racer, win zone and event types
//!
//! Everything the state machine mutates per tick that is not a wall.

use std::collections::VecDeque;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::TRAIL_LENGTH;
use crate::physics::BodyHandle;

/// Global session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Racers are moving
    Running,
    /// Nothing advances; resumable
    Paused,
    /// Session ended (terminal until reset)
    GameOver,
}

/// Per-racer lifecycle
///
/// `Alive -> Finishing -> Finished` and `Alive -> Dead`. A dead racer never
/// finishes and a finishing racer can still die until the delay elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RacerStatus {
    Alive,
    Finishing,
    Finished,
    Dead,
}

impl RacerStatus {
    /// Still under physics control
    pub fn is_active(self) -> bool {
        matches!(self, RacerStatus::Alive | RacerStatus::Finishing)
    }

    /// Will not change again before a reset
    pub fn is_terminal(self) -> bool {
        matches!(self, RacerStatus::Finished | RacerStatus::Dead)
    }
}

/// Why a racer died
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathCause {
    /// Touched a wall flagged deadly
    Deadly { wall: u32 },
    /// Overlapped by an expanding or moving wall
    Crushed { wall: u32 },
}

/// A competitor
#[derive(Debug, Clone)]
pub struct Racer {
    pub index: usize,
    pub body: BodyHandle,
    pub status: RacerStatus,
    /// Seconds since first win-zone contact
    pub finish_timer: f32,
    /// Frozen position at the moment of death (tombstone)
    pub death_pos: Option<Vec2>,
    /// Recent positions, newest at the back
    pub trail: VecDeque<Vec2>,
    /// Cached pose from the last tick (for rendering)
    pub pos: Vec2,
    pub angle: f32,
    pub vel: Vec2,
}

impl Racer {
    pub fn new(index: usize, body: BodyHandle) -> Self {
        Self {
            index,
            body,
            status: RacerStatus::Alive,
            finish_timer: 0.0,
            death_pos: None,
            trail: VecDeque::with_capacity(TRAIL_LENGTH),
            pos: Vec2::ZERO,
            angle: 0.0,
            vel: Vec2::ZERO,
        }
    }

    /// Push a trail point, dropping the oldest once full
    pub fn record_trail(&mut self, pos: Vec2) {
        if self.trail.len() == TRAIL_LENGTH {
            self.trail.pop_front();
        }
        self.trail.push_back(pos);
    }

    pub fn clear_trail(&mut self) {
        self.trail.clear();
    }
}

/// The single sensor region racers must reach
#[derive(Debug, Clone, Copy)]
pub struct WinZone {
    pub body: BodyHandle,
    pub pos: Vec2,
    pub size: Vec2,
    /// Rendered with a glow pulse
    pub glow: bool,
}

/// What to play for a wall hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundCue {
    /// Built-in scale tone by sound id (1..=8)
    Tone(u8),
    /// Song note (MIDI number)
    Note(u8),
}

/// Outcomes of a tick, consumed by audio routing and rendering
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    WallHit {
        racer: usize,
        /// `None` for the arena boundary
        wall: Option<u32>,
        point: Vec2,
        normal: Vec2,
    },
    Sound {
        cue: SoundCue,
        gain: f32,
        /// -1 (left) ..= 1 (right)
        pan: f32,
    },
    ChaosKick {
        racer: usize,
    },
    RacerDied {
        racer: usize,
        cause: DeathCause,
        position: Vec2,
    },
    RacerFinishing {
        racer: usize,
    },
    RacerFinished {
        racer: usize,
    },
    DebrisSpawned {
        wall: u32,
        position: Vec2,
    },
    GameOver {
        winner: Option<usize>,
    },
}

/// A visual-only particle
#[derive(Debug, Clone, Copy)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    pub color: [u8; 3],
    /// 1 -> 0 over the particle lifetime
    pub life: f32,
    pub size: f32,
}

impl Particle {
    pub fn update(&mut self, dt: f32) {
        self.pos += self.vel * dt;
        self.vel *= 0.96;
        self.life -= dt * 2.0;
        self.size *= 0.99;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert!(RacerStatus::Alive.is_active());
        assert!(RacerStatus::Finishing.is_active());
        assert!(!RacerStatus::Dead.is_active());
        assert!(RacerStatus::Finished.is_terminal());
        assert!(RacerStatus::Dead.is_terminal());
        assert!(!RacerStatus::Finishing.is_terminal());
    }

    #[test]
    fn test_particle_fades() {
        let mut p = Particle {
            pos: Vec2::ZERO,
            vel: Vec2::new(1.0, 0.0),
            color: [255, 255, 255],
            life: 1.0,
            size: 0.2,
        };
        for _ in 0..60 {
            p.update(1.0 / 60.0);
        }
        assert!(p.life < 0.0);
        assert!(p.pos.x > 0.0);
    }
}
