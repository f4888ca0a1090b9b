//! Chaos Racer - four racers bouncing through a configurable arena
//!
//! Core modules:
//! - `sim`: Deterministic fixed-step simulation (racers, walls, game rules)
//! - `physics`: Rigid-body engine boundary (rapier2d behind opaque handles)
//! - `audio`: Tone synthesis and the sample-accurate capture mixer
//! - `capture`: Frame queue, encoder worker and muxing finalizer
//! - `render`: CPU render target the capture pipeline reads from
//! - `session`: Glue between scheduler, simulation, renderer and recorder

pub mod audio;
pub mod capture;
pub mod error;
pub mod physics;
pub mod render;
pub mod session;
pub mod settings;
pub mod sim;

pub use error::{CaptureError, LevelError, SettingsError};
pub use session::Session;
pub use settings::{RecorderSettings, Settings, SimConfig, Tunables};

use glam::Vec2;

/// Simulation and capture constants
pub mod consts {
    /// Fixed simulation timestep (one tick per recorded frame)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Frames per second of the recorded video
    pub const FPS: u32 = 60;
    /// Maximum substeps per frame to prevent spiral of death (live mode only)
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Wall-clock deltas are clamped to this before accumulating
    pub const MAX_FRAME_DT: f32 = 0.25;

    /// Physics solver iterations
    pub const VELOCITY_ITERATIONS: usize = 8;
    pub const POSITION_ITERATIONS: usize = 3;

    /// Arena size in pixels and the pixel-per-meter scale
    pub const ARENA_WIDTH_PX: u32 = 720;
    pub const ARENA_HEIGHT_PX: u32 = 720;
    pub const PIXELS_PER_METER: f32 = 30.0;
    /// Boundary wall half-thickness (meters)
    pub const BOUNDARY_HALF_THICKNESS: f32 = 0.5;

    /// Racer defaults
    pub const RACER_COUNT: usize = 4;
    pub const RACER_SIZE: f32 = 1.0;
    pub const TARGET_SPEED: f32 = 8.0;
    /// Speeds inside [target, target + SPEED_BAND] are left alone
    pub const SPEED_BAND: f32 = 0.5;
    /// Spin below this gets a nudge (rad/s)
    pub const MIN_SPIN: f32 = 2.0;
    pub const SPIN_NUDGE: f32 = 0.1;
    pub const GRAVITY: f32 = 9.8;

    /// Seconds between first win-zone contact and finishing
    pub const FINISH_DELAY: f32 = 0.5;
    /// Fraction of racer area a wall must cover to crush it (strictly greater)
    pub const CRUSH_THRESHOLD: f32 = 0.5;
    /// Clearance kept between an expanding wall and its stop target (meters)
    pub const EXPANSION_CLEARANCE: f32 = 0.02;
    /// Clearance used when predicting moving-platform contact (meters)
    pub const MOVING_CLEARANCE: f32 = 0.05;

    /// Wall flash duration after a hit (seconds)
    pub const WALL_FLASH_TIME: f32 = 0.15;
    /// Trail length per racer
    pub const TRAIL_LENGTH: usize = 24;
    /// Maximum live particles
    pub const MAX_PARTICLES: usize = 512;

    /// Audio
    pub const SAMPLE_RATE: u32 = 44_100;
    pub const OUTPUT_CHANNELS: u16 = 2;
    pub const TONE_DURATION: f32 = 0.3;
    pub const TONE_DECAY: f32 = 15.0;
    /// Peak targets used when finalizing the mix (full scale = 1.0)
    pub const NORMALIZE_CEILING: f32 = 0.95;
    pub const NORMALIZE_FLOOR: f32 = 0.25;
    pub const MAX_NORMALIZE_BOOST: f32 = 4.0;
}

/// Pixel position of a world-space point
#[inline]
pub fn meters_to_pixels(p: Vec2) -> Vec2 {
    p * consts::PIXELS_PER_METER
}

/// World-space point of a pixel position
#[inline]
pub fn pixels_to_meters(p: Vec2) -> Vec2 {
    p / consts::PIXELS_PER_METER
}

/// Rotate a vector by `angle` radians
#[inline]
pub fn rotate(v: Vec2, angle: f32) -> Vec2 {
    let (s, c) = angle.sin_cos();
    Vec2::new(v.x * c - v.y * s, v.x * s + v.y * c)
}

/// Convert polar (r, theta) to cartesian (x, y)
#[inline]
pub fn polar_to_cartesian(r: f32, theta: f32) -> Vec2 {
    Vec2::new(r * theta.cos(), r * theta.sin())
}
