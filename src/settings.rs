//! Simulation and recorder settings
//!
//! `SimConfig` is fixed for the lifetime of a `Simulation`. `Tunables` are the
//! knobs that may change while running, and only through `Simulation` setters.
//! Both are persisted together with the recorder settings as JSON.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::SettingsError;

/// Frame readback strategy used by the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CaptureMode {
    /// Read the render target synchronously every frame
    #[default]
    Direct,
    /// Double-buffered readback with one frame of latency
    PingPong,
}

impl CaptureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureMode::Direct => "Direct",
            CaptureMode::PingPong => "PingPong",
        }
    }

}

impl FromStr for CaptureMode {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "direct" => Ok(CaptureMode::Direct),
            "pingpong" | "ping-pong" | "async" => Ok(CaptureMode::PingPong),
            _ => Err(SettingsError::UnknownCaptureMode(s.to_string())),
        }
    }
}

/// Immutable simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Arena size in pixels
    pub width_px: u32,
    pub height_px: u32,
    pub pixels_per_meter: f32,
    pub racer_count: usize,
    /// RNG seed; a fixed seed makes the recorded race reproducible
    pub seed: u64,
    pub finish_delay: f32,
    pub crush_threshold: f32,
    pub velocity_iterations: usize,
    pub position_iterations: usize,
    /// Initial win zone (meters, center + size)
    pub win_zone_pos: Vec2,
    pub win_zone_size: Vec2,
    /// Wall neon palette, indexed by `Wall::color_index`
    pub palette: Vec<[u8; 3]>,
    /// One color per racer (wraps if there are more racers)
    pub racer_colors: Vec<[u8; 3]>,
    pub background: [u8; 3],
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            width_px: ARENA_WIDTH_PX,
            height_px: ARENA_HEIGHT_PX,
            pixels_per_meter: PIXELS_PER_METER,
            racer_count: RACER_COUNT,
            seed: 42,
            finish_delay: FINISH_DELAY,
            crush_threshold: CRUSH_THRESHOLD,
            velocity_iterations: VELOCITY_ITERATIONS,
            position_iterations: POSITION_ITERATIONS,
            win_zone_pos: Vec2::new(12.0, 3.0),
            win_zone_size: Vec2::splat(2.0),
            palette: vec![
                [255, 255, 255],
                [0, 255, 255],
                [255, 0, 255],
                [0, 255, 0],
                [255, 255, 0],
                [255, 128, 0],
                [255, 40, 40],
                [80, 120, 255],
            ],
            racer_colors: vec![[0, 255, 255], [255, 0, 255], [0, 255, 0], [255, 255, 0]],
            background: [20, 20, 25],
        }
    }
}

impl SimConfig {
    /// World width in meters
    pub fn world_width(&self) -> f32 {
        self.width_px as f32 / self.pixels_per_meter
    }

    /// World height in meters
    pub fn world_height(&self) -> f32 {
        self.height_px as f32 / self.pixels_per_meter
    }

    /// Palette color for a wall color index (wraps)
    pub fn palette_color(&self, index: usize) -> [u8; 3] {
        if self.palette.is_empty() {
            return [255, 255, 255];
        }
        self.palette[index % self.palette.len()]
    }

    /// Color for racer `index` (wraps)
    pub fn racer_color(&self, index: usize) -> [u8; 3] {
        if self.racer_colors.is_empty() {
            return [255, 255, 255];
        }
        self.racer_colors[index % self.racer_colors.len()]
    }
}

/// Runtime-tunable simulation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tunables {
    pub target_speed: f32,
    pub enforce_speed: bool,
    pub enable_gravity: bool,
    pub enable_chaos: bool,
    /// Probability a racer-racer contact perturbs the racer
    pub chaos_chance: f32,
    /// Speed multiplier applied by a chaos perturbation
    pub chaos_boost: f32,
    pub racer_size: f32,
    pub restitution: f32,
    pub friction: f32,
    pub fixed_rotation: bool,
    /// End the session when the first racer finishes
    pub stop_on_first_win: bool,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            target_speed: TARGET_SPEED,
            enforce_speed: true,
            enable_gravity: false,
            enable_chaos: false,
            chaos_chance: 0.05,
            chaos_boost: 1.5,
            racer_size: RACER_SIZE,
            restitution: 1.0,
            friction: 0.0,
            fixed_rotation: false,
            stop_on_first_win: true,
        }
    }
}

/// Recorder / encoder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderSettings {
    /// Final muxed output
    pub output_path: PathBuf,
    pub fps: u32,
    pub sample_rate: u32,
    /// External encoder executable
    pub encoder_program: String,
    /// Software codec
    pub video_codec: String,
    /// Hardware codec; used instead of `video_codec` when set
    pub hardware_codec: Option<String>,
    pub capture_mode: CaptureMode,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("output/video.mp4"),
            fps: FPS,
            sample_rate: SAMPLE_RATE,
            encoder_program: "ffmpeg".to_string(),
            video_codec: "libx264".to_string(),
            hardware_codec: None,
            capture_mode: CaptureMode::Direct,
        }
    }
}

impl RecorderSettings {
    /// Codec actually passed to the encoder
    pub fn effective_codec(&self) -> &str {
        self.hardware_codec.as_deref().unwrap_or(&self.video_codec)
    }

    /// Whether the hardware path is selected
    pub fn uses_hardware(&self) -> bool {
        self.hardware_codec.is_some()
    }
}

/// All persisted settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sim: SimConfig,
    pub tunables: Tunables,
    pub recorder: RecorderSettings,
}

impl Settings {
    /// Load settings from a JSON file; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            log::info!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)?;
        let settings = serde_json::from_str(&json)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Save settings as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }
}
