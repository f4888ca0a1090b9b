//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by racer index, wall index)
//! - No rendering, audio or capture dependencies

pub mod contact;
pub mod crush;
pub mod level;
pub mod scheduler;
pub mod song;
pub mod state;
pub mod tick;
pub mod wall;
pub mod world;

pub use contact::{ContactEvent, TickContacts, WallRef, classify};
pub use crush::{Aabb, crush_fraction, is_crushed};
pub use level::{Level, LevelConfig, RacerDef, WinZoneDef};
pub use scheduler::{FixedStep, StepMode};
pub use song::Song;
pub use state::{DeathCause, GamePhase, Particle, Racer, RacerStatus, SimEvent, SoundCue, WinZone};
pub use wall::{
    Destructible, Expansion, ExpansionAxis, Motion, MotionMode, Wall, WallDef, WallShape,
};
pub use world::Simulation;
