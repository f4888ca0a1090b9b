//! Error taxonomy
//!
//! Game-rule outcomes (deaths, wins, crushed racers) are never errors. What is
//! left are capture failures, missing input files and settings I/O.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Failures of the capture/encode pipeline
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to allocate {width}x{height} render target")]
    RenderTarget { width: u32, height: u32 },
    #[error("failed to launch encoder: {0}")]
    EncoderLaunch(#[source] io::Error),
    #[error("encoder pipe error: {0}")]
    EncoderIo(#[source] io::Error),
    #[error("encoder worker panicked")]
    WorkerPanicked,
    #[error("failed to write audio track: {0}")]
    AudioWrite(#[source] io::Error),
    #[error("failed to launch muxer: {0}")]
    MuxLaunch(#[source] io::Error),
    #[error("muxer exited with {status}")]
    MuxFailed { status: ExitStatus },
    #[error("recorder already stopped")]
    AlreadyStopped,
}

/// Failures loading level or song files
#[derive(Debug, Error)]
pub enum LevelError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Failures loading or saving settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid settings json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown capture mode '{0}'")]
    UnknownCaptureMode(String),
}
