//! External encoder boundary
//!
//! The encoder is a subprocess (ffmpeg by default) invoked twice: once with
//! raw RGBA frames streamed to its stdin to produce a silent video, and once
//! at stop to mux that video with the finished audio track.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};

use crate::consts::OUTPUT_CHANNELS;
use crate::error::CaptureError;
use crate::settings::RecorderSettings;

/// Where encoded frames go; owned by the worker thread
pub trait FrameSink: Send {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Close the input and wait for the encoder to finish the stream
    fn finish(self: Box<Self>) -> io::Result<()>;
}

/// Final audio/video mux step
pub trait Muxer: Send {
    fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), CaptureError>;
}

/// Arguments for the silent-video encode
pub fn video_args(settings: &RecorderSettings, width: u32, height: u32, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "-y",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
        "-s",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(format!("{width}x{height}"));
    args.push("-r".into());
    args.push(settings.fps.to_string());
    args.extend(["-i", "-", "-c:v"].map(String::from));
    args.push(settings.effective_codec().to_string());
    if !settings.uses_hardware() {
        args.extend(["-preset", "ultrafast"].map(String::from));
    }
    args.extend(["-pix_fmt", "yuv420p"].map(String::from));
    args.push(output.display().to_string());
    args
}

/// Arguments for muxing the silent video with raw PCM audio
pub fn mux_args(video: &Path, audio: &Path, sample_rate: u32, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        video.display().to_string(),
        "-f".into(),
        "s16le".into(),
        "-ar".into(),
        sample_rate.to_string(),
        "-ac".into(),
        OUTPUT_CHANNELS.to_string(),
        "-i".into(),
        audio.display().to_string(),
        "-c:v".into(),
        "copy".into(),
        "-c:a".into(),
        "aac".into(),
        "-shortest".into(),
        output.display().to_string(),
    ]
}

/// Streams frames into an encoder subprocess
pub struct FfmpegSink {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl FfmpegSink {
    pub fn spawn(
        settings: &RecorderSettings,
        width: u32,
        height: u32,
        output: &Path,
    ) -> Result<Self, CaptureError> {
        let args = video_args(settings, width, height, output);
        log::debug!("[rec] {} {}", settings.encoder_program, args.join(" "));
        let mut child = Command::new(&settings.encoder_program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(CaptureError::EncoderLaunch)?;
        let stdin = child.stdin.take();
        if stdin.is_none() {
            let _ = child.kill();
            return Err(CaptureError::EncoderLaunch(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "encoder stdin unavailable",
            )));
        }
        log::info!(
            "[rec] Encoder started: {}x{} @ {} fps, codec {}",
            width,
            height,
            settings.fps,
            settings.effective_codec()
        );
        Ok(Self { child, stdin })
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        match &mut self.stdin {
            Some(stdin) => stdin.write_all(frame),
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "encoder input closed")),
        }
    }

    fn finish(mut self: Box<Self>) -> io::Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush()?;
        }
        let status = self.child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("encoder exited with {status}")))
        }
    }
}

/// Muxes with the external encoder program
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    pub program: String,
    pub sample_rate: u32,
}

impl FfmpegMuxer {
    pub fn from_settings(settings: &RecorderSettings) -> Self {
        Self {
            program: settings.encoder_program.clone(),
            sample_rate: settings.sample_rate,
        }
    }
}

impl Muxer for FfmpegMuxer {
    fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), CaptureError> {
        let args = mux_args(video, audio, self.sample_rate, output);
        log::debug!("[rec] {} {}", self.program, args.join(" "));
        let status = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .status()
            .map_err(CaptureError::MuxLaunch)?;
        if status.success() {
            Ok(())
        } else {
            Err(CaptureError::MuxFailed { status })
        }
    }
}

/// Keeps frames in memory; used for headless checks and tests
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
    finished: Arc<Mutex<bool>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames written so far (shared with every clone)
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_finished(&self) -> bool {
        *self.finished.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(frame.to_vec());
        Ok(())
    }

    fn finish(self: Box<Self>) -> io::Result<()> {
        *self.finished.lock().unwrap_or_else(PoisonError::into_inner) = true;
        Ok(())
    }
}

/// Muxer that only records what it was asked to do
#[derive(Debug, Clone, Default)]
pub struct RecordingMuxer {
    calls: Arc<Mutex<Vec<(PathBuf, PathBuf, PathBuf)>>>,
    fail: bool,
}

impl RecordingMuxer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A muxer whose every call fails to launch
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(PathBuf, PathBuf, PathBuf)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Muxer for RecordingMuxer {
    fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), CaptureError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((video.to_path_buf(), audio.to_path_buf(), output.to_path_buf()));
        if self.fail {
            return Err(CaptureError::MuxLaunch(io::Error::new(
                io::ErrorKind::NotFound,
                "muxer unavailable",
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_args_software() {
        let settings = RecorderSettings::default();
        let args = video_args(&settings, 720, 720, Path::new("out/v.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo -pix_fmt rgba -s 720x720 -r 60 -i -"));
        assert!(joined.contains("-c:v libx264 -preset ultrafast"));
        assert!(joined.ends_with("-pix_fmt yuv420p out/v.mp4"));
    }

    #[test]
    fn test_video_args_hardware_skips_preset() {
        let settings = RecorderSettings {
            hardware_codec: Some("h264_nvenc".into()),
            ..Default::default()
        };
        let args = video_args(&settings, 64, 32, Path::new("v.mp4"));
        assert!(args.iter().any(|a| a == "h264_nvenc"));
        assert!(!args.iter().any(|a| a == "ultrafast"));
    }

    #[test]
    fn test_mux_args_layout() {
        let args = mux_args(Path::new("v.mp4"), Path::new("a.raw"), 44_100, Path::new("o.mp4"));
        assert_eq!(
            args.join(" "),
            "-y -loglevel error -i v.mp4 -f s16le -ar 44100 -ac 2 -i a.raw -c:v copy -c:a aac -shortest o.mp4"
        );
    }

    #[test]
    fn test_memory_sink_shares_frames() {
        let sink = MemorySink::new();
        let mut boxed: Box<dyn FrameSink> = Box::new(sink.clone());
        boxed.write_frame(&[1, 2, 3]).unwrap();
        boxed.finish().unwrap();
        assert_eq!(sink.frames(), vec![vec![1, 2, 3]]);
        assert!(sink.is_finished());
    }
}
