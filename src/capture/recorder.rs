//! Capture/encode pipeline and muxing finalizer
//!
//! The render loop pushes one frame per tick into the queue; a worker thread
//! drains it into the frame sink. Audio triggers go straight into the mixer
//! on the calling thread. `stop` runs the shutdown sequence in a fixed order:
//!
//! 1. close the mixer to new events
//! 2. flush any in-flight ping-pong frame, then close the queue
//! 3. join the worker (it drains every queued frame first)
//! 4. close the encoder input and wait for the silent video
//! 5. normalize the audio and write it as raw PCM
//! 6. mux video and audio, then delete the temporary files

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::encoder::{FfmpegMuxer, FfmpegSink, FrameSink, Muxer};
use super::queue::FrameQueue;
use super::readback::{FrameSource, Readback};
use crate::audio::{AudioMixer, AudioTrigger, write_pcm};
use crate::error::CaptureError;
use crate::settings::RecorderSettings;

/// What the worker hands back when it exits
struct WorkerOutcome {
    sink: Box<dyn FrameSink>,
    written: u64,
    error: Option<io::Error>,
}

fn run_worker(queue: Arc<FrameQueue>, mut sink: Box<dyn FrameSink>) -> WorkerOutcome {
    let mut written = 0;
    let mut error = None;
    while let Some(frame) = queue.pop() {
        if error.is_some() {
            continue;
        }
        match sink.write_frame(&frame) {
            Ok(()) => written += 1,
            Err(e) => {
                log::error!("[rec] Encoder write failed after {} frames: {}", written, e);
                error = Some(e);
            }
        }
    }
    log::debug!("[rec] Worker drained, {} frames written", written);
    WorkerOutcome {
        sink,
        written,
        error,
    }
}

/// Summary of a finished recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingReport {
    pub output: PathBuf,
    pub frames_captured: u64,
    pub frames_written: u64,
    pub audio_events: usize,
}

/// Temporary file paths next to the final output
pub fn temp_paths(output: &Path) -> (PathBuf, PathBuf) {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording".to_string());
    let dir = output.parent().unwrap_or_else(|| Path::new(""));
    (
        dir.join(format!("{stem}.silent.mp4")),
        dir.join(format!("{stem}.audio.raw")),
    )
}

pub struct Recorder {
    settings: RecorderSettings,
    width: u32,
    height: u32,
    queue: Arc<FrameQueue>,
    worker: Option<JoinHandle<WorkerOutcome>>,
    readback: Readback,
    mixer: AudioMixer,
    muxer: Box<dyn Muxer>,
    temp_video: PathBuf,
    temp_audio: PathBuf,
    frames_captured: u64,
    stopped: bool,
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("output", &self.settings.output_path)
            .field("size", &(self.width, self.height))
            .field("frames_captured", &self.frames_captured)
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

impl Recorder {
    /// Launch the encoder subprocess and start recording
    pub fn start(settings: RecorderSettings, width: u32, height: u32) -> Result<Self, CaptureError> {
        let (temp_video, _) = temp_paths(&settings.output_path);
        if let Some(dir) = temp_video.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(CaptureError::EncoderLaunch)?;
        }
        let sink = FfmpegSink::spawn(&settings, width, height, &temp_video)?;
        let muxer = FfmpegMuxer::from_settings(&settings);
        Ok(Self::with_backend(settings, width, height, Box::new(sink), Box::new(muxer)))
    }

    /// Start recording into a caller-provided sink and muxer
    pub fn with_backend(
        settings: RecorderSettings,
        width: u32,
        height: u32,
        sink: Box<dyn FrameSink>,
        muxer: Box<dyn Muxer>,
    ) -> Self {
        let (temp_video, temp_audio) = temp_paths(&settings.output_path);
        let queue = Arc::new(FrameQueue::new());
        let worker = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || run_worker(queue, sink))
        };
        log::info!(
            "[rec] Recording {}x{} to {} ({} capture)",
            width,
            height,
            settings.output_path.display(),
            settings.capture_mode.as_str()
        );
        Self {
            mixer: AudioMixer::new(settings.sample_rate, settings.fps),
            readback: Readback::new(settings.capture_mode),
            settings,
            width,
            height,
            queue,
            worker: Some(worker),
            muxer,
            temp_video,
            temp_audio,
            frames_captured: 0,
            stopped: false,
        }
    }

    pub fn is_recording(&self) -> bool {
        !self.stopped
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    pub fn mixer(&self) -> &AudioMixer {
        &self.mixer
    }

    pub fn temp_files(&self) -> (&Path, &Path) {
        (&self.temp_video, &self.temp_audio)
    }

    /// Read one frame from the render target and queue it
    pub fn capture_frame(&mut self, source: &dyn FrameSource) -> Result<(), CaptureError> {
        if self.stopped {
            return Err(CaptureError::AlreadyStopped);
        }
        let (w, h) = source.dimensions();
        if (w, h) != (self.width, self.height) {
            return Err(CaptureError::RenderTarget {
                width: w,
                height: h,
            });
        }
        self.frames_captured += 1;
        if let Some(frame) = self.readback.capture(source) {
            self.queue.push(frame);
        }
        Ok(())
    }

    /// Mix a sound at its trigger tick; ignored once stopped
    pub fn record_audio(&mut self, trigger: &AudioTrigger) {
        self.mixer
            .record_panned(trigger.tick, &trigger.samples, trigger.gain, trigger.pan);
    }

    /// Finish the recording; later calls do nothing and return `None`
    pub fn stop(&mut self) -> Result<Option<RecordingReport>, CaptureError> {
        if self.stopped {
            log::debug!("[rec] stop() called again, ignoring");
            return Ok(None);
        }
        self.stopped = true;
        log::info!("[rec] Stopping after {} frames", self.frames_captured);

        self.mixer.close();

        if let Some(frame) = self.readback.flush() {
            self.queue.push(frame);
        }
        self.queue.close();

        let outcome = match self.worker.take() {
            Some(handle) => handle.join().map_err(|_| CaptureError::WorkerPanicked)?,
            None => return Err(CaptureError::WorkerPanicked),
        };
        let written = outcome.written;
        outcome.sink.finish().map_err(CaptureError::EncoderIo)?;
        if let Some(e) = outcome.error {
            return Err(CaptureError::EncoderIo(e));
        }
        log::info!("[rec] Video stream closed ({} frames)", written);

        let pcm = self.mixer.finalize();
        write_pcm(&self.temp_audio, &pcm).map_err(CaptureError::AudioWrite)?;

        let output = self.settings.output_path.clone();
        if let Err(e) = self.muxer.mux(&self.temp_video, &self.temp_audio, &output) {
            log::error!(
                "[rec] Mux failed: {}. Keeping {} and {}",
                e,
                self.temp_video.display(),
                self.temp_audio.display()
            );
            return Err(e);
        }
        for temp in [&self.temp_video, &self.temp_audio] {
            if let Err(e) = std::fs::remove_file(temp) {
                log::debug!("[rec] Could not remove {}: {}", temp.display(), e);
            }
        }
        log::info!("[rec] Saved {}", output.display());

        Ok(Some(RecordingReport {
            output,
            frames_captured: self.frames_captured,
            frames_written: written,
            audio_events: self.mixer.event_count(),
        }))
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if !self.stopped {
            if let Err(e) = self.stop() {
                log::error!("[rec] Recording not finalized: {}", e);
            }
        }
    }
}
