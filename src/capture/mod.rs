//! Video capture
//!
//! Producer/consumer pipeline from the render target to an external encoder,
//! plus the final audio/video mux.

pub mod encoder;
pub mod queue;
pub mod readback;
pub mod recorder;

pub use encoder::{
    FfmpegMuxer, FfmpegSink, FrameSink, MemorySink, Muxer, RecordingMuxer, mux_args, video_args,
};
pub use queue::FrameQueue;
pub use readback::{FrameSource, Readback};
pub use recorder::{Recorder, RecordingReport, temp_paths};
