//! Frame readback from the render target
//!
//! `Direct` copies the current frame out every call. `PingPong` alternates
//! between two buffers: each call requests this frame into one buffer and
//! hands out the previous frame from the other, so output lags by one frame.
//! The first call yields nothing; `flush` hands out the last pending frame.

use crate::settings::CaptureMode;

/// Anything that can hand out RGBA pixels
pub trait FrameSource {
    fn dimensions(&self) -> (u32, u32);

    /// Copy the current frame into `out` (resized as needed)
    fn read_pixels(&self, out: &mut Vec<u8>);
}

#[derive(Debug, Clone)]
pub struct Readback {
    mode: CaptureMode,
    buffers: [Vec<u8>; 2],
    /// Buffer the next request writes into
    write_index: usize,
    /// A requested frame that has not been handed out yet
    pending: bool,
}

impl Readback {
    pub fn new(mode: CaptureMode) -> Self {
        Self {
            mode,
            buffers: [Vec::new(), Vec::new()],
            write_index: 0,
            pending: false,
        }
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    /// Whether a frame is still in flight
    pub fn has_pending(&self) -> bool {
        self.pending
    }

    /// Read this frame; returns the frame ready for encoding, if any
    pub fn capture(&mut self, source: &dyn FrameSource) -> Option<Vec<u8>> {
        match self.mode {
            CaptureMode::Direct => {
                let mut frame = Vec::new();
                source.read_pixels(&mut frame);
                Some(frame)
            }
            CaptureMode::PingPong => {
                let write = self.write_index;
                let read = 1 - write;
                source.read_pixels(&mut self.buffers[write]);
                let ready = self.pending.then(|| self.buffers[read].clone());
                if ready.is_none() {
                    log::debug!("[rec] First ping-pong read, nothing to hand out yet");
                }
                self.pending = true;
                self.write_index = read;
                ready
            }
        }
    }

    /// Hand out the frame still in flight
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        if !self.pending {
            return None;
        }
        self.pending = false;
        let last = 1 - self.write_index;
        Some(std::mem::take(&mut self.buffers[last]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Counter {
        next: Cell<u8>,
    }

    impl FrameSource for Counter {
        fn dimensions(&self) -> (u32, u32) {
            (1, 1)
        }

        fn read_pixels(&self, out: &mut Vec<u8>) {
            let v = self.next.get();
            self.next.set(v + 1);
            out.clear();
            out.extend_from_slice(&[v, v, v, 255]);
        }
    }

    #[test]
    fn test_direct_returns_every_frame() {
        let src = Counter { next: Cell::new(0) };
        let mut rb = Readback::new(CaptureMode::Direct);
        assert_eq!(rb.capture(&src).unwrap()[0], 0);
        assert_eq!(rb.capture(&src).unwrap()[0], 1);
        assert_eq!(rb.flush(), None);
    }

    #[test]
    fn test_ping_pong_lags_one_frame_and_flushes() {
        let src = Counter { next: Cell::new(0) };
        let mut rb = Readback::new(CaptureMode::PingPong);
        assert_eq!(rb.capture(&src), None);
        assert_eq!(rb.capture(&src).unwrap()[0], 0);
        assert_eq!(rb.capture(&src).unwrap()[0], 1);
        assert_eq!(rb.flush().unwrap()[0], 2);
        assert_eq!(rb.flush(), None);
    }
}
