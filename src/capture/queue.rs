//! Frame queue between the render loop and the encoder worker
//!
//! FIFO guarded by a mutex with a condition variable for wake-on-data and
//! wake-on-close. `pop` blocks while the queue is empty and open; after
//! `close` it keeps returning queued frames until the queue is drained.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct QueueState {
    frames: VecDeque<Vec<u8>>,
    closed: bool,
    pushed: u64,
}

#[derive(Debug, Default)]
pub struct FrameQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a frame; returns false once the queue is closed
    pub fn push(&self, frame: Vec<u8>) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.frames.push_back(frame);
        state.pushed += 1;
        drop(state);
        self.ready.notify_one();
        true
    }

    /// Block until a frame is available; `None` once closed and drained
    pub fn pop(&self) -> Option<Vec<u8>> {
        let mut state = self.lock();
        loop {
            if let Some(frame) = state.frames.pop_front() {
                return Some(frame);
            }
            if state.closed {
                return None;
            }
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// No more work: wake the consumer so it can drain and exit
    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Frames currently waiting
    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames accepted since creation
    pub fn pushed(&self) -> u64 {
        self.lock().pushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let q = FrameQueue::new();
        q.push(vec![1]);
        q.push(vec![2]);
        q.close();
        assert_eq!(q.pop(), Some(vec![1]));
        assert_eq!(q.pop(), Some(vec![2]));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn test_push_after_close_rejected() {
        let q = FrameQueue::new();
        q.close();
        assert!(!q.push(vec![0]));
        assert_eq!(q.pushed(), 0);
    }

    #[test]
    fn test_consumer_drains_everything_before_exit() {
        let q = Arc::new(FrameQueue::new());
        let consumer = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                let mut seen = Vec::new();
                while let Some(frame) = q.pop() {
                    seen.push(frame[0]);
                }
                seen
            })
        };
        for i in 0..200u8 {
            q.push(vec![i]);
        }
        q.close();
        let seen = consumer.join().unwrap();
        assert_eq!(seen, (0..200u8).collect::<Vec<_>>());
    }
}
