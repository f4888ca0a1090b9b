//! Fixed-step scheduler
//!
//! Converts wall-clock frame deltas into a whole number of simulation ticks.
//! Live mode accumulates leftover time across frames. Recording mode ignores
//! the clock entirely: one rendered frame is exactly one tick, so the video
//! time base never depends on host performance.

use crate::consts::{MAX_FRAME_DT, MAX_SUBSTEPS, SIM_DT};

/// How the current frame should be scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    Live,
    Recording,
    Paused,
}

/// Accumulator-based fixed timestep
#[derive(Debug, Clone)]
pub struct FixedStep {
    step: f32,
    accumulator: f32,
    max_substeps: u32,
}

impl Default for FixedStep {
    fn default() -> Self {
        Self::new(SIM_DT)
    }
}

impl FixedStep {
    pub fn new(step: f32) -> Self {
        Self {
            step,
            accumulator: 0.0,
            max_substeps: MAX_SUBSTEPS,
        }
    }

    /// The constant tick length
    pub fn step(&self) -> f32 {
        self.step
    }

    /// Leftover time carried into the next frame
    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }

    /// Number of ticks to run for a frame that took `dt` seconds
    pub fn advance(&mut self, dt: f32, mode: StepMode) -> u32 {
        match mode {
            StepMode::Paused => {
                // Clear so resuming does not burst through stored time
                self.accumulator = 0.0;
                0
            }
            StepMode::Recording => {
                self.accumulator = 0.0;
                1
            }
            StepMode::Live => {
                self.accumulator += dt.clamp(0.0, MAX_FRAME_DT);
                let mut ticks = 0;
                while self.accumulator >= self.step && ticks < self.max_substeps {
                    self.accumulator -= self.step;
                    ticks += 1;
                }
                if ticks == self.max_substeps && self.accumulator >= self.step {
                    log::debug!(
                        "Dropping {:.3}s of simulation time (frame too slow)",
                        self.accumulator
                    );
                    self.accumulator %= self.step;
                }
                ticks
            }
        }
    }
}
