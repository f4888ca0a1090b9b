//! Audio system
//!
//! Procedurally generated tones, no external files needed. Sound events from
//! the simulation are turned into sample buffers here and handed to the
//! capture mixer with their trigger tick.

pub mod mixer;
pub mod synth;

pub use mixer::{AudioMixer, normalization_gain, pan_gains, sample_offset, write_pcm};
pub use synth::{SCALE_FREQUENCIES, ToneBank, midi_to_frequency, tone};

use crate::sim::{SimEvent, SoundCue};

/// A sound ready for the mixer: its own samples, gain, pan and trigger tick
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrigger {
    pub tick: u64,
    pub samples: Vec<f32>,
    pub gain: f32,
    pub pan: f32,
}

/// Turns simulation sound events into mixer triggers
#[derive(Debug, Clone)]
pub struct AudioRouter {
    bank: ToneBank,
    master_volume: f32,
    muted: bool,
}

impl AudioRouter {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            bank: ToneBank::new(sample_rate),
            master_volume: 0.8,
            muted: false,
        }
    }

    /// Set master volume (0.0 - 1.0)
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, 1.0);
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Build the trigger for one cue
    pub fn trigger(&mut self, tick: u64, cue: SoundCue, gain: f32, pan: f32) -> AudioTrigger {
        AudioTrigger {
            tick,
            samples: self.bank.samples(cue).to_vec(),
            gain: gain * self.master_volume,
            pan,
        }
    }

    /// Triggers for every sound event produced during `tick`
    pub fn route(&mut self, tick: u64, events: &[SimEvent]) -> Vec<AudioTrigger> {
        if self.muted {
            return Vec::new();
        }
        events
            .iter()
            .filter_map(|e| match *e {
                SimEvent::Sound { cue, gain, pan } => Some(self.trigger(tick, cue, gain, pan)),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_only_sound_events() {
        let mut router = AudioRouter::new(8_000);
        router.set_master_volume(1.0);
        let events = vec![
            SimEvent::ChaosKick { racer: 0 },
            SimEvent::Sound {
                cue: SoundCue::Tone(2),
                gain: 1.5,
                pan: -0.5,
            },
        ];
        let triggers = router.route(42, &events);
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].tick, 42);
        assert_eq!(triggers[0].gain, 1.5);
        assert_eq!(triggers[0].samples.len(), 2_400);
    }

    #[test]
    fn test_muted_router_is_silent() {
        let mut router = AudioRouter::new(8_000);
        router.set_muted(true);
        let events = vec![SimEvent::Sound {
            cue: SoundCue::Tone(1),
            gain: 1.0,
            pan: 0.0,
        }];
        assert!(router.route(0, &events).is_empty());
    }
}
