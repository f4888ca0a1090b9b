//! Procedural tone bank
//!
//! Every sound is generated at startup, no external files needed. A tone is a
//! short sine "ping" with an exponential decay envelope.

use std::collections::HashMap;

use crate::consts::{TONE_DECAY, TONE_DURATION};
use crate::sim::SoundCue;

/// C major scale, C4 to C5 (sound ids 1..=8)
pub const SCALE_FREQUENCIES: [f32; 8] = [
    261.63, 293.66, 329.63, 349.23, 392.00, 440.00, 493.88, 523.25,
];

/// Peak amplitude of a generated tone (full scale = 1.0)
pub const TONE_AMPLITUDE: f32 = 30_000.0 / 32_767.0;

/// Frequency of a MIDI note number (A4 = 69 = 440 Hz)
pub fn midi_to_frequency(note: u8) -> f32 {
    440.0 * 2f32.powf((note as f32 - 69.0) / 12.0)
}

/// Render one decaying sine ping
pub fn tone(frequency: f32, sample_rate: u32) -> Vec<f32> {
    let count = (sample_rate as f32 * TONE_DURATION) as usize;
    (0..count)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let wave = (std::f32::consts::TAU * frequency * t).sin();
            TONE_AMPLITUDE * wave * (-TONE_DECAY * t).exp()
        })
        .collect()
}

/// Cached sample buffers for every cue
#[derive(Debug, Clone)]
pub struct ToneBank {
    sample_rate: u32,
    scale: Vec<Vec<f32>>,
    notes: HashMap<u8, Vec<f32>>,
}

impl ToneBank {
    pub fn new(sample_rate: u32) -> Self {
        let scale = SCALE_FREQUENCIES
            .iter()
            .map(|&f| tone(f, sample_rate))
            .collect();
        log::debug!("Generated {} scale tones at {} Hz", SCALE_FREQUENCIES.len(), sample_rate);
        Self {
            sample_rate,
            scale,
            notes: HashMap::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples for a cue; song notes are rendered on first use
    pub fn samples(&mut self, cue: SoundCue) -> &[f32] {
        match cue {
            SoundCue::Tone(id) => {
                let index = (id.clamp(1, 8) - 1) as usize;
                self.scale[index].as_slice()
            }
            SoundCue::Note(note) => {
                let sample_rate = self.sample_rate;
                self.notes
                    .entry(note)
                    .or_insert_with(|| tone(midi_to_frequency(note), sample_rate))
                    .as_slice()
            }
        }
    }
}
