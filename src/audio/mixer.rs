//! Sample-accurate capture mixer
//!
//! Sounds are placed on a stereo float timeline at the sample offset of the
//! tick that triggered them and summed additively. Nothing is clipped until
//! `finalize`, which applies one global gain to the whole mix and converts it
//! to interleaved 16-bit PCM.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::consts::{MAX_NORMALIZE_BOOST, NORMALIZE_CEILING, NORMALIZE_FLOOR, OUTPUT_CHANNELS};

const CHANNELS: usize = OUTPUT_CHANNELS as usize;

/// Absolute sample (frame) offset of a tick: `tick * sample_rate / fps`, floored
pub fn sample_offset(tick: u64, sample_rate: u32, fps: u32) -> usize {
    (tick * sample_rate as u64 / fps.max(1) as u64) as usize
}

/// Per-channel gains for a pan in `-1..=1`; centre keeps full level on both sides
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    ((1.0 - pan).min(1.0), (1.0 + pan).min(1.0))
}

/// Single gain applied to the whole mix at finalization
pub fn normalization_gain(peak: f32) -> f32 {
    if peak <= f32::EPSILON {
        1.0
    } else if peak > NORMALIZE_CEILING {
        NORMALIZE_CEILING / peak
    } else if peak < NORMALIZE_FLOOR {
        (NORMALIZE_CEILING / peak).min(MAX_NORMALIZE_BOOST)
    } else {
        1.0
    }
}

/// Float-domain timeline
#[derive(Debug, Clone)]
pub struct AudioMixer {
    sample_rate: u32,
    fps: u32,
    /// Interleaved stereo frames
    timeline: Vec<f32>,
    accepting: bool,
    events: usize,
}

impl AudioMixer {
    pub fn new(sample_rate: u32, fps: u32) -> Self {
        Self {
            sample_rate,
            fps,
            timeline: Vec::new(),
            accepting: true,
            events: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Timeline length in frames
    pub fn len_frames(&self) -> usize {
        self.timeline.len() / CHANNELS
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    /// Number of events mixed in so far
    pub fn event_count(&self) -> usize {
        self.events
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting
    }

    /// Refuse further events
    pub fn close(&mut self) {
        self.accepting = false;
    }

    /// Mix a centred mono sound starting at `tick`
    pub fn record_event(&mut self, tick: u64, samples: &[f32], gain: f32) {
        self.record_panned(tick, samples, gain, 0.0);
    }

    /// Mix a mono sound at `tick` with a stereo pan
    pub fn record_panned(&mut self, tick: u64, samples: &[f32], gain: f32, pan: f32) {
        if !self.accepting || samples.is_empty() {
            return;
        }
        let start = sample_offset(tick, self.sample_rate, self.fps);
        let end = (start + samples.len()) * CHANNELS;
        if self.timeline.len() < end {
            self.timeline.resize(end, 0.0);
        }
        let (left, right) = pan_gains(pan);
        let frames = self.timeline[start * CHANNELS..end].chunks_exact_mut(CHANNELS);
        for (frame, &s) in frames.zip(samples) {
            frame[0] += s * gain * left;
            frame[1] += s * gain * right;
        }
        self.events += 1;
    }

    /// Raw (pre-normalization) frame at `index`
    pub fn frame(&self, index: usize) -> Option<[f32; 2]> {
        let i = index * CHANNELS;
        Some([*self.timeline.get(i)?, *self.timeline.get(i + 1)?])
    }

    /// Largest absolute sample
    pub fn peak(&self) -> f32 {
        self.timeline.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    /// Stop accepting events and produce interleaved 16-bit stereo PCM
    pub fn finalize(&mut self) -> Vec<i16> {
        self.accepting = false;
        let peak = self.peak();
        let gain = normalization_gain(peak);
        log::info!(
            "[rec] Audio: {} events, {} frames, peak {:.3}, gain {:.3}",
            self.events,
            self.len_frames(),
            peak,
            gain
        );
        self.timeline
            .iter()
            .map(|s| ((s * gain).clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .collect()
    }
}

/// Write interleaved samples as raw little-endian PCM
pub fn write_pcm(path: &Path, samples: &[i16]) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    #[cfg(target_endian = "little")]
    out.write_all(bytemuck::cast_slice(samples))?;
    #[cfg(target_endian = "big")]
    for s in samples {
        out.write_all(&s.to_le_bytes())?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_offset_at_sixty_fps() {
        assert_eq!(sample_offset(0, 44_100, 60), 0);
        assert_eq!(sample_offset(1, 44_100, 60), 735);
        assert_eq!(sample_offset(60, 44_100, 60), 44_100);
        // 48 kHz at 7 fps does not divide evenly: floor
        assert_eq!(sample_offset(1, 48_000, 7), 6_857);
    }

    #[test]
    fn test_event_lands_at_tick_offset() {
        let mut mixer = AudioMixer::new(44_100, 60);
        mixer.record_event(10, &[0.5, 0.25], 1.0);
        assert_eq!(mixer.len_frames(), 7_352);
        assert_eq!(mixer.frame(7_349), Some([0.0, 0.0]));
        assert_eq!(mixer.frame(7_350), Some([0.5, 0.5]));
        assert_eq!(mixer.frame(7_351), Some([0.25, 0.25]));
    }

    #[test]
    fn test_overlapping_events_sum_without_clipping() {
        let mut mixer = AudioMixer::new(44_100, 60);
        let a = vec![0.7f32; 100];
        mixer.record_event(3, &a, 1.0);
        mixer.record_event(3, &a, 1.0);
        let [l, r] = mixer.frame(sample_offset(3, 44_100, 60) + 50).unwrap();
        assert!((l - 1.4).abs() < 1e-6);
        assert!((r - 1.4).abs() < 1e-6);
    }

    #[test]
    fn test_normalization_scales_by_ceiling_over_peak() {
        let mut mixer = AudioMixer::new(1_000, 10);
        mixer.record_event(0, &[2.0, -1.0, 0.5], 1.0);
        let pcm = mixer.finalize();
        let scale = NORMALIZE_CEILING / 2.0;
        let expect = |v: f32| ((v * scale) * i16::MAX as f32) as i16;
        assert_eq!(pcm, vec![expect(2.0), expect(2.0), expect(-1.0), expect(-1.0), expect(0.5), expect(0.5)]);
        let peak = pcm.iter().map(|s| s.unsigned_abs()).max().unwrap();
        assert!(peak as f32 <= NORMALIZE_CEILING * i16::MAX as f32 + 1.0);
    }

    #[test]
    fn test_quiet_mix_is_boosted_with_cap() {
        assert!((normalization_gain(0.5) - 1.0).abs() < 1e-6);
        assert!((normalization_gain(0.2) - NORMALIZE_CEILING / 0.2).abs() < 1e-5);
        assert_eq!(normalization_gain(0.01), MAX_NORMALIZE_BOOST);
        assert_eq!(normalization_gain(0.0), 1.0);
    }

    #[test]
    fn test_closed_mixer_ignores_events() {
        let mut mixer = AudioMixer::new(44_100, 60);
        mixer.close();
        mixer.record_event(0, &[1.0], 1.0);
        assert!(mixer.is_empty());
        assert_eq!(mixer.event_count(), 0);
    }

    #[test]
    fn test_pan_law() {
        assert_eq!(pan_gains(0.0), (1.0, 1.0));
        assert_eq!(pan_gains(-1.0), (1.0, 0.0));
        assert_eq!(pan_gains(1.0), (0.0, 1.0));
    }

    #[test]
    fn test_write_pcm_little_endian() {
        let path = std::env::temp_dir().join(format!("chaos_racer_pcm_{}.raw", std::process::id()));
        write_pcm(&path, &[1, -2, 0x1234, i16::MIN]).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(bytes, vec![1, 0, 0xfe, 0xff, 0x34, 0x12, 0x00, 0x80]);
    }

    proptest! {
        #[test]
        fn prop_event_placed_at_floor_offset(tick in 0u64..5_000, fps in 1u32..240) {
            let mut mixer = AudioMixer::new(44_100, fps);
            mixer.record_event(tick, &[1.0], 0.5);
            let offset = ((tick * 44_100) as f64 / fps as f64).floor() as usize;
            prop_assert_eq!(mixer.frame(offset), Some([0.5, 0.5]));
            prop_assert_eq!(mixer.len_frames(), offset + 1);
        }
    }
}
