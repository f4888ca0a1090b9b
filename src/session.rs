//! Frame loop glue
//!
//! One `frame` call: schedule ticks, step the simulation, route sound events
//! to the recorder at the tick that produced them, render, then capture.
//! While recording, video frame N and audio offset N both belong to the Nth
//! tick after recording started; frames where the sim did not advance are
//! not captured.

use crate::audio::AudioRouter;
use crate::capture::{FrameSink, Muxer, Recorder, RecordingReport};
use crate::error::CaptureError;
use crate::render::{Canvas, Renderer};
use crate::settings::{RecorderSettings, Settings};
use crate::sim::{FixedStep, GamePhase, Simulation, StepMode};

#[derive(Debug)]
pub struct Session {
    sim: Simulation,
    scheduler: FixedStep,
    router: AudioRouter,
    renderer: Renderer,
    recorder_settings: RecorderSettings,
    recorder: Option<Recorder>,
    /// Sim tick that became video frame 0
    recording_start_tick: u64,
    last_report: Option<RecordingReport>,
}

impl Session {
    /// Build the simulation and allocate the render target
    pub fn new(settings: Settings) -> Result<Self, CaptureError> {
        let Settings {
            sim,
            tunables,
            recorder,
        } = settings;
        let renderer = Renderer::new(sim.width_px, sim.height_px, sim.pixels_per_meter)?;
        Ok(Self {
            sim: Simulation::new(sim, tunables),
            scheduler: FixedStep::default(),
            router: AudioRouter::new(recorder.sample_rate),
            renderer,
            recorder_settings: recorder,
            recorder: None,
            recording_start_tick: 0,
            last_report: None,
        })
    }

    pub fn sim(&self) -> &Simulation {
        &self.sim
    }

    pub fn sim_mut(&mut self) -> &mut Simulation {
        &mut self.sim
    }

    pub fn audio(&mut self) -> &mut AudioRouter {
        &mut self.router
    }

    pub fn canvas(&self) -> &Canvas {
        self.renderer.canvas()
    }

    pub fn recorder_settings(&self) -> &RecorderSettings {
        &self.recorder_settings
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.as_ref().is_some_and(Recorder::is_recording)
    }

    pub fn recorder(&self) -> Option<&Recorder> {
        self.recorder.as_ref()
    }

    /// Report of the most recent finished recording
    pub fn last_report(&self) -> Option<&RecordingReport> {
        self.last_report.as_ref()
    }

    /// Start recording through the external encoder
    pub fn start_recording(&mut self) -> Result<(), CaptureError> {
        if self.is_recording() {
            log::warn!("[rec] Already recording");
            return Ok(());
        }
        let (w, h) = (self.canvas().width(), self.canvas().height());
        self.recorder = Some(Recorder::start(self.recorder_settings.clone(), w, h)?);
        self.recording_start_tick = self.sim.tick_count();
        self.scheduler.reset();
        Ok(())
    }

    /// Start recording into a caller-provided sink and muxer
    pub fn start_recording_with(&mut self, sink: Box<dyn FrameSink>, muxer: Box<dyn Muxer>) {
        if self.is_recording() {
            log::warn!("[rec] Already recording");
            return;
        }
        let (w, h) = (self.canvas().width(), self.canvas().height());
        self.recorder = Some(Recorder::with_backend(
            self.recorder_settings.clone(),
            w,
            h,
            sink,
            muxer,
        ));
        self.recording_start_tick = self.sim.tick_count();
        self.scheduler.reset();
    }

    /// Finalize the current recording, if any
    pub fn stop_recording(&mut self) -> Result<Option<RecordingReport>, CaptureError> {
        let Some(mut recorder) = self.recorder.take() else {
            return Ok(None);
        };
        let report = recorder.stop()?;
        if let Some(r) = &report {
            self.last_report = Some(r.clone());
        }
        Ok(report)
    }

    fn step_mode(&self) -> StepMode {
        if self.sim.phase() == GamePhase::Paused {
            StepMode::Paused
        } else if self.is_recording() {
            StepMode::Recording
        } else {
            StepMode::Live
        }
    }

    /// Advance by one rendered frame that took `dt` seconds of wall clock.
    /// Returns the number of ticks simulated. A recording is finalized on the
    /// frame the session ends.
    pub fn frame(&mut self, dt: f32) -> Result<u32, CaptureError> {
        let scheduled = self.scheduler.advance(dt, self.step_mode());
        let step = self.scheduler.step();
        let before = self.sim.tick_count();
        for _ in 0..scheduled {
            let tick = self.sim.tick_count();
            self.sim.step(step);
            let events = self.sim.drain_events();
            let offset = tick.saturating_sub(self.recording_start_tick);
            let triggers = self.router.route(offset, &events);
            if let Some(recorder) = self.recorder.as_mut() {
                for trigger in &triggers {
                    recorder.record_audio(trigger);
                }
            }
        }
        let ticks = (self.sim.tick_count() - before) as u32;
        if ticks == 0 {
            self.sim.update_wall_visuals(dt);
        }

        self.renderer.draw(&self.sim);
        if let Some(recorder) = self.recorder.as_mut().filter(|_| ticks > 0) {
            recorder.capture_frame(self.renderer.canvas())?;
        }

        if self.sim.is_game_over() && self.recorder.is_some() {
            log::info!("Game over, finalizing recording");
            self.stop_recording()?;
        }
        Ok(ticks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    use crate::audio::AudioMixer;
    use crate::capture::{MemorySink, RecordingMuxer};
    use crate::settings::SimConfig;
    use crate::sim::{ContactEvent, SoundCue, WallDef, WallRef};

    fn small_settings(name: &str) -> Settings {
        let dir = std::env::temp_dir()
            .join(format!("chaos_racer_session_{}_{}", std::process::id(), name));
        std::fs::create_dir_all(&dir).unwrap();
        let mut settings = Settings::default();
        settings.sim = SimConfig {
            width_px: 240,
            height_px: 240,
            pixels_per_meter: 10.0,
            win_zone_pos: Vec2::new(12.0, 3.0),
            ..SimConfig::default()
        };
        settings.recorder.output_path = dir.join("race.mp4");
        settings
    }

    #[test]
    fn test_live_frames_accumulate() {
        let mut session = Session::new(small_settings("live")).unwrap();
        let step = session.scheduler.step();
        assert_eq!(session.frame(step * 0.5).unwrap(), 0);
        assert_eq!(session.frame(step * 0.6).unwrap(), 1);
        assert_eq!(session.sim().tick_count(), 1);
    }

    #[test]
    fn test_recording_captures_one_frame_per_tick() {
        let mut session = Session::new(small_settings("rec")).unwrap();
        let sink = MemorySink::new();
        let muxer = RecordingMuxer::new();
        session.start_recording_with(Box::new(sink.clone()), Box::new(muxer.clone()));
        assert!(session.is_recording());

        for _ in 0..10 {
            // wall-clock time is ignored while recording
            assert_eq!(session.frame(0.5).unwrap(), 1);
        }
        let report = session.stop_recording().unwrap().unwrap();
        assert_eq!(report.frames_captured, 10);
        assert_eq!(report.frames_written, 10);
        assert_eq!(sink.frame_count(), 10);
        assert_eq!(sink.frames()[0].len(), 240 * 240 * 4);
        assert_eq!(muxer.calls().len(), 1);
        assert_eq!(session.sim().tick_count(), 10);
        assert!(session.stop_recording().unwrap().is_none());
    }

    /// Racers never reach the goal, so the session keeps running
    fn open_session(name: &str) -> (Session, u32) {
        let mut settings = small_settings(name);
        settings.sim.win_zone_pos = Vec2::new(-10.0, -10.0);
        let mut session = Session::new(settings).unwrap();
        let idx = session
            .sim_mut()
            .add_wall(WallDef::rect(Vec2::new(12.0, 20.0), Vec2::new(2.0, 0.5)).with_sound(4));
        let id = session.sim().walls()[idx].id;
        (session, id)
    }

    fn hit_wall(session: &mut Session, wall: u32) {
        session.sim_mut().inject_contact(ContactEvent::WallHit {
            racer: 0,
            wall: WallRef::Custom(wall),
            point: Vec2::new(12.0, 19.75),
            normal: Vec2::new(0.0, -1.0),
        });
    }

    fn first_sound(mixer: &AudioMixer) -> Option<usize> {
        (0..mixer.len_frames()).find(|&i| mixer.frame(i).is_some_and(|f| f != [0.0, 0.0]))
    }

    /// Leading silent samples of the wall's tone
    fn tone_lead(session: &mut Session) -> usize {
        let tone = session.audio().trigger(0, SoundCue::Tone(4), 1.0, 0.0);
        tone.samples.iter().position(|&s| s != 0.0).unwrap()
    }

    #[test]
    fn test_recording_started_mid_session_starts_audio_at_zero() {
        let (mut session, wall) = open_session("midway");
        for _ in 0..120 {
            session.frame(crate::consts::SIM_DT).unwrap();
        }
        assert!(session.sim().tick_count() > 100);
        let lead = tone_lead(&mut session);

        session.start_recording_with(Box::new(MemorySink::new()), Box::new(RecordingMuxer::new()));
        hit_wall(&mut session, wall);
        assert_eq!(session.frame(crate::consts::SIM_DT).unwrap(), 1);

        let recorder = session.recorder().unwrap();
        assert_eq!(recorder.frames_captured(), 1);
        assert_eq!(first_sound(recorder.mixer()), Some(lead));
    }

    #[test]
    fn test_paused_frames_are_not_recorded() {
        let (mut session, wall) = open_session("paused_rec");
        let lead = tone_lead(&mut session);
        let sink = MemorySink::new();
        session.start_recording_with(Box::new(sink.clone()), Box::new(RecordingMuxer::new()));

        assert_eq!(session.frame(0.5).unwrap(), 1);
        session.sim_mut().pause();
        for _ in 0..30 {
            assert_eq!(session.frame(0.5).unwrap(), 0);
        }
        session.sim_mut().resume();
        hit_wall(&mut session, wall);
        assert_eq!(session.frame(0.5).unwrap(), 1);

        // the hit is on video frame 1, so its audio starts one tick in
        let recorder = session.recorder().unwrap();
        assert_eq!(recorder.frames_captured(), 2);
        let offset = crate::audio::mixer::sample_offset(1, 44_100, 60);
        assert_eq!(first_sound(recorder.mixer()), Some(offset + lead));

        let report = session.stop_recording().unwrap().unwrap();
        assert_eq!(report.frames_written, 2);
        assert_eq!(sink.frame_count(), 2);
        assert_eq!(session.sim().tick_count(), 2);
    }

    #[test]
    fn test_paused_session_does_not_tick() {
        let mut session = Session::new(small_settings("pause")).unwrap();
        session.sim_mut().pause();
        assert_eq!(session.frame(0.1).unwrap(), 0);
        assert_eq!(session.sim().tick_count(), 0);
    }
}
