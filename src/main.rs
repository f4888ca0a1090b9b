//! Chaos Racer headless runner
//!
//! Loads settings, an optional map and song, then runs the session at the
//! fixed step until the race ends or the time limit is hit.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;

use chaos_racer::consts::SIM_DT;
use chaos_racer::settings::CaptureMode;
use chaos_racer::{Session, Settings};

#[derive(Parser, Debug)]
#[command(
    name = "chaos-racer",
    version,
    about = "Race four bouncing racers through an arena and record the result"
)]
struct Cli {
    /// JSON settings file; missing file means defaults.
    #[arg(long, default_value = "settings.json")]
    settings: PathBuf,

    /// Level file to load before starting.
    #[arg(long)]
    map: Option<PathBuf>,

    /// Song file whose notes replace the wall tones.
    #[arg(long)]
    song: Option<PathBuf>,

    /// Output video path (overrides the settings file).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Stop after this many simulated seconds.
    #[arg(long, default_value_t = 60.0)]
    seconds: f32,

    /// Simulate without launching the encoder.
    #[arg(long)]
    no_record: bool,

    /// Use double-buffered frame readback.
    #[arg(long)]
    ping_pong: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut settings = Settings::load(&cli.settings)
        .with_context(|| format!("failed to read settings from {}", cli.settings.display()))?;
    if let Some(output) = cli.output {
        settings.recorder.output_path = output;
    }
    if cli.ping_pong {
        settings.recorder.capture_mode = CaptureMode::PingPong;
    }
    let fps = settings.recorder.fps.max(1);

    let mut session = Session::new(settings).context("failed to allocate render target")?;

    // Missing map or song is logged and the run continues with prior state
    if let Some(map) = &cli.map {
        if session.sim_mut().load_map(map).is_ok() {
            log::info!("Loaded map {}", map.display());
        }
    }
    if let Some(song) = &cli.song {
        if session.sim_mut().load_song(song).is_ok() {
            log::info!("Loaded song {}", song.display());
        }
    }

    if !cli.no_record {
        session
            .start_recording()
            .context("failed to start the video encoder")?;
    }

    let max_ticks = (cli.seconds.max(0.0) * fps as f32).round() as u64;
    let started = Instant::now();
    log::info!("Chaos Racer starting ({} ticks max)", max_ticks);

    while !session.sim().is_game_over() && session.sim().tick_count() < max_ticks {
        // Headless: every frame is exactly one fixed step of wall clock
        session.frame(SIM_DT).context("frame capture failed")?;
    }

    let sim = session.sim();
    match sim.winner() {
        Some(w) => log::info!("Racer {} wins after {} ticks", w, sim.tick_count()),
        None if sim.is_game_over() => log::info!("Game over, no winner"),
        None => log::info!("Time limit reached after {} ticks", sim.tick_count()),
    }
    if !sim.finish_order().is_empty() {
        log::info!("Finish order: {:?}", sim.finish_order());
    }

    let report = session
        .stop_recording()
        .context("failed to finalize recording")?
        .or_else(|| session.last_report().cloned());
    if let Some(report) = report {
        log::info!(
            "Wrote {} ({} frames, {} sounds)",
            report.output.display(),
            report.frames_written,
            report.audio_events
        );
    }
    log::info!("Done in {:.1}s", started.elapsed().as_secs_f32());
    Ok(())
}
