// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::collections::HashSet;
use std::env;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use beatdrop::sequencer::VoiceHandle;
use beatdrop::timing::{FrameTimer, DEFAULT_TICK_RATE};
use beatdrop::{
    AudioClock, AudioError, AudioSink, BeatSchedule, ClockSource, Collaborators, Engine,
    EngineConfig, LevelPack, LevelParameters, ManualClock, ObjectHandle, RunObserver, RunStart,
    RunSummary, SceneSink, ScoreDisplay,
};

/// Seconds a clip keeps its voice busy
const CLIP_LENGTH: f64 = 0.5;
/// Voices the demo sink can play at once
const VOICES: usize = 4;

fn print_usage() {
    println!("BEATDROP - Beat synchronization and scoring engine");
    println!();
    println!("Usage: beatdrop [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --schedule <INTERVAL> <LENGTH> [DELAY]  Print the beat schedule for the given timing");
    println!("  --simulate [OPTIONS]                    Run a level headless with a simulated player");
    println!("  --realtime [OPTIONS]                    Run a level in real time with a simulated player");
    println!("  --write-levels <FILE>                   Write a default level pack to FILE (YAML)");
    println!("  --help                                  Show this help message");
    println!();
    println!("Run options:");
    println!("  --config <FILE>     Engine config (.yaml, .yml or .toml)");
    println!("  --levels <FILE>     Level pack (.yaml, .yml or .toml)");
    println!("  --level <N>         Level number in the pack (default 1)");
    println!("  --accuracy <P>      Chance the player presses for a beat, 0..1 (default 0.9)");
    println!("  --jitter <SECONDS>  Largest timing error of a press (default 0.25)");
    println!("  --seed <N>          Seed for the simulated player");
    println!();
    println!("Set RUST_LOG=debug for per-beat logging.");
}

/// Audio sink with a small voice pool, playing nothing
struct PooledAudio<C: ClockSource> {
    clock: C,
    clips: HashSet<String>,
    /// Start time of every voice handed out
    voices: Vec<f64>,
}

impl<C: ClockSource> PooledAudio<C> {
    fn new(clock: C, clips: &[String]) -> Self {
        Self {
            clock,
            clips: clips.iter().cloned().collect(),
            voices: Vec::new(),
        }
    }

    fn busy_at(&self, t: f64) -> usize {
        self.voices
            .iter()
            .filter(|&&start| start < t + CLIP_LENGTH && t < start + CLIP_LENGTH)
            .count()
    }
}

impl<C: ClockSource> AudioSink for PooledAudio<C> {
    fn schedule_clip(&mut self, clip: &str, at: f64) -> std::result::Result<VoiceHandle, AudioError> {
        if !self.clips.contains(clip) {
            return Err(AudioError::UnknownClip(clip.to_string()));
        }
        if self.busy_at(at) >= VOICES {
            return Err(AudioError::NoVoiceAvailable);
        }
        self.voices.push(at);
        debug!(clip, at, "voice reserved");
        Ok(VoiceHandle(self.voices.len() as u64 - 1))
    }

    fn is_playing(&self, voice: VoiceHandle) -> bool {
        let now = self.clock.now();
        self.voices
            .get(voice.0 as usize)
            .map_or(false, |&start| start <= now && now < start + CLIP_LENGTH)
    }

    fn cancel_all(&mut self) {
        self.voices.clear();
    }
}

/// Scene that only counts objects
#[derive(Default)]
struct CountingScene {
    live: HashSet<u64>,
    next: u64,
}

impl SceneSink for CountingScene {
    fn spawn_object(&mut self, _position: f64) -> Option<ObjectHandle> {
        self.next += 1;
        self.live.insert(self.next);
        Some(ObjectHandle(self.next))
    }

    fn set_position(&mut self, _handle: ObjectHandle, _position: f64) {}

    fn destroy(&mut self, handle: ObjectHandle) {
        self.live.remove(&handle.0);
    }
}

struct ConsoleDisplay {
    echo: bool,
}

impl ScoreDisplay for ConsoleDisplay {
    fn set_score_text(&mut self, text: &str) {
        if self.echo {
            println!("{}", text);
        }
    }
}

struct ConsoleObserver;

impl RunObserver for ConsoleObserver {
    fn on_streak(&mut self, length: u32) {
        println!("*** {} in a row! ***", length);
    }

    fn on_threshold_reached(&mut self, total: i64) {
        println!("Level passed at {} points", total);
    }

    fn on_run_finished(&mut self, summary: &RunSummary) {
        print_summary(summary);
    }

    fn on_idle(&mut self, idle_for: f64) {
        println!("(idle for {:.1}s)", idle_for);
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("Run complete");
    println!("  Beats:          {}", summary.beats);
    println!("  Perfect:        {}", summary.tally.perfect);
    println!("  Missed presses: {}", summary.tally.miss);
    println!("  Passive misses: {}", summary.tally.passive_miss);
    println!("  Accuracy:       {:.1}%", summary.tally.accuracy() * 100.0);
    println!("  Streaks:        {}", summary.streaks);
    println!("  Dropped audio:  {}", summary.dropped_audio);
    println!("  Final score:    {}", summary.score);
    println!(
        "  Threshold:      {}",
        if summary.threshold_reached { "reached" } else { "not reached" }
    );
}

/// Options shared by the run commands
struct RunOptions {
    config: EngineConfig,
    level: LevelParameters,
    accuracy: f64,
    jitter: f64,
    seed: Option<u64>,
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> Result<T> {
    let raw = args
        .get(i)
        .ok_or_else(|| anyhow!("{} requires a value", flag))?;
    raw.parse()
        .map_err(|_| anyhow!("Invalid value for {}: {}", flag, raw))
}

fn parse_finite(args: &[String], i: usize, flag: &str) -> Result<f64> {
    let value: f64 = parse_value(args, i, flag)?;
    if !value.is_finite() {
        return Err(anyhow!("{} must be a finite number, got {}", flag, value));
    }
    Ok(value)
}

fn parse_run_options(args: &[String]) -> Result<RunOptions> {
    let mut config = EngineConfig::default();
    let mut pack: Option<LevelPack> = None;
    let mut level_number = 1usize;
    let mut accuracy = 0.9;
    let mut jitter = 0.25;
    let mut seed = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                let path = parse_value::<String>(args, i + 1, "--config")?;
                config = EngineConfig::load(&path)?;
                i += 1;
            }
            "--levels" => {
                let path = parse_value::<String>(args, i + 1, "--levels")?;
                pack = Some(LevelPack::load(&path)?);
                i += 1;
            }
            "--level" => {
                level_number = parse_value(args, i + 1, "--level")?;
                i += 1;
            }
            "--accuracy" => {
                accuracy = parse_finite(args, i + 1, "--accuracy")?.clamp(0.0, 1.0);
                i += 1;
            }
            "--jitter" => {
                jitter = parse_finite(args, i + 1, "--jitter")?.abs();
                i += 1;
            }
            "--seed" => {
                seed = Some(parse_value(args, i + 1, "--seed")?);
                i += 1;
            }
            other => return Err(anyhow!("Unknown option: {}", other)),
        }
        i += 1;
    }

    if config.audio.clip_names.is_empty() {
        config.audio.clip_names = ["kick", "snare", "clap", "hat"]
            .iter()
            .map(|s| s.to_string())
            .collect();
    }

    let level = match pack {
        Some(pack) => *level_number
            .checked_sub(1)
            .and_then(|i| pack.level(i))
            .ok_or_else(|| anyhow!("Level {} not in pack ({} levels)", level_number, pack.len()))?,
        None => LevelParameters {
            total_length: 20.0,
            ..Default::default()
        },
    };

    Ok(RunOptions {
        config,
        level,
        accuracy,
        jitter,
        seed,
    })
}

/// Press times of a simulated player, in order
fn plan_presses(schedule: &BeatSchedule, options: &RunOptions) -> Vec<f64> {
    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut presses: Vec<f64> = schedule
        .timestamps()
        .into_iter()
        .filter_map(|t| {
            if !rng.gen_bool(options.accuracy) {
                None
            } else if options.jitter > 0.0 {
                Some(t + rng.gen_range(-options.jitter..=options.jitter))
            } else {
                Some(t)
            }
        })
        .collect();
    presses.sort_by(|a, b| a.total_cmp(b));
    presses
}

fn print_schedule(interval: f64, length: f64, delay: f64) -> Result<()> {
    let schedule = BeatSchedule::generate(delay, interval, length, 0.0)
        .context("Failed to generate schedule")?;

    println!(
        "{} beats (delay {}s, interval {}s, length {}s)",
        schedule.len(),
        delay,
        interval,
        length
    );
    for beat in schedule.beats() {
        println!("  {:>4}  {:>10.4}", beat.index, beat.timestamp);
    }
    Ok(())
}

fn simulate(options: RunOptions) -> Result<()> {
    let clock = ManualClock::new(0.0);
    let collaborators = Collaborators::new()
        .with_audio(PooledAudio::new(clock.clone(), &options.config.audio.clip_names))
        .with_scene(CountingScene::default())
        .with_display(ConsoleDisplay { echo: false })
        .with_observer(ConsoleObserver);
    let mut engine = Engine::new(options.config.clone(), Box::new(clock.clone()), collaborators)?;

    if engine.start_run(&options.level)? == RunStart::Empty {
        println!("Level has no beats");
        return Ok(());
    }
    println!("Simulating {} beats...", engine.schedule().len());

    let presses = plan_presses(engine.schedule(), &options);
    let mut next_press = 0;
    let dt = 1.0 / DEFAULT_TICK_RATE;
    let deadline = engine.schedule().last_timestamp().unwrap_or(0.0)
        + options.level.extra_fall_time
        + 10.0;

    while !engine.is_finished() && clock.now() < deadline {
        clock.advance(dt);
        let now = clock.now();
        while next_press < presses.len() && presses[next_press] <= now {
            engine.register_input(presses[next_press]);
            next_press += 1;
        }
        engine.tick();
    }

    if !engine.is_finished() {
        print_summary(&engine.summary());
    }
    Ok(())
}

fn run_realtime(options: RunOptions) -> Result<()> {
    let clock = AudioClock::new();
    let collaborators = Collaborators::new()
        .with_audio(PooledAudio::new(clock.clone(), &options.config.audio.clip_names))
        .with_scene(CountingScene::default())
        .with_display(ConsoleDisplay { echo: true })
        .with_observer(ConsoleObserver);
    let mut engine = Engine::new(options.config.clone(), Box::new(clock), collaborators)?;

    if engine.start_run(&options.level)? == RunStart::Empty {
        println!("Level has no beats");
        return Ok(());
    }
    println!(
        "Playing {} beats in real time (press Ctrl+C to stop)...",
        engine.schedule().len()
    );

    let presses = plan_presses(engine.schedule(), &options);
    let mut next_press = 0;
    let mut timer = FrameTimer::new(DEFAULT_TICK_RATE);
    timer.start();

    while !engine.is_finished() {
        if timer.tick() {
            let now = engine.now();
            while next_press < presses.len() && presses[next_press] <= now {
                engine.register_input(presses[next_press]);
                next_press += 1;
            }
            engine.tick();
        }

        // Small sleep to prevent busy-waiting
        let sleep_time = timer.time_until_next_frame();
        if sleep_time > Duration::from_micros(100) {
            thread::sleep(sleep_time / 2);
        }
    }

    timer.stop();
    println!("{} frames", timer.frames());
    Ok(())
}

fn write_levels(path: &str) -> Result<()> {
    let pack = LevelPack {
        levels: vec![
            LevelParameters {
                total_length: 30.0,
                ..Default::default()
            },
            LevelParameters {
                min_clips: 3,
                max_clips: 4,
                beat_interval: 0.75,
                total_length: 45.0,
                perfect_hit_window: 0.15,
                score_threshold: 200,
                ..Default::default()
            },
            LevelParameters {
                min_clips: 3,
                max_clips: 5,
                beat_interval: 0.5,
                perfect_hit_window: 0.1,
                score_threshold: 400,
                ..Default::default()
            },
        ],
    };
    pack.save(path)?;
    println!("Wrote {} levels to {}", pack.len(), path);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("BEATDROP - Beat synchronization and scoring engine");
        println!("Run with --help for usage information");
        return Ok(());
    }

    match args[1].as_str() {
        "--schedule" => {
            if args.len() < 4 {
                eprintln!("Error: --schedule requires an interval and a length");
                std::process::exit(1);
            }
            let interval: f64 = parse_value(&args, 2, "interval")?;
            let length: f64 = parse_value(&args, 3, "length")?;
            let delay: f64 = if args.len() > 4 {
                parse_value(&args, 4, "delay")?
            } else {
                0.0
            };
            print_schedule(interval, length, delay)?;
        }
        "--simulate" => {
            simulate(parse_run_options(&args[2..])?)?;
        }
        "--realtime" => {
            run_realtime(parse_run_options(&args[2..])?)?;
        }
        "--write-levels" => {
            if args.len() < 3 {
                eprintln!("Error: --write-levels requires a file path");
                std::process::exit(1);
            }
            write_levels(&args[2])?;
        }
        "--help" | "-h" => {
            print_usage();
        }
        _ => {
            eprintln!("Unknown option: {}", args[1]);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}
