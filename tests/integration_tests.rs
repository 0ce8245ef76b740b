// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Integration tests for BEATDROP
//!
//! These tests drive whole runs through the public API with a manual clock.

use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};

use beatdrop::{
    AudioError, AudioSink, ClockSource, Collaborators, Engine, EngineConfig, LevelPack,
    LevelParameters, ManualClock, ObjectHandle, RunObserver, RunStart, RunSummary, SceneSink,
    VoiceHandle,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DT: f64 = 1.0 / 60.0;

/// Scene recording every position update with the clock time it happened at
#[derive(Clone)]
struct RecordingScene {
    clock: ManualClock,
    tracks: Arc<Mutex<HashMap<u64, Vec<(f64, f64)>>>>,
    live: Arc<Mutex<usize>>,
    next: u64,
}

impl RecordingScene {
    fn new(clock: &ManualClock) -> Self {
        Self {
            clock: clock.clone(),
            tracks: Arc::new(Mutex::new(HashMap::new())),
            live: Arc::new(Mutex::new(0)),
            next: 0,
        }
    }
}

impl SceneSink for RecordingScene {
    fn spawn_object(&mut self, position: f64) -> Option<ObjectHandle> {
        self.next += 1;
        self.tracks
            .lock()
            .unwrap()
            .insert(self.next, vec![(self.clock.now(), position)]);
        *self.live.lock().unwrap() += 1;
        Some(ObjectHandle(self.next))
    }

    fn set_position(&mut self, handle: ObjectHandle, position: f64) {
        if let Some(track) = self.tracks.lock().unwrap().get_mut(&handle.0) {
            track.push((self.clock.now(), position));
        }
    }

    fn destroy(&mut self, _handle: ObjectHandle) {
        *self.live.lock().unwrap() -= 1;
    }
}

/// Audio sink that accepts a limited number of commands in total
#[derive(Clone)]
struct LimitedAudio {
    accepted: Arc<Mutex<Vec<(String, f64)>>>,
    limit: usize,
}

impl LimitedAudio {
    fn new(limit: usize) -> Self {
        Self {
            accepted: Arc::new(Mutex::new(Vec::new())),
            limit,
        }
    }
}

impl AudioSink for LimitedAudio {
    fn schedule_clip(&mut self, clip: &str, at: f64) -> Result<VoiceHandle, AudioError> {
        let mut accepted = self.accepted.lock().unwrap();
        if accepted.len() >= self.limit {
            return Err(AudioError::NoVoiceAvailable);
        }
        accepted.push((clip.to_string(), at));
        Ok(VoiceHandle(accepted.len() as u64))
    }

    fn is_playing(&self, _voice: VoiceHandle) -> bool {
        false
    }

    fn cancel_all(&mut self) {}
}

#[derive(Clone, Default)]
struct FinishRecorder {
    summaries: Arc<Mutex<Vec<RunSummary>>>,
}

impl RunObserver for FinishRecorder {
    fn on_run_finished(&mut self, summary: &RunSummary) {
        self.summaries.lock().unwrap().push(*summary);
    }
}

fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.audio.clip_names = vec!["kick".into(), "snare".into(), "clap".into()];
    config.seed = Some(42);
    config
}

fn level(interval: f64, total: f64, delay: f64) -> LevelParameters {
    LevelParameters {
        beat_interval: interval,
        total_length: total,
        start_delay: delay,
        ..Default::default()
    }
}

fn run_until(engine: &mut Engine, clock: &ManualClock, until: f64) {
    while clock.now() < until && !engine.is_finished() {
        clock.advance(DT);
        engine.tick();
    }
}

/// Starting at t=0 with delay 1, interval 1 and length 3 plays beats at 1, 2 and 3
#[test]
fn test_end_to_end_schedule_boundary() {
    let clock = ManualClock::new(0.0);
    let mut engine = Engine::new(config(), Box::new(clock.clone()), Collaborators::new()).unwrap();

    engine.start_run(&level(1.0, 3.0, 1.0)).unwrap();
    assert_eq!(engine.schedule_timestamps(), vec![1.0, 2.0, 3.0]);

    run_until(&mut engine, &clock, 10.0);
    assert!(engine.is_finished());
}

#[test]
fn test_restart_is_congruent() {
    let clock = ManualClock::new(0.0);
    let scene = RecordingScene::new(&clock);
    let collaborators = Collaborators::new().with_scene(scene.clone());
    let mut engine = Engine::new(config(), Box::new(clock.clone()), collaborators).unwrap();
    let params = level(0.5, 4.0, 1.0);

    engine.start_run(&params).unwrap();
    let first_offsets = engine.schedule().offsets();
    run_until(&mut engine, &clock, 2.5);
    assert!(engine.active_object_count() > 0);
    engine.register_input(1.5);

    engine.stop_run();
    assert_eq!(engine.active_object_count(), 0);
    assert_eq!(*scene.live.lock().unwrap(), 0);

    clock.set(10.0);
    engine.start_run(&params).unwrap();
    assert_eq!(engine.schedule().offsets(), first_offsets);
    assert_eq!(engine.schedule().start_time(), 11.0);
    assert_eq!(engine.schedule().unconsumed_count(), engine.schedule().len());
    assert_eq!(engine.current_score(), 0);
    assert_eq!(engine.active_object_count(), 0);
}

#[test]
fn test_every_beat_judged_exactly_once() {
    let clock = ManualClock::new(0.0);
    let scene = RecordingScene::new(&clock);
    let recorder = FinishRecorder::default();
    let collaborators = Collaborators::new()
        .with_scene(scene)
        .with_observer(recorder.clone());
    let mut engine = Engine::new(config(), Box::new(clock.clone()), collaborators).unwrap();
    engine.start_run(&level(0.4, 12.0, 2.0)).unwrap();

    // Sloppy player: some beats skipped, some pressed twice, wide timing error
    let mut rng = StdRng::seed_from_u64(7);
    let mut presses: Vec<f64> = Vec::new();
    for t in engine.schedule_timestamps() {
        let count = rng.gen_range(0..=2);
        for _ in 0..count {
            presses.push(t + rng.gen_range(-0.3..=0.3));
        }
    }
    presses.sort_by(|a, b| a.total_cmp(b));

    let mut next = 0;
    while !engine.is_finished() && clock.now() < 30.0 {
        clock.advance(DT);
        while next < presses.len() && presses[next] <= clock.now() {
            engine.register_input(presses[next]);
            next += 1;
        }
        engine.tick();
    }

    assert!(engine.is_finished());
    assert!(engine.schedule().all_consumed());

    let tally = engine.tally();
    let beats = engine.schedule().len() as u32;
    assert_eq!(tally.perfect + tally.passive_miss, beats);
    assert!(tally.perfect > 0);
    assert!(tally.passive_miss > 0);
    assert_eq!(
        engine.current_score(),
        10 * tally.perfect as i64 - 10 * (tally.miss + tally.passive_miss) as i64
    );

    let summaries = recorder.summaries.lock().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].tally, tally);
}

#[test]
fn test_objects_cross_baseline_on_beat() {
    let clock = ManualClock::new(0.0);
    let scene = RecordingScene::new(&clock);
    let collaborators = Collaborators::new().with_scene(scene.clone());
    let mut engine = Engine::new(config(), Box::new(clock.clone()), collaborators).unwrap();

    engine.start_run(&level(0.75, 6.0, 3.0)).unwrap();
    let beats = engine.schedule_timestamps();
    run_until(&mut engine, &clock, 20.0);
    assert!(engine.is_finished());

    let tracks = scene.tracks.lock().unwrap();
    assert_eq!(tracks.len(), beats.len());

    let speed = engine.config().field.fall_speed;
    for (i, beat) in beats.iter().enumerate() {
        let track = &tracks[&(i as u64 + 1)];
        let (time, position) = track
            .iter()
            .copied()
            .min_by(|a, b| (a.0 - beat).abs().total_cmp(&(b.0 - beat).abs()))
            .unwrap();
        assert!((time - beat).abs() <= DT);
        assert!(
            position.abs() <= speed * DT,
            "beat {} at {}: position {} at t={}",
            i,
            beat,
            position,
            time
        );
    }
}

#[test]
fn test_audio_exhaustion_keeps_visuals() {
    let clock = ManualClock::new(0.0);
    let scene = RecordingScene::new(&clock);
    let audio = LimitedAudio::new(2);
    let collaborators = Collaborators::new()
        .with_scene(scene.clone())
        .with_audio(audio.clone());
    let mut engine = Engine::new(config(), Box::new(clock.clone()), collaborators).unwrap();

    engine.start_run(&level(1.0, 5.0, 2.5)).unwrap();
    run_until(&mut engine, &clock, 15.0);

    assert!(engine.is_finished());
    let summary = engine.summary();
    assert_eq!(summary.beats, 5);
    assert_eq!(summary.dropped_audio, 3);
    assert_eq!(summary.tally.passive_miss, 5);
    assert_eq!(scene.tracks.lock().unwrap().len(), 5);

    let accepted = audio.accepted.lock().unwrap();
    let times: Vec<f64> = accepted.iter().map(|(_, at)| *at).collect();
    assert_eq!(times, vec![2.5, 3.5]);
    assert!(accepted
        .iter()
        .all(|(clip, _)| ["kick", "snare", "clap"].contains(&clip.as_str())));
}

#[test]
fn test_score_only_mode() {
    let clock = ManualClock::new(0.0);
    let mut engine = Engine::new(config(), Box::new(clock.clone()), Collaborators::new()).unwrap();

    engine.start_run(&level(1.0, 3.0, 1.0)).unwrap();
    run_until(&mut engine, &clock, 1.0);
    assert!(engine.register_input(1.1).is_perfect());
    run_until(&mut engine, &clock, 10.0);

    assert!(engine.is_finished());
    assert_eq!(engine.active_object_count(), 0);
    assert_eq!(engine.tally().perfect, 1);
    assert_eq!(engine.tally().passive_miss, 2);
    assert_eq!(engine.current_score(), -10);
}

#[test]
fn test_engines_do_not_share_state() {
    let clock_a = ManualClock::new(0.0);
    let clock_b = ManualClock::new(100.0);
    let mut a = Engine::new(config(), Box::new(clock_a.clone()), Collaborators::new()).unwrap();
    let mut b = Engine::new(config(), Box::new(clock_b.clone()), Collaborators::new()).unwrap();

    a.start_run(&level(1.0, 3.0, 1.0)).unwrap();
    b.start_run(&level(1.0, 3.0, 1.0)).unwrap();

    assert!(a.register_input(1.0).is_perfect());
    assert_eq!(a.current_score(), 10);
    assert_eq!(b.current_score(), 0);
    assert_eq!(b.schedule_timestamps(), vec![101.0, 102.0, 103.0]);
    assert_eq!(b.schedule().unconsumed_count(), 3);
}

#[test]
fn test_level_pack_drives_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("levels.yaml");
    fs::write(
        &path,
        "levels:\n  - total_length: 10\n  - beat_interval: 0.5\n    total_length: 2\n    start_delay: 0\n",
    )
    .unwrap();

    let pack = LevelPack::load(&path).unwrap();
    let clock = ManualClock::new(0.0);
    let mut engine = Engine::new(config(), Box::new(clock), Collaborators::new()).unwrap();

    let start = engine.start_run(pack.level(1).unwrap()).unwrap();
    assert_eq!(start, RunStart::Started { beats: 4 });
    assert_eq!(engine.schedule_timestamps(), vec![0.0, 0.5, 1.0, 1.5]);
}
