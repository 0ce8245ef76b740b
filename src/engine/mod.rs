// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Run context.
//!
//! `Engine` owns everything one run needs: the schedule, the playback
//! scheduler, the fall simulator, the judge and the score. The host drives
//! it from a single loop by calling [`Engine::tick`] once per frame and
//! [`Engine::register_input`] for every key press. Every tick reads the
//! clock exactly once and hands that reading to every component.

use tracing::{debug, info, warn};

use crate::config::{EngineConfig, LevelParameters, PassiveMissPolicy};
use crate::error::{EngineError, Result};
use crate::gameplay::{
    score_text, FallEvent, FallSimulator, HitJudge, Judgment, Outcome, SceneSink, ScoreAggregator,
    ScoreState, Tally,
};
use crate::sequencer::{
    AudioSink, BeatSchedule, ClipPool, PlaybackCommand, PlaybackScheduler, SchedulerConfig,
};
use crate::timing::{ClockSource, IdleWatcher};

/// Trait for the external UI score widget.
pub trait ScoreDisplay: Send {
    fn set_score_text(&mut self, text: &str);
}

/// Trait for the external progression collaborator.
///
/// Every method has an empty default so implementors pick what they need.
pub trait RunObserver: Send {
    fn on_score_changed(&mut self, _total: i64) {}

    /// A streak of `_length` positive deltas was completed
    fn on_streak(&mut self, _length: u32) {}

    /// The score reached the level threshold; reported once per run
    fn on_threshold_reached(&mut self, _total: i64) {}

    /// Every beat is judged and every object is gone
    fn on_run_finished(&mut self, _summary: &RunSummary) {}

    /// No input for the configured idle timeout
    fn on_idle(&mut self, _idle_for: f64) {}
}

/// External collaborators handed to the engine.
///
/// Any of them may be absent; the run degrades instead of failing.
#[derive(Default)]
pub struct Collaborators {
    pub audio: Option<Box<dyn AudioSink>>,
    pub scene: Option<Box<dyn SceneSink>>,
    pub display: Option<Box<dyn ScoreDisplay>>,
    pub observer: Option<Box<dyn RunObserver>>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_audio(mut self, audio: impl AudioSink + 'static) -> Self {
        self.audio = Some(Box::new(audio));
        self
    }

    pub fn with_scene(mut self, scene: impl SceneSink + 'static) -> Self {
        self.scene = Some(Box::new(scene));
        self
    }

    pub fn with_display(mut self, display: impl ScoreDisplay + 'static) -> Self {
        self.display = Some(Box::new(display));
        self
    }

    pub fn with_observer(mut self, observer: impl RunObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }
}

/// How `start_run` went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStart {
    /// The run is live with this many beats
    Started { beats: usize },
    /// The parameters produced no beats; nothing will happen
    Empty,
}

/// Lifecycle of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Running,
    Finished,
}

/// Outcome of a run, or of the run so far
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub score: i64,
    pub tally: Tally,
    pub beats: usize,
    pub streaks: u32,
    pub threshold_reached: bool,
    /// Beats whose audio the sink refused
    pub dropped_audio: usize,
}

/// What one tick did
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Clock reading the tick ran at
    pub now: f64,
    pub commands: Vec<PlaybackCommand>,
    pub events: Vec<FallEvent>,
    /// Beats that expired this tick
    pub passive_misses: usize,
    /// Set on the tick that finished the run
    pub finished: bool,
}

/// One explicitly owned run context
pub struct Engine {
    config: EngineConfig,
    clock: Box<dyn ClockSource>,
    schedule: BeatSchedule,
    playback: PlaybackScheduler,
    fall: FallSimulator,
    judge: HitJudge,
    score: ScoreAggregator,
    tally: Tally,
    idle: IdleWatcher,
    display: Option<Box<dyn ScoreDisplay>>,
    observer: Option<Box<dyn RunObserver>>,
    phase: RunPhase,
    /// Beats before this index have had their window closed and were swept
    expiry_cursor: usize,
    runs: u64,
}

impl Engine {
    /// Build an engine. Missing audio or scene collaborators are logged and tolerated.
    pub fn new(
        config: EngineConfig,
        clock: Box<dyn ClockSource>,
        collaborators: Collaborators,
    ) -> Result<Self> {
        config.validate()?;

        if collaborators.audio.is_none() {
            warn!(
                error = %EngineError::MissingCollaborator("audio".into()),
                "runs will be silent"
            );
        }
        if collaborators.scene.is_none() {
            warn!(
                error = %EngineError::MissingCollaborator("scene".into()),
                "runs will be score-only"
            );
        }

        let playback = PlaybackScheduler::with_config(
            collaborators.audio,
            SchedulerConfig {
                lookahead: config.audio.lookahead,
            },
        );
        let fall = FallSimulator::new(config.field.geometry(0.0), collaborators.scene);

        Ok(Self {
            score: ScoreAggregator::new(config.scoring.streak_length),
            idle: IdleWatcher::new(config.idle_timeout),
            config,
            clock,
            schedule: BeatSchedule::default(),
            playback,
            fall,
            judge: HitJudge::default(),
            tally: Tally::default(),
            display: collaborators.display,
            observer: collaborators.observer,
            phase: RunPhase::Idle,
            expiry_cursor: 0,
            runs: 0,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current clock reading
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == RunPhase::Running
    }

    /// Start a fresh run, replacing any previous one.
    ///
    /// Parameters are checked before anything changes: on error the
    /// previous run, if any, carries on untouched.
    pub fn start_run(&mut self, params: &LevelParameters) -> Result<RunStart> {
        params.validate()?;
        let geometry = self.config.field.geometry(params.perfect_hit_window);
        geometry.validate()?;

        let now = self.clock.now();
        let schedule = BeatSchedule::generate(
            params.start_delay,
            params.beat_interval,
            params.total_length,
            now,
        )?;

        self.stop_run();
        self.runs += 1;

        self.schedule = schedule;
        self.judge = HitJudge::new(params.perfect_hit_window);
        self.score.reset(Some(params.score_threshold));
        self.tally = Tally::default();
        if let Some(display) = self.display.as_mut() {
            display.set_score_text(&score_text(0));
        }

        if self.schedule.is_empty() {
            warn!(run = self.runs, error = %EngineError::EmptySchedule, "run has nothing to play");
            self.phase = RunPhase::Finished;
            return Ok(RunStart::Empty);
        }

        let clips = ClipPool::draw(
            &self.config.audio.clip_names,
            params.min_clips,
            params.max_clips,
            self.config.seed,
        );
        if clips.is_empty() && self.playback.has_audio() {
            warn!(run = self.runs, "no clips configured, beats will be silent");
        }

        self.playback.start(clips);
        self.fall.start(geometry, params.extra_fall_time, now);
        self.idle.arm(now);
        self.phase = RunPhase::Running;

        info!(
            run = self.runs,
            beats = self.schedule.len(),
            first = self.schedule.start_time(),
            interval = params.beat_interval,
            "run started"
        );

        Ok(RunStart::Started {
            beats: self.schedule.len(),
        })
    }

    /// Stop the run: cancel audio, destroy every object, drop the schedule.
    ///
    /// The score stays readable until the next run starts.
    pub fn stop_run(&mut self) {
        if self.phase == RunPhase::Running {
            info!(run = self.runs, score = self.score.total(), "run stopped");
        }
        self.playback.stop();
        self.fall.stop();
        self.idle.disarm();
        self.schedule = BeatSchedule::default();
        self.expiry_cursor = 0;
        self.phase = RunPhase::Idle;
    }

    /// Beats of the current run
    pub fn schedule(&self) -> &BeatSchedule {
        &self.schedule
    }

    /// Absolute beat timestamps of the current run
    pub fn schedule_timestamps(&self) -> Vec<f64> {
        self.schedule.timestamps()
    }

    /// Judge a key press made at `timestamp` on the audio clock.
    ///
    /// Outside a running run, or once every beat is consumed, the press is
    /// judged a miss and scores nothing.
    pub fn register_input(&mut self, timestamp: f64) -> Judgment {
        if self.phase != RunPhase::Running {
            debug!(timestamp, phase = ?self.phase, "input ignored outside a run");
            return Judgment {
                outcome: Outcome::Miss,
                beat_index: None,
                offset: None,
                hit_time: timestamp,
            };
        }

        self.idle.record_input(timestamp);

        let judgment = self.judge.judge(&mut self.schedule, timestamp);

        match (judgment.outcome, judgment.beat_index) {
            (_, None) => {
                debug!(timestamp, "no beat left to judge, input not scored");
            }
            (Outcome::Perfect, Some(beat)) => {
                self.tally.record(Outcome::Perfect);
                self.fall.claim(beat);
                self.apply_score(self.config.scoring.perfect_hit_score);
            }
            (Outcome::Miss, Some(_)) => {
                self.tally.record(Outcome::Miss);
                self.apply_score(self.config.scoring.miss_hit_score);
            }
        }

        judgment
    }

    /// Advance the run to the current clock reading
    pub fn tick(&mut self) -> TickReport {
        let now = self.clock.now();
        let mut report = TickReport {
            now,
            ..Default::default()
        };

        if self.phase != RunPhase::Running {
            return report;
        }

        report.commands = self.playback.poll(&self.schedule, now);
        report.events = self.fall.tick(&mut self.schedule, now);

        for event in &report.events {
            if let FallEvent::PassiveMiss { beat_index, .. } = event {
                debug!(beat = beat_index, "passive miss");
                self.record_passive_miss();
                report.passive_misses += 1;
            }
        }

        report.passive_misses += self.expire_unseen_beats(now);

        if self.idle.poll(now) {
            let idle_for = self.idle.idle_for(now).unwrap_or(0.0);
            debug!(idle_for, "player idle");
            if let Some(observer) = self.observer.as_mut() {
                observer.on_idle(idle_for);
            }
        }

        if self.run_complete() {
            self.phase = RunPhase::Finished;
            self.idle.disarm();
            report.finished = true;

            let summary = self.summary();
            info!(
                run = self.runs,
                score = summary.score,
                perfect = summary.tally.perfect,
                missed = summary.tally.passive_miss,
                "run finished"
            );
            if let Some(observer) = self.observer.as_mut() {
                observer.on_run_finished(&summary);
            }
        }

        report
    }

    /// Whether the current run has played out completely
    pub fn is_finished(&self) -> bool {
        self.phase == RunPhase::Finished
    }

    pub fn current_score(&self) -> i64 {
        self.score.total()
    }

    pub fn score_state(&self) -> ScoreState {
        self.score.state()
    }

    pub fn threshold_reached(&self) -> bool {
        self.score.threshold_reached()
    }

    /// Live falling objects, including those in their grace fall
    pub fn active_object_count(&self) -> usize {
        self.fall.active_object_count()
    }

    pub fn tally(&self) -> Tally {
        self.tally
    }

    /// Beats whose judging window has closed and been swept
    pub fn expired_beats(&self) -> usize {
        self.expiry_cursor
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            score: self.score.total(),
            tally: self.tally,
            beats: self.schedule.len(),
            streaks: self.score.streaks(),
            threshold_reached: self.score.threshold_reached(),
            dropped_audio: self.playback.dropped(),
        }
    }

    /// Claim beats whose window closed with no falling object to miss them
    fn expire_unseen_beats(&mut self, now: f64) -> usize {
        let window = self.judge.perfect_window();
        let end = self
            .schedule
            .expiry_boundary(self.expiry_cursor, now, window);
        let start = std::mem::replace(&mut self.expiry_cursor, end);

        let mut penalised = 0;
        for beat in start..end {
            // Beats with an object are missed by the object itself
            if self.fall.has_object_for(beat) || !self.schedule.try_consume(beat) {
                continue;
            }
            match self.config.passive_miss {
                PassiveMissPolicy::Always => {
                    debug!(beat, "passive miss without visual");
                    self.record_passive_miss();
                    penalised += 1;
                }
                PassiveMissPolicy::VisualOnly => {
                    debug!(beat, "beat without visual expired unscored");
                }
            }
        }
        penalised
    }

    fn record_passive_miss(&mut self) {
        self.tally.record_passive_miss();
        self.apply_score(self.config.scoring.passive_miss_score);
    }

    fn apply_score(&mut self, delta: i64) {
        let update = self.score.apply(delta);

        if let Some(display) = self.display.as_mut() {
            display.set_score_text(&score_text(update.total));
        }
        if let Some(length) = update.streak_achieved {
            info!(length, total = update.total, "streak achieved");
        }
        if update.threshold_reached {
            info!(total = update.total, "score threshold reached");
        }

        if let Some(observer) = self.observer.as_mut() {
            observer.on_score_changed(update.total);
            if let Some(length) = update.streak_achieved {
                observer.on_streak(length);
            }
            if update.threshold_reached {
                observer.on_threshold_reached(update.total);
            }
        }
    }

    fn run_complete(&self) -> bool {
        self.playback.is_exhausted(&self.schedule)
            && self.fall.spawning_done(&self.schedule)
            && self.schedule.all_consumed()
            && self.fall.active_object_count() == 0
    }
}
