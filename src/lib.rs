// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Beat synchronization and scoring engine for a falling-object rhythm game.
//!
//! Audio clips are scheduled on the audio clock, falling objects are
//! simulated so they cross the baseline exactly on their beat, and player
//! input is judged against the nearest open beat.

pub mod config;
pub mod engine;
pub mod error;
pub mod gameplay;
pub mod sequencer;
pub mod timing;

pub use config::{EngineConfig, LevelPack, LevelParameters, PassiveMissPolicy};
pub use engine::{
    Collaborators, Engine, RunObserver, RunPhase, RunStart, RunSummary, ScoreDisplay, TickReport,
};
pub use error::{AudioError, EngineError, Result};
pub use gameplay::{FallGeometry, Judgment, ObjectHandle, Outcome, SceneSink};
pub use sequencer::{AudioSink, BeatSchedule, VoiceHandle};
pub use timing::{AudioClock, ClockSource, ManualClock};
