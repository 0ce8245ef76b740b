// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Beat sequencing on the audio clock.
//!
//! This module provides:
//! - Beat schedule generation and at-most-once consumption
//! - Playback scheduling with lookahead against an external audio sink
//! - Per-run clip selection

pub mod clips;
pub mod schedule;
pub mod scheduler;

pub use clips::{ClipId, ClipPool};
pub use schedule::{BeatSchedule, ScheduledBeat, MAX_BEATS};
pub use scheduler::{
    AudioSink, CommandStatus, PlaybackCommand, PlaybackScheduler, SchedulerConfig, VoiceHandle,
};
