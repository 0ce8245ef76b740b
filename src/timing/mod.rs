// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timing and clock module.
//!
//! This module provides the audio-domain clock sources, frame pacing
//! and the idle-input watcher.

pub mod clock;
pub mod idle;

pub use clock::{AudioClock, ClockSource, FrameState, FrameTimer, ManualClock, DEFAULT_TICK_RATE};
pub use idle::IdleWatcher;
