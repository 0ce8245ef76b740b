// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Error types for the beat engine.

use thiserror::Error;

/// Result alias carrying [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the engine.
///
/// Only `InvalidParameter` ever reaches the caller of `start_run` as an
/// `Err`; the other kinds are absorbed at runtime, logged, and degrade the
/// run instead of aborting it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A run parameter is out of range (non-positive interval, negative
    /// delay or length, non-finite values)
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// The parameters are valid but produce zero beats
    #[error("schedule is empty")]
    EmptySchedule,
    /// An audio or scene collaborator is not attached
    #[error("collaborator unavailable: {0}")]
    MissingCollaborator(String),
    /// The hit judge found no beat left to judge against
    #[error("no unconsumed beat left to judge")]
    NoUnconsumedBeat,
    /// The audio collaborator refused a command
    #[error(transparent)]
    Audio(#[from] AudioError),
}

impl EngineError {
    /// Shorthand for an `InvalidParameter` error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}

/// Errors reported by an [`AudioSink`](crate::sequencer::AudioSink).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    /// Every voice is busy
    #[error("no audio voice available")]
    NoVoiceAvailable,
    /// The sink does not know the requested clip
    #[error("unknown clip: {0}")]
    UnknownClip(String),
    /// The audio device is gone or not initialised
    #[error("audio unavailable: {0}")]
    Unavailable(String),
}
