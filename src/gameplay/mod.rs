// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Gameplay: falling objects, hit judging and scoring.

pub mod fall;
pub mod judge;
pub mod score;

pub use fall::{
    FallEvent, FallGeometry, FallSimulator, FallingObject, ObjectHandle, ObjectState, SceneSink,
};
pub use judge::{HitJudge, Judgment, Outcome, Tally};
pub use score::{score_text, ScoreAggregator, ScoreState, ScoreUpdate};
