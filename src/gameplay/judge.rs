// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Hit judging.
//!
//! A player input is matched to the closest beat that has not been
//! consumed yet. Within the perfect window the beat is claimed; otherwise
//! the input is a miss and the beat stays open, since a miss cannot tell
//! which beat the player meant.

use tracing::{debug, warn};

use crate::error::EngineError;
use crate::sequencer::BeatSchedule;

/// Graded result of one input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Perfect,
    Miss,
}

/// Full judgment of one input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Judgment {
    pub outcome: Outcome,
    /// Beat the input was matched to, if any beat was open
    pub beat_index: Option<usize>,
    /// Signed offset, positive when the input came after the beat
    pub offset: Option<f64>,
    /// Input time on the audio clock
    pub hit_time: f64,
}

impl Judgment {
    pub fn is_perfect(&self) -> bool {
        self.outcome == Outcome::Perfect
    }

    /// Absolute distance to the matched beat
    pub fn gap(&self) -> Option<f64> {
        self.offset.map(f64::abs)
    }
}

/// Counts of judged beats and inputs over a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub perfect: u32,
    /// Inputs outside the perfect window (or with nothing to hit)
    pub miss: u32,
    /// Beats that expired without a hit
    pub passive_miss: u32,
}

impl Tally {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Perfect => self.perfect += 1,
            Outcome::Miss => self.miss += 1,
        }
    }

    pub fn record_passive_miss(&mut self) {
        self.passive_miss += 1;
    }

    /// Fraction of judged beats that were hit perfectly
    pub fn accuracy(&self) -> f64 {
        let beats = self.perfect + self.passive_miss;
        if beats == 0 {
            0.0
        } else {
            self.perfect as f64 / beats as f64
        }
    }
}

/// Nearest-beat hit judge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitJudge {
    /// Largest gap, inclusive, that counts as perfect
    perfect_window: f64,
}

impl HitJudge {
    pub fn new(perfect_window: f64) -> Self {
        Self {
            perfect_window: perfect_window.max(0.0),
        }
    }

    pub fn perfect_window(&self) -> f64 {
        self.perfect_window
    }

    /// Judge an input at `hit_time`, claiming the matched beat on a perfect hit
    pub fn judge(&self, schedule: &mut BeatSchedule, hit_time: f64) -> Judgment {
        let Some((index, gap)) = schedule.nearest_unconsumed(hit_time) else {
            warn!(hit_time, error = %EngineError::NoUnconsumedBeat, "input judged as miss");
            return Judgment {
                outcome: Outcome::Miss,
                beat_index: None,
                offset: None,
                hit_time,
            };
        };

        let offset = schedule
            .get(index)
            .map_or(gap, |beat| hit_time - beat.timestamp);

        let outcome = if gap <= self.perfect_window && schedule.try_consume(index) {
            Outcome::Perfect
        } else {
            Outcome::Miss
        };

        debug!(beat = index, hit_time, offset, ?outcome, "input judged");

        Judgment {
            outcome,
            beat_index: Some(index),
            offset: Some(offset),
            hit_time,
        }
    }
}

impl Default for HitJudge {
    fn default() -> Self {
        Self::new(0.2)
    }
}
