// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Score aggregation with edge-triggered streaks.

/// Score of the active run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreState {
    /// Running total; may go negative
    pub total: i64,
    /// Positive deltas in a row since the last non-positive one
    pub consecutive_perfect_count: u32,
}

/// What a single `apply` changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreUpdate {
    pub delta: i64,
    pub total: i64,
    /// Set on the delta that completes a streak
    pub streak_achieved: Option<u32>,
    /// Set on the first delta that lifts the total to the threshold
    pub threshold_reached: bool,
}

/// Accumulates score deltas for one run
#[derive(Debug, Clone)]
pub struct ScoreAggregator {
    state: ScoreState,
    /// Positive deltas in a row that make a streak; 0 disables streaks
    streak_length: u32,
    /// Total at which the run counts as passed
    threshold: Option<i64>,
    threshold_reached: bool,
    /// Streaks completed this run
    streaks: u32,
}

impl ScoreAggregator {
    pub fn new(streak_length: u32) -> Self {
        Self {
            state: ScoreState::default(),
            streak_length,
            threshold: None,
            threshold_reached: false,
            streaks: 0,
        }
    }

    /// Set the pass threshold
    pub fn with_threshold(mut self, threshold: i64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Reset to zero for a new run
    pub fn reset(&mut self, threshold: Option<i64>) {
        self.state = ScoreState::default();
        self.threshold = threshold;
        self.threshold_reached = false;
        self.streaks = 0;
    }

    pub fn state(&self) -> ScoreState {
        self.state
    }

    pub fn total(&self) -> i64 {
        self.state.total
    }

    pub fn streak_length(&self) -> u32 {
        self.streak_length
    }

    /// Streaks completed since the last reset
    pub fn streaks(&self) -> u32 {
        self.streaks
    }

    pub fn threshold_reached(&self) -> bool {
        self.threshold_reached
    }

    /// Add a delta
    pub fn apply(&mut self, delta: i64) -> ScoreUpdate {
        self.state.total += delta;

        let mut streak_achieved = None;
        if delta > 0 {
            self.state.consecutive_perfect_count += 1;
            if self.streak_length > 0 && self.state.consecutive_perfect_count == self.streak_length {
                self.streaks += 1;
                streak_achieved = Some(self.streak_length);
            }
        } else {
            self.state.consecutive_perfect_count = 0;
        }

        let mut threshold_reached = false;
        if let Some(threshold) = self.threshold {
            if !self.threshold_reached && self.state.total >= threshold {
                self.threshold_reached = true;
                threshold_reached = true;
            }
        }

        ScoreUpdate {
            delta,
            total: self.state.total,
            streak_achieved,
            threshold_reached,
        }
    }
}

impl Default for ScoreAggregator {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Text shown by the score widget
pub fn score_text(total: i64) -> String {
    format!("Score: {}", total)
}
