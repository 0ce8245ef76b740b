// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Beat schedule generation and consumption bookkeeping.
//!
//! A [`BeatSchedule`] is the sole authority on whether a beat has been
//! judged. Both the active-hit path and the passive-miss path claim beats
//! through [`BeatSchedule::try_consume`], so each beat is consumed at most
//! once per run.

use crate::error::{EngineError, Result};

/// Upper bound on beats per schedule
pub const MAX_BEATS: usize = 1_000_000;

/// One scheduled beat on the audio clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledBeat {
    /// Ordinal position in the schedule
    pub index: usize,
    /// Absolute audio-clock time in seconds
    pub timestamp: f64,
    consumed: bool,
}

impl ScheduledBeat {
    fn new(index: usize, timestamp: f64) -> Self {
        Self {
            index,
            timestamp,
            consumed: false,
        }
    }

    /// Whether this beat has been claimed by a hit or a passive miss
    pub fn is_consumed(&self) -> bool {
        self.consumed
    }
}

/// Ordered, strictly increasing sequence of beats
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeatSchedule {
    beats: Vec<ScheduledBeat>,
    /// Time of the first beat (clock reading + start delay)
    start_time: f64,
    /// Seconds between consecutive beats
    interval: f64,
}

impl BeatSchedule {
    /// Generate a schedule.
    ///
    /// Beats are placed at `t_k = clock_now + start_delay + k * interval`
    /// for every `k` where `t_k - t_0 < total_length`.
    pub fn generate(
        start_delay: f64,
        interval: f64,
        total_length: f64,
        clock_now: f64,
    ) -> Result<Self> {
        if !clock_now.is_finite() {
            return Err(EngineError::invalid("clock reading is not finite"));
        }
        if !start_delay.is_finite() || start_delay < 0.0 {
            return Err(EngineError::invalid(format!(
                "start delay must be >= 0, got {}",
                start_delay
            )));
        }
        if !interval.is_finite() || interval <= 0.0 {
            return Err(EngineError::invalid(format!(
                "beat interval must be > 0, got {}",
                interval
            )));
        }
        if !total_length.is_finite() || total_length < 0.0 {
            return Err(EngineError::invalid(format!(
                "total length must be >= 0, got {}",
                total_length
            )));
        }

        let estimate = (total_length / interval).ceil();
        if estimate > MAX_BEATS as f64 {
            return Err(EngineError::invalid(format!(
                "schedule would hold {} beats (max {})",
                estimate, MAX_BEATS
            )));
        }

        let start_time = clock_now + start_delay;
        let mut beats = Vec::with_capacity(estimate as usize);
        let mut k = 0usize;

        loop {
            // Multiply rather than accumulate so rounding error does not grow with k
            let timestamp = start_time + k as f64 * interval;
            if timestamp - start_time >= total_length {
                break;
            }
            if let Some(prev) = beats.last().map(|b: &ScheduledBeat| b.timestamp) {
                if timestamp <= prev {
                    return Err(EngineError::invalid(format!(
                        "beat interval {} is below clock resolution at t={}",
                        interval, start_time
                    )));
                }
            }
            beats.push(ScheduledBeat::new(k, timestamp));
            k += 1;
        }

        Ok(Self {
            beats,
            start_time,
            interval,
        })
    }

    /// Number of beats
    pub fn len(&self) -> usize {
        self.beats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// All beats in time order
    pub fn beats(&self) -> &[ScheduledBeat] {
        &self.beats
    }

    pub fn get(&self, index: usize) -> Option<&ScheduledBeat> {
        self.beats.get(index)
    }

    /// Absolute timestamps in order
    pub fn timestamps(&self) -> Vec<f64> {
        self.beats.iter().map(|b| b.timestamp).collect()
    }

    /// Timestamps relative to the first beat
    pub fn offsets(&self) -> Vec<f64> {
        self.beats
            .iter()
            .map(|b| b.timestamp - self.start_time)
            .collect()
    }

    /// Time of the last beat, if any
    pub fn last_timestamp(&self) -> Option<f64> {
        self.beats.last().map(|b| b.timestamp)
    }

    /// Whether the beat at `index` has been consumed. Unknown indices read as consumed.
    pub fn is_consumed(&self, index: usize) -> bool {
        self.beats.get(index).map_or(true, |b| b.consumed)
    }

    /// Claim a beat. Returns false if it was already claimed or does not exist.
    pub fn try_consume(&mut self, index: usize) -> bool {
        match self.beats.get_mut(index) {
            Some(beat) if !beat.consumed => {
                beat.consumed = true;
                true
            }
            _ => false,
        }
    }

    /// Number of beats still open for judging
    pub fn unconsumed_count(&self) -> usize {
        self.beats.iter().filter(|b| !b.consumed).count()
    }

    pub fn all_consumed(&self) -> bool {
        self.beats.iter().all(|b| b.consumed)
    }

    /// Find the unconsumed beat closest to `time`.
    ///
    /// Returns the beat index and the absolute gap. Equal gaps resolve to
    /// the lower index.
    pub fn nearest_unconsumed(&self, time: f64) -> Option<(usize, f64)> {
        // First beat at or after `time`; everything before it is earlier
        let split = self.beats.partition_point(|b| b.timestamp < time);

        let before = self.beats[..split].iter().rev().find(|b| !b.consumed);
        let after = self.beats[split..].iter().find(|b| !b.consumed);

        match (before, after) {
            (Some(b), Some(a)) => {
                let gap_before = (time - b.timestamp).abs();
                let gap_after = (a.timestamp - time).abs();
                if gap_after < gap_before {
                    Some((a.index, gap_after))
                } else {
                    Some((b.index, gap_before))
                }
            }
            (Some(b), None) => Some((b.index, (time - b.timestamp).abs())),
            (None, Some(a)) => Some((a.index, (a.timestamp - time).abs())),
            (None, None) => None,
        }
    }

    /// One past the last beat whose judging window closed before `now`.
    ///
    /// Only beats from `from` on are searched, so a caller that keeps the
    /// result as a cursor never looks at the same beat twice.
    pub fn expiry_boundary(&self, from: usize, now: f64, window: f64) -> usize {
        let from = from.min(self.beats.len());
        from + self.beats[from..].partition_point(|b| b.timestamp + window < now)
    }
}
