// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Idle-input watcher.
//!
//! Fires once when no input has been accepted for longer than the
//! threshold, then stays quiet until the next input re-arms it. Advisory
//! only: it drives ambience, never scoring.

/// Idle-input watcher measured on the audio clock
#[derive(Debug, Clone)]
pub struct IdleWatcher {
    /// Seconds without input before firing
    threshold: f64,
    /// Time of the last accepted input (or of arming)
    last_input: Option<f64>,
    /// Whether the notification already fired for the current idle period
    fired: bool,
}

impl IdleWatcher {
    /// Create a disarmed watcher
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.max(0.0),
            last_input: None,
            fired: false,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Start measuring from `now`
    pub fn arm(&mut self, now: f64) {
        self.last_input = Some(now);
        self.fired = false;
    }

    /// Stop measuring
    pub fn disarm(&mut self) {
        self.last_input = None;
        self.fired = false;
    }

    /// Record an accepted input, resetting the idle period
    pub fn record_input(&mut self, now: f64) {
        self.arm(now);
    }

    /// Seconds since the last input, if armed
    pub fn idle_for(&self, now: f64) -> Option<f64> {
        self.last_input.map(|last| (now - last).max(0.0))
    }

    /// Returns true exactly once per idle period
    pub fn poll(&mut self, now: f64) -> bool {
        if self.fired {
            return false;
        }
        match self.idle_for(now) {
            Some(idle) if idle >= self.threshold => {
                self.fired = true;
                true
            }
            _ => false,
        }
    }
}

impl Default for IdleWatcher {
    fn default() -> Self {
        Self::new(8.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disarmed_never_fires() {
        let mut watcher = IdleWatcher::new(1.0);
        assert!(!watcher.poll(100.0));
    }

    #[test]
    fn test_fires_once_per_idle_period() {
        let mut watcher = IdleWatcher::new(2.0);
        watcher.arm(0.0);

        assert!(!watcher.poll(1.9));
        assert!(watcher.poll(2.0));
        assert!(!watcher.poll(5.0));
    }

    #[test]
    fn test_input_rearms() {
        let mut watcher = IdleWatcher::new(2.0);
        watcher.arm(0.0);
        assert!(watcher.poll(3.0));

        watcher.record_input(3.5);
        assert!(!watcher.poll(5.0));
        assert!(watcher.poll(5.5));
    }

    #[test]
    fn test_disarm() {
        let mut watcher = IdleWatcher::new(1.0);
        watcher.arm(0.0);
        watcher.disarm();
        assert_eq!(watcher.idle_for(10.0), None);
        assert!(!watcher.poll(10.0));
    }
}
