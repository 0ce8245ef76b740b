// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Configuration system for the beat engine.
//!
//! This module provides data structures for engine tuning (playfield,
//! scoring, audio lookahead) and level packs (per-run parameters), loaded
//! from YAML or TOML.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::gameplay::FallGeometry;

/// File formats understood by the loaders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// Pick the format from a file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            _ => Err(anyhow!(
                "Unsupported config extension: {:?} (expected .yaml, .yml or .toml)",
                path.as_ref()
            )),
        }
    }
}

fn read_as<T, P>(path: P) -> anyhow::Result<T>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let format = ConfigFormat::from_path(path.as_ref())?;
    let contents = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
    match format {
        ConfigFormat::Yaml => serde_yaml::from_str(&contents).context("Failed to parse YAML configuration"),
        ConfigFormat::Toml => toml::from_str(&contents).context("Failed to parse TOML configuration"),
    }
}

/// What happens to a beat that expires without any falling object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PassiveMissPolicy {
    /// Penalise every expired beat, visual or not
    #[default]
    Always,
    /// Penalise only beats that had a falling object; others expire silently
    VisualOnly,
}

/// Root engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Playfield layout
    #[serde(default)]
    pub field: FieldConfig,
    /// Point values and streaks
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Audio scheduling
    #[serde(default)]
    pub audio: AudioSettings,
    /// Seconds without input before the idle notification
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: f64,
    /// Handling of expired beats with no falling object
    #[serde(default)]
    pub passive_miss: PassiveMissPolicy,
    /// Seed for clip selection; random when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_idle_timeout() -> f64 {
    8.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            field: FieldConfig::default(),
            scoring: ScoringConfig::default(),
            audio: AudioSettings::default(),
            idle_timeout: default_idle_timeout(),
            passive_miss: PassiveMissPolicy::default(),
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Load from a YAML or TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let config: Self = read_as(path.as_ref())?;
        config
            .validate()
            .with_context(|| format!("Invalid engine config: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Parse from a YAML string
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse YAML configuration")
    }

    /// Parse from a TOML string
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("Failed to parse TOML configuration")
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize configuration to YAML")
    }

    /// Check ranges that the engine relies on
    pub fn validate(&self) -> Result<()> {
        self.field.geometry(0.0).validate()?;
        if let Some(distance) = self.field.hit_window_distance {
            if !distance.is_finite() || distance < 0.0 {
                return Err(EngineError::invalid(format!(
                    "hit window distance must be >= 0, got {}",
                    distance
                )));
            }
        }
        if !self.audio.lookahead.is_finite() || self.audio.lookahead < 0.0 {
            return Err(EngineError::invalid(format!(
                "audio lookahead must be >= 0, got {}",
                self.audio.lookahead
            )));
        }
        if !self.idle_timeout.is_finite() || self.idle_timeout < 0.0 {
            return Err(EngineError::invalid(format!(
                "idle timeout must be >= 0, got {}",
                self.idle_timeout
            )));
        }
        Ok(())
    }
}

/// Playfield layout
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FieldConfig {
    /// Height at which objects appear
    #[serde(default = "default_spawn_y")]
    pub spawn_y: f64,
    /// Height objects reach exactly on their beat
    #[serde(default)]
    pub baseline_y: f64,
    /// Units per second
    #[serde(default = "default_fall_speed")]
    pub fall_speed: f64,
    /// Miss-line distance below the baseline; derived from the perfect window when absent
    #[serde(default)]
    pub hit_window_distance: Option<f64>,
}

fn default_spawn_y() -> f64 {
    10.0
}
fn default_fall_speed() -> f64 {
    5.0
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            spawn_y: default_spawn_y(),
            baseline_y: 0.0,
            fall_speed: default_fall_speed(),
            hit_window_distance: None,
        }
    }
}

impl FieldConfig {
    /// Build the fall geometry for a run with the given perfect window
    pub fn geometry(&self, perfect_hit_window: f64) -> FallGeometry {
        let mut geometry = FallGeometry::new(
            self.spawn_y,
            self.baseline_y,
            self.fall_speed,
            perfect_hit_window,
        );
        if let Some(distance) = self.hit_window_distance {
            geometry.hit_window_distance = distance;
        }
        geometry
    }
}

/// Point values
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScoringConfig {
    #[serde(default = "default_perfect_hit_score")]
    pub perfect_hit_score: i64,
    /// Applied to an input outside the perfect window
    #[serde(default = "default_miss_score")]
    pub miss_hit_score: i64,
    /// Applied to a beat that expires unclaimed
    #[serde(default = "default_miss_score")]
    pub passive_miss_score: i64,
    /// Positive deltas in a row that make a streak; 0 disables
    #[serde(default = "default_streak_length")]
    pub streak_length: u32,
}

fn default_perfect_hit_score() -> i64 {
    10
}
fn default_miss_score() -> i64 {
    -10
}
fn default_streak_length() -> u32 {
    5
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            perfect_hit_score: default_perfect_hit_score(),
            miss_hit_score: default_miss_score(),
            passive_miss_score: default_miss_score(),
            streak_length: default_streak_length(),
        }
    }
}

/// Audio scheduling settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioSettings {
    /// Seconds before a beat at which its play command is issued
    #[serde(default = "default_lookahead")]
    pub lookahead: f64,
    /// Clips the audio collaborator can play
    #[serde(default)]
    pub clip_names: Vec<String>,
}

fn default_lookahead() -> f64 {
    0.1
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            lookahead: default_lookahead(),
            clip_names: Vec::new(),
        }
    }
}

/// Parameters of one run (one level)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LevelParameters {
    /// Fewest clips drawn for the run
    #[serde(default = "default_min_clips")]
    pub min_clips: usize,
    /// Most clips drawn for the run
    #[serde(default = "default_max_clips")]
    pub max_clips: usize,
    /// Seconds between beats
    #[serde(default = "default_beat_interval")]
    pub beat_interval: f64,
    /// Seconds of beats after the first one
    #[serde(default = "default_total_length")]
    pub total_length: f64,
    /// Seconds from run start to the first beat
    #[serde(default = "default_start_delay")]
    pub start_delay: f64,
    /// Largest gap, in seconds, that still counts as perfect
    #[serde(default = "default_perfect_hit_window")]
    pub perfect_hit_window: f64,
    /// Seconds a missed object keeps falling
    #[serde(default = "default_extra_fall_time")]
    pub extra_fall_time: f64,
    /// Score at which the level is passed
    #[serde(default = "default_score_threshold")]
    pub score_threshold: i64,
}

fn default_min_clips() -> usize {
    2
}
fn default_max_clips() -> usize {
    3
}
fn default_beat_interval() -> f64 {
    1.0
}
fn default_total_length() -> f64 {
    60.0
}
fn default_start_delay() -> f64 {
    1.0
}
fn default_perfect_hit_window() -> f64 {
    0.2
}
fn default_extra_fall_time() -> f64 {
    2.0
}
fn default_score_threshold() -> i64 {
    100
}

impl Default for LevelParameters {
    fn default() -> Self {
        Self {
            min_clips: default_min_clips(),
            max_clips: default_max_clips(),
            beat_interval: default_beat_interval(),
            total_length: default_total_length(),
            start_delay: default_start_delay(),
            perfect_hit_window: default_perfect_hit_window(),
            extra_fall_time: default_extra_fall_time(),
            score_threshold: default_score_threshold(),
        }
    }
}

impl LevelParameters {
    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if !self.beat_interval.is_finite() || self.beat_interval <= 0.0 {
            return Err(EngineError::invalid(format!(
                "beat interval must be > 0, got {}",
                self.beat_interval
            )));
        }
        if !self.total_length.is_finite() || self.total_length < 0.0 {
            return Err(EngineError::invalid(format!(
                "total length must be >= 0, got {}",
                self.total_length
            )));
        }
        if !self.start_delay.is_finite() || self.start_delay < 0.0 {
            return Err(EngineError::invalid(format!(
                "start delay must be >= 0, got {}",
                self.start_delay
            )));
        }
        if !self.perfect_hit_window.is_finite() || self.perfect_hit_window < 0.0 {
            return Err(EngineError::invalid(format!(
                "perfect hit window must be >= 0, got {}",
                self.perfect_hit_window
            )));
        }
        if !self.extra_fall_time.is_finite() || self.extra_fall_time < 0.0 {
            return Err(EngineError::invalid(format!(
                "extra fall time must be >= 0, got {}",
                self.extra_fall_time
            )));
        }
        if self.min_clips > self.max_clips {
            return Err(EngineError::invalid(format!(
                "min clips {} exceeds max clips {}",
                self.min_clips, self.max_clips
            )));
        }
        Ok(())
    }
}

/// Ordered list of levels
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LevelPack {
    #[serde(default)]
    pub levels: Vec<LevelParameters>,
}

impl LevelPack {
    /// Load from a YAML or TOML file and validate every level
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let pack: Self = read_as(path.as_ref())?;
        pack.validate()
            .with_context(|| format!("Invalid level pack: {:?}", path.as_ref()))?;
        Ok(pack)
    }

    /// Parse from a YAML string
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse YAML level pack")
    }

    /// Parse from a TOML string
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("Failed to parse TOML level pack")
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize level pack to YAML")
    }

    /// Save to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let yaml = self.to_yaml()?;
        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write level pack: {:?}", path.as_ref()))
    }

    /// Validate every level, naming the first bad one
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.levels.is_empty() {
            bail!("Level pack contains no levels");
        }
        for (i, level) in self.levels.iter().enumerate() {
            level.validate().with_context(|| format!("Level {}", i + 1))?;
        }
        Ok(())
    }

    /// Level by zero-based index
    pub fn level(&self, index: usize) -> Option<&LevelParameters> {
        self.levels.get(index)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
