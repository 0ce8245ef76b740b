// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Playback scheduler.
//!
//! Walks the beat schedule in order and, a short lookahead before each
//! beat, commands the audio collaborator to start a clip at the beat's
//! exact timestamp. Commands are fire-and-forget: the scheduler never waits
//! for playback, and a refused command only silences that one beat.

use tracing::{debug, warn};

use super::clips::{ClipId, ClipPool};
use super::schedule::BeatSchedule;
use crate::error::AudioError;

/// Handle to a voice started by the audio collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceHandle(pub u64);

/// Trait for the external audio subsystem.
///
/// Implementations are trusted to start playback sample-accurately at the
/// requested audio-clock time.
pub trait AudioSink: Send {
    /// Schedule `clip` to start at absolute time `at`.
    fn schedule_clip(&mut self, clip: &str, at: f64) -> Result<VoiceHandle, AudioError>;

    /// Whether the voice is still playing.
    fn is_playing(&self, voice: VoiceHandle) -> bool;

    /// Stop every playing voice and drop pending commands.
    fn cancel_all(&mut self);
}

/// What happened to one beat's audio
#[derive(Debug, Clone, PartialEq)]
pub enum CommandStatus {
    /// Accepted by the audio collaborator
    Scheduled(VoiceHandle),
    /// Refused by the audio collaborator
    Dropped(AudioError),
    /// No audio collaborator or no clips; the beat plays silently
    Silent,
    /// The beat time had already passed when it was considered
    Late,
}

/// One committed playback decision
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackCommand {
    /// Beat index in the schedule
    pub beat_index: usize,
    /// Clip chosen for the beat
    pub clip: Option<ClipId>,
    /// Absolute start time
    pub at: f64,
    pub status: CommandStatus,
}

/// Configuration for the playback scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Seconds before a beat at which its command is issued
    pub lookahead: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { lookahead: 0.1 }
    }
}

/// Issues one audio command per beat, in schedule order
pub struct PlaybackScheduler {
    /// External audio collaborator
    audio: Option<Box<dyn AudioSink>>,
    config: SchedulerConfig,
    /// Clip selection for the current run
    clips: ClipPool,
    /// Next beat to commit
    cursor: usize,
    /// Voices started during the current run
    voices: Vec<(usize, VoiceHandle)>,
    /// Beats whose audio was refused
    dropped: usize,
    /// Whether a run is active
    playing: bool,
}

impl PlaybackScheduler {
    /// Create a scheduler
    pub fn new(audio: Option<Box<dyn AudioSink>>) -> Self {
        Self::with_config(audio, SchedulerConfig::default())
    }

    /// Create scheduler with custom config
    pub fn with_config(audio: Option<Box<dyn AudioSink>>, config: SchedulerConfig) -> Self {
        Self {
            audio,
            config,
            clips: ClipPool::empty(),
            cursor: 0,
            voices: Vec::new(),
            dropped: 0,
            playing: false,
        }
    }

    /// Whether an audio collaborator is attached
    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    pub fn lookahead(&self) -> f64 {
        self.config.lookahead
    }

    /// Begin committing beats from the start of a fresh schedule
    pub fn start(&mut self, clips: ClipPool) {
        self.stop();
        self.clips = clips;
        self.playing = true;
    }

    /// Cancel outstanding audio and forget the run
    pub fn stop(&mut self) {
        if let Some(audio) = self.audio.as_mut() {
            audio.cancel_all();
        }
        self.playing = false;
        self.cursor = 0;
        self.voices.clear();
        self.dropped = 0;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Number of beats already committed
    pub fn committed(&self) -> usize {
        self.cursor
    }

    /// Beats whose audio was refused this run
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Whether every beat of `schedule` has been committed
    pub fn is_exhausted(&self, schedule: &BeatSchedule) -> bool {
        self.cursor >= schedule.len()
    }

    /// Voices of this run that are still sounding
    pub fn active_voices(&self) -> usize {
        match self.audio.as_ref() {
            Some(audio) => self
                .voices
                .iter()
                .filter(|(_, voice)| audio.is_playing(*voice))
                .count(),
            None => 0,
        }
    }

    /// Commit every beat due within the lookahead window
    pub fn poll(&mut self, schedule: &BeatSchedule, now: f64) -> Vec<PlaybackCommand> {
        if !self.playing {
            return Vec::new();
        }

        let horizon = now + self.config.lookahead;
        let mut commands = Vec::new();

        while let Some(beat) = schedule.get(self.cursor) {
            if beat.timestamp > horizon {
                break;
            }
            self.cursor += 1;
            commands.push(self.commit(beat.index, beat.timestamp, now));
        }

        commands
    }

    fn commit(&mut self, beat_index: usize, at: f64, now: f64) -> PlaybackCommand {
        if at < now {
            debug!(beat = beat_index, at, now, "beat already past, audio skipped");
            return PlaybackCommand {
                beat_index,
                clip: None,
                at,
                status: CommandStatus::Late,
            };
        }

        let clip = self.clips.next_clip();
        let status = match (self.audio.as_mut(), clip.as_deref()) {
            (Some(audio), Some(name)) => match audio.schedule_clip(name, at) {
                Ok(voice) => {
                    debug!(beat = beat_index, clip = name, at, "clip scheduled");
                    self.voices.push((beat_index, voice));
                    CommandStatus::Scheduled(voice)
                }
                Err(err) => {
                    warn!(beat = beat_index, clip = name, %err, "audio command refused, beat plays silently");
                    self.dropped += 1;
                    CommandStatus::Dropped(err)
                }
            },
            _ => CommandStatus::Silent,
        };

        PlaybackCommand {
            beat_index,
            clip,
            at,
            status,
        }
    }
}

impl Default for PlaybackScheduler {
    fn default() -> Self {
        Self::new(None)
    }
}
