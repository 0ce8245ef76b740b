// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Per-run clip selection.
//!
//! At run start a random subset of the available clips is drawn; every
//! beat then plays a uniformly random member of that subset.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Identifier of an audio clip known to the audio collaborator
pub type ClipId = String;

/// Random clip chooser for one run
#[derive(Debug, Clone)]
pub struct ClipPool {
    /// Clips drawn for the current run
    selected: Vec<ClipId>,
    rng: StdRng,
}

impl ClipPool {
    /// Draw between `min_clips` and `max_clips` clips (inclusive, capped by
    /// what is available). Duplicates are possible, as when drawing with
    /// replacement.
    pub fn draw(available: &[ClipId], min_clips: usize, max_clips: usize, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let selected = if available.is_empty() {
            Vec::new()
        } else {
            let max = max_clips.max(min_clips);
            let count = rng.gen_range(min_clips..=max).min(available.len());
            (0..count)
                .map(|_| available[rng.gen_range(0..available.len())].clone())
                .collect()
        };

        Self { selected, rng }
    }

    /// An empty pool; every beat is silent
    pub fn empty() -> Self {
        Self {
            selected: Vec::new(),
            rng: StdRng::seed_from_u64(0),
        }
    }

    /// Clips drawn for this run
    pub fn selected(&self) -> &[ClipId] {
        &self.selected
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Pick the clip for the next beat
    pub fn next_clip(&mut self) -> Option<ClipId> {
        if self.selected.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..self.selected.len());
        Some(self.selected[index].clone())
    }
}
