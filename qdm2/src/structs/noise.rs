//! Per-band noise envelopes.

use crate::utils::tables::{MAX_NOISE_LEVEL, NUM_BANDS, noise_amplitude};

/// Differential level update for a run of bands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoiseUpdate {
    pub type_code: u8,
    /// Target channel, `None` for joint updates.
    pub channel: Option<usize>,
    pub first_band: usize,
    pub deltas: Vec<i8>,
}

impl NoiseUpdate {
    pub fn applies_to(&self, channel: usize) -> bool {
        self.channel.is_none_or(|ch| ch == channel)
    }
}

/// Energy level of each band, 0 (silent) to 63.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoiseEnvelope {
    levels: [i32; NUM_BANDS],
}

impl Default for NoiseEnvelope {
    fn default() -> Self {
        Self {
            levels: [0; NUM_BANDS],
        }
    }
}

impl NoiseEnvelope {
    pub fn apply(&mut self, first_band: usize, deltas: &[i8]) {
        for (level, &delta) in self.levels[first_band..].iter_mut().zip(deltas) {
            *level = (*level + delta as i32).clamp(0, MAX_NOISE_LEVEL);
        }
    }

    pub fn level(&self, band: usize) -> i32 {
        self.levels[band]
    }

    pub fn levels(&self) -> &[i32; NUM_BANDS] {
        &self.levels
    }

    /// Per-bin amplitude of `band`.
    pub fn amplitude(&self, band: usize) -> f32 {
        noise_amplitude(self.levels[band])
    }

    pub fn is_silent(&self) -> bool {
        self.levels.iter().all(|&level| level == 0)
    }

    pub fn reset(&mut self) {
        self.levels = [0; NUM_BANDS];
    }
}
