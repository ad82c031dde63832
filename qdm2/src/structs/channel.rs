//! Per-channel decoder state.

use crate::structs::config::StreamConfig;
use crate::structs::noise::NoiseEnvelope;
use crate::structs::tone::ToneSet;
use crate::utils::tables::DEFAULT_NOISE_SEED;

#[derive(Debug, Clone)]
pub struct ChannelState {
    /// Windowed second half of the previous frame, added to the next one.
    pub overlap: Vec<f32>,
    pub tones: ToneSet,
    pub noise: NoiseEnvelope,
    pub noise_seed: u32,
    pub samples_emitted: u64,
}

impl ChannelState {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            overlap: vec![0.0; config.samples_per_frame],
            tones: ToneSet::new(config.samples_per_frame, config.coeffs_per_band),
            noise: NoiseEnvelope::default(),
            noise_seed: DEFAULT_NOISE_SEED,
            samples_emitted: 0,
        }
    }

    /// No tones, no noise and a silent overlap tail.
    pub fn is_silent(&self) -> bool {
        self.tones.is_empty() && self.noise.is_silent() && self.overlap.iter().all(|&s| s == 0.0)
    }
}

#[test]
fn new_channel_is_silent() {
    let config = crate::utils::testing::config(1, 8000, 256, 64);
    let channel = ChannelState::new(&config);
    assert!(channel.is_silent());
    assert_eq!(channel.overlap.len(), 256);
    assert_eq!(channel.noise_seed, DEFAULT_NOISE_SEED);
}
