//! Constant tables for packet decoding and synthesis.
//!
//! The VLC length/symbol pairs define the canonical codes accepted in noise
//! and tone sub-packets. Every table is a complete prefix code (its Kraft
//! sum is exactly one), so any bit pattern long enough decodes to a symbol.
//! Amplitude and phase tables are derived once from closed-form expressions.

use std::sync::LazyLock;

/// Frequency bands per channel.
pub const NUM_BANDS: usize = 32;

/// Upper bound on sub-packets in one packet, header included.
pub const MAX_SUB_PACKETS: usize = 16;

/// Accepted values of the `packet_size` (samples per frame) field.
pub const SUPPORTED_FRAME_SAMPLES: [u32; 5] = [128, 256, 512, 1024, 2048];

/// Smallest packet: type byte, length byte and the checksum.
pub const MIN_FRAME_BYTES: u32 = 4;
pub const MAX_FRAME_BYTES: u32 = 0xFFFF;

pub const MAX_SAMPLE_RATE: u32 = 96_000;

/// FFT size relative to the samples produced per frame.
pub const OVERSAMPLING: usize = 2;

pub const MAX_NOISE_LEVEL: i32 = 63;
pub const MAX_TONE_LEVEL: i32 = 47;

/// Level steps removed from an untouched tone once its hold time is over.
pub const TONE_DECAY_STEP: i32 = 2;
/// Tones below this level are dropped.
pub const TONE_MIN_LEVEL: i32 = 4;

/// Tone phases are coded in units of π/4.
pub const TONE_PHASE_BITS: u32 = 3;
pub const TONE_PHASE_STEPS: u32 = 1 << TONE_PHASE_BITS;

/// Initial checksum value per header sub-packet type.
pub const CHECKSUM_INIT: [u16; 2] = [0x0000, 0x5153];

/// Header flag: drop every active tone before applying this frame's updates.
pub const HEADER_FLAG_RESET_TONES: u8 = 0x01;
/// Header flag: zero every noise envelope before applying this frame's updates.
pub const HEADER_FLAG_RESET_NOISE: u8 = 0x02;

pub const DEFAULT_NOISE_SEED: u32 = 0x5144_4D32;

/// Bands below this index take their noise deltas from the low-band table.
pub const NOISE_LOW_BANDS: usize = 8;

// Noise envelope deltas, low bands.
pub const NOISE_LOW_SYMBOLS: [i16; 13] = [0, 1, -1, 2, -2, 3, -3, 4, -4, 5, -5, 6, -6];
pub const NOISE_LOW_LENGTHS: [u8; 13] = [1, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 7, 7];

// Noise envelope deltas, high bands.
pub const NOISE_HIGH_SYMBOLS: [i16; 7] = [0, 1, -1, 2, -2, 3, -3];
pub const NOISE_HIGH_LENGTHS: [u8; 7] = [1, 3, 3, 4, 4, 4, 4];

pub const TONE_CMD_END: i32 = 0;
pub const TONE_CMD_ADD: i32 = 1;
pub const TONE_CMD_REFRESH: i32 = 2;
pub const TONE_CMD_DELETE: i32 = 3;

pub const TONE_COMMAND_SYMBOLS: [i16; 4] = [0, 1, 2, 3];
pub const TONE_COMMAND_LENGTHS: [u8; 4] = [2, 1, 3, 3];

// Band distance from the previous tone command.
pub const BAND_RUN_SYMBOLS: [i16; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];
pub const BAND_RUN_LENGTHS: [u8; 16] = [2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 8, 8];

#[rustfmt::skip]
pub const TONE_LEVEL_SYMBOLS: [i16; 48] = [
     0,  1,  2,  3,  4,  5,  6,  7,  8,  9, 10, 11, 12, 13, 14, 15,
    16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31,
    32, 33, 34, 35, 36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47,
];
#[rustfmt::skip]
pub const TONE_LEVEL_LENGTHS: [u8; 48] = [
    6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 5, 5, 5, 5,
    5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 6, 6, 6, 6,
    6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6,
];

// Hold time exponent: symbol d holds a tone for 2^d frames.
pub const TONE_DURATION_SYMBOLS: [i16; 5] = [0, 1, 2, 3, 4];
pub const TONE_DURATION_LENGTHS: [u8; 5] = [3, 1, 2, 4, 4];

/// Per-bin noise amplitude by envelope level; level 0 is silent.
pub fn noise_amplitude(level: i32) -> f32 {
    static TABLE: LazyLock<[f32; 64]> = LazyLock::new(|| {
        let mut table = [0.0f32; 64];
        for (level, amp) in table.iter_mut().enumerate().skip(1) {
            *amp = (2048.0 * ((level as f64 - 63.0) / 3.0).exp2()) as f32;
        }
        table
    });

    TABLE[level.clamp(0, MAX_NOISE_LEVEL) as usize]
}

/// Peak amplitude of a tone by level.
pub fn tone_amplitude(level: i32) -> f32 {
    static TABLE: LazyLock<[f32; 48]> = LazyLock::new(|| {
        let mut table = [0.0f32; 48];
        for (level, amp) in table.iter_mut().enumerate() {
            *amp = (16384.0 * ((level as f64 - 47.0) / 4.0).exp2()) as f32;
        }
        table
    });

    TABLE[level.clamp(0, MAX_TONE_LEVEL) as usize]
}

/// Unit phasor for `index` steps of 2π/256.
pub fn phasor(index: u8) -> (f32, f32) {
    static TABLE: LazyLock<[(f32, f32); 256]> = LazyLock::new(|| {
        let mut table = [(0.0f32, 0.0f32); 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let theta = std::f64::consts::TAU * i as f64 / 256.0;
            *entry = (theta.cos() as f32, theta.sin() as f32);
        }
        table
    });

    TABLE[index as usize]
}
