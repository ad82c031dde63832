//! Typed regions of a packet.

use std::fmt::Display;
use std::ops::Range;

/// Type byte flag: the payload length is coded on 16 bits.
pub const TYPE_FLAG_LONG: u8 = 0x80;
/// Type byte bits that must be zero.
pub const TYPE_RESERVED_MASK: u8 = 0x60;
pub const TYPE_CODE_MASK: u8 = 0x1F;
/// A zero type byte after the header ends the sub-packet list.
pub const TYPE_TERMINATOR: u8 = 0x00;

pub const HEADER_PLAIN: u8 = 0;
pub const HEADER_SEEDED: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubPacketClass {
    Header,
    Noise,
    Tone,
}

impl SubPacketClass {
    /// Class of a type code, `None` for codes the format does not define.
    pub fn of(type_code: u8) -> Option<Self> {
        match type_code {
            0 | 1 => Some(Self::Header),
            2..=4 | 13..=15 => Some(Self::Noise),
            8..=12 => Some(Self::Tone),
            _ => None,
        }
    }
}

impl Display for SubPacketClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubPacketClass::Header => write!(f, "header"),
            SubPacketClass::Noise => write!(f, "noise"),
            SubPacketClass::Tone => write!(f, "tone"),
        }
    }
}

/// A sub-packet located within a packet. Offsets and sizes are in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubPacket {
    pub type_code: u8,
    pub class: SubPacketClass,
    pub size: usize,
    pub payload_offset: usize,
    pub crc_ok: bool,
}

impl SubPacket {
    pub fn payload<'a>(&self, packet: &'a [u8]) -> &'a [u8] {
        let start = self.payload_offset >> 3;
        &packet[start..start + (self.size >> 3)]
    }

    pub fn payload_len(&self) -> usize {
        self.size >> 3
    }

    /// Noise sub-packets applied to every channel at once.
    pub fn is_joint_noise(&self) -> bool {
        matches!(self.type_code, 13..=15)
    }
}

/// Bands covered by a noise sub-packet type.
pub fn noise_band_range(type_code: u8) -> Option<Range<usize>> {
    match type_code {
        2 | 13 => Some(0..8),
        3 | 14 => Some(8..16),
        4 | 15 => Some(16..32),
        _ => None,
    }
}

/// Bands addressed by a tone sub-packet type.
pub fn tone_band_range(type_code: u8) -> Option<Range<usize>> {
    match type_code {
        8 => Some(0..4),
        9 => Some(4..8),
        10 => Some(8..16),
        11 => Some(16..32),
        12 => Some(0..32),
        _ => None,
    }
}

/// Whether a tone sub-packet type may introduce new tones.
pub fn tone_allows_add(type_code: u8) -> bool {
    (8..=11).contains(&type_code)
}

#[test]
fn classes_and_ranges() {
    assert_eq!(SubPacketClass::of(1), Some(SubPacketClass::Header));
    assert_eq!(SubPacketClass::of(14), Some(SubPacketClass::Noise));
    assert_eq!(SubPacketClass::of(12), Some(SubPacketClass::Tone));
    for code in [5, 6, 7, 16, 31] {
        assert_eq!(SubPacketClass::of(code), None);
    }
    assert!(SubPacketClass::Header < SubPacketClass::Noise);
    assert!(SubPacketClass::Noise < SubPacketClass::Tone);

    // every noise and tone type maps to a band range
    for code in 0..32u8 {
        match SubPacketClass::of(code) {
            Some(SubPacketClass::Noise) => assert!(noise_band_range(code).is_some()),
            Some(SubPacketClass::Tone) => assert!(tone_band_range(code).is_some()),
            _ => {
                assert!(noise_band_range(code).is_none());
                assert!(tone_band_range(code).is_none());
            }
        }
    }
    assert!(!tone_allows_add(12));
}
