//! Packet checksum.
//!
//! Packets carry a 16-bit additive checksum over every byte of the packet
//! body. The running sum starts from a value selected by the type of the
//! header sub-packet.
//!
//! Note: this is a plain wrapping byte sum, not a CRC.

use crate::utils::tables::CHECKSUM_INIT;

/// Checksum parameters for one header type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Algorithm {
    init: u16,
}

/// Checksum used for packets starting with header type 0.
pub const CHECKSUM_PLAIN_ALG: Algorithm = Algorithm {
    init: CHECKSUM_INIT[0],
};

/// Checksum used for packets starting with header type 1.
pub const CHECKSUM_SEEDED_ALG: Algorithm = Algorithm {
    init: CHECKSUM_INIT[1],
};

impl Algorithm {
    /// Algorithm for a header sub-packet type, if it is one.
    pub const fn for_header(header_type: u8) -> Option<Self> {
        match header_type {
            0 => Some(CHECKSUM_PLAIN_ALG),
            1 => Some(CHECKSUM_SEEDED_ALG),
            _ => None,
        }
    }

    pub const fn init(&self) -> u16 {
        self.init
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Checksum16 {
    pub init: u16,
}

impl Checksum16 {
    pub const fn new(algorithm: &Algorithm) -> Self {
        Self {
            init: algorithm.init,
        }
    }

    #[inline(always)]
    pub const fn update(&self, mut sum: u16, bytes: &[u8]) -> u16 {
        let mut i = 0;

        while i < bytes.len() {
            sum = sum.wrapping_add(bytes[i] as u16);
            i += 1;
        }

        sum
    }

    #[inline(always)]
    pub const fn checksum(&self, bytes: &[u8]) -> u16 {
        self.update(self.init, bytes)
    }
}

/// Splits a packet into its body and the stored big-endian checksum.
pub fn split_trailer(packet: &[u8]) -> Option<(&[u8], u16)> {
    let (body, trailer) = packet.split_at_checked(packet.len().checked_sub(2)?)?;
    Some((body, u16::from_be_bytes([trailer[0], trailer[1]])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_wrap_at_sixteen_bits() {
        let crc = Checksum16::new(&CHECKSUM_PLAIN_ALG);
        assert_eq!(crc.checksum(&[]), 0);
        assert_eq!(crc.checksum(&[1, 2, 3]), 6);
        assert_eq!(crc.checksum(&[0xFF; 258]), (0xFFu32 * 258 % 0x10000) as u16);

        let seeded = Checksum16::new(&CHECKSUM_SEEDED_ALG);
        assert_eq!(seeded.checksum(&[0x01]), 0x5154);
        assert_eq!(seeded.update(0xFFFF, &[0x02]), 0x0001);
    }

    #[test]
    fn header_selects_init() {
        assert_eq!(Algorithm::for_header(0), Some(CHECKSUM_PLAIN_ALG));
        assert_eq!(Algorithm::for_header(1).map(|a| a.init()), Some(0x5153));
        assert_eq!(Algorithm::for_header(2), None);
    }

    #[test]
    fn trailer_is_big_endian() {
        assert_eq!(
            split_trailer(&[9, 8, 0x12, 0x34]),
            Some((&[9u8, 8][..], 0x1234))
        );
        assert_eq!(split_trailer(&[0x12, 0x34]), Some((&[][..], 0x1234)));
        assert_eq!(split_trailer(&[0x12]), None);
    }
}
