use anyhow::{Result, bail};
use log::trace;

use crate::structs::sub_packet::{
    SubPacket, SubPacketClass, TYPE_CODE_MASK, TYPE_FLAG_LONG, TYPE_RESERVED_MASK,
    TYPE_TERMINATOR,
};
use crate::utils::checksum::{Algorithm, Checksum16, split_trailer};
use crate::utils::errors::PacketError;
use crate::utils::tables::MAX_SUB_PACKETS;

/// Sub-packet layout of one packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketLayout {
    pub header_type: u8,
    pub sub_packets: Vec<SubPacket>,
    pub checksum_read: u16,
    pub checksum_calculated: u16,
}

impl PacketLayout {
    pub fn checksum_ok(&self) -> bool {
        self.checksum_read == self.checksum_calculated
    }
}

/// Splits packets into typed sub-packets and verifies their checksum.
#[derive(Debug, Clone)]
pub struct Demuxer {
    frame_size: usize,
}

impl Demuxer {
    pub fn new(frame_size: usize) -> Self {
        Self { frame_size }
    }

    /// Demuxes a packet, failing on a checksum mismatch.
    pub fn demux(&self, packet: &[u8]) -> Result<PacketLayout> {
        let layout = self.scan(packet)?;

        if !layout.checksum_ok() {
            bail!(PacketError::ChecksumMismatch {
                calculated: layout.checksum_calculated,
                read: layout.checksum_read,
            });
        }

        Ok(layout)
    }

    /// Locates the sub-packets without rejecting a bad checksum.
    ///
    /// The verdict is reported through [`PacketLayout::checksum_ok`] and the
    /// `crc_ok` flag of every sub-packet.
    pub fn scan(&self, packet: &[u8]) -> Result<PacketLayout> {
        if packet.len() != self.frame_size {
            bail!(PacketError::SizeMismatch {
                expected: self.frame_size,
                actual: packet.len(),
            });
        }
        let Some((body, checksum_read)) = split_trailer(packet) else {
            bail!(PacketError::SizeMismatch {
                expected: self.frame_size,
                actual: packet.len(),
            });
        };

        let mut sub_packets: Vec<SubPacket> = Vec::with_capacity(MAX_SUB_PACKETS);
        let mut offset = 0;

        while offset < body.len() {
            let type_byte = body[offset];
            if !sub_packets.is_empty() && type_byte == TYPE_TERMINATOR {
                break;
            }
            if type_byte & TYPE_RESERVED_MASK != 0 {
                bail!(PacketError::ReservedTypeBits(type_byte));
            }

            let type_code = type_byte & TYPE_CODE_MASK;
            let Some(class) = SubPacketClass::of(type_code) else {
                bail!(PacketError::UnknownType(type_code));
            };

            match sub_packets.last() {
                None if class != SubPacketClass::Header => {
                    bail!(PacketError::MissingHeader(type_code))
                }
                Some(previous) if previous.class > class || class == SubPacketClass::Header => {
                    bail!(PacketError::OutOfOrder {
                        previous: previous.type_code,
                        found: type_code,
                    })
                }
                _ => {}
            }
            if sub_packets.iter().any(|s| s.type_code == type_code) {
                bail!(PacketError::DuplicateType(type_code));
            }
            if sub_packets.len() == MAX_SUB_PACKETS {
                bail!(PacketError::TooManySubPackets(MAX_SUB_PACKETS));
            }

            let length_bytes = if type_byte & TYPE_FLAG_LONG != 0 { 2 } else { 1 };
            let payload_start = offset + 1 + length_bytes;
            if payload_start > body.len() {
                bail!(PacketError::TruncatedHeader { offset });
            }
            let length = if length_bytes == 2 {
                u16::from_be_bytes([body[offset + 1], body[offset + 2]]) as usize
            } else {
                body[offset + 1] as usize
            };
            if length > body.len() - payload_start {
                bail!(PacketError::SubPacketOverrun {
                    code: type_code,
                    offset,
                    length,
                    available: body.len() - payload_start,
                });
            }

            trace!("sub-packet type {type_code} ({class}) at byte {offset}, {length} bytes");

            sub_packets.push(SubPacket {
                type_code,
                class,
                size: length << 3,
                payload_offset: payload_start << 3,
                crc_ok: true,
            });
            offset = payload_start + length;
        }

        let Some(header_type) = sub_packets.first().map(|s| s.type_code) else {
            bail!(PacketError::TruncatedHeader { offset: 0 });
        };

        // Header types are exactly the ones with a checksum algorithm.
        let checksum_calculated = Algorithm::for_header(header_type)
            .map(|alg| Checksum16::new(&alg).checksum(body))
            .unwrap_or_default();

        let crc_ok = checksum_calculated == checksum_read;
        for sub_packet in &mut sub_packets {
            sub_packet.crc_ok = crc_ok;
        }

        Ok(PacketLayout {
            header_type,
            sub_packets,
            checksum_read,
            checksum_calculated,
        })
    }
}
