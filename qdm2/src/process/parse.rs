use anyhow::{Context, Result, bail};
use log::trace;

use crate::process::demux::PacketLayout;
use crate::structs::config::StreamConfig;
use crate::structs::noise::NoiseUpdate;
use crate::structs::sub_packet::{
    HEADER_SEEDED, SubPacket, SubPacketClass, noise_band_range, tone_allows_add, tone_band_range,
};
use crate::structs::tone::{ToneCommand, ToneOp};
use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::errors::PacketError;
use crate::utils::tables::{
    HEADER_FLAG_RESET_NOISE, HEADER_FLAG_RESET_TONES, TONE_CMD_ADD, TONE_CMD_DELETE,
    TONE_CMD_END, TONE_CMD_REFRESH, TONE_PHASE_BITS,
};
use crate::utils::vlc::{VlcLibrary, vlc_library};

/// Frame-global values from the header sub-packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameHeader {
    pub type_code: u8,
    pub flags: u8,
    pub noise_seed: Option<u16>,
}

impl FrameHeader {
    pub fn reset_tones(&self) -> bool {
        self.flags & HEADER_FLAG_RESET_TONES != 0
    }

    pub fn reset_noise(&self) -> bool {
        self.flags & HEADER_FLAG_RESET_NOISE != 0
    }
}

/// Every state change carried by one packet, in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameUpdate {
    pub header: FrameHeader,
    pub noise: Vec<NoiseUpdate>,
    pub tones: Vec<ToneCommand>,
}

impl FrameUpdate {
    /// An update that changes nothing.
    pub fn is_empty(&self) -> bool {
        self.header.flags == 0
            && self.header.noise_seed.is_none()
            && self.noise.iter().all(|u| u.deltas.iter().all(|&d| d == 0))
            && self.tones.is_empty()
    }
}

/// Decodes sub-packet payloads into a [`FrameUpdate`].
///
/// Parsing never touches decoder state, so a packet that fails anywhere
/// leaves nothing half applied.
#[derive(Debug, Clone)]
pub struct Parser {
    channels: usize,
    position_bits: u32,
    vlc: &'static VlcLibrary,
}

impl Parser {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            channels: config.channels,
            position_bits: config.position_bits(),
            vlc: vlc_library(),
        }
    }

    pub fn parse(&self, packet: &[u8], layout: &PacketLayout) -> Result<FrameUpdate> {
        let mut update = FrameUpdate::default();

        for sub_packet in &layout.sub_packets {
            let payload = sub_packet.payload(packet);
            let reader = &mut BsIoSliceReader::from_slice(payload);

            match sub_packet.class {
                SubPacketClass::Header => {
                    update.header = self
                        .read_header(sub_packet, reader)
                        .with_context(|| format!("header sub-packet {}", sub_packet.type_code))?;
                }
                SubPacketClass::Noise => {
                    self.read_noise(sub_packet, reader, &mut update.noise)
                        .with_context(|| format!("noise sub-packet {}", sub_packet.type_code))?;
                }
                SubPacketClass::Tone => {
                    if payload.is_empty() {
                        continue;
                    }
                    self.read_tones(sub_packet, reader, &mut update.tones)
                        .with_context(|| format!("tone sub-packet {}", sub_packet.type_code))?;
                }
            }
        }

        Ok(update)
    }

    fn read_header(&self, sub_packet: &SubPacket, reader: &mut BsIoSliceReader) -> Result<FrameHeader> {
        let mut header = FrameHeader {
            type_code: sub_packet.type_code,
            ..Default::default()
        };

        if sub_packet.type_code == HEADER_SEEDED {
            header.flags = reader.get_n(8)?;
            header.noise_seed = Some(reader.get_n(16)?);
        } else if reader.available() >= 8 {
            header.flags = reader.get_n(8)?;
        }

        trace!(
            "header type {}: flags {:#04X}, seed {:?}",
            header.type_code, header.flags, header.noise_seed
        );

        Ok(header)
    }

    fn read_noise(
        &self,
        sub_packet: &SubPacket,
        reader: &mut BsIoSliceReader,
        updates: &mut Vec<NoiseUpdate>,
    ) -> Result<()> {
        let Some(bands) = noise_band_range(sub_packet.type_code) else {
            bail!(PacketError::UnknownType(sub_packet.type_code));
        };

        let targets = if sub_packet.is_joint_noise() {
            vec![None]
        } else {
            (0..self.channels).map(Some).collect()
        };

        for channel in targets {
            if !reader.get()? {
                continue;
            }

            let deltas = bands
                .clone()
                .map(|band| Ok(reader.get_symbol(self.vlc.noise_delta(band))? as i8))
                .collect::<Result<Vec<_>>>()?;

            trace!(
                "noise type {} channel {channel:?}: bands {bands:?} deltas {deltas:?}",
                sub_packet.type_code
            );

            updates.push(NoiseUpdate {
                type_code: sub_packet.type_code,
                channel,
                first_band: bands.start,
                deltas,
            });
        }

        Ok(())
    }

    fn read_tones(
        &self,
        sub_packet: &SubPacket,
        reader: &mut BsIoSliceReader,
        commands: &mut Vec<ToneCommand>,
    ) -> Result<()> {
        let code = sub_packet.type_code;
        let Some(bands) = tone_band_range(code) else {
            bail!(PacketError::UnknownType(code));
        };

        let mut band = bands.start;
        loop {
            let command = reader.get_symbol(&self.vlc.tone_command)?;
            if command == TONE_CMD_END {
                return Ok(());
            }

            band += reader.get_symbol(&self.vlc.band_run)? as usize;
            if !bands.contains(&band) {
                bail!(PacketError::ToneBandOutOfRange {
                    code,
                    band,
                    start: bands.start,
                    end: bands.end,
                });
            }

            let channel = if self.channels == 2 {
                reader.get()? as usize
            } else {
                0
            };
            let position = reader.get_n::<u32>(self.position_bits)? as usize;

            let op = match command {
                TONE_CMD_ADD => {
                    if !tone_allows_add(code) {
                        bail!(PacketError::ToneAddNotAllowed(code));
                    }
                    let level = reader.get_symbol(&self.vlc.tone_level)?;
                    let phase = reader.get_n::<u8>(TONE_PHASE_BITS)?;
                    let duration = 1 << reader.get_symbol(&self.vlc.tone_duration)?;
                    ToneOp::Add {
                        level,
                        phase,
                        duration,
                    }
                }
                TONE_CMD_REFRESH => ToneOp::Refresh,
                TONE_CMD_DELETE => ToneOp::Delete,
                _ => unreachable!("tone command table only holds four symbols"),
            };

            trace!("tone type {code}: {op:?} at band {band} position {position} channel {channel}");

            commands.push(ToneCommand {
                type_code: code,
                channel,
                band,
                position,
                op,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::demux::Demuxer;
    use crate::utils::errors::{ErrorKind, error_kind};
    use crate::utils::testing::{BitWriter, PacketBuilder, config};

    fn parse(config: &StreamConfig, packet: &[u8]) -> Result<FrameUpdate> {
        let layout = Demuxer::new(config.frame_size).demux(packet)?;
        Parser::new(config).parse(packet, &layout)
    }

    #[test]
    fn empty_packet_is_no_update() {
        let config = config(2, 44100, 512, 128);
        let update = parse(&config, &[0; 128]).unwrap();
        assert!(update.is_empty());
        assert_eq!(update, FrameUpdate::default());
    }

    #[test]
    fn header_flags_and_seed() {
        let config = config(1, 22050, 256, 64);
        let packet = PacketBuilder::new(64).header(1, &[0x03, 0xBE, 0xEF]).build();
        let update = parse(&config, &packet).unwrap();
        assert!(update.header.reset_tones());
        assert!(update.header.reset_noise());
        assert_eq!(update.header.noise_seed, Some(0xBEEF));

        let packet = PacketBuilder::new(64).header(1, &[0x03]).build();
        let err = parse(&config, &packet).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Truncated));
    }

    #[test]
    fn per_channel_and_joint_noise() {
        let config = config(2, 44100, 512, 128);
        let vlc = vlc_library();

        // channel 0 absent, channel 1 present with deltas +1..
        let mut bits = BitWriter::default();
        bits.put_bit(false);
        bits.put_bit(true);
        for band in 8..16 {
            bits.put_vlc(vlc.noise_delta(band), if band % 2 == 0 { 3 } else { -2 });
        }
        let per_channel = bits.into_bytes();

        let mut bits = BitWriter::default();
        bits.put_bit(true);
        for band in 0..8 {
            bits.put_vlc(vlc.noise_delta(band), band as i32 - 4);
        }
        let joint = bits.into_bytes();

        let packet = PacketBuilder::new(128)
            .sub_packet(3, per_channel)
            .sub_packet(13, joint)
            .build();
        let update = parse(&config, &packet).unwrap();

        assert_eq!(update.noise.len(), 2);
        assert_eq!(update.noise[0].channel, Some(1));
        assert_eq!(update.noise[0].first_band, 8);
        assert_eq!(update.noise[0].deltas, [3, -2, 3, -2, 3, -2, 3, -2]);
        assert_eq!(update.noise[1].channel, None);
        assert_eq!(update.noise[1].deltas, [-4, -3, -2, -1, 0, 1, 2, 3]);
    }

    #[test]
    fn tone_commands() {
        let config = config(2, 44100, 512, 128);
        let vlc = vlc_library();

        let mut bits = BitWriter::default();
        // add at band 9 (run 1 from 8), channel 1, position 5
        bits.put_vlc(&vlc.tone_command, TONE_CMD_ADD);
        bits.put_vlc(&vlc.band_run, 1);
        bits.put_bit(true);
        bits.put(5, 4);
        bits.put_vlc(&vlc.tone_level, 30);
        bits.put(6, 3);
        bits.put_vlc(&vlc.tone_duration, 2);
        // delete at band 15 (run 6), channel 0, position 0
        bits.put_vlc(&vlc.tone_command, TONE_CMD_DELETE);
        bits.put_vlc(&vlc.band_run, 6);
        bits.put_bit(false);
        bits.put(0, 4);
        bits.put_vlc(&vlc.tone_command, TONE_CMD_END);

        let packet = PacketBuilder::new(128)
            .sub_packet(10, bits.into_bytes())
            .build();
        let update = parse(&config, &packet).unwrap();

        assert_eq!(
            update.tones,
            [
                ToneCommand {
                    type_code: 10,
                    channel: 1,
                    band: 9,
                    position: 5,
                    op: ToneOp::Add {
                        level: 30,
                        phase: 6,
                        duration: 4
                    }
                },
                ToneCommand {
                    type_code: 10,
                    channel: 0,
                    band: 15,
                    position: 0,
                    op: ToneOp::Delete
                }
            ]
        );
    }

    #[test]
    fn tone_errors() {
        let config = config(1, 44100, 512, 128);
        let vlc = vlc_library();

        // band run leaves the range of type 8
        let mut bits = BitWriter::default();
        bits.put_vlc(&vlc.tone_command, TONE_CMD_REFRESH);
        bits.put_vlc(&vlc.band_run, 4);
        bits.put(0, 4);
        bits.put_vlc(&vlc.tone_command, TONE_CMD_END);
        let packet = PacketBuilder::new(128)
            .sub_packet(8, bits.into_bytes())
            .build();
        let err = parse(&config, &packet).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Malformed));

        // type 12 may not add
        let mut bits = BitWriter::default();
        bits.put_vlc(&vlc.tone_command, TONE_CMD_ADD);
        bits.put_vlc(&vlc.band_run, 0);
        bits.put(0, 4);
        bits.put_vlc(&vlc.tone_level, 0);
        bits.put(0, 3);
        bits.put_vlc(&vlc.tone_duration, 0);
        bits.put_vlc(&vlc.tone_command, TONE_CMD_END);
        let packet = PacketBuilder::new(128)
            .sub_packet(12, bits.into_bytes())
            .build();
        let err = parse(&config, &packet).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PacketError>(),
            Some(&PacketError::ToneAddNotAllowed(12))
        );

        // command list without an end marker
        let mut bits = BitWriter::default();
        bits.put_vlc(&vlc.tone_command, TONE_CMD_DELETE);
        let packet = PacketBuilder::new(128)
            .sub_packet(9, bits.into_bytes())
            .build();
        let err = parse(&config, &packet).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Truncated));
    }
}
