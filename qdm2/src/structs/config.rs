//! Stream configuration and the extradata blob it is read from.
//!
//! The blob is a sequence of length-prefixed, FourCC-tagged chunks with
//! big-endian fields:
//!
//! | chunk  | contents                                                   |
//! |--------|------------------------------------------------------------|
//! | `frma` | codec FourCC, must be `QDM2`; chunk length is 12           |
//! | `QDCA` | version, channels, sample rate, bitrate, block size,       |
//! |        | frame size (bytes), packet size (samples); ≥ 36 bytes      |
//! | `QDCP` | optional profile bytes, kept but not interpreted           |
//! | `0`    | optional terminator, 8 bytes                               |

use anyhow::{Result, bail};
use log::{debug, info};

use crate::utils::errors::ExtraDataError;
use crate::utils::tables::{
    MAX_FRAME_BYTES, MAX_SAMPLE_RATE, MAX_SUB_PACKETS, MIN_FRAME_BYTES, NUM_BANDS, OVERSAMPLING,
    SUPPORTED_FRAME_SAMPLES,
};

pub const FRMA_TAG: [u8; 4] = *b"frma";
pub const QDM2_TAG: [u8; 4] = *b"QDM2";
pub const QDCA_TAG: [u8; 4] = *b"QDCA";
pub const QDCP_TAG: [u8; 4] = *b"QDCP";
pub const TERMINATOR_TAG: [u8; 4] = [0; 4];

const CHUNK_HEADER_LEN: usize = 8;
const FRMA_CHUNK_LEN: usize = 12;
const QDCA_CHUNK_LEN: usize = 36;

/// A chunk following `QDCA`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrailingChunk {
    /// `QDCP` profile payload.
    Profile(Vec<u8>),
    Terminator,
}

/// Immutable stream parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub version: u32,
    pub channels: usize,
    pub sample_rate: u32,
    pub bitrate: u32,
    /// Bytes per input block handed to the decoder.
    pub block_size: u32,
    /// Bytes per compressed packet.
    pub frame_size: usize,
    /// Samples per channel produced by one packet.
    pub samples_per_frame: usize,

    pub fft_order: u32,
    pub fft_size: usize,
    pub num_bands: usize,
    pub coeffs_per_band: usize,
    /// Packets per input block.
    pub group_size: usize,
    pub sub_packets_per_frame: usize,

    qdca_extra: Vec<u8>,
    trailing: Vec<TrailingChunk>,
}

struct ChunkReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ChunkReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], ExtraDataError> {
        let available = self.data.len() - self.offset;
        if available < n {
            return Err(ExtraDataError::TooShort {
                offset: self.offset,
                needed: n,
                available,
            });
        }

        let bytes = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(bytes)
    }

    fn u32(&mut self) -> Result<u32, ExtraDataError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn tag(&mut self) -> Result<[u8; 4], ExtraDataError> {
        let bytes = self.take(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Reads a chunk header, returning the tag and the payload length.
    fn chunk_header(&mut self) -> Result<([u8; 4], usize), ExtraDataError> {
        let size = self.u32()? as usize;
        let tag = self.tag()?;
        let available = self.data.len() - self.offset + CHUNK_HEADER_LEN;

        if size < CHUNK_HEADER_LEN || size > available {
            return Err(ExtraDataError::ChunkLengthMismatch {
                tag: tag_name(&tag),
                declared: size,
                available,
            });
        }

        Ok((tag, size - CHUNK_HEADER_LEN))
    }

    fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }
}

fn tag_name(tag: &[u8; 4]) -> String {
    tag.iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

impl StreamConfig {
    /// Parses and validates an extradata blob.
    pub fn from_extradata(extradata: &[u8]) -> Result<Self> {
        let reader = &mut ChunkReader {
            data: extradata,
            offset: 0,
        };

        let (tag, len) = reader.chunk_header()?;
        if tag != FRMA_TAG {
            bail!(ExtraDataError::UnexpectedTag {
                offset: 4,
                expected: tag_name(&FRMA_TAG),
                found: tag_name(&tag),
            });
        }
        if len + CHUNK_HEADER_LEN != FRMA_CHUNK_LEN {
            bail!(ExtraDataError::ChunkLengthMismatch {
                tag: tag_name(&tag),
                declared: len + CHUNK_HEADER_LEN,
                available: FRMA_CHUNK_LEN,
            });
        }
        let codec = reader.tag()?;
        if codec != QDM2_TAG {
            bail!(ExtraDataError::UnsupportedCodec(tag_name(&codec)));
        }

        let qdca_offset = reader.offset;
        let (tag, len) = reader.chunk_header()?;
        if tag != QDCA_TAG {
            bail!(ExtraDataError::UnexpectedTag {
                offset: qdca_offset + 4,
                expected: tag_name(&QDCA_TAG),
                found: tag_name(&tag),
            });
        }
        if len + CHUNK_HEADER_LEN < QDCA_CHUNK_LEN {
            bail!(ExtraDataError::ChunkLengthMismatch {
                tag: tag_name(&tag),
                declared: len + CHUNK_HEADER_LEN,
                available: QDCA_CHUNK_LEN,
            });
        }

        let version = reader.u32()?;
        let channels = reader.u32()?;
        let sample_rate = reader.u32()?;
        let bitrate = reader.u32()?;
        let block_size = reader.u32()?;
        let frame_size = reader.u32()?;
        let samples_per_frame = reader.u32()?;
        let qdca_extra = reader.take(len + CHUNK_HEADER_LEN - QDCA_CHUNK_LEN)?.to_vec();

        let mut trailing = Vec::new();
        while !reader.is_empty() {
            let offset = reader.offset;
            let (tag, len) = reader.chunk_header()?;
            match tag {
                QDCP_TAG => {
                    let profile = reader.take(len)?;
                    debug!("QDCP chunk with {} advisory bytes", profile.len());
                    trailing.push(TrailingChunk::Profile(profile.to_vec()));
                }
                TERMINATOR_TAG if len == 0 => trailing.push(TrailingChunk::Terminator),
                _ => bail!(ExtraDataError::UnexpectedTag {
                    offset: offset + 4,
                    expected: tag_name(&QDCP_TAG),
                    found: tag_name(&tag),
                }),
            }
        }

        let mut config = Self::with_parameters(
            version,
            channels,
            sample_rate,
            bitrate,
            block_size,
            frame_size,
            samples_per_frame,
        )?;
        config.qdca_extra = qdca_extra;
        config.trailing = trailing;

        info!(
            "QDM2 stream: {} ch, {} Hz, {} samples/frame, {} bytes/packet, {} bps",
            config.channels,
            config.sample_rate,
            config.samples_per_frame,
            config.frame_size,
            config.bitrate
        );

        Ok(config)
    }

    /// Validates raw `QDCA` fields and derives the coding parameters.
    pub fn with_parameters(
        version: u32,
        channels: u32,
        sample_rate: u32,
        bitrate: u32,
        block_size: u32,
        frame_size: u32,
        samples_per_frame: u32,
    ) -> Result<Self> {
        if !(1..=2).contains(&channels) {
            bail!(ExtraDataError::UnsupportedChannels(channels));
        }
        if !(1..=MAX_SAMPLE_RATE).contains(&sample_rate) {
            bail!(ExtraDataError::UnsupportedSampleRate(sample_rate));
        }
        if !SUPPORTED_FRAME_SAMPLES.contains(&samples_per_frame) {
            bail!(ExtraDataError::UnsupportedFrameSamples(samples_per_frame));
        }
        if !(MIN_FRAME_BYTES..=MAX_FRAME_BYTES).contains(&frame_size) {
            bail!(ExtraDataError::UnsupportedFrameSize(frame_size));
        }
        if block_size == 0 {
            bail!(ExtraDataError::ZeroBlockSize);
        }

        let samples_per_frame = samples_per_frame as usize;
        let fft_size = samples_per_frame * OVERSAMPLING;

        Ok(Self {
            version,
            channels: channels as usize,
            sample_rate,
            bitrate,
            block_size,
            frame_size: frame_size as usize,
            samples_per_frame,
            fft_order: fft_size.trailing_zeros(),
            fft_size,
            num_bands: NUM_BANDS,
            coeffs_per_band: samples_per_frame / NUM_BANDS,
            group_size: (block_size / frame_size).max(1) as usize,
            sub_packets_per_frame: MAX_SUB_PACKETS,
            qdca_extra: Vec::new(),
            trailing: Vec::new(),
        })
    }

    /// Serializes the configuration back into an extradata blob.
    pub fn to_extradata(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(FRMA_CHUNK_LEN + QDCA_CHUNK_LEN + self.qdca_extra.len());

        blob.extend_from_slice(&(FRMA_CHUNK_LEN as u32).to_be_bytes());
        blob.extend_from_slice(&FRMA_TAG);
        blob.extend_from_slice(&QDM2_TAG);

        blob.extend_from_slice(&((QDCA_CHUNK_LEN + self.qdca_extra.len()) as u32).to_be_bytes());
        blob.extend_from_slice(&QDCA_TAG);
        for value in [
            self.version,
            self.channels as u32,
            self.sample_rate,
            self.bitrate,
            self.block_size,
            self.frame_size as u32,
            self.samples_per_frame as u32,
        ] {
            blob.extend_from_slice(&value.to_be_bytes());
        }
        blob.extend_from_slice(&self.qdca_extra);

        for chunk in &self.trailing {
            match chunk {
                TrailingChunk::Profile(profile) => {
                    blob.extend_from_slice(&((CHUNK_HEADER_LEN + profile.len()) as u32).to_be_bytes());
                    blob.extend_from_slice(&QDCP_TAG);
                    blob.extend_from_slice(profile);
                }
                TrailingChunk::Terminator => {
                    blob.extend_from_slice(&(CHUNK_HEADER_LEN as u32).to_be_bytes());
                    blob.extend_from_slice(&TERMINATOR_TAG);
                }
            }
        }

        blob
    }

    pub fn is_stereo(&self) -> bool {
        self.channels == 2
    }

    /// Interleaved samples produced by one packet.
    pub fn frame_samples(&self) -> usize {
        self.samples_per_frame * self.channels
    }

    /// Bits used to code a tone position within its band.
    pub fn position_bits(&self) -> u32 {
        self.coeffs_per_band.trailing_zeros()
    }

    pub fn profile(&self) -> Option<&[u8]> {
        self.trailing.iter().find_map(|chunk| match chunk {
            TrailingChunk::Profile(profile) => Some(profile.as_slice()),
            TrailingChunk::Terminator => None,
        })
    }

    pub fn trailing_chunks(&self) -> &[TrailingChunk] {
        &self.trailing
    }

    /// Duration of one packet in seconds.
    pub fn frame_duration(&self) -> f64 {
        self.samples_per_frame as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::errors::{ErrorKind, error_kind};
    use crate::utils::testing::extradata;

    #[test]
    fn parses_and_derives() {
        let config = StreamConfig::from_extradata(&extradata(2, 44100, 512, 256)).unwrap();
        assert_eq!(config.channels, 2);
        assert!(config.is_stereo());
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.samples_per_frame, 512);
        assert_eq!(config.frame_size, 256);
        assert_eq!(config.fft_size, 1024);
        assert_eq!(config.fft_order, 10);
        assert_eq!(config.coeffs_per_band, 16);
        assert_eq!(config.position_bits(), 4);
        assert_eq!(config.group_size, 1);
        assert_eq!(config.frame_samples(), 1024);
        assert_eq!(config.trailing_chunks(), [TrailingChunk::Terminator]);
    }

    #[test]
    fn round_trips_byte_for_byte() {
        let mut blob = extradata(1, 22050, 256, 128);
        assert_eq!(
            StreamConfig::from_extradata(&blob).unwrap().to_extradata(),
            blob
        );

        // QDCA with extra bytes, a profile chunk and no terminator
        blob.truncate(blob.len() - 8);
        blob[15] = 40;
        blob.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        blob.extend_from_slice(&11u32.to_be_bytes());
        blob.extend_from_slice(b"QDCP");
        blob.extend_from_slice(&[1, 2, 3]);

        let config = StreamConfig::from_extradata(&blob).unwrap();
        assert_eq!(config.profile(), Some(&[1u8, 2, 3][..]));
        assert_eq!(config.to_extradata(), blob);
    }

    #[test]
    fn rejects_unsupported_channel_count() {
        let err = StreamConfig::from_extradata(&extradata(3, 44100, 512, 256)).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::BadExtradata));
        assert_eq!(
            err.downcast_ref::<ExtraDataError>(),
            Some(&ExtraDataError::UnsupportedChannels(3))
        );
    }

    #[test]
    fn rejects_wrong_tags() {
        let mut blob = extradata(2, 44100, 512, 256);
        blob[4..8].copy_from_slice(b"frmb");
        let err = StreamConfig::from_extradata(&blob).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::BadExtradata));

        let mut blob = extradata(2, 44100, 512, 256);
        blob[8..12].copy_from_slice(b"QDMC");
        let err = StreamConfig::from_extradata(&blob).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExtraDataError>(),
            Some(ExtraDataError::UnsupportedCodec(_))
        ));

        let mut blob = extradata(2, 44100, 512, 256);
        let len = blob.len();
        blob[len - 4..].copy_from_slice(b"junk");
        let err = StreamConfig::from_extradata(&blob).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::BadExtradata));
    }

    #[test]
    fn rejects_bad_lengths_and_values() {
        let blob = extradata(2, 44100, 512, 256);
        for cut in [0, 3, 11, 20, 47] {
            let err = StreamConfig::from_extradata(&blob[..cut]).unwrap_err();
            assert_eq!(error_kind(&err), Some(ErrorKind::BadExtradata), "cut {cut}");
        }

        let mut overrun = blob.clone();
        overrun[15] = 200;
        assert!(StreamConfig::from_extradata(&overrun).is_err());

        for (spf, frame_size) in [(500, 256), (4096, 256), (512, 3), (512, 70000)] {
            assert!(StreamConfig::from_extradata(&extradata(1, 8000, spf, frame_size)).is_err());
        }
        assert!(StreamConfig::from_extradata(&extradata(1, 0, 512, 256)).is_err());
        assert!(StreamConfig::with_parameters(1, 1, 8000, 0, 0, 256, 512).is_err());
    }
}
