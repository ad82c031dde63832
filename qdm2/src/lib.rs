#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! Decoder for QDesign Music 2 (QDM2) packets as carried in QuickTime and
//! RealMedia containers.
//!
//! ### Stream Configuration
//!
//! Every stream starts from an extradata blob made of `frma`, `QDCA` and
//! optional `QDCP` chunks. It fixes the channel count (mono or stereo), the
//! sample rate, the packet size and the number of samples per frame.
//!
//! ### Packet Organization
//!
//! **External Structure**: Fixed-size packets ending in a 16-bit checksum.
//! **Internal Structure**: A header sub-packet followed by noise and tone
//! sub-packets, each tagged with a type code and a byte length.
//!
//! ### Synthesis
//!
//! The signal model is parametric: a noise floor per band plus a set of
//! persistent sinusoidal tones. Each frame is rendered into a spectrum,
//! inverse transformed, windowed and overlap-added with the previous frame.
//! Packets that fail validation are concealed by letting the tones decay.
//!
//! ## Quick Start
//!
//! 1. Read the configuration with [`structs::config::StreamConfig::from_extradata`]
//! 2. Split raw data into packets using [`process::extract::Extractor`]
//! 3. Decode packets to PCM samples using [`process::decode::Decoder`]
//!
//! ```rust
//! use qdm2::process::{decode::Decoder, extract::Extractor};
//! use qdm2::structs::config::StreamConfig;
//!
//! let config = StreamConfig::with_parameters(1, 2, 44100, 128_000, 256, 256, 512)?;
//! let mut extractor = Extractor::new(config.frame_size);
//! let mut decoder = Decoder::new(config);
//!
//! // Two silent packets
//! extractor.push_bytes(&[0; 512]);
//!
//! for packet_result in extractor {
//!     match packet_result {
//!         Ok(packet) => {
//!             let frame = decoder.decode(packet.as_ref())?;
//!             assert_eq!(frame.pcm.len(), 512 * 2);
//!         }
//!         // Waiting for more data
//!         Err(extract_error) => eprintln!("{extract_error}"),
//!     }
//! }
//! assert_eq!(decoder.stats().frames_decoded, 2);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! For pull-based playback, [`process::stream::Qdm2Stream`] queues packets and
//! fills caller buffers of any size.

/// Processing functionality for QDM2 streams.
///
/// 1. **Packet Extraction** ([`process::extract`]): Splits raw data into
///    fixed-size packets.
///
/// 2. **Demuxing** ([`process::demux`]): Locates sub-packets and validates
///    the packet checksum.
///
/// 3. **Parsing** ([`process::parse`]): Decodes sub-packet payloads into
///    frame updates.
///
/// 4. **Decoding** ([`process::decode`], [`process::synthesis`]): Applies
///    updates to channel state and synthesizes PCM.
///
/// 5. **Streaming** ([`process::stream`]): Codec and stream adapters.
pub mod process;

/// Data structures representing QDM2 format components.
///
/// - **Configuration** ([`structs::config`]): Extradata parameters
/// - **Sub-packets** ([`structs::sub_packet`]): Typed packet regions
/// - **Tones** ([`structs::tone`]): Persistent sinusoidal components
/// - **Noise** ([`structs::noise`]): Per-band noise envelope
/// - **Channels** ([`structs::channel`]): Per-channel synthesis state
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Bitstream I/O** ([`utils::bitstream_io`]): Bit-level reading
/// - **VLC Tables** ([`utils::vlc`]): Variable-length code decoding
/// - **Checksum Validation** ([`utils::checksum`]): Error detection
/// - **FFT** ([`utils::fft`]): Inverse transform for synthesis
/// - **Noise Generation** ([`utils::rng`]): Seeded phase generator
/// - **Error Handling** ([`utils::errors`]): Error types
/// - **Buffer Management** ([`utils::buffer_pool`]): Memory allocation
pub mod utils;

pub use process::decode::{DecodedFrame, Decoder, DecoderStats};
pub use process::stream::{
    Codec, PacketizedAudioStream, Qdm2Codec, Qdm2Stream, make_qdm2_decoder, make_qdm2_stream,
};
pub use structs::config::StreamConfig;
