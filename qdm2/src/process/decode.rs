use anyhow::Result;
use log::{debug, trace};

use crate::log_or_err;
use crate::process::demux::Demuxer;
use crate::process::parse::{FrameUpdate, Parser};
use crate::process::synthesis::{Synthesizer, to_pcm};
use crate::structs::channel::ChannelState;
use crate::structs::config::StreamConfig;
use crate::utils::errors::{ErrorKind, error_kind};

/// Decodes packets to interleaved 16-bit PCM.
///
/// Every packet yields exactly `samples_per_frame` samples per channel. A
/// packet that fails to demux or parse is concealed: its updates are
/// dropped, tones keep decaying and the frame carries only the overlap tail
/// of the previous one. With the fail level set to [`log::Level::Warn`]
/// such packets are reported as errors instead.
///
/// # Example
///
/// ```rust
/// use qdm2::process::decode::Decoder;
///
/// # fn extradata() -> Vec<u8> {
/// #     let mut blob = Vec::new();
/// #     blob.extend_from_slice(&12u32.to_be_bytes());
/// #     blob.extend_from_slice(b"frmaQDM2");
/// #     blob.extend_from_slice(&36u32.to_be_bytes());
/// #     blob.extend_from_slice(b"QDCA");
/// #     for v in [1u32, 1, 22050, 24000, 64, 64, 256] {
/// #         blob.extend_from_slice(&v.to_be_bytes());
/// #     }
/// #     blob
/// # }
/// let mut decoder = Decoder::from_extradata(&extradata())?;
///
/// let frame = decoder.decode(&[0; 64])?;
/// assert_eq!(frame.pcm.len(), 256);
/// assert!(frame.pcm.iter().all(|&s| s == 0));
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct Decoder {
    state: DecoderState,
}

impl Decoder {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            state: DecoderState::new(config),
        }
    }

    pub fn from_extradata(extradata: &[u8]) -> Result<Self> {
        Ok(Self::new(StreamConfig::from_extradata(extradata)?))
    }

    /// Decodes one packet into a new [`DecodedFrame`].
    pub fn decode(&mut self, packet: &[u8]) -> Result<DecodedFrame> {
        let frame_index = self.state.frame_index;
        let mut pcm = Vec::with_capacity(self.state.config.frame_samples());
        let concealed = self.state.decode_packet(packet, &mut pcm)?;

        Ok(DecodedFrame {
            frame_index,
            sample_rate: self.state.config.sample_rate,
            channels: self.state.config.channels,
            samples_per_frame: self.state.config.samples_per_frame,
            concealed,
            pcm,
        })
    }

    /// Decodes one packet, appending its samples to `pcm`.
    ///
    /// Returns `true` if the packet was concealed.
    pub fn decode_into(&mut self, packet: &[u8], pcm: &mut Vec<i16>) -> Result<bool> {
        self.state.decode_packet(packet, pcm)
    }

    pub fn config(&self) -> &StreamConfig {
        &self.state.config
    }

    pub fn stats(&self) -> &DecoderStats {
        &self.state.stats
    }

    /// Index of the next frame to be decoded.
    pub fn frame_index(&self) -> u64 {
        self.state.frame_index
    }

    /// Sets the failure level for packet errors.
    ///
    /// - `log::Level::Error`: Conceal bad packets and log a warning (default)
    /// - `log::Level::Warn`: Fail on bad packets (strict mode)
    pub fn set_fail_level(&mut self, level: log::Level) {
        self.state.fail_level = level;
    }
}

/// PCM produced by one packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub frame_index: u64,
    pub sample_rate: u32,
    pub channels: usize,
    pub samples_per_frame: usize,
    /// The packet was rejected and the frame synthesized without it.
    pub concealed: bool,
    /// Interleaved samples, `samples_per_frame * channels` long.
    pub pcm: Vec<i16>,
}

/// Running counters for a decoded stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub frames_decoded: u64,
    pub frames_concealed: u64,
    pub checksum_failures: u64,
    pub malformed_packets: u64,
    pub truncated_packets: u64,
    pub invalid_codes: u64,
    pub clipped_samples: u64,
    pub samples_emitted: u64,
}

impl DecoderStats {
    fn record_error(&mut self, err: &anyhow::Error) {
        match error_kind(err) {
            Some(ErrorKind::ChecksumMismatch) => self.checksum_failures += 1,
            Some(ErrorKind::Truncated) => self.truncated_packets += 1,
            Some(ErrorKind::InvalidCode) => self.invalid_codes += 1,
            _ => self.malformed_packets += 1,
        }
    }
}

#[derive(Debug)]
pub struct DecoderState {
    pub fail_level: log::Level,

    pub config: StreamConfig,
    pub channels: Vec<ChannelState>,
    pub frame_index: u64,
    pub stats: DecoderStats,

    demuxer: Demuxer,
    parser: Parser,
    synthesizer: Synthesizer,
    scratch: Vec<f32>,
}

impl DecoderState {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            fail_level: log::Level::Error,
            channels: (0..config.channels)
                .map(|_| ChannelState::new(&config))
                .collect(),
            frame_index: 0,
            stats: DecoderStats::default(),
            demuxer: Demuxer::new(config.frame_size),
            parser: Parser::new(&config),
            synthesizer: Synthesizer::new(&config),
            scratch: vec![0.0; config.samples_per_frame],
            config,
        }
    }

    fn read_packet(&self, packet: &[u8]) -> Result<FrameUpdate> {
        let layout = self.demuxer.demux(packet)?;
        self.parser.parse(packet, &layout)
    }

    /// Decodes one frame into `pcm`. Returns whether the packet was concealed.
    pub fn decode_packet(&mut self, packet: &[u8], pcm: &mut Vec<i16>) -> Result<bool> {
        let update = match self.read_packet(packet) {
            Ok(update) => Some(update),
            Err(err) => {
                self.stats.record_error(&err);
                let err = err.context(format!("packet {} concealed", self.frame_index));
                log_or_err!(self, log::Level::Warn, err);
                None
            }
        };

        match &update {
            Some(update) => self.apply_update(update),
            None => self.stats.frames_concealed += 1,
        }

        for channel in &mut self.channels {
            channel.tones.tick_untouched();
        }

        self.render(update.is_none(), pcm);

        trace!(
            "frame {}: {} tones, concealed {}",
            self.frame_index,
            self.channels.iter().map(|c| c.tones.len()).sum::<usize>(),
            update.is_none()
        );

        self.frame_index += 1;
        self.stats.frames_decoded += 1;

        Ok(update.is_none())
    }

    fn apply_update(&mut self, update: &FrameUpdate) {
        let header = &update.header;

        for channel in &mut self.channels {
            if header.reset_tones() {
                channel.tones.clear();
            }
            if header.reset_noise() {
                channel.noise.reset();
            }
            if let Some(seed) = header.noise_seed {
                channel.noise_seed = ((seed as u32) << 16) | seed as u32;
            }
        }

        for noise in &update.noise {
            for (index, channel) in self.channels.iter_mut().enumerate() {
                if noise.applies_to(index) {
                    channel.noise.apply(noise.first_band, &noise.deltas);
                }
            }
        }

        for command in &update.tones {
            let Some(channel) = self.channels.get_mut(command.channel) else {
                continue;
            };
            if !channel.tones.apply(command, self.frame_index) {
                debug!(
                    "frame {}: {:?} of empty tone slot band {} position {} ignored",
                    self.frame_index, command.op, command.band, command.position
                );
            }
        }
    }

    fn render(&mut self, silent: bool, pcm: &mut Vec<i16>) {
        let channels = self.channels.len();
        let spf = self.config.samples_per_frame;
        let start = pcm.len();
        pcm.resize(start + spf * channels, 0);

        for (index, channel) in self.channels.iter_mut().enumerate() {
            self.synthesizer
                .render(channel, index, self.frame_index, silent, &mut self.scratch);

            for (n, &sample) in self.scratch.iter().enumerate() {
                let (value, clipped) = to_pcm(sample);
                self.stats.clipped_samples += clipped as u64;
                pcm[start + n * channels + index] = value;
            }
            channel.samples_emitted += spf as u64;
        }

        self.stats.samples_emitted += (spf * channels) as u64;
    }
}
