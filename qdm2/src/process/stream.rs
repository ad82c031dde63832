//! Embedding interfaces: a packet-at-a-time codec and a pull-based stream.

use std::collections::VecDeque;

use anyhow::{Result, bail};
use log::{debug, error};

use crate::process::decode::Decoder;
use crate::structs::config::StreamConfig;
use crate::utils::buffer_pool::BufferPool;
use crate::utils::errors::StreamError;

/// Decodes one packet at a time into a new sample buffer.
pub trait Codec: Send {
    fn decode_frame(&mut self, packet: &[u8]) -> Result<Vec<i16>>;
    fn is_stereo(&self) -> bool;
    fn rate(&self) -> u32;
}

/// Accepts packets and hands out interleaved PCM on demand.
pub trait PacketizedAudioStream: Send {
    /// Copies a packet into the queue. Fails once the stream is finished.
    fn queue_packet(&mut self, packet: &[u8]) -> Result<()>;

    /// No more packets will be queued.
    fn finish(&mut self);

    /// Drops queued packets and buffered samples.
    fn close(&mut self);

    /// Fills `dst` with up to `dst.len()` samples and returns how many were written.
    fn read_buffer(&mut self, dst: &mut [i16]) -> Result<usize>;

    fn end_of_data(&self) -> bool;
    fn is_stereo(&self) -> bool;
    fn rate(&self) -> u32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Open,
    Draining,
    Closed,
}

#[derive(Debug)]
pub struct Qdm2Codec {
    decoder: Decoder,
}

impl Qdm2Codec {
    pub fn new(extradata: &[u8]) -> Result<Self> {
        Ok(Self {
            decoder: Decoder::from_extradata(extradata)?,
        })
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn decoder_mut(&mut self) -> &mut Decoder {
        &mut self.decoder
    }
}

impl Codec for Qdm2Codec {
    fn decode_frame(&mut self, packet: &[u8]) -> Result<Vec<i16>> {
        Ok(self.decoder.decode(packet)?.pcm)
    }

    fn is_stereo(&self) -> bool {
        self.decoder.config().is_stereo()
    }

    fn rate(&self) -> u32 {
        self.decoder.config().sample_rate
    }
}

/// Stream adapter over a [`Decoder`].
///
/// Packets are decoded lazily by [`read_buffer`](PacketizedAudioStream::read_buffer):
/// a queued packet is decoded only while less than one frame of samples is
/// pending, so a read may return fewer samples than requested.
///
/// ```rust
/// use qdm2::process::stream::{PacketizedAudioStream, Qdm2Stream};
///
/// # fn extradata() -> Vec<u8> {
/// #     let mut blob = Vec::new();
/// #     blob.extend_from_slice(&12u32.to_be_bytes());
/// #     blob.extend_from_slice(b"frmaQDM2");
/// #     blob.extend_from_slice(&36u32.to_be_bytes());
/// #     blob.extend_from_slice(b"QDCA");
/// #     for v in [1u32, 2, 44100, 64000, 64, 64, 128] {
/// #         blob.extend_from_slice(&v.to_be_bytes());
/// #     }
/// #     blob
/// # }
/// let mut stream = Qdm2Stream::new(&extradata())?;
/// stream.queue_packet(&[0; 64])?;
/// stream.finish();
///
/// let mut buf = [0i16; 100];
/// let mut total = 0;
/// loop {
///     let n = stream.read_buffer(&mut buf)?;
///     if n == 0 && stream.end_of_data() {
///         break;
///     }
///     total += n;
/// }
/// assert_eq!(total, 256);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct Qdm2Stream {
    decoder: Decoder,
    queue: VecDeque<Vec<u8>>,
    buffer_pool: BufferPool,
    pending: VecDeque<i16>,
    frame: Vec<i16>,
    state: StreamState,
    end_of_data: bool,
}

impl Qdm2Stream {
    pub fn new(extradata: &[u8]) -> Result<Self> {
        Ok(Self::with_decoder(Decoder::from_extradata(extradata)?))
    }

    pub fn with_decoder(decoder: Decoder) -> Self {
        let frame_size = decoder.config().frame_size;
        let frame_samples = decoder.config().frame_samples();

        Self {
            decoder,
            queue: VecDeque::new(),
            buffer_pool: BufferPool::new(16, frame_size),
            pending: VecDeque::with_capacity(frame_samples * 2),
            frame: Vec::with_capacity(frame_samples),
            state: StreamState::Open,
            end_of_data: false,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn config(&self) -> &StreamConfig {
        self.decoder.config()
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn set_fail_level(&mut self, level: log::Level) {
        self.decoder.set_fail_level(level);
    }

    pub fn queued_packets(&self) -> usize {
        self.queue.len()
    }

    pub fn pending_samples(&self) -> usize {
        self.pending.len()
    }

    fn decode_next(&mut self) -> Result<()> {
        let Some(packet) = self.queue.pop_front() else {
            return Ok(());
        };

        self.frame.clear();
        let result = self.decoder.decode_into(&packet, &mut self.frame);
        self.buffer_pool.release(packet);
        result?;

        self.pending.extend(self.frame.iter().copied());
        Ok(())
    }
}

impl PacketizedAudioStream for Qdm2Stream {
    fn queue_packet(&mut self, packet: &[u8]) -> Result<()> {
        if self.state != StreamState::Open {
            bail!(StreamError::Closed);
        }

        self.queue.push_back(self.buffer_pool.acquire_copy(packet));
        Ok(())
    }

    fn finish(&mut self) {
        if self.state == StreamState::Open {
            debug!("stream finished with {} packets queued", self.queue.len());
            self.state = StreamState::Draining;
        }
    }

    fn close(&mut self) {
        for packet in self.queue.drain(..) {
            self.buffer_pool.release(packet);
        }
        self.pending.clear();
        self.state = StreamState::Closed;
        self.end_of_data = true;
    }

    fn read_buffer(&mut self, dst: &mut [i16]) -> Result<usize> {
        if self.state == StreamState::Closed {
            return Ok(0);
        }

        let frame_samples = self.decoder.config().frame_samples();
        while self.pending.len() < frame_samples && !self.queue.is_empty() {
            if let Err(err) = self.decode_next() {
                error!("{err:#}");
                return Err(err);
            }
        }

        let count = dst.len().min(self.pending.len());
        for (out, sample) in dst.iter_mut().zip(self.pending.drain(..count)) {
            *out = sample;
        }

        if count == 0
            && self.pending.is_empty()
            && self.queue.is_empty()
            && self.state == StreamState::Draining
        {
            debug!(
                "stream drained after {} frames",
                self.decoder.stats().frames_decoded
            );
            self.end_of_data = true;
            self.state = StreamState::Closed;
        }

        Ok(count)
    }

    fn end_of_data(&self) -> bool {
        self.end_of_data
    }

    fn is_stereo(&self) -> bool {
        self.decoder.config().is_stereo()
    }

    fn rate(&self) -> u32 {
        self.decoder.config().sample_rate
    }
}

/// Builds a packet decoder, or `None` if the extradata is unusable.
pub fn make_qdm2_decoder(extradata: &[u8]) -> Option<Box<dyn Codec>> {
    match Qdm2Codec::new(extradata) {
        Ok(codec) => Some(Box::new(codec)),
        Err(err) => {
            error!("Cannot create QDM2 decoder: {err:#}");
            None
        }
    }
}

/// Builds a stream adapter, or `None` if the extradata is unusable.
pub fn make_qdm2_stream(extradata: &[u8]) -> Option<Box<dyn PacketizedAudioStream>> {
    match Qdm2Stream::new(extradata) {
        Ok(stream) => Some(Box::new(stream)),
        Err(err) => {
            error!("Cannot create QDM2 stream: {err:#}");
            None
        }
    }
}
