/// Packet extraction from raw byte streams.
///
/// Provides the [`Extractor`](extract::Extractor) for splitting a
/// concatenation of fixed-size packets into indexed
/// [`Packet`](extract::Packet) objects.
pub mod extract;

/// Sub-packet demultiplexing and checksum validation.
///
/// Provides the [`Demuxer`](demux::Demuxer), which locates the typed
/// [`SubPacket`](crate::structs::sub_packet::SubPacket) regions of a packet.
pub mod demux;

/// Bit-level decoding of sub-packet payloads.
///
/// Provides the [`Parser`](parse::Parser) producing a
/// [`FrameUpdate`](parse::FrameUpdate) of header, noise and tone changes.
pub mod parse;

/// Frame decoding to PCM samples.
///
/// Provides the [`Decoder`](decode::Decoder), which applies frame updates to
/// the channel state and synthesizes [`DecodedFrame`](decode::DecodedFrame)
/// objects, concealing bad packets.
pub mod decode;

/// Spectrum rendering, inverse FFT, windowing and overlap-add.
pub mod synthesis;

/// `Codec` and `PacketizedAudioStream` adapters and their factories.
pub mod stream;
