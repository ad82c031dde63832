#[macro_export]
macro_rules! log_or_err {
    ($state:expr, $level:expr, $err:expr $(,)?) => {{
        if $level <= $state.fail_level {
            return Err($err);
        } else {
            match $level {
                ::log::Level::Error => ::log::error!("{:#}", $err),
                ::log::Level::Warn => ::log::warn!("{:#}", $err),
                ::log::Level::Info => ::log::info!("{:#}", $err),
                ::log::Level::Debug => ::log::debug!("{:#}", $err),
                ::log::Level::Trace => ::log::trace!("{:#}", $err),
            }
        }
    }};
}

/// Coarse classification of every failure the decoder can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or unsupported configuration blob.
    BadExtradata,
    /// The bit reader ran off the end of a packet.
    Truncated,
    /// A VLC prefix matched no table entry.
    InvalidCode,
    /// Sub-packet ordering, type or framing is invalid.
    Malformed,
    /// The packet checksum failed.
    ChecksumMismatch,
    /// Operation attempted on a finished or closed stream.
    Closed,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::BadExtradata => "bad extradata",
            ErrorKind::Truncated => "truncated",
            ErrorKind::InvalidCode => "invalid code",
            ErrorKind::Malformed => "malformed",
            ErrorKind::ChecksumMismatch => "checksum mismatch",
            ErrorKind::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Returns the [`ErrorKind`] of the first typed decoder error in the chain.
pub fn error_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    err.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<ExtraDataError>() {
            Some(e.kind())
        } else if let Some(e) = cause.downcast_ref::<BitstreamError>() {
            Some(e.kind())
        } else if let Some(e) = cause.downcast_ref::<PacketError>() {
            Some(e.kind())
        } else if let Some(e) = cause.downcast_ref::<ExtractError>() {
            Some(e.kind())
        } else {
            cause.downcast_ref::<StreamError>().map(StreamError::kind)
        }
    })
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtraDataError {
    #[error("extradata too short: need {needed} bytes at offset {offset}, {available} available")]
    TooShort {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Expected chunk tag {expected:?} at offset {offset}, found {found:?}")]
    UnexpectedTag {
        offset: usize,
        expected: String,
        found: String,
    },

    #[error("Unsupported codec tag {0:?}, expected \"QDM2\"")]
    UnsupportedCodec(String),

    #[error("Chunk {tag:?} declares {declared} bytes but {available} remain")]
    ChunkLengthMismatch {
        tag: String,
        declared: usize,
        available: usize,
    },

    #[error("Unsupported channel count {0} (1 or 2 supported)")]
    UnsupportedChannels(u32),

    #[error("Unsupported sample rate {0} Hz")]
    UnsupportedSampleRate(u32),

    #[error("Unsupported samples per frame {0}")]
    UnsupportedFrameSamples(u32),

    #[error("Unsupported packet size {0} bytes")]
    UnsupportedFrameSize(u32),

    #[error("block_size must not be zero")]
    ZeroBlockSize,
}

impl ExtraDataError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::BadExtradata
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BitstreamError {
    #[error("Read of {requested} bits at bit {position} runs past the end ({available} bits left)")]
    Truncated {
        requested: u32,
        position: u64,
        available: u64,
    },

    #[error("No {table} code matches the bits at {position}")]
    InvalidCode { table: &'static str, position: u64 },
}

impl BitstreamError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BitstreamError::Truncated { .. } => ErrorKind::Truncated,
            BitstreamError::InvalidCode { .. } => ErrorKind::InvalidCode,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("Packet is {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Packet must start with a header sub-packet, found type {0}")]
    MissingHeader(u8),

    #[error("Unknown sub-packet type {0}")]
    UnknownType(u8),

    #[error("Reserved bits set in sub-packet type byte {0:#04X}")]
    ReservedTypeBits(u8),

    #[error("Sub-packet type {found} may not follow type {previous}")]
    OutOfOrder { previous: u8, found: u8 },

    #[error("Sub-packet type {0} repeated within one packet")]
    DuplicateType(u8),

    #[error("More than {0} sub-packets in one packet")]
    TooManySubPackets(usize),

    #[error("Sub-packet header at byte {offset} is cut off by the packet body")]
    TruncatedHeader { offset: usize },

    #[error(
        "Sub-packet type {code} at byte {offset} declares {length} bytes, only {available} remain"
    )]
    SubPacketOverrun {
        code: u8,
        offset: usize,
        length: usize,
        available: usize,
    },

    #[error("Tone band {band} outside of range {start}..{end} for sub-packet type {code}")]
    ToneBandOutOfRange {
        code: u8,
        band: usize,
        start: usize,
        end: usize,
    },

    #[error("Sub-packet type {0} does not allow adding tones")]
    ToneAddNotAllowed(u8),

    #[error("Packet checksum failed. Calculated {calculated:#06X}, Read {read:#06X}")]
    ChecksumMismatch { calculated: u16, read: u16 },
}

impl PacketError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PacketError::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            _ => ErrorKind::Malformed,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Insufficient data for the next packet")]
    InsufficientData,

    #[error("Stream ends with a partial packet: {actual} of {expected} bytes")]
    PartialPacket { expected: usize, actual: usize },
}

impl ExtractError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Truncated
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VlcError {
    #[error("{table}: {lengths} code lengths for {symbols} symbols")]
    LengthSymbolMismatch {
        table: &'static str,
        lengths: usize,
        symbols: usize,
    },

    #[error("{table}: code length {len} exceeds 24 bits")]
    CodeTooLong { table: &'static str, len: u8 },

    #[error("{table}: code lengths are over-subscribed")]
    Oversubscribed { table: &'static str },

    #[error("{table}: no codes")]
    Empty { table: &'static str },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Stream no longer accepts packets")]
    Closed,
}

impl StreamError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Closed
    }
}

#[test]
fn error_kind_follows_context_chain() {
    use anyhow::Context;

    let err: anyhow::Error = PacketError::ChecksumMismatch {
        calculated: 1,
        read: 2,
    }
    .into();
    assert_eq!(error_kind(&err), Some(ErrorKind::ChecksumMismatch));

    let err = Err::<(), _>(BitstreamError::Truncated {
        requested: 8,
        position: 0,
        available: 3,
    })
    .context("noise sub-packet")
    .unwrap_err();
    assert_eq!(error_kind(&err), Some(ErrorKind::Truncated));

    assert_eq!(error_kind(&anyhow::anyhow!("plain")), None);
}
