use std::collections::VecDeque;
use std::sync::Arc;

use log::warn;

use crate::utils::buffer_pool::BufferPool;
use crate::utils::errors::ExtractError;

/// Splits a byte stream into fixed-size packets.
///
/// Packets have no sync word; a raw packet dump is simply the concatenation
/// of `frame_size` byte packets. Each packet gets a sequence index in
/// arrival order.
///
/// # Example
///
/// ```rust
/// use qdm2::process::extract::Extractor;
///
/// let mut extractor = Extractor::new(4);
/// extractor.push_bytes(&[0; 10]);
///
/// let packets = extractor.by_ref().filter_map(Result::ok).collect::<Vec<_>>();
/// assert_eq!(packets.len(), 2);
/// assert_eq!(packets[1].index, 1);
/// ```
#[derive(Debug)]
pub struct Extractor {
    buffer: VecDeque<u8>,
    frame_size: usize,
    io_counter: usize,
    next_index: u64,
    buffer_pool: BufferPool,
}

impl Extractor {
    pub fn new(frame_size: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(frame_size * 16),
            frame_size,
            io_counter: 0,
            next_index: 0,
            buffer_pool: BufferPool::new(16, frame_size),
        }
    }

    /// Adds raw bytes to the internal buffer.
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend(data);
        self.io_counter += 1;
    }

    /// Reports bytes left over at the end of the stream.
    ///
    /// Returns an error if fewer than `frame_size` bytes remain buffered;
    /// the partial packet is discarded.
    pub fn flush(&mut self) -> Result<(), ExtractError> {
        let actual = self.buffer.len();
        self.buffer.clear();

        if actual == 0 {
            return Ok(());
        }

        warn!(
            "Discarding {actual} trailing bytes, packets are {} bytes",
            self.frame_size
        );
        Err(ExtractError::PartialPacket {
            expected: self.frame_size,
            actual,
        })
    }

    pub fn packets_extracted(&self) -> u64 {
        self.next_index
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn iter_insufficient(&mut self) -> Option<Result<Packet, ExtractError>> {
        self.io_counter -= 1;
        Some(Err(ExtractError::InsufficientData))
    }
}

impl Iterator for Extractor {
    type Item = Result<Packet, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.io_counter == 0 {
            return None;
        }

        if self.buffer.len() < self.frame_size {
            return self.iter_insufficient();
        }

        let mut packet_buffer = self.buffer_pool.acquire();
        packet_buffer.extend(self.buffer.drain(..self.frame_size));

        let packet = Packet {
            index: self.next_index,
            data: packet_buffer.into(),
        };
        self.next_index += 1;

        Some(Ok(packet))
    }
}

/// One compressed packet and its position in the stream.
#[derive(Debug, Clone)]
pub struct Packet {
    pub index: u64,
    pub data: Arc<[u8]>,
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl Packet {
    pub fn new(index: u64, data: &[u8]) -> Self {
        Self {
            index,
            data: data.into(),
        }
    }
}

#[test]
fn splits_across_pushes() {
    let mut extractor = Extractor::new(6);

    extractor.push_bytes(&[1, 2, 3, 4]);
    assert!(matches!(
        extractor.next(),
        Some(Err(ExtractError::InsufficientData))
    ));
    assert!(extractor.next().is_none());

    extractor.push_bytes(&[5, 6, 7, 8, 9, 10, 11, 12, 13]);
    let packets = extractor.by_ref().filter_map(Result::ok).collect::<Vec<_>>();
    assert_eq!(packets.len(), 2);
    assert_eq!(packets[0].as_ref(), [1, 2, 3, 4, 5, 6]);
    assert_eq!(packets[1].as_ref(), [7, 8, 9, 10, 11, 12]);
    assert_eq!(packets[1].index, 1);

    assert_eq!(extractor.buffered(), 1);
    assert_eq!(
        extractor.flush(),
        Err(ExtractError::PartialPacket {
            expected: 6,
            actual: 1
        })
    );
    assert_eq!(extractor.flush(), Ok(()));
    assert_eq!(extractor.packets_extracted(), 2);
}
