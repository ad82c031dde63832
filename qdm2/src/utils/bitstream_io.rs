//! Bitstream I/O utilities for packet parsing.
//!
//! MSB-first bit reading over a byte slice with explicit bounds checks, plus
//! VLC decoding against the tables in [`crate::utils::vlc`].

use std::io;
use std::io::SeekFrom;

use bitstream_io::{BigEndian, BitRead, BitReader, SignedInteger, UnsignedInteger};

use crate::utils::errors::BitstreamError;
use crate::utils::vlc::Vlc;

#[derive(Debug)]
pub struct BitstreamIoReader<R: io::Read + io::Seek> {
    bs: BitReader<R, BigEndian>,
    len: u64,
}

pub type BsIoSliceReader<'a> = BitstreamIoReader<io::Cursor<&'a [u8]>>;

impl<R> BitstreamIoReader<R>
where
    R: io::Read + io::Seek,
{
    pub fn new(read: R, len_bytes: u64) -> Self {
        Self {
            bs: BitReader::new(read),
            len: len_bytes << 3,
        }
    }

    #[inline(always)]
    pub fn get(&mut self) -> Result<bool, BitstreamError> {
        self.ensure(1)?;
        self.bs.read_bit().map_err(|_| self.truncated(1))
    }

    /// Reads `n` bits (1 ≤ `n` ≤ 32) as an unsigned value.
    #[inline(always)]
    pub fn get_n<I: UnsignedInteger>(&mut self, n: u32) -> Result<I, BitstreamError> {
        debug_assert!((1..=32).contains(&n));
        self.ensure(n)?;
        self.bs.read_unsigned_var(n).map_err(|_| self.truncated(n))
    }

    #[inline(always)]
    pub fn get_s<S: SignedInteger>(&mut self, n: u32) -> Result<S, BitstreamError> {
        debug_assert!((1..=32).contains(&n));
        self.ensure(n)?;
        self.bs.read_signed_var(n).map_err(|_| self.truncated(n))
    }

    /// Returns the next `n` bits (`n` ≤ 32) without consuming them.
    #[inline(always)]
    pub fn peek_n(&mut self, n: u32) -> Result<u32, BitstreamError> {
        if n == 0 {
            return Ok(0);
        }
        let position = self.position();
        let value = self.get_n::<u32>(n)?;
        self.rewind_to(position)?;
        Ok(value)
    }

    /// Like [`peek_n`](Self::peek_n), but bits past the end read as zero.
    ///
    /// VLC lookups peek a fixed window that may extend beyond the last code
    /// of a packet; the actual code length is checked when it is skipped.
    #[inline(always)]
    pub fn peek_padded(&mut self, n: u32) -> Result<u32, BitstreamError> {
        let available = self.available();
        if available >= n as u64 {
            return self.peek_n(n);
        }

        let short = available as u32;
        if short == 0 {
            return Ok(0);
        }
        let value = self.peek_n(short)?;
        Ok(value << (n - short))
    }

    #[inline(always)]
    pub fn skip_n(&mut self, n: u32) -> Result<(), BitstreamError> {
        if n == 0 {
            return Ok(());
        }
        self.ensure(n)?;
        self.bs.skip(n).map_err(|_| self.truncated(n))
    }

    /// Decodes one symbol, returning it together with its code length.
    #[inline(always)]
    pub fn get_vlc(&mut self, vlc: &Vlc) -> Result<(i32, u32), BitstreamError> {
        let position = self.position();
        let lookup_bits = vlc.lookup_bits();

        let entry = vlc.entry(self.peek_padded(lookup_bits)? as usize);
        if entry.is_leaf() {
            let len = entry.code_len();
            self.skip_n(len)?;
            return Ok((entry.value(), len));
        }

        let Some(sub_bits) = entry.subtable_bits() else {
            return Err(BitstreamError::InvalidCode {
                table: vlc.name(),
                position,
            });
        };

        self.skip_n(lookup_bits)?;
        let sub = vlc.entry(entry.value() as usize + self.peek_padded(sub_bits)? as usize);
        if !sub.is_leaf() {
            self.rewind_to(position)?;
            return Err(BitstreamError::InvalidCode {
                table: vlc.name(),
                position,
            });
        }

        self.skip_n(sub.code_len())?;
        Ok((sub.value(), lookup_bits + sub.code_len()))
    }

    /// Convenience wrapper around [`get_vlc`](Self::get_vlc) returning the symbol only.
    #[inline(always)]
    pub fn get_symbol(&mut self, vlc: &Vlc) -> Result<i32, BitstreamError> {
        self.get_vlc(vlc).map(|(symbol, _)| symbol)
    }

    #[inline(always)]
    pub fn byte_align(&mut self) {
        self.bs.byte_align();
    }

    #[inline(always)]
    pub fn available(&mut self) -> u64 {
        self.len.saturating_sub(self.position())
    }

    #[inline(always)]
    pub fn position(&mut self) -> u64 {
        // The cursor is in memory; querying its position cannot fail.
        self.bs.position_in_bits().unwrap_or(self.len)
    }

    #[inline(always)]
    pub fn len_bits(&self) -> u64 {
        self.len
    }

    fn rewind_to(&mut self, position: u64) -> Result<(), BitstreamError> {
        self.bs
            .seek_bits(SeekFrom::Start(position))
            .map(|_| ())
            .map_err(|_| BitstreamError::Truncated {
                requested: 0,
                position,
                available: self.len.saturating_sub(position),
            })
    }

    #[inline(always)]
    fn ensure(&mut self, n: u32) -> Result<(), BitstreamError> {
        if self.available() < n as u64 {
            return Err(self.truncated(n));
        }
        Ok(())
    }

    #[cold]
    fn truncated(&mut self, n: u32) -> BitstreamError {
        let position = self.position();
        BitstreamError::Truncated {
            requested: n,
            position,
            available: self.len.saturating_sub(position),
        }
    }
}

impl<'a> BsIoSliceReader<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        let len = buf.len() as u64;
        let read = io::Cursor::new(buf);

        Self::new(read, len)
    }
}

impl Default for BsIoSliceReader<'_> {
    fn default() -> Self {
        Self::from_slice(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::errors::ErrorKind;

    const DATA: [u8; 6] = [0b1011_0010, 0x5A, 0xFF, 0x00, 0x81, 0x7E];

    #[test]
    fn reads_msb_first() {
        let mut reader = BsIoSliceReader::from_slice(&DATA);
        assert!(reader.get().unwrap());
        assert_eq!(reader.get_n::<u8>(3).unwrap(), 0b011);
        assert_eq!(reader.get_n::<u16>(12).unwrap(), 0x25A);
        assert_eq!(reader.position(), 16);
        assert_eq!(reader.get_n::<u32>(32).unwrap(), 0xFF00_817E);
        assert_eq!(reader.available(), 0);
    }

    #[test]
    fn peek_then_skip_equals_read() {
        for offset in 0..16u32 {
            for n in 1..=32u32 {
                if (offset + n) as usize > DATA.len() * 8 {
                    continue;
                }

                let mut a = BsIoSliceReader::from_slice(&DATA);
                let mut b = BsIoSliceReader::from_slice(&DATA);
                a.skip_n(offset).unwrap();
                b.skip_n(offset).unwrap();

                let peeked = a.peek_n(n).unwrap();
                assert_eq!(a.position(), offset as u64);
                a.skip_n(n).unwrap();

                let read: u32 = b.get_n(n).unwrap();
                assert_eq!(peeked, read, "offset {offset}, n {n}");
                assert_eq!(a.position(), (offset + n) as u64);
                assert_eq!(b.position(), (offset + n) as u64);
            }
        }
    }

    #[test]
    fn reading_past_the_end_is_truncated() {
        let mut reader = BsIoSliceReader::from_slice(&DATA[..2]);
        reader.skip_n(10).unwrap();

        let err = reader.get_n::<u8>(7).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Truncated);
        assert_eq!(
            err,
            BitstreamError::Truncated {
                requested: 7,
                position: 10,
                available: 6
            }
        );

        assert!(reader.peek_n(7).is_err());
        assert!(reader.skip_n(7).is_err());
        assert_eq!(reader.position(), 10);
    }

    #[test]
    fn padded_peek_fills_with_zeros() {
        let mut reader = BsIoSliceReader::from_slice(&[0xF0]);
        reader.skip_n(2).unwrap();
        assert_eq!(reader.peek_padded(9).unwrap(), 0b1_1000_0000);
        assert_eq!(reader.position(), 2);
    }

    #[test]
    fn signed_reads_and_alignment() {
        let mut reader = BsIoSliceReader::from_slice(&DATA);
        reader.skip_n(3).unwrap();
        reader.byte_align();
        assert_eq!(reader.position(), 8);
        // 0x5A = 0101 1010 -> top nibble 5, bottom nibble -6
        assert_eq!(reader.get_s::<i8>(4).unwrap(), 5);
        assert_eq!(reader.get_s::<i8>(4).unwrap(), -6);
    }
}
