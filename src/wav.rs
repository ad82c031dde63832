use std::io::{self, BufWriter, Seek, SeekFrom, Write};

use crate::byteorder::WriteBytesLe;
use crate::impl_u16_enum;
use qdm2d_macros::{ToBytes, riff_chunk};

pub const RIFF_ID: [u8; 4] = *b"RIFF";
pub const WAVE_ID: [u8; 4] = *b"WAVE";

/// Bytes before the first sample: RIFF header, `fmt ` chunk, `data` header.
pub const HEADER_LEN: u64 = 12 + 8 + 16 + 8;

pub trait RiffChunk {
    const ID: [u8; 4];

    fn chunk_data(&self) -> Vec<u8>;

    /// Writes id, little-endian length, body and the pad byte for odd bodies.
    fn write_chunk<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let data = self.chunk_data();
        writer.write_all(&Self::ID)?;
        writer.write_all(&(data.len() as u32).to_le_bytes())?;
        writer.write_all(&data)?;
        if data.len() % 2 == 1 {
            writer.write_all(&[0])?;
        }
        Ok(())
    }
}

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatTag {
    Pcm = 0x0001,
}

impl_u16_enum!(FormatTag);

#[derive(Debug, ToBytes)]
#[riff_chunk(b"fmt ")]
pub struct FormatChunk {
    pub format_tag: FormatTag,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
}

impl FormatChunk {
    pub fn pcm16(sample_rate: u32, channels: u16) -> Self {
        let block_align = channels * 2;
        Self {
            format_tag: FormatTag::Pcm,
            channels,
            sample_rate,
            byte_rate: sample_rate * block_align as u32,
            block_align,
            bits_per_sample: 16,
        }
    }
}

/// RIFF/WAVE writer for interleaved 16-bit PCM.
///
/// Chunk sizes are written as zero and patched by [`finish`](Self::finish).
pub struct WAVWriter<W: Write + Seek> {
    writer: BufWriter<W>,
    data_size_position: u64,
    data_written: u64,
    format: FormatChunk,
}

impl<W: Write + Seek> WAVWriter<W> {
    pub fn new(writer: W, sample_rate: u32, channels: u16) -> Self {
        Self {
            writer: BufWriter::new(writer),
            data_size_position: 0,
            data_written: 0,
            format: FormatChunk::pcm16(sample_rate, channels),
        }
    }

    pub fn write_header(&mut self) -> io::Result<()> {
        self.writer.write_all(&RIFF_ID)?;
        self.writer.write_all(&0u32.to_le_bytes())?;
        self.writer.write_all(&WAVE_ID)?;

        self.format.write_chunk(&mut self.writer)?;

        self.writer.write_all(b"data")?;
        self.data_size_position = self.writer.stream_position()?;
        self.writer.write_all(&0u32.to_le_bytes())?;

        Ok(())
    }

    pub fn write_samples(&mut self, samples: &[i16]) -> io::Result<()> {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        samples.iter().for_each(|s| s.write_le(&mut bytes));
        self.writer.write_all(&bytes)?;
        self.data_written += bytes.len() as u64;
        Ok(())
    }

    /// Patches the RIFF and `data` sizes.
    ///
    /// Sizes beyond the 32-bit range are clamped; the samples are kept.
    pub fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()?;

        let current_pos = self.writer.stream_position()?;
        let riff_size = current_pos.saturating_sub(8);
        if riff_size > u32::MAX as u64 {
            log::warn!("WAV output exceeds 4 GiB, chunk sizes are clamped");
        }

        self.writer.seek(SeekFrom::Start(self.data_size_position))?;
        self.writer
            .write_all(&clamp_u32(self.data_written).to_le_bytes())?;

        self.writer.seek(SeekFrom::Start(4))?;
        self.writer.write_all(&clamp_u32(riff_size).to_le_bytes())?;

        self.writer.seek(SeekFrom::Start(current_pos))?;
        self.writer.flush()?;

        Ok(())
    }

    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }

    pub fn stats(&self) -> WAVStats {
        WAVStats {
            data_written: self.data_written,
            sample_rate: self.format.sample_rate,
            channels: self.format.channels,
        }
    }
}

fn clamp_u32(value: u64) -> u32 {
    value.min(u32::MAX as u64) as u32
}

#[derive(Debug, Clone)]
pub struct WAVStats {
    pub data_written: u64,
    pub sample_rate: u32,
    pub channels: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn u32_at(buf: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn header_layout() -> io::Result<()> {
        let mut writer = WAVWriter::new(Cursor::new(Vec::new()), 44100, 2);
        writer.write_header()?;
        writer.finish()?;
        let buffer = writer.into_inner()?.into_inner();

        assert_eq!(buffer.len() as u64, HEADER_LEN);
        assert_eq!(&buffer[0..4], b"RIFF");
        assert_eq!(u32_at(&buffer, 4), 36);
        assert_eq!(&buffer[8..12], b"WAVE");
        assert_eq!(&buffer[12..16], b"fmt ");
        assert_eq!(u32_at(&buffer, 16), 16);
        assert_eq!(&buffer[20..22], &[1, 0]);
        assert_eq!(&buffer[22..24], &[2, 0]);
        assert_eq!(u32_at(&buffer, 24), 44100);
        assert_eq!(u32_at(&buffer, 28), 44100 * 4);
        assert_eq!(&buffer[32..34], &[4, 0]);
        assert_eq!(&buffer[34..36], &[16, 0]);
        assert_eq!(&buffer[36..40], b"data");
        assert_eq!(u32_at(&buffer, 40), 0);

        Ok(())
    }

    #[test]
    fn sizes_patched_on_finish() -> io::Result<()> {
        let mut writer = WAVWriter::new(Cursor::new(Vec::new()), 8000, 1);
        writer.write_header()?;
        writer.write_samples(&[0x0102, -2, 3])?;
        assert_eq!(writer.stats().data_written, 6);
        writer.finish()?;

        let buffer = writer.into_inner()?.into_inner();
        assert_eq!(buffer.len() as u64, HEADER_LEN + 6);
        assert_eq!(u32_at(&buffer, 4), 36 + 6);
        assert_eq!(u32_at(&buffer, 40), 6);
        assert_eq!(&buffer[44..], &[0x02, 0x01, 0xFE, 0xFF, 0x03, 0x00]);

        Ok(())
    }

    #[test]
    fn odd_chunks_are_padded() {
        struct Odd;
        impl RiffChunk for Odd {
            const ID: [u8; 4] = *b"odd ";
            fn chunk_data(&self) -> Vec<u8> {
                vec![7; 3]
            }
        }

        let mut out = Vec::new();
        Odd.write_chunk(&mut out).unwrap();
        assert_eq!(out, [b'o', b'd', b'd', b' ', 3, 0, 0, 0, 7, 7, 7, 0]);
    }
}
