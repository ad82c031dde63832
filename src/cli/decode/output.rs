use crate::byteorder::WriteBytesLe;
use crate::wav::WAVWriter;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::super::command::AudioFormat;

/// Appends `expected_ext` unless the path already carries it.
///
/// An existing, different extension is kept: `song.qdm2` becomes
/// `song.qdm2.wav`.
pub fn create_path_with_extension(base_path: &Path, expected_ext: &str) -> PathBuf {
    match base_path.extension() {
        Some(existing_ext) if existing_ext == expected_ext => base_path.to_path_buf(),
        Some(_) => {
            let mut name = base_path.file_name().unwrap_or_default().to_os_string();
            name.push(".");
            name.push(expected_ext);
            base_path.with_file_name(name)
        }
        None => base_path.with_extension(expected_ext),
    }
}

pub fn create_output_path(base_path: &Path, format: AudioFormat) -> PathBuf {
    create_path_with_extension(base_path, format.extension())
}

pub enum AudioWriter {
    Pcm(BufWriter<File>),
    Wav(WAVWriter<File>),
}

impl AudioWriter {
    pub fn create(path: &Path, format: AudioFormat, sample_rate: u32, channels: u16) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Cannot create output {}", path.display()))?;

        match format {
            AudioFormat::Pcm => Ok(AudioWriter::Pcm(BufWriter::new(file))),
            AudioFormat::Wav => {
                let mut wav_writer = WAVWriter::new(file, sample_rate, channels);
                wav_writer.write_header()?;
                Ok(AudioWriter::Wav(wav_writer))
            }
        }
    }

    /// Writes interleaved samples.
    pub fn write_samples(&mut self, samples: &[i16]) -> Result<()> {
        match self {
            AudioWriter::Pcm(pcm_writer) => {
                let mut bytes = Vec::with_capacity(samples.len() * 2);
                samples.iter().for_each(|s| s.write_le(&mut bytes));
                pcm_writer.write_all(&bytes)?;
            }
            AudioWriter::Wav(wav_writer) => {
                wav_writer.write_samples(samples)?;
            }
        }
        Ok(())
    }

    pub fn finish(&mut self) -> Result<()> {
        match self {
            AudioWriter::Pcm(pcm_writer) => {
                pcm_writer.flush()?;
            }
            AudioWriter::Wav(wav_writer) => {
                wav_writer.finish()?;
            }
        }
        Ok(())
    }
}
