use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};

/// File or stdin reader for packet dumps.
pub struct InputReader {
    reader: Box<dyn Read>,
    is_pipe: bool,
}

impl InputReader {
    /// Opens `input_path`, or stdin for `-`.
    pub fn new<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        let path = input_path.as_ref();
        let is_pipe = path.as_os_str() == "-";

        let reader: Box<dyn Read> = if is_pipe {
            Box::new(io::stdin().lock())
        } else {
            let file = File::open(path)
                .with_context(|| format!("Cannot open input {}", path.display()))?;
            Box::new(BufReader::new(file))
        };

        Ok(Self { reader, is_pipe })
    }

    #[cfg(test)]
    fn from_reader(reader: impl Read + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            is_pipe: false,
        }
    }

    /// Returns the number of bytes read, 0 at EOF.
    pub fn read_chunk(&mut self, buffer: &mut [u8]) -> Result<usize> {
        loop {
            match self.reader.read(buffer) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn is_pipe(&self) -> bool {
        self.is_pipe
    }

    /// Feeds the input to `callback` in chunks of at most `chunk_size` bytes.
    ///
    /// The callback returns `Ok(false)` to stop early.
    pub fn process_chunks<F>(&mut self, chunk_size: usize, mut callback: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<bool>,
    {
        let mut buffer = vec![0u8; chunk_size];

        loop {
            let bytes_read = self.read_chunk(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }

            if !callback(&buffer[..bytes_read])? {
                break;
            }
        }

        Ok(())
    }
}

/// Reads an extradata blob from a file.
pub fn read_extradata(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Cannot read extradata {}", path.display()))
}

#[test]
fn chunks_cover_input() {
    let data = (0..=255u8).collect::<Vec<_>>();
    let mut reader = InputReader::from_reader(io::Cursor::new(data.clone()));

    let mut seen = Vec::new();
    let mut calls = 0;
    reader
        .process_chunks(100, |chunk| {
            calls += 1;
            seen.extend_from_slice(chunk);
            Ok(true)
        })
        .unwrap();

    assert_eq!(seen, data);
    assert_eq!(calls, 3);
    assert!(!reader.is_pipe());
}

#[test]
fn callback_can_stop() {
    let mut reader = InputReader::from_reader(io::Cursor::new(vec![0u8; 1000]));
    let mut calls = 0;
    reader
        .process_chunks(10, |_| {
            calls += 1;
            Ok(calls < 2)
        })
        .unwrap();
    assert_eq!(calls, 2);
}
