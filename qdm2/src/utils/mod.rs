//! Utility functions and supporting infrastructure.
//!
//! Provides bitstream I/O, VLC decoding, checksum validation, the synthesis
//! FFT, noise generation, error handling and buffer management.

pub mod bitstream_io;
pub mod buffer_pool;
pub mod checksum;
pub mod errors;
pub mod fft;
pub mod rng;
pub mod tables;
pub mod vlc;

#[cfg(test)]
pub mod testing;
