use super::processor::{ProcessPacketsContext, process_packets};
use crate::input::InputReader;
use anyhow::Result;
use indicatif::ProgressBar;
use qdm2::process::decode::{DecodedFrame, Decoder, DecoderStats};
use qdm2::process::extract::Extractor;
use std::sync::mpsc;
use std::thread;

pub struct DecoderThreadConfig {
    pub input_path: std::path::PathBuf,
    pub strict_mode: bool,
    pub tx: mpsc::Sender<Result<DecodedFrame>>,
    pub pb_clone: Option<ProgressBar>,
    pub extractor: Extractor,
    pub decoder: Decoder,
}

/// Reads the input and decodes it on a worker thread, sending each frame
/// through `tx`. Returns the decoder statistics when the input ends.
pub fn spawn_decoder_thread(config: DecoderThreadConfig) -> thread::JoinHandle<Result<DecoderStats>> {
    thread::spawn(move || -> Result<DecoderStats> {
        let DecoderThreadConfig {
            input_path,
            strict_mode,
            tx,
            pb_clone,
            mut extractor,
            mut decoder,
        } = config;

        let mut packets_processed = 0u64;
        let mut total_samples = 0u64;
        let mut stopped = false;

        let mut input_reader = InputReader::new(&input_path)?;

        input_reader.process_chunks(64 * 1024, |chunk| {
            extractor.push_bytes(chunk);

            let mut ctx = ProcessPacketsContext {
                extractor: &mut extractor,
                decoder: &mut decoder,
                packets_processed: &mut packets_processed,
                total_samples: &mut total_samples,
                strict_mode,
                tx: &tx,
                pb_clone: &pb_clone,
            };

            stopped = process_packets(&mut ctx)?;

            Ok(!stopped)
        })?;

        if !stopped {
            if let Err(e) = extractor.flush() {
                if strict_mode {
                    let _ = tx.send(Err(e.into()));
                }
            }
        }

        log::info!("Processing complete: {packets_processed} packets, {total_samples} samples");
        Ok(*decoder.stats())
    })
}
