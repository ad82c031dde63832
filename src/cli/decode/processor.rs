use anyhow::Result;
use indicatif::ProgressBar;
use qdm2::process::decode::{DecodedFrame, Decoder};
use qdm2::process::extract::Extractor;
use qdm2::utils::errors::ExtractError;
use std::sync::mpsc;

pub struct ProcessPacketsContext<'a> {
    pub extractor: &'a mut Extractor,
    pub decoder: &'a mut Decoder,
    pub packets_processed: &'a mut u64,
    pub total_samples: &'a mut u64,
    pub strict_mode: bool,
    pub tx: &'a mpsc::Sender<Result<DecodedFrame>>,
    pub pb_clone: &'a Option<ProgressBar>,
}

/// Decodes every complete packet buffered in the extractor.
///
/// Returns `true` when processing must stop: the receiver hung up or a
/// packet failed in strict mode.
pub fn process_packets(ctx: &mut ProcessPacketsContext) -> Result<bool> {
    loop {
        match ctx.extractor.next() {
            Some(Ok(packet)) => {
                *ctx.packets_processed += 1;
                if let Some(pb) = ctx.pb_clone {
                    pb.set_position(*ctx.packets_processed);
                }

                match ctx.decoder.decode(packet.as_ref()) {
                    Ok(decoded) => {
                        if decoded.concealed {
                            if let Some(pb) = ctx.pb_clone {
                                pb.set_message("decoding (some packets concealed)");
                            }
                        }

                        *ctx.total_samples += decoded.samples_per_frame as u64;
                        if ctx.tx.send(Ok(decoded)).is_err() {
                            return Ok(true);
                        }
                    }
                    Err(e) => {
                        log::error!("Decode error at packet {}: {e:#}", packet.index);
                        if ctx.strict_mode {
                            let _ = ctx.tx.send(Err(e.context(format!("packet {}", packet.index))));
                            return Ok(true);
                        }
                    }
                }
            }
            Some(Err(ExtractError::InsufficientData)) => {
                break;
            }
            Some(Err(_extract_error)) => {
                if let Some(pb) = ctx.pb_clone {
                    pb.set_message("processing (some extraction errors)");
                }
            }
            None => {
                break;
            }
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdm2::structs::config::StreamConfig;

    fn decoder(strict: bool) -> Decoder {
        let config = StreamConfig::with_parameters(1, 1, 8000, 16000, 64, 64, 256).unwrap();
        let mut decoder = Decoder::new(config);
        if strict {
            decoder.set_fail_level(log::Level::Warn);
        }
        decoder
    }

    fn run(
        data: &[u8],
        decoder: &mut Decoder,
        strict: bool,
    ) -> (bool, u64, u64, Vec<Result<DecodedFrame>>) {
        let (tx, rx) = mpsc::channel();
        let mut extractor = Extractor::new(64);
        extractor.push_bytes(data);

        let mut packets = 0;
        let mut samples = 0;
        let stop = process_packets(&mut ProcessPacketsContext {
            extractor: &mut extractor,
            decoder,
            packets_processed: &mut packets,
            total_samples: &mut samples,
            strict_mode: strict,
            tx: &tx,
            pb_clone: &None,
        })
        .unwrap();
        drop(tx);

        (stop, packets, samples, rx.into_iter().collect())
    }

    #[test]
    fn decodes_every_complete_packet() {
        let mut decoder = decoder(false);
        let (stop, packets, samples, frames) = run(&[0; 64 * 3 + 10], &mut decoder, false);

        assert!(!stop);
        assert_eq!(packets, 3);
        assert_eq!(samples, 3 * 256);
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.as_ref().is_ok_and(|f| !f.concealed)));
    }

    #[test]
    fn bad_packet_concealed_or_fatal() {
        let mut data = vec![0u8; 64 * 3];
        data[64] = 0xFF;

        let mut lenient = decoder(false);
        let (stop, _, _, frames) = run(&data, &mut lenient, false);
        assert!(!stop);
        assert_eq!(frames.len(), 3);
        assert!(frames[1].as_ref().is_ok_and(|f| f.concealed));

        let mut strict = decoder(true);
        let (stop, packets, _, frames) = run(&data, &mut strict, true);
        assert!(stop);
        assert_eq!(packets, 2);
        assert_eq!(frames.len(), 2);
        assert!(frames[1].is_err());
    }
}
