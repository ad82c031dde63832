use super::decoder_thread::{DecoderThreadConfig, spawn_decoder_thread};
use super::handler::{DecodeHandler, FrameHandlerContext, WriterState};
use super::progress::{create_progress_bar, estimate_total_packets};
use crate::cli::command::{Cli, DecodeArgs};
use crate::input::read_extradata;
use anyhow::{Context, Result};
use indicatif::{MultiProgress, ProgressStyle};
use std::sync::mpsc;
use qdm2::process::{decode::Decoder, extract::Extractor};
use qdm2::structs::config::StreamConfig;

pub fn cmd_decode(args: &DecodeArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!(
        "Decoding QDM2 stream: {} (strict mode: {})",
        args.input.display(),
        cli.strict,
    );

    let extradata = read_extradata(&args.extradata)?;
    let config = StreamConfig::from_extradata(&extradata)
        .with_context(|| format!("Invalid extradata in {}", args.extradata.display()))?;

    let is_pipe = args.input.as_os_str() == "-";
    let base_path = args.output_path.clone();

    if let Some(ref path) = base_path {
        log::info!("Output path specified: {}", path.display());
    } else {
        log::info!("No output path, decoding without writing audio");
    }

    let should_estimate = !args.no_estimate_progress && !is_pipe && multi.is_some();
    let total_packets = if should_estimate {
        Some(estimate_total_packets(&args.input, config.frame_size)?)
    } else {
        if is_pipe {
            log::debug!("Skipping progress estimation for pipe input");
        } else if args.no_estimate_progress {
            log::debug!("Progress estimation disabled by --no-estimate-progress flag");
        }
        None
    };

    let pb = if let Some(multi) = multi {
        Some(create_progress_bar(multi, total_packets)?)
    } else {
        None
    };

    let (tx, rx) = mpsc::channel();
    let fail_level = cli.fail_level();

    let extractor = Extractor::new(config.frame_size);
    let mut decoder = Decoder::new(config);
    decoder.set_fail_level(fail_level);

    let state = WriterState { fail_level };

    let decode_thread = spawn_decoder_thread(DecoderThreadConfig {
        input_path: args.input.clone(),
        strict_mode: cli.strict,
        tx,
        pb_clone: pb.clone(),
        extractor,
        decoder,
    });

    let mut handler = DecodeHandler::default();
    let start_time = std::time::Instant::now();

    while let Ok(result) = rx.recv() {
        match result {
            Ok(decoded) => {
                let ctx = FrameHandlerContext {
                    base_path: &base_path,
                    format: args.format,
                    pb: &pb,
                    state: &state,
                    start_time,
                };
                handler.handle_decoded_frame(decoded, &ctx)?;
            }
            Err(e) => {
                if let Some(pb) = pb {
                    pb.finish_with_message("decode failed");
                }
                return Err(e);
            }
        }
    }

    handler.finalize(&state)?;

    match decode_thread.join() {
        Ok(Ok(stats)) => {
            finalize_progress_bar(
                &pb,
                total_packets,
                handler.decoded_samples,
                handler.final_sample_rate,
                start_time,
            );
            log::info!(
                "Decoding completed: {} frames, {} concealed, {} checksum failures, {} clipped samples",
                stats.frames_decoded,
                stats.frames_concealed,
                stats.checksum_failures,
                stats.clipped_samples
            );
        }
        Ok(Err(e)) => {
            if let Some(pb) = pb {
                pb.finish_with_message("decode failed");
            }
            return Err(e);
        }
        Err(_) => {
            if let Some(pb) = pb {
                pb.finish_with_message("decode thread panicked");
            }
            return Err(anyhow::anyhow!("Decode thread panicked"));
        }
    }

    Ok(())
}

fn finalize_progress_bar(
    pb: &Option<indicatif::ProgressBar>,
    total_packets: Option<u64>,
    decoded_samples: u64,
    final_sample_rate: u32,
    start_time: std::time::Instant,
) {
    if let Some(pb) = pb {
        let elapsed = start_time.elapsed();
        let audio_duration_secs = crate::timestamp::samples_to_secs(decoded_samples, final_sample_rate);
        let realtime_multiplier = audio_duration_secs / elapsed.as_secs_f64();
        let final_time_str = crate::timestamp::time_str(audio_duration_secs);

        if total_packets.is_some() {
            pb.set_style(
                ProgressStyle::with_template(
                    "{bar:40.cyan/blue} {pos}/{len} packets ({percent}%)\n{msg} | elapsed: {elapsed_precise}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
        } else {
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} {pos} packets\n{msg} | elapsed: {elapsed_precise}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
        }

        pb.finish_with_message(format!(
            "speed: {realtime_multiplier:.1}x | timestamp: {final_time_str}"
        ));
    }
}
