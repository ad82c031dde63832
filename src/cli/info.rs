use std::collections::BTreeMap;

use anyhow::{Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::Level;
use serde::Serialize;

use super::command::{Cli, InfoArgs, ReportFormat};
use crate::input::{InputReader, read_extradata};
use crate::timestamp::{samples_to_secs, time_str};
use qdm2::log_or_err;
use qdm2::process::{demux::Demuxer, extract::Extractor, parse::Parser};
use qdm2::structs::config::{StreamConfig, TrailingChunk};
use qdm2::structs::sub_packet::SubPacketClass;
use qdm2::utils::errors::{ErrorKind, PacketError, error_kind};

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    let extradata = read_extradata(&args.extradata)?;
    let config = StreamConfig::from_extradata(&extradata)
        .with_context(|| format!("Invalid extradata in {}", args.extradata.display()))?;

    let packets = match &args.input {
        Some(input) => {
            log::info!("Analyzing QDM2 stream: {}", input.display());
            Some(analyze_stream(input, &config, cli, multi)?)
        }
        None => None,
    };

    let report = InfoReport {
        configuration: ConfigReport::new(&config),
        packets,
    };

    match args.report {
        ReportFormat::Text => display_report(&report),
        ReportFormat::Yaml => print!("{}", serde_yaml_ng::to_string(&report)?),
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct InfoReport {
    configuration: ConfigReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    packets: Option<PacketReport>,
}

#[derive(Debug, Serialize)]
struct ConfigReport {
    version: u32,
    channels: usize,
    sample_rate: u32,
    bitrate: u32,
    block_size: u32,
    frame_size: usize,
    samples_per_frame: usize,
    fft_size: usize,
    num_bands: usize,
    coeffs_per_band: usize,
    group_size: usize,
    frame_duration_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile_bytes: Option<usize>,
    terminated: bool,
}

impl ConfigReport {
    fn new(config: &StreamConfig) -> Self {
        Self {
            version: config.version,
            channels: config.channels,
            sample_rate: config.sample_rate,
            bitrate: config.bitrate,
            block_size: config.block_size,
            frame_size: config.frame_size,
            samples_per_frame: config.samples_per_frame,
            fft_size: config.fft_size,
            num_bands: config.num_bands,
            coeffs_per_band: config.coeffs_per_band,
            group_size: config.group_size,
            frame_duration_ms: config.frame_duration() * 1000.0,
            profile_bytes: config.profile().map(<[u8]>::len),
            terminated: config
                .trailing_chunks()
                .iter()
                .any(|c| matches!(c, TrailingChunk::Terminator)),
        }
    }
}

#[derive(Debug, Default, Serialize)]
struct PacketReport {
    packets: u64,
    bytes: u64,
    trailing_bytes: usize,
    checksum_failures: u64,
    malformed_packets: u64,
    truncated_packets: u64,
    invalid_codes: u64,
    /// Occurrences of each sub-packet type code.
    sub_packets: BTreeMap<u8, u64>,
    duration: String,
    average_bitrate_kbps: f64,
}

struct AnalysisContext {
    demuxer: Demuxer,
    parser: Parser,
    report: PacketReport,
    fail_level: Level,
    pb: Option<ProgressBar>,
}

impl AnalysisContext {
    fn new(config: &StreamConfig, fail_level: Level) -> Self {
        Self {
            demuxer: Demuxer::new(config.frame_size),
            parser: Parser::new(config),
            report: PacketReport::default(),
            fail_level,
            pb: None,
        }
    }

    /// Demuxes and parses one packet without decoding it.
    fn process_packet(&mut self, index: u64, packet: &[u8]) -> Result<()> {
        self.report.packets += 1;

        if self.report.packets.is_multiple_of(100) {
            if let Some(ref pb) = self.pb {
                pb.set_message(format!("Analyzing packets...       {}", self.report.packets));
                pb.tick();
            }
        }

        let layout = match self.demuxer.scan(packet) {
            Ok(layout) => layout,
            Err(err) => return self.packet_error(index, err),
        };

        for sub_packet in &layout.sub_packets {
            *self.report.sub_packets.entry(sub_packet.type_code).or_default() += 1;
        }

        if !layout.checksum_ok() {
            self.report.checksum_failures += 1;
            let err = anyhow::Error::from(PacketError::ChecksumMismatch {
                calculated: layout.checksum_calculated,
                read: layout.checksum_read,
            });
            log_or_err!(self, Level::Warn, err.context(format!("packet {index}")));
        }

        if let Err(err) = self.parser.parse(packet, &layout) {
            return self.packet_error(index, err);
        }

        Ok(())
    }

    fn packet_error(&mut self, index: u64, err: anyhow::Error) -> Result<()> {
        match error_kind(&err) {
            Some(ErrorKind::Truncated) => self.report.truncated_packets += 1,
            Some(ErrorKind::InvalidCode) => self.report.invalid_codes += 1,
            _ => self.report.malformed_packets += 1,
        }
        log_or_err!(self, Level::Warn, err.context(format!("packet {index}")));
        Ok(())
    }

    fn into_report(mut self, config: &StreamConfig) -> PacketReport {
        if let Some(ref pb) = self.pb {
            pb.finish_and_clear();
        }

        let samples = self.report.packets * config.samples_per_frame as u64;
        let duration_secs = samples_to_secs(samples, config.sample_rate);
        self.report.duration = time_str(duration_secs);
        if duration_secs > 0.0 {
            self.report.average_bitrate_kbps =
                (self.report.bytes as f64 * 8.0) / (duration_secs * 1000.0);
        }

        self.report
    }
}

fn analyze_stream(
    input_path: &std::path::Path,
    config: &StreamConfig,
    cli: &Cli,
    multi: Option<&MultiProgress>,
) -> Result<PacketReport> {
    let mut input_reader = InputReader::new(input_path)?;
    let mut extractor = Extractor::new(config.frame_size);
    let mut context = AnalysisContext::new(config, cli.fail_level());

    if let Some(multi) = multi {
        let pb = multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb.set_message("Analyzing packets...");
        context.pb = Some(pb);
    }

    input_reader.process_chunks(64 * 1024, |chunk| {
        context.report.bytes += chunk.len() as u64;
        extractor.push_bytes(chunk);

        for packet_result in extractor.by_ref() {
            let packet = match packet_result {
                Ok(packet) => packet,
                Err(_) => continue,
            };

            context.process_packet(packet.index, packet.as_ref())?;
        }

        Ok(true)
    })?;

    context.report.trailing_bytes = extractor.buffered();
    if let Err(e) = extractor.flush() {
        log_or_err!(context, Level::Warn, anyhow::Error::from(e));
    }

    Ok(context.into_report(config))
}

fn display_report(report: &InfoReport) {
    let config = &report.configuration;

    println!();
    println!("QDM2 Stream Information");
    println!("=======================");
    println!();
    println!("Configuration");
    println!("  Version                   {}", config.version);
    println!("  Channels                  {}", config.channels);
    println!("  Sampling rate             {} Hz", config.sample_rate);
    println!("  Bitrate                   {} bps", config.bitrate);
    println!("  Block size                {} bytes", config.block_size);
    println!("  Packet size               {} bytes", config.frame_size);
    println!("  Samples per frame         {}", config.samples_per_frame);
    println!("  Frame duration            {:.3} ms", config.frame_duration_ms);
    println!("  FFT size                  {}", config.fft_size);
    println!(
        "  Bands                     {} x {} coefficients",
        config.num_bands, config.coeffs_per_band
    );
    println!("  Packets per block         {}", config.group_size);
    match config.profile_bytes {
        Some(len) => println!("  QDCP profile              {len} bytes"),
        None => println!("  QDCP profile              none"),
    }
    println!();

    let Some(packets) = &report.packets else {
        return;
    };

    println!("Analysis Summary");
    println!("  Packets processed         {}", packets.packets);
    let size_mb = packets.bytes as f64 / 1_000_000.0;
    println!("  Size                      {size_mb:.2} MB ({} bytes)", packets.bytes);
    if packets.trailing_bytes > 0 {
        println!("  Trailing bytes            {}", packets.trailing_bytes);
    }
    println!("  Duration                  {}", packets.duration);
    println!("  Average data rate         {:.1} kbps", packets.average_bitrate_kbps);
    println!("  Checksum failures         {}", packets.checksum_failures);
    println!("  Malformed packets         {}", packets.malformed_packets);
    println!("  Truncated packets         {}", packets.truncated_packets);
    println!("  Invalid codes             {}", packets.invalid_codes);
    println!();

    if !packets.sub_packets.is_empty() {
        println!("Sub-packets");
        for (code, count) in &packets.sub_packets {
            let class = SubPacketClass::of(*code)
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            println!("  Type {code:<2} ({class:<6})          {count}");
        }
        println!();
    }
}
