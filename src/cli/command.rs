use std::path::PathBuf;

use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};

#[derive(Debug, ClapParser)]
#[command(
    name         = env!("CARGO_PKG_NAME"),
    version      = env!("CARGO_PKG_VERSION"),
    long_version = crate::version::long_version(),
    author       = env!("CARGO_PKG_AUTHORS"),
    about        = "Tools for inspecting and decoding QDesign Music 2 (QDM2) audio",
    long_about   = None,
)]
pub struct Cli {
    /// Set the log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Treat warnings as fatal errors (fail on the first bad packet).
    #[arg(long, global = true)]
    pub strict: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show progress bars during operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Packet errors at or above this level abort instead of being concealed.
    pub fn fail_level(&self) -> log::Level {
        if self.strict {
            log::Level::Warn
        } else {
            log::Level::Error
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Decode a raw QDM2 packet stream into PCM audio.
    Decode(DecodeArgs),

    /// Print stream configuration and packet statistics.
    Info(InfoArgs),
}

#[derive(Debug, Args)]
pub struct DecodeArgs {
    /// Concatenated QDM2 packets (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Codec extradata (frma/QDCA/QDCP chunks) describing the stream.
    #[arg(long, value_name = "FILE")]
    pub extradata: PathBuf,

    /// Output path for the decoded audio.
    #[arg(long, value_name = "PATH")]
    pub output_path: Option<PathBuf>,

    /// Audio format for output.
    #[arg(long, value_enum, default_value_t = AudioFormat::Wav)]
    pub format: AudioFormat,

    /// Disable progress estimation
    #[arg(long)]
    pub no_estimate_progress: bool,
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Concatenated QDM2 packets to scan (optional).
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    /// Codec extradata describing the stream.
    #[arg(long, value_name = "FILE")]
    pub extradata: PathBuf,

    /// Report format.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub report: ReportFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors.
    Warn,
    /// Show info, warnings and errors (default).
    Info,
    /// Show debug, info, warnings and errors.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Colorized human-readable text.
    Plain,
    /// Structured JSON per log record.
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum AudioFormat {
    /// RIFF/WAVE, 16-bit PCM.
    Wav,
    /// Raw PCM (16-bit little-endian, interleaved).
    Pcm,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Pcm => "pcm",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ReportFormat {
    /// Aligned human-readable text.
    Text,
    /// YAML document.
    Yaml,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decode_command() {
        let cli = Cli::try_parse_from([
            "qdm2d",
            "--strict",
            "decode",
            "in.qdm2",
            "--extradata",
            "stream.extra",
            "--format",
            "pcm",
        ])
        .unwrap();

        assert_eq!(cli.fail_level(), log::Level::Warn);
        let Commands::Decode(args) = cli.command else {
            panic!("expected decode");
        };
        assert_eq!(args.format, AudioFormat::Pcm);
        assert_eq!(args.extradata, PathBuf::from("stream.extra"));
        assert!(args.output_path.is_none());
    }

    #[test]
    fn info_input_is_optional() {
        let cli =
            Cli::try_parse_from(["qdm2d", "info", "--extradata", "x", "--report", "yaml"]).unwrap();
        assert_eq!(cli.fail_level(), log::Level::Error);
        let Commands::Info(args) = cli.command else {
            panic!("expected info");
        };
        assert!(args.input.is_none());
        assert_eq!(args.report, ReportFormat::Yaml);
    }

    #[test]
    fn extradata_is_required() {
        assert!(Cli::try_parse_from(["qdm2d", "decode", "in.qdm2"]).is_err());
    }
}
