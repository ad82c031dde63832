use super::output::{AudioWriter, create_output_path};
use crate::cli::command::AudioFormat;
use crate::timestamp::{samples_to_secs, time_str};
use anyhow::{Result, anyhow};
use indicatif::ProgressBar;
use log::Level;
use qdm2::log_or_err;
use qdm2::process::decode::DecodedFrame;
use std::path::PathBuf;

pub struct WriterState {
    pub fail_level: Level,
}

pub struct FrameHandlerContext<'a> {
    pub base_path: &'a Option<PathBuf>,
    pub format: AudioFormat,
    pub pb: &'a Option<ProgressBar>,
    pub state: &'a WriterState,
    pub start_time: std::time::Instant,
}

/// Receives decoded frames and writes them out.
pub struct DecodeHandler {
    pub audio_writer: Option<AudioWriter>,
    pub current_audio_path: Option<PathBuf>,
    pub decoded_frames: u64,
    pub concealed_frames: u64,
    pub decoded_samples: u64,
    pub final_sample_rate: u32,
    pub channels: usize,
}

impl Default for DecodeHandler {
    fn default() -> Self {
        Self {
            audio_writer: None,
            current_audio_path: None,
            decoded_frames: 0,
            concealed_frames: 0,
            decoded_samples: 0,
            final_sample_rate: 44100,
            channels: 0,
        }
    }
}

impl DecodeHandler {
    pub fn handle_decoded_frame(
        &mut self,
        decoded: DecodedFrame,
        ctx: &FrameHandlerContext,
    ) -> Result<()> {
        if self.channels != 0 && self.channels != decoded.channels {
            log_or_err!(
                ctx.state,
                Level::Error,
                anyhow!(
                    "Channel count changed from {} to {} at frame {}",
                    self.channels,
                    decoded.channels,
                    decoded.frame_index
                )
            );
        }

        self.decoded_frames += 1;
        self.decoded_samples += decoded.samples_per_frame as u64;
        self.final_sample_rate = decoded.sample_rate;
        self.channels = decoded.channels;
        if decoded.concealed {
            self.concealed_frames += 1;
        }

        self.create_audio_writer_if_needed(
            ctx.base_path,
            ctx.format,
            decoded.sample_rate,
            decoded.channels,
        )?;

        if let Some(ref mut writer) = self.audio_writer {
            writer.write_samples(&decoded.pcm)?;
        }

        self.update_progress_display(ctx.start_time, ctx.pb);

        Ok(())
    }

    fn create_audio_writer_if_needed(
        &mut self,
        base_path: &Option<PathBuf>,
        format: AudioFormat,
        sample_rate: u32,
        channels: usize,
    ) -> Result<()> {
        if let Some(base_path) = base_path {
            if self.audio_writer.is_none() {
                let audio_path = create_output_path(base_path, format);
                log::info!("Creating audio file: {}", audio_path.display());

                self.audio_writer = Some(AudioWriter::create(
                    &audio_path,
                    format,
                    sample_rate,
                    channels as u16,
                )?);
                self.current_audio_path = Some(audio_path);
            }
        }
        Ok(())
    }

    fn update_progress_display(&self, start_time: std::time::Instant, pb: &Option<ProgressBar>) {
        if self.decoded_frames.is_multiple_of(30) {
            let elapsed = start_time.elapsed();
            let audio_duration_secs = samples_to_secs(self.decoded_samples, self.final_sample_rate);
            let realtime_multiplier = audio_duration_secs / elapsed.as_secs_f64();
            let time_str = time_str(audio_duration_secs);

            if let Some(pb) = pb {
                pb.set_message(format!(
                    "speed: {realtime_multiplier:.1}x | timestamp: {time_str}"
                ));
            }
        }
    }

    pub fn finalize(&mut self, state: &WriterState) -> Result<()> {
        if let Some(ref mut writer) = self.audio_writer {
            writer.finish()?;
        }

        if self.decoded_frames == 0 {
            log_or_err!(state, Level::Warn, anyhow!("No packets were decoded"));
        } else if self.concealed_frames > 0 {
            log::warn!(
                "{} of {} frames were concealed",
                self.concealed_frames,
                self.decoded_frames
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(index: u64, channels: usize, concealed: bool) -> DecodedFrame {
        DecodedFrame {
            frame_index: index,
            sample_rate: 22050,
            channels,
            samples_per_frame: 4,
            concealed,
            pcm: vec![index as i16; 4 * channels],
        }
    }

    #[test]
    fn counts_frames_without_output() -> Result<()> {
        let state = WriterState {
            fail_level: Level::Error,
        };
        let ctx = FrameHandlerContext {
            base_path: &None,
            format: AudioFormat::Wav,
            pb: &None,
            state: &state,
            start_time: std::time::Instant::now(),
        };

        let mut handler = DecodeHandler::default();
        handler.handle_decoded_frame(frame(0, 2, false), &ctx)?;
        handler.handle_decoded_frame(frame(1, 2, true), &ctx)?;
        handler.finalize(&state)?;

        assert_eq!(handler.decoded_frames, 2);
        assert_eq!(handler.concealed_frames, 1);
        assert_eq!(handler.decoded_samples, 8);
        assert_eq!(handler.final_sample_rate, 22050);
        assert!(handler.audio_writer.is_none());
        Ok(())
    }

    #[test]
    fn strict_empty_stream_fails() {
        let strict = WriterState {
            fail_level: Level::Warn,
        };
        assert!(DecodeHandler::default().finalize(&strict).is_err());

        let lenient = WriterState {
            fail_level: Level::Error,
        };
        assert!(DecodeHandler::default().finalize(&lenient).is_ok());
    }

    #[test]
    fn channel_change_is_fatal() {
        let state = WriterState {
            fail_level: Level::Error,
        };
        let ctx = FrameHandlerContext {
            base_path: &None,
            format: AudioFormat::Pcm,
            pb: &None,
            state: &state,
            start_time: std::time::Instant::now(),
        };

        let mut handler = DecodeHandler::default();
        handler.handle_decoded_frame(frame(0, 1, false), &ctx).unwrap();
        assert!(handler.handle_decoded_frame(frame(1, 2, false), &ctx).is_err());
    }
}
