//! Spectrum rendering and the synthesis filterbank.
//!
//! Each channel's tones and noise envelope are written into a complex
//! spectrum of `fft_size` bins with conjugate symmetry, transformed back to
//! the time domain, windowed with a sine window and overlap-added with the
//! tail of the previous frame.

use std::f32::consts;

use crate::structs::channel::ChannelState;
use crate::structs::config::StreamConfig;
use crate::utils::fft::{COMPLEX_ZERO, Complex32, Fft};
use crate::utils::rng::NoiseRng;
use crate::utils::tables::phasor;

#[derive(Debug, Clone)]
pub struct Synthesizer {
    fft: Fft,
    window: Vec<f32>,
    spectrum: Vec<Complex32>,
    samples_per_frame: usize,
    coeffs_per_band: usize,
    num_bands: usize,
}

impl Synthesizer {
    pub fn new(config: &StreamConfig) -> Self {
        let fft_size = config.fft_size;
        let window = (0..fft_size)
            .map(|n| (consts::PI * (n as f32 + 0.5) / fft_size as f32).sin())
            .collect();

        Self {
            fft: Fft::new(config.fft_order),
            window,
            spectrum: vec![COMPLEX_ZERO; fft_size],
            samples_per_frame: config.samples_per_frame,
            coeffs_per_band: config.coeffs_per_band,
            num_bands: config.num_bands,
        }
    }

    /// Renders one frame of `channel` into `out`, which holds
    /// `samples_per_frame` values.
    ///
    /// With `silent` set the spectrum stays empty and only the overlap tail
    /// is emitted.
    pub fn render(
        &mut self,
        channel: &mut ChannelState,
        channel_index: usize,
        frame_index: u64,
        silent: bool,
        out: &mut [f32],
    ) {
        self.spectrum.fill(COMPLEX_ZERO);

        if !silent {
            self.add_tones(channel, frame_index);
            self.add_noise(channel, channel_index, frame_index);
        }

        self.fft.do_ifft_inplace(&mut self.spectrum);

        let spf = self.samples_per_frame;
        let (head, tail) = self.spectrum.split_at(spf);
        let (w_head, w_tail) = self.window.split_at(spf);

        for (n, sample) in out.iter_mut().enumerate().take(spf) {
            *sample = channel.overlap[n] + head[n].re * w_head[n];
            channel.overlap[n] = tail[n].re * w_tail[n];
        }
    }

    /// Adds `value` at `bin` and its conjugate at the mirrored bin.
    fn put_bin(&mut self, bin: usize, value: Complex32) {
        if bin == 0 {
            self.spectrum[0].re += 2.0 * value.re;
            return;
        }

        let mirror = self.spectrum.len() - bin;
        self.spectrum[bin] += value;
        self.spectrum[mirror] += value.conj();
    }

    fn add_tones(&mut self, channel: &ChannelState, frame_index: u64) {
        for (bin, tone) in channel.tones.iter() {
            let value = Complex32::from_polar(
                tone.amplitude() * 0.5,
                tone.phasor_at(frame_index, bin),
            );
            self.put_bin(bin, value);
        }
    }

    fn add_noise(&mut self, channel: &ChannelState, channel_index: usize, frame_index: u64) {
        if channel.noise.is_silent() {
            return;
        }

        let mut rng = NoiseRng::for_frame(channel.noise_seed, channel_index, frame_index);
        let cpb = self.coeffs_per_band;

        for band in 0..self.num_bands {
            let amplitude = channel.noise.amplitude(band);
            if amplitude == 0.0 {
                continue;
            }

            for bin in band * cpb..(band + 1) * cpb {
                if channel.tones.is_tonal(bin) {
                    continue;
                }
                let value = Complex32::from_polar(amplitude * 0.5, phasor(rng.next_phase()));
                self.put_bin(bin, value);
            }
        }
    }
}

/// Rounds and clips a sample, returning whether it was clipped.
#[inline(always)]
pub fn to_pcm(sample: f32) -> (i16, bool) {
    let rounded = sample.round();
    if rounded > i16::MAX as f32 {
        (i16::MAX, true)
    } else if rounded < i16::MIN as f32 {
        (i16::MIN, true)
    } else {
        (rounded as i16, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::tone::{ToneCommand, ToneOp};
    use crate::utils::testing::config;

    fn add_tone(channel: &mut ChannelState, band: usize, position: usize, level: i32) {
        channel.tones.apply(
            &ToneCommand {
                type_code: 8,
                channel: 0,
                band,
                position,
                op: ToneOp::Add {
                    level,
                    phase: 0,
                    duration: 16,
                },
            },
            0,
        );
    }

    #[test]
    fn silence_in_silence_out() {
        let config = config(1, 8000, 256, 64);
        let mut synth = Synthesizer::new(&config);
        let mut channel = ChannelState::new(&config);
        let mut out = vec![1.0; 256];

        synth.render(&mut channel, 0, 0, false, &mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert!(channel.is_silent());
    }

    #[test]
    fn steady_tone_is_a_windowed_cosine() {
        let config = config(1, 8000, 256, 64);
        let mut synth = Synthesizer::new(&config);
        let mut channel = ChannelState::new(&config);
        // bin 4 * 8 + 1 = 33
        add_tone(&mut channel, 4, 1, 47);

        let mut first = vec![0.0; 256];
        synth.render(&mut channel, 0, 0, false, &mut first);

        let m = config.fft_size as f64;
        let carrier = |t: f64| 16384.0 * (std::f64::consts::TAU * 33.0 * t / m).cos();
        let window = |t: f64| (std::f64::consts::PI * (t + 0.5) / m).sin();

        for (n, &sample) in first.iter().enumerate() {
            let expected = carrier(n as f64) * window(n as f64);
            assert!(
                (sample as f64 - expected).abs() < 0.5,
                "n {n}: {sample} vs {expected}"
            );
        }

        // Next frame: overlap-add of sin-windowed halves with continuous phase.
        let mut second = vec![0.0; 256];
        synth.render(&mut channel, 0, 1, false, &mut second);
        for (n, &sample) in second.iter().enumerate() {
            let t = (n + 256) as f64;
            let expected = carrier(t) * (window(t) + window(n as f64));
            assert!(
                (sample as f64 - expected).abs() < 1.0,
                "n {n}: {sample} vs {expected}"
            );
        }
    }

    #[test]
    fn silent_frame_flushes_tail() {
        let config = config(1, 8000, 128, 64);
        let mut synth = Synthesizer::new(&config);
        let mut channel = ChannelState::new(&config);
        add_tone(&mut channel, 3, 2, 40);
        channel.noise.apply(20, &[6, 6]);

        let mut out = vec![0.0; 128];
        synth.render(&mut channel, 0, 0, false, &mut out);
        let tail = channel.overlap.clone();
        assert!(tail.iter().any(|&s| s != 0.0));

        synth.render(&mut channel, 0, 1, true, &mut out);
        assert_eq!(out, tail);
        assert!(channel.overlap.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn noise_skips_tonal_bins_and_is_seeded() {
        let config = config(1, 8000, 128, 64);
        let mut channel = ChannelState::new(&config);
        channel.noise.apply(0, &[6; 8]);
        add_tone(&mut channel, 1, 0, 47);

        let mut synth = Synthesizer::new(&config);
        synth.add_noise(&channel, 0, 5);
        // bin 4 belongs to the tone, its neighbours to the noise
        assert_eq!(synth.spectrum[4], COMPLEX_ZERO);
        assert_ne!(synth.spectrum[5], COMPLEX_ZERO);
        let first = synth.spectrum.clone();

        synth.spectrum.fill(COMPLEX_ZERO);
        synth.add_noise(&channel, 0, 5);
        assert_eq!(synth.spectrum, first);

        synth.spectrum.fill(COMPLEX_ZERO);
        synth.add_noise(&channel, 0, 6);
        assert_ne!(synth.spectrum, first);
    }

    #[test]
    fn pcm_rounding_and_clipping() {
        assert_eq!(to_pcm(0.49), (0, false));
        assert_eq!(to_pcm(-1.5), (-2, false));
        assert_eq!(to_pcm(32767.4), (32767, false));
        assert_eq!(to_pcm(32767.6), (32767, true));
        assert_eq!(to_pcm(-40000.0), (-32768, true));
    }
}
