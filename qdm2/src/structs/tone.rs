//! Tonal components and their per-channel registry.

use log::trace;

use crate::utils::tables::{
    TONE_DECAY_STEP, TONE_MIN_LEVEL, TONE_PHASE_STEPS, phasor, tone_amplitude,
};

/// A sinusoid pinned to one spectral bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToneComponent {
    pub band: usize,
    pub position: usize,
    pub level: i32,
    /// Phase in units of π/4 at `start_frame`.
    pub phase: u8,
    /// Frames the tone holds its level after an add or refresh.
    pub duration: u32,
    pub remaining: u32,
    pub start_frame: u64,
}

impl ToneComponent {
    pub fn bin(&self, coeffs_per_band: usize) -> usize {
        self.band * coeffs_per_band + self.position
    }

    pub fn amplitude(&self) -> f32 {
        tone_amplitude(self.level)
    }

    /// Phase at `frame`, continuing the sinusoid across frame hops.
    pub fn phase_at(&self, frame: u64, bin: usize) -> u8 {
        let steps = TONE_PHASE_STEPS as u64;
        let elapsed = frame.wrapping_sub(self.start_frame) % steps;
        ((self.phase as u64 + 4 * bin as u64 * elapsed) % steps) as u8
    }

    /// Unit phasor of [`phase_at`](Self::phase_at).
    pub fn phasor_at(&self, frame: u64, bin: usize) -> (f32, f32) {
        phasor(self.phase_at(frame, bin) * (256 / TONE_PHASE_STEPS) as u8)
    }

    pub fn refresh(&mut self) {
        self.remaining = self.duration;
    }

    /// Advances an untouched tone by one frame. Returns `false` once it died.
    pub fn tick(&mut self) -> bool {
        if self.remaining > 0 {
            self.remaining -= 1;
        } else {
            self.level -= TONE_DECAY_STEP;
        }

        self.level >= TONE_MIN_LEVEL
    }
}

/// Edit to a tone set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneOp {
    Add { level: i32, phase: u8, duration: u32 },
    Refresh,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToneCommand {
    pub type_code: u8,
    pub channel: usize,
    pub band: usize,
    pub position: usize,
    pub op: ToneOp,
}

/// Active tones of one channel, at most one per bin.
#[derive(Debug, Clone)]
pub struct ToneSet {
    slots: Vec<Option<ToneComponent>>,
    touched: Vec<bool>,
    coeffs_per_band: usize,
    active: usize,
}

impl ToneSet {
    pub fn new(bins: usize, coeffs_per_band: usize) -> Self {
        Self {
            slots: vec![None; bins],
            touched: vec![false; bins],
            coeffs_per_band,
            active: 0,
        }
    }

    /// Applies one command in `frame`. Returns `false` when it addressed an empty slot.
    pub fn apply(&mut self, command: &ToneCommand, frame: u64) -> bool {
        let bin = command.band * self.coeffs_per_band + command.position;
        let Some(slot) = self.slots.get_mut(bin) else {
            return false;
        };

        match command.op {
            ToneOp::Add {
                level,
                phase,
                duration,
            } => {
                if slot.is_none() {
                    self.active += 1;
                }
                *slot = Some(ToneComponent {
                    band: command.band,
                    position: command.position,
                    level,
                    phase,
                    duration,
                    remaining: duration,
                    start_frame: frame,
                });
            }
            ToneOp::Refresh => match slot {
                Some(tone) => tone.refresh(),
                None => return false,
            },
            ToneOp::Delete => {
                if slot.take().is_none() {
                    return false;
                }
                self.active -= 1;
            }
        }

        self.touched[bin] = true;
        true
    }

    /// Ticks every tone not touched since the last call and drops dead ones.
    pub fn tick_untouched(&mut self) {
        for (bin, (slot, touched)) in self.slots.iter_mut().zip(&mut self.touched).enumerate() {
            if std::mem::take(touched) {
                continue;
            }
            if let Some(tone) = slot
                && !tone.tick()
            {
                trace!("tone at bin {bin} decayed below level {TONE_MIN_LEVEL}");
                *slot = None;
                self.active -= 1;
            }
        }
    }

    pub fn get(&self, bin: usize) -> Option<&ToneComponent> {
        self.slots.get(bin)?.as_ref()
    }

    pub fn is_tonal(&self, bin: usize) -> bool {
        self.get(bin).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &ToneComponent)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(bin, slot)| slot.as_ref().map(|tone| (bin, tone)))
    }

    pub fn len(&self) -> usize {
        self.active
    }

    pub fn is_empty(&self) -> bool {
        self.active == 0
    }

    pub fn clear(&mut self) {
        self.slots.fill(None);
        self.touched.fill(false);
        self.active = 0;
    }
}
