//! Classic ADSR amplitude envelope with a power-curve shape factor.

use crate::Error;

use super::{curved_progress, release_ramp, stage_progress, EnvelopeFrame};

// -------------------------------------------------------------------------------------------------

/// Amplitude envelope config for a grain: the classic four-stage ADSR shape.
///
/// Attack rises 0→1 over `attack_ticks`, decay falls 1→`sustain_level` over
/// `decay_ticks`, sustain holds `sustain_level` until the grain is released,
/// release falls from the level captured at release time down to 0 over
/// `release_ticks`. All ramps are shaped by the same `curve` exponent
/// (`progress.powf(curve)`, 1.0 = linear).
///
/// Durations are counted in scheduler ticks (one output frame per tick).
/// Zero durations are valid and mean an instantaneous jump.
///
/// Config is immutable once built; the elapsed-time state belongs to the
/// grain that owns the envelope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmpEnv {
    attack_ticks: u32,
    decay_ticks: u32,
    sustain_level: f32,
    release_ticks: u32,
    curve: f32,
}

impl AmpEnv {
    /// Create a new, linearly shaped amplitude envelope.
    ///
    /// `sustain_level` must be in range `[0.0, 1.0]`.
    pub fn new(
        attack_ticks: u32,
        decay_ticks: u32,
        sustain_level: f32,
        release_ticks: u32,
    ) -> Result<Self, Error> {
        Self::with_curve(attack_ticks, decay_ticks, sustain_level, release_ticks, 1.0)
    }

    /// Create a new amplitude envelope with a custom curve exponent.
    ///
    /// `curve` must be finite and > 0.0: values below 1.0 give fast-start
    /// ramps, values above 1.0 give slow-start ramps.
    pub fn with_curve(
        attack_ticks: u32,
        decay_ticks: u32,
        sustain_level: f32,
        release_ticks: u32,
        curve: f32,
    ) -> Result<Self, Error> {
        if !(0.0..=1.0).contains(&sustain_level) {
            return Err(Error::InvalidEnvelopeConfig(format!(
                "Invalid sustain level: {sustain_level}. Must be in range [0.0, 1.0]"
            )));
        }
        if !curve.is_finite() || curve <= 0.0 {
            return Err(Error::InvalidEnvelopeConfig(format!(
                "Invalid curve: {curve}. Must be finite and > 0.0"
            )));
        }
        Ok(Self {
            attack_ticks,
            decay_ticks,
            sustain_level,
            release_ticks,
            curve,
        })
    }

    /// Attack stage length in ticks.
    pub fn attack_ticks(&self) -> u32 {
        self.attack_ticks
    }
    /// Decay stage length in ticks.
    pub fn decay_ticks(&self) -> u32 {
        self.decay_ticks
    }
    /// The level held during sustain, in range `[0.0, 1.0]`.
    pub fn sustain_level(&self) -> f32 {
        self.sustain_level
    }
    /// Release stage length in ticks.
    pub fn release_ticks(&self) -> u32 {
        self.release_ticks
    }
    /// The ramp shape exponent (1.0 = linear).
    pub fn curve(&self) -> f32 {
        self.curve
    }

    /// Evaluate the attack stage after `elapsed` ticks in it: ramps 0→1.
    #[inline]
    pub fn attack(&self, elapsed: u32) -> EnvelopeFrame {
        let progress = stage_progress(elapsed, self.attack_ticks);
        EnvelopeFrame {
            value: curved_progress(progress, self.curve),
            complete: progress >= 1.0,
        }
    }

    /// Evaluate the decay stage after `elapsed` ticks in it: ramps
    /// 1→`sustain_level`.
    #[inline]
    pub fn decay(&self, elapsed: u32) -> EnvelopeFrame {
        let progress = stage_progress(elapsed, self.decay_ticks);
        let curved = curved_progress(progress, self.curve);
        EnvelopeFrame {
            value: 1.0 + (self.sustain_level - 1.0) * curved,
            complete: progress >= 1.0,
        }
    }

    /// The constant sustain stage value. Sustain holds indefinitely; it only
    /// ends through an explicit release or the grain's duration envelope.
    #[inline]
    pub fn sustain(&self) -> f32 {
        self.sustain_level
    }

    /// Evaluate the release stage after `elapsed` ticks in it: ramps from
    /// `from_level` (the envelope value captured when release was triggered)
    /// down to 0. Completes at the end of the ramp or as soon as the value
    /// is inaudible.
    #[inline]
    pub fn release(&self, elapsed: u32, from_level: f32) -> EnvelopeFrame {
        release_ramp(elapsed, self.release_ticks, from_level, self.curve)
    }
}

impl Default for AmpEnv {
    fn default() -> Self {
        Self {
            attack_ticks: 1,
            decay_ticks: 1,
            sustain_level: 0.5,
            release_ticks: 1,
            curve: 1.0,
        }
    }
}

// -------------------------------------------------------------------------------------------------
