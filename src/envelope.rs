//! Per-grain envelope evaluators: amplitude (ADSR), frequency (playback-rate
//! ramps) and duration (auto-release lifetime).
//!
//! Evaluators are pure: the current value is a function of the immutable
//! envelope config and the elapsed time within the owning grain's current
//! lifecycle state. All elapsed-time state lives in the grain, not here.

pub mod amp;
pub mod dur;
pub mod freq;

pub use amp::AmpEnv;
pub use dur::DurEnv;
pub use freq::FreqEnv;

// -------------------------------------------------------------------------------------------------

/// Inaudibility threshold below which a releasing envelope reports
/// completion (~ -60dB). Release never requires exact float equality to
/// finish.
pub(crate) const SILENCE: f32 = 0.001;

// -------------------------------------------------------------------------------------------------

/// Single evaluation result of an envelope stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeFrame {
    /// The envelope's current scalar value.
    pub value: f32,
    /// True when the current stage has run to completion and the owning
    /// grain should transition to its next lifecycle state.
    pub complete: bool,
}

// -------------------------------------------------------------------------------------------------

/// Normalized progress through a stage of `ticks` length after `elapsed`
/// ticks, following the original engine's convention: the value at the first
/// tick already moved off the start, and the value at the last tick sits
/// exactly on the stage target. Zero-length stages jump to 1.0 immediately.
#[inline]
pub(crate) fn stage_progress(elapsed: u32, ticks: u32) -> f32 {
    if ticks == 0 {
        1.0
    } else {
        ((elapsed + 1) as f32 / ticks as f32).min(1.0)
    }
}

/// Shape a normalized progress value with a power curve. 1.0 is linear,
/// < 1.0 is fast-start, > 1.0 is slow-start.
#[inline]
pub(crate) fn curved_progress(progress: f32, curve: f32) -> f32 {
    debug_assert!(
        (0.0..=1.0).contains(&progress),
        "Progress must be in range [0.0, 1.0]"
    );
    if curve == 1.0 {
        progress
    } else {
        progress.powf(curve)
    }
}

/// A linear ramp from `from` to zero over `ticks`, used for amplitude
/// release stages. Completes when the ramp has run its course or the value
/// dropped below the inaudibility threshold, whichever comes first.
#[inline]
pub(crate) fn release_ramp(elapsed: u32, ticks: u32, from: f32, curve: f32) -> EnvelopeFrame {
    let progress = stage_progress(elapsed, ticks);
    let value = from * (1.0 - curved_progress(progress, curve));
    let complete = progress >= 1.0 || value <= SILENCE;
    EnvelopeFrame { value, complete }
}

// -------------------------------------------------------------------------------------------------
