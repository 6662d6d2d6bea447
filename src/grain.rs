//! A single grain: one short, enveloped fragment of source material.

use crate::{
    envelope::{release_ramp, stage_progress, AmpEnv, DurEnv, EnvelopeFrame, FreqEnv},
    source::GrainSource,
};

pub mod list;

// -------------------------------------------------------------------------------------------------

/// Lifecycle state of a [`Grain`].
///
/// `Ready` is both the initial and the terminal state: a ready grain
/// produces silence and its slot is eligible for reuse. Any other state
/// counts towards the scheduler's active-voice budget.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::EnumString,
    strum::Display,
    strum::VariantNames,
    strum::FromRepr,
)]
#[repr(u8)]
pub enum GrainState {
    #[default]
    Ready = 0,
    Attack = 1,
    Decay = 2,
    Sustain = 3,
    Release = 4,
}

// -------------------------------------------------------------------------------------------------

/// Single tick processing result of a [`Grain`].
#[derive(Debug, Clone, Copy)]
pub struct GrainOutput {
    /// The enveloped mono sample, with the grain's gain already applied.
    pub sample: f32,
    /// The grain's stereo panning position (-1.0 left .. 1.0 right).
    pub panning: f32,
}

// -------------------------------------------------------------------------------------------------

/// One grain instance: its lifecycle state, elapsed-tick counters, play
/// position into shared source material, and the three envelopes that shape
/// it.
///
/// A grain owns its envelopes exclusively and never touches state outside of
/// itself; grains are advanced one tick at a time by the scheduler and
/// report their return to [`GrainState::Ready`] through their state.
///
/// State machine: `Ready → Attack → Decay → Sustain → Release → Ready`.
/// The transition into `Release` is triggered by the duration envelope's
/// auto-expiry or by an explicit release signal, whichever comes first;
/// entering `Release` twice is a no-op.
#[derive(Debug, Clone, Default)]
pub struct Grain {
    state: GrainState,
    /// Ticks spent in the current lifecycle state.
    ticks_in_state: u32,
    /// Ticks since the grain was started, across all states.
    total_ticks: u32,
    /// Normalized play position into the source material.
    position: f64,
    source: Option<GrainSource>,
    freq_env: FreqEnv,
    amp_env: AmpEnv,
    dur_env: DurEnv,
    gain: f32,
    panning: f32,
    /// Envelope level captured when release was triggered; release ramps
    /// from here to zero.
    release_level: f32,
    /// Playback rate captured when release was triggered.
    release_from_rate: f32,
    /// When set, release uses the short fixed de-click ramp instead of the
    /// amplitude envelope's release stage.
    fast_stop: bool,
    current_amplitude: f32,
    current_rate: f32,
}

impl Grain {
    /// Length of the forced release ramp used by [`Grain::fast_release`].
    /// A force-stopped grain still fades over this many ticks; there is no
    /// instantaneous kill that would click.
    pub const FAST_RELEASE_TICKS: u32 = 32;

    /// Create a new idle grain.
    pub fn new() -> Self {
        Self::default()
    }

    /// The grain's current lifecycle state.
    #[inline]
    pub fn state(&self) -> GrainState {
        self.state
    }

    /// Is this grain idle and eligible for reuse?
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state == GrainState::Ready
    }

    /// Current amplitude envelope value, for telemetry/UI meters.
    #[inline]
    pub fn amplitude(&self) -> f32 {
        self.current_amplitude
    }

    /// Current playback rate, for telemetry/UI meters.
    #[inline]
    pub fn rate(&self) -> f32 {
        self.current_rate
    }

    /// Start the grain: transition `Ready → Attack` with the given source
    /// material, envelopes and mix parameters. `onset_offset` is the
    /// normalized start position within the source.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        &mut self,
        source: GrainSource,
        onset_offset: f32,
        freq_env: FreqEnv,
        amp_env: AmpEnv,
        dur_env: DurEnv,
        gain: f32,
        panning: f32,
    ) {
        debug_assert!(self.is_ready(), "Only idle grains can be started");
        self.position = (onset_offset as f64).rem_euclid(1.0);
        self.current_rate = freq_env.attack_rate();
        self.source = Some(source);
        self.freq_env = freq_env;
        self.amp_env = amp_env;
        self.dur_env = dur_env;
        self.gain = gain;
        self.panning = panning;
        self.release_level = 0.0;
        self.release_from_rate = freq_env.attack_rate();
        self.fast_stop = false;
        self.current_amplitude = 0.0;
        self.ticks_in_state = 0;
        self.total_ticks = 0;
        self.state = GrainState::Attack;
    }

    /// Trigger the release stage. A no-op on idle or already releasing
    /// grains, so racing release triggers never double-transition.
    pub fn release(&mut self) {
        self.enter_release(false);
    }

    /// Force-stop the grain: enters release with a short fixed ramp of
    /// [`Self::FAST_RELEASE_TICKS`] ticks. Upgrades an already running
    /// release to the fast ramp; no-op on idle grains.
    pub fn fast_release(&mut self) {
        self.enter_release(true);
    }

    fn enter_release(&mut self, fast: bool) {
        match self.state {
            GrainState::Ready => {}
            GrainState::Release => {
                if fast && !self.fast_stop {
                    self.fast_stop = true;
                    self.release_level = self.current_amplitude;
                    self.release_from_rate = self.current_rate;
                    self.ticks_in_state = 0;
                }
            }
            _ => {
                self.fast_stop = fast;
                self.release_level = self.current_amplitude;
                self.release_from_rate = self.current_rate;
                self.ticks_in_state = 0;
                self.state = GrainState::Release;
            }
        }
    }

    /// Consume one tick: evaluate the envelopes for the current state,
    /// produce one output sample from the source material, advance the play
    /// position by the frequency-envelope-derived rate, and perform state
    /// transitions signaled by the envelopes.
    ///
    /// Idle grains return silence and change nothing.
    pub fn advance(&mut self) -> GrainOutput {
        if self.state == GrainState::Ready {
            return GrainOutput {
                sample: 0.0,
                panning: self.panning,
            };
        }
        if self.source.is_none() {
            return GrainOutput {
                sample: 0.0,
                panning: self.panning,
            };
        }

        // Duration auto-expiry, checked up front so the release ramp starts
        // on this tick. Harmless if an explicit release already won.
        if self.dur_env.expired(self.total_ticks) {
            self.enter_release(false);
        }

        let elapsed = self.ticks_in_state;
        let (amp_frame, rate) = match self.state {
            GrainState::Attack => {
                let progress = stage_progress(elapsed, self.amp_env.attack_ticks());
                (self.amp_env.attack(elapsed), self.freq_env.attack(progress))
            }
            GrainState::Decay => {
                let progress = stage_progress(elapsed, self.amp_env.decay_ticks());
                (self.amp_env.decay(elapsed), self.freq_env.decay(progress))
            }
            GrainState::Sustain => (
                EnvelopeFrame {
                    value: self.amp_env.sustain(),
                    complete: false,
                },
                self.freq_env.sustain(),
            ),
            GrainState::Release => {
                let (frame, ticks) = if self.fast_stop {
                    (
                        release_ramp(elapsed, Self::FAST_RELEASE_TICKS, self.release_level, 1.0),
                        Self::FAST_RELEASE_TICKS,
                    )
                } else {
                    (
                        self.amp_env.release(elapsed, self.release_level),
                        self.amp_env.release_ticks(),
                    )
                };
                let progress = stage_progress(elapsed, ticks);
                (frame, self.freq_env.release(progress, self.release_from_rate))
            }
            GrainState::Ready => unreachable!(),
        };

        let source = self.source.as_ref().expect("checked above");
        let sample = source.sample_at(self.position) * amp_frame.value * self.gain;
        self.position = (self.position + source.base_increment() * rate as f64).rem_euclid(1.0);
        self.current_amplitude = amp_frame.value;
        self.current_rate = rate;
        self.ticks_in_state += 1;
        self.total_ticks = self.total_ticks.saturating_add(1);

        if amp_frame.complete {
            match self.state {
                GrainState::Attack => {
                    self.ticks_in_state = 0;
                    self.state = GrainState::Decay;
                }
                GrainState::Decay => {
                    self.ticks_in_state = 0;
                    self.state = GrainState::Sustain;
                }
                GrainState::Release => self.reset(),
                _ => {}
            }
        }

        GrainOutput {
            sample,
            panning: self.panning,
        }
    }

    /// Return to `Ready` and drop the source reference.
    fn reset(&mut self) {
        self.state = GrainState::Ready;
        self.ticks_in_state = 0;
        self.total_ticks = 0;
        self.current_amplitude = 0.0;
        self.current_rate = 0.0;
        self.fast_stop = false;
        self.source = None;
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_source() -> GrainSource {
        GrainSource::from_frames(vec![0.5; 64]).unwrap()
    }

    fn started_grain(amp_env: AmpEnv, dur_env: DurEnv) -> Grain {
        let mut grain = Grain::new();
        grain.start(
            test_source(),
            0.0,
            FreqEnv::constant(1.0),
            amp_env,
            dur_env,
            1.0,
            0.0,
        );
        grain
    }

    #[test]
    fn full_lifecycle_traversal() {
        let amp = AmpEnv::new(10, 10, 0.5, 10).unwrap();
        let mut grain = started_grain(amp, DurEnv::sustained());
        assert_eq!(grain.state(), GrainState::Attack);

        for _ in 0..10 {
            grain.advance();
        }
        assert_eq!(grain.state(), GrainState::Decay);
        assert!((grain.amplitude() - 1.0).abs() < 1e-6);

        for _ in 0..10 {
            grain.advance();
        }
        assert_eq!(grain.state(), GrainState::Sustain);
        assert!((grain.amplitude() - 0.5).abs() < 1e-6);

        // sustain holds indefinitely without a release
        for _ in 0..1000 {
            grain.advance();
        }
        assert_eq!(grain.state(), GrainState::Sustain);

        grain.release();
        assert_eq!(grain.state(), GrainState::Release);
        for _ in 0..10 {
            grain.advance();
        }
        assert!(grain.is_ready());
        assert_eq!(grain.amplitude(), 0.0);
    }

    #[test]
    fn amplitude_stays_normalized_through_all_states() {
        let amp = AmpEnv::with_curve(7, 5, 0.8, 9, 2.0).unwrap();
        let mut grain = started_grain(amp, DurEnv::ticks(30));
        while !grain.is_ready() {
            grain.advance();
            let value = grain.amplitude();
            assert!((0.0..=1.0).contains(&value), "amplitude out of range: {value}");
        }
    }

    #[test]
    fn duration_envelope_auto_releases() {
        // 50 ticks lifetime, no explicit release: auto-transitions to
        // Release at tick 50 and is back to Ready by tick 50 + release time
        let amp = AmpEnv::new(10, 10, 0.5, 10).unwrap();
        let mut grain = started_grain(amp, DurEnv::ticks(50));
        for _ in 0..50 {
            grain.advance();
        }
        assert_eq!(grain.state(), GrainState::Sustain);
        grain.advance();
        assert_eq!(grain.state(), GrainState::Release);
        for _ in 0..10 {
            grain.advance();
        }
        assert!(grain.is_ready());
    }

    #[test]
    fn duration_expiry_interrupts_earlier_states() {
        // lifetime shorter than the attack stage: release starts mid-attack
        let amp = AmpEnv::new(100, 10, 0.5, 10).unwrap();
        let mut grain = started_grain(amp, DurEnv::ticks(20));
        for _ in 0..21 {
            grain.advance();
        }
        assert_eq!(grain.state(), GrainState::Release);
    }

    #[test]
    fn release_mid_decay_skips_sustain() {
        let amp = AmpEnv::new(10, 10, 0.5, 10).unwrap();
        let mut grain = started_grain(amp, DurEnv::sustained());
        for _ in 0..15 {
            grain.advance();
        }
        assert_eq!(grain.state(), GrainState::Decay);
        let level_at_release = grain.amplitude();
        assert!(level_at_release > 0.5 && level_at_release < 1.0);

        grain.release();
        assert_eq!(grain.state(), GrainState::Release);
        // the release ramp starts from the captured decay level
        grain.advance();
        assert!(grain.amplitude() < level_at_release);
        for _ in 0..10 {
            grain.advance();
        }
        assert!(grain.is_ready());
    }

    #[test]
    fn double_release_is_a_noop() {
        let amp = AmpEnv::new(10, 10, 0.5, 20).unwrap();
        let mut grain = started_grain(amp, DurEnv::sustained());
        for _ in 0..25 {
            grain.advance();
        }
        grain.release();
        for _ in 0..5 {
            grain.advance();
        }
        let level = grain.amplitude();
        // releasing again must not restart the ramp
        grain.release();
        grain.advance();
        assert!(grain.amplitude() < level);
        // releasing an idle grain is also a no-op
        let mut idle = Grain::new();
        idle.release();
        assert!(idle.is_ready());
    }

    #[test]
    fn fast_release_ramps_over_minimum_ticks() {
        let amp = AmpEnv::new(1, 1, 1.0, 10_000).unwrap();
        let mut grain = started_grain(amp, DurEnv::sustained());
        for _ in 0..10 {
            grain.advance();
        }
        grain.fast_release();
        // not instantaneous: still audible right after the force-stop
        grain.advance();
        assert!(grain.amplitude() > 0.0);
        for _ in 0..Grain::FAST_RELEASE_TICKS {
            grain.advance();
        }
        assert!(grain.is_ready());
    }

    #[test]
    fn idle_grain_produces_silence() {
        let mut grain = Grain::new();
        let out = grain.advance();
        assert_eq!(out.sample, 0.0);
        assert!(grain.is_ready());
    }

    #[test]
    fn gain_scales_output() {
        let amp = AmpEnv::new(0, 0, 1.0, 1).unwrap();
        let mut grain = Grain::new();
        grain.start(
            test_source(),
            0.0,
            FreqEnv::constant(1.0),
            amp,
            DurEnv::sustained(),
            0.5,
            0.0,
        );
        // skip attack/decay jumps, sample during sustain at full envelope
        grain.advance();
        grain.advance();
        let out = grain.advance();
        assert!((out.sample - 0.5 * 0.5).abs() < 1e-6);
    }
}
