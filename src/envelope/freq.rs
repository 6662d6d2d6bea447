//! Frequency envelope: per-stage playback-rate targets with linear,
//! value-continuous ramps.

use crate::Error;

// -------------------------------------------------------------------------------------------------

/// Frequency envelope config for a grain, expressed as playback-rate
/// multipliers (1.0 = the source material's natural rate).
///
/// Each lifecycle stage ramps **linearly** from the previous stage's end
/// value to its own target: attack ramps `attack_rate`→`decay_rate`, decay
/// ramps `decay_rate`→`sustain_rate`, sustain holds `sustain_rate`, release
/// ramps from the rate at release time to `release_rate`. Adjacent stages
/// are therefore value-continuous by construction, which keeps the grain's
/// play-position advance free of audible discontinuities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreqEnv {
    attack_rate: f32,
    decay_rate: f32,
    sustain_rate: f32,
    release_rate: f32,
}

impl FreqEnv {
    /// Create a new frequency envelope from four per-stage rate targets.
    ///
    /// All rates must be finite and > 0.0.
    pub fn new(
        attack_rate: f32,
        decay_rate: f32,
        sustain_rate: f32,
        release_rate: f32,
    ) -> Result<Self, Error> {
        for (name, rate) in [
            ("attack", attack_rate),
            ("decay", decay_rate),
            ("sustain", sustain_rate),
            ("release", release_rate),
        ] {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(Error::InvalidEnvelopeConfig(format!(
                    "Invalid {name} rate: {rate}. Must be finite and > 0.0"
                )));
            }
        }
        Ok(Self {
            attack_rate,
            decay_rate,
            sustain_rate,
            release_rate,
        })
    }

    /// A flat envelope holding one rate through all stages.
    pub fn constant(rate: f32) -> Self {
        Self {
            attack_rate: rate,
            decay_rate: rate,
            sustain_rate: rate,
            release_rate: rate,
        }
    }

    /// The rate the attack stage starts from.
    pub fn attack_rate(&self) -> f32 {
        self.attack_rate
    }
    /// The rate reached at the end of the attack stage.
    pub fn decay_rate(&self) -> f32 {
        self.decay_rate
    }
    /// The rate held during sustain.
    pub fn sustain_rate(&self) -> f32 {
        self.sustain_rate
    }
    /// The rate reached at the end of the release stage.
    pub fn release_rate(&self) -> f32 {
        self.release_rate
    }

    /// Rate during attack at normalized stage `progress` in `[0.0, 1.0]`.
    #[inline]
    pub fn attack(&self, progress: f32) -> f32 {
        lerp(self.attack_rate, self.decay_rate, progress)
    }

    /// Rate during decay at normalized stage `progress`.
    #[inline]
    pub fn decay(&self, progress: f32) -> f32 {
        lerp(self.decay_rate, self.sustain_rate, progress)
    }

    /// Rate during sustain.
    #[inline]
    pub fn sustain(&self) -> f32 {
        self.sustain_rate
    }

    /// Rate during release at normalized stage `progress`, ramping from the
    /// rate captured when release was triggered.
    #[inline]
    pub fn release(&self, progress: f32, from_rate: f32) -> f32 {
        lerp(from_rate, self.release_rate, progress)
    }
}

impl Default for FreqEnv {
    fn default() -> Self {
        Self::constant(1.0)
    }
}

#[inline]
fn lerp(from: f32, to: f32, progress: f32) -> f32 {
    debug_assert!(
        (0.0..=1.0).contains(&progress),
        "Progress must be in range [0.0, 1.0]"
    );
    from + (to - from) * progress
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_config() {
        assert!(FreqEnv::new(1.0, 1.0, 0.0, 1.0).is_err());
        assert!(FreqEnv::new(-1.0, 1.0, 1.0, 1.0).is_err());
        assert!(FreqEnv::new(1.0, f32::INFINITY, 1.0, 1.0).is_err());
        assert!(FreqEnv::new(2.0, 1.5, 1.0, 0.5).is_ok());
    }

    #[test]
    fn stages_are_value_continuous() {
        let env = FreqEnv::new(2.0, 1.5, 1.0, 0.5).unwrap();
        // the end of each stage equals the start of the next
        assert_eq!(env.attack(1.0), env.decay(0.0));
        assert_eq!(env.decay(1.0), env.sustain());
        assert_eq!(env.release(0.0, env.sustain()), env.sustain());
        assert_eq!(env.release(1.0, env.sustain()), 0.5);
    }

    #[test]
    fn constant_envelope_never_moves() {
        let env = FreqEnv::constant(1.25);
        for progress in [0.0, 0.3, 1.0] {
            assert_eq!(env.attack(progress), 1.25);
            assert_eq!(env.decay(progress), 1.25);
            assert_eq!(env.release(progress, 1.25), 1.25);
        }
    }
}
