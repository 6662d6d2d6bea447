//! Shared, read-only source material that grains read their samples from.

use std::sync::Arc;

use crate::Error;

// -------------------------------------------------------------------------------------------------

/// Read-only mono sample material, cheaply shared between any number of
/// grains. Grains never mutate the material; no locking is needed.
///
/// Positions are normalized to `[0.0, 1.0)` and sampled with 4-point cubic
/// (Catmull-Rom) interpolation. Out-of-range positions **wrap** around the
/// material rather than clamping or faulting, so a grain's play position can
/// advance freely past either end.
#[derive(Debug, Clone)]
pub struct GrainSource {
    frames: Arc<Box<[f32]>>,
}

impl GrainSource {
    /// Create source material from an already shared sample buffer.
    ///
    /// The buffer must not be empty.
    pub fn new(frames: Arc<Box<[f32]>>) -> Result<Self, Error> {
        if frames.is_empty() {
            return Err(Error::ParameterError(
                "Source material must not be empty".to_string(),
            ));
        }
        Ok(Self { frames })
    }

    /// Create source material from a plain frame vec.
    pub fn from_frames(frames: Vec<f32>) -> Result<Self, Error> {
        Self::new(Arc::new(frames.into_boxed_slice()))
    }

    /// Number of sample frames in the material.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false: empty material is rejected at construction.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Per-tick play-position increment which traverses the whole material
    /// in `len` ticks at rate 1.0.
    #[inline]
    pub(crate) fn base_increment(&self) -> f64 {
        1.0 / self.frames.len() as f64
    }

    /// Sample the material at a normalized position using Catmull-Rom cubic
    /// interpolation. The position and all interpolation taps wrap around
    /// the ends of the buffer.
    #[inline]
    pub fn sample_at(&self, normalized_pos: f64) -> f32 {
        let len = self.frames.len();
        let max_index = len - 1;

        let pos = normalized_pos.rem_euclid(1.0);
        let float_index = pos * max_index as f64;
        let index = (float_index as usize).min(max_index);
        let fraction = (float_index - index as f64) as f32;

        // 4-point taps, wrapping at the buffer ends
        let i1 = index;
        let i2 = if i1 < max_index { i1 + 1 } else { 0 };
        let i0 = if i1 > 0 { i1 - 1 } else { max_index };
        let i3 = if i2 < max_index { i2 + 1 } else { 0 };

        let y0 = self.frames[i0];
        let y1 = self.frames[i1];
        let y2 = self.frames[i2];
        let y3 = self.frames[i3];

        // Catmull-Rom
        let a = -0.5 * y0 + 1.5 * y1 - 1.5 * y2 + 0.5 * y3;
        let b = y0 - 2.5 * y1 + 2.0 * y2 - 0.5 * y3;
        let c = -0.5 * y0 + 0.5 * y2;
        let d = y1;

        a * fraction * fraction * fraction + b * fraction * fraction + c * fraction + d
    }
}

// -------------------------------------------------------------------------------------------------
