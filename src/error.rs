use std::{error, fmt};

// -------------------------------------------------------------------------------------------------

/// Provides an enumeration of all possible errors reported by granule.
///
/// Errors are only ever surfaced on the control side, synchronously from the
/// call that caused them. The render path never propagates errors: its worst
/// outcome is a silently dropped, counted spawn request.
#[derive(Debug)]
pub enum Error {
    /// An envelope was configured with out-of-range values (e.g. a sustain
    /// level outside `[0.0, 1.0]`). Rejected at configuration time, before
    /// the config can reach the render path.
    InvalidEnvelopeConfig(String),
    /// A spawn parameter other than an envelope is out of range.
    ParameterError(String),
    /// The bounded request queue towards the render thread is full.
    CapacityExceeded,
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvelopeConfig(str) => write!(f, "Invalid envelope config: {str}"),
            Self::ParameterError(str) => write!(f, "Invalid parameter: {str}"),
            Self::CapacityExceeded => write!(f, "Request queue is full"),
        }
    }
}
