#![doc = include_str!("../README.md")]

// -------------------------------------------------------------------------------------------------

pub mod envelope;

mod error;
mod grain;
mod scheduler;
mod source;

// -------------------------------------------------------------------------------------------------

// export the public API into the crate root

pub use error::Error;
pub use grain::{
    list::{GrainId, GrainList, GrainNode},
    Grain, GrainOutput, GrainState,
};
pub use scheduler::{GrainControl, GrainScheduler, GrainStatusEvent, SpawnParams};
pub use source::GrainSource;
