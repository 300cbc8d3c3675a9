//! Checkpoint module for resumable trial-factoring runs.
//!
//! Provides:
//! - `CheckpointLine`: Canonical single-line format with CRC-32 trailer
//! - `CheckpointStore`: Staged writes, backup rotation and recovery on read
//! - `CheckpointSchedule`: When the engine should take the next checkpoint

mod line;
mod schedule;
mod store;

pub use line::*;
pub use schedule::*;
pub use store::*;
