//! tfresume - Checkpoint persistence and recovery for trial-factoring runs.
//!
//! ## Architecture
//!
//! - **Codec** (`models::Int96`): 96-bit factors to and from decimal text
//! - **Store** (`checkpoint::CheckpointStore`): one small file set per exponent
//!
//! ## Lifecycle
//!
//! Start → `read` (resume or fresh) → `write` every few classes → `delete` when done
//!
//! ## Epistemic Design
//!
//! - K_i (Knowledge): Compile-time enforced limits (factor capacity, line length)
//! - B_i (Beliefs): Checkpoint content is only trusted after header, checksum and range checks
//! - I^R (Resolvable): User-configurable directory, cadence and verbosity
//! - I^B (Bounded): Corrupt primary → quarantine and a single backup retry

pub mod checkpoint;
pub mod models;

// Re-exports for convenience
pub use checkpoint::{CheckpointLine, CheckpointSchedule, CheckpointStore};
pub use models::{
    CheckpointRecord, Config, FactorList, Int96, ResumeError, Result, RunParams,
    MAX_FACTORS_PER_JOB,
};
