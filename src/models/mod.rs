//! Core data models for tfresume.
//!
//! Epistemic mapping:
//! - K_i (Knowledge): Fixed-width integers and bounded factor lists
//! - B_i (Beliefs): Wrapped in Result/Option
//! - I^R (Resolvable): Config parameters
//! - I^B (Bounded): Error variants with fallback strategies

mod config;
mod error;
mod int96;
mod record;

pub use config::*;
pub use error::*;
pub use int96::*;
pub use record::*;
