//! Progress record types persisted by the checkpoint store.
//!
//! K_i: A record is scoped to one exact run configuration (`RunParams`).

use super::{Int96, ResumeError, Result};
use serde::{Serialize, Serializer};

/// Most factors a single job keeps in its checkpoint.
///
/// A full list only fits `MAX_LINE_LEN` when the factors are short: 20
/// factors near 2^96 (29 digits each) need about 600 bytes on their own, and
/// the writer refuses such a line.
pub const MAX_FACTORS_PER_JOB: usize = 20;

/// Sentinel factor field for "no factors found".
pub const NO_FACTORS: &str = "0";

/// Parameters identifying one run: a checkpoint only applies when all four match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunParams {
    pub exponent: u32,
    pub bit_min: i32,
    pub bit_max: i32,
    pub num_classes: u32,
}

impl RunParams {
    pub fn new(exponent: u32, bit_min: i32, bit_max: i32, num_classes: u32) -> Self {
        Self {
            exponent,
            bit_min,
            bit_max,
            num_classes,
        }
    }

    /// Leading bytes every checkpoint for this run starts with.
    pub fn header(&self) -> String {
        format!(
            "{} {} {} {} ",
            self.exponent, self.bit_min, self.bit_max, self.num_classes
        )
    }
}

/// Fixed-capacity, ordered list of discovered factors.
///
/// Zero marks an empty slot. Occupied slots always form a prefix, so two
/// lists holding the same factors in the same order compare equal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FactorList {
    slots: [Int96; MAX_FACTORS_PER_JOB],
}

impl FactorList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a raw slot array as the engine keeps it; zero slots are dropped.
    pub fn from_slots(slots: &[Int96; MAX_FACTORS_PER_JOB]) -> Self {
        let mut list = Self::new();
        for (dst, src) in list.slots.iter_mut().zip(slots.iter().filter(|f| !f.is_zero())) {
            *dst = *src;
        }
        list
    }

    /// Parse a serialized factor field (`"0"` or comma-joined decimals).
    ///
    /// Tokens past the capacity are ignored; empty tokens and tokens that
    /// decode to zero are skipped, so occupied slots stay a prefix.
    pub fn from_field(field: &str) -> Self {
        let mut list = Self::new();
        let tokens = field
            .split(',')
            .filter(|t| !t.is_empty())
            .map(Int96::decode)
            .filter(|f| !f.is_zero());
        for (dst, factor) in list.slots.iter_mut().zip(tokens) {
            *dst = factor;
        }
        list
    }

    /// Append a factor.
    pub fn push(&mut self, factor: Int96) -> Result<()> {
        if factor.is_zero() {
            return Err(ResumeError::range("zero is not a valid factor"));
        }
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.is_zero())
            .ok_or_else(|| ResumeError::capacity("factor list", MAX_FACTORS_PER_JOB))?;
        *slot = factor;
        Ok(())
    }

    /// Non-empty slots in order.
    pub fn iter(&self) -> impl Iterator<Item = Int96> + '_ {
        self.slots.iter().copied().filter(|f| !f.is_zero())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots[0].is_zero()
    }

    pub fn is_full(&self) -> bool {
        !self.slots[MAX_FACTORS_PER_JOB - 1].is_zero()
    }

    pub fn slots(&self) -> &[Int96; MAX_FACTORS_PER_JOB] {
        &self.slots
    }

    /// Serialized form: `"0"` when empty, otherwise decimals joined by commas.
    pub fn to_field(&self) -> String {
        if self.is_empty() {
            return NO_FACTORS.to_string();
        }
        self.iter().map(Int96::encode).collect::<Vec<_>>().join(",")
    }
}

impl Serialize for FactorList {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// Progress of one run at one bit level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckpointRecord {
    pub exponent: u32,
    pub bit_min: i32,
    pub bit_max: i32,
    pub num_classes: u32,
    /// Informational tag of the writing program, never validated
    pub version: String,
    /// Last completed class, -1 before the first one
    pub current_class: i64,
    /// Factors found so far (may exceed what `factors` can hold)
    pub num_factors: i32,
    pub factors: FactorList,
    /// Milliseconds spent at the current bit level
    pub elapsed_ms: u64,
}

impl CheckpointRecord {
    /// Create a not-yet-started record for a run.
    pub fn new(params: RunParams, version: impl Into<String>) -> Self {
        Self {
            exponent: params.exponent,
            bit_min: params.bit_min,
            bit_max: params.bit_max,
            num_classes: params.num_classes,
            version: version.into(),
            current_class: -1,
            num_factors: 0,
            factors: FactorList::new(),
            elapsed_ms: 0,
        }
    }

    pub fn params(&self) -> RunParams {
        RunParams::new(self.exponent, self.bit_min, self.bit_max, self.num_classes)
    }

    /// Count a newly found factor and keep it if there is room.
    ///
    /// Returns whether the factor was stored.
    pub fn record_factor(&mut self, factor: Int96) -> Result<bool> {
        if factor.is_zero() {
            return Err(ResumeError::range("zero is not a valid factor"));
        }
        self.num_factors = self.num_factors.saturating_add(1);
        if self.factors.is_full() {
            return Ok(false);
        }
        self.factors.push(factor)?;
        Ok(true)
    }

    /// Check the invariants a reader will enforce.
    pub fn validate(&self) -> Result<()> {
        if self.current_class < 0 || self.current_class >= i64::from(self.num_classes) {
            return Err(ResumeError::range(format!(
                "current class {} outside 0..{}",
                self.current_class, self.num_classes
            )));
        }
        if self.num_factors < 0 {
            return Err(ResumeError::range(format!(
                "negative factor count {}",
                self.num_factors
            )));
        }
        if (self.num_factors == 0) != self.factors.is_empty() {
            return Err(ResumeError::range(format!(
                "factor count {} disagrees with {} stored factors",
                self.num_factors,
                self.factors.len()
            )));
        }
        if self.num_factors > 0 && self.factors.to_field().len() < 2 {
            return Err(ResumeError::range(format!(
                "factor field \"{}\" is indistinguishable from the no-factor sentinel",
                self.factors.to_field()
            )));
        }
        Ok(())
    }
}
