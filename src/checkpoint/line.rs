//! Canonical checkpoint line.
//!
//! ```text
//! {exponent} {bit_min} {bit_max} {num_classes} {version}: {class} {num_factors} {factors} {elapsed_ms} {CRC32:08X}
//! ```
//!
//! The checksum covers everything before its preceding space. `factors` is
//! `0` or a comma-joined list of decimal factors.

use crate::models::{
    validate_version, CheckpointRecord, FactorList, ResumeError, Result, RunParams, NO_FACTORS,
};

/// Longest checkpoint line (without line terminator) a reader accepts.
///
/// This, not `MAX_FACTORS_PER_JOB`, is what bounds a record with many large
/// factors: twenty 29-digit factors alone exceed it.
pub const MAX_LINE_LEN: usize = 599;

/// Separates the free-form version tag from the progress fields.
pub const VERSION_SEPARATOR: &str = ": ";

/// CRC-32 over a line body.
pub fn checksum(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}

/// A canonical line body together with its checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointLine {
    body: String,
    checksum: u32,
}

impl CheckpointLine {
    pub fn from_parts(
        params: &RunParams,
        version: &str,
        current_class: i64,
        num_factors: i32,
        factor_field: &str,
        elapsed_ms: u64,
    ) -> Self {
        let body = format!(
            "{}{version}{VERSION_SEPARATOR}{current_class} {num_factors} {factor_field} {elapsed_ms}",
            params.header()
        );
        let checksum = checksum(body.as_bytes());
        Self { body, checksum }
    }

    /// Render a record, enforcing the line limits.
    pub fn from_record(record: &CheckpointRecord) -> Result<Self> {
        validate_version(&record.version)?;
        let line = Self::from_parts(
            &record.params(),
            &record.version,
            record.current_class,
            record.num_factors,
            &record.factors.to_field(),
            record.elapsed_ms,
        );
        if line.signed().len() > MAX_LINE_LEN {
            return Err(ResumeError::capacity(
                format!("checkpoint line of {} bytes", line.signed().len()),
                MAX_LINE_LEN,
            ));
        }
        Ok(line)
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    /// Body followed by the checksum field.
    pub fn signed(&self) -> String {
        format!("{} {:08X}", self.body, self.checksum)
    }

    /// What goes on disk.
    pub fn to_file_contents(&self) -> String {
        format!("{}\n", self.signed())
    }

    /// Parse and verify checkpoint file content against the expected run.
    ///
    /// Anything after the checksum field (e.g. `\r\n`) is ignored.
    pub fn parse(content: &[u8], expected: &RunParams) -> Result<CheckpointRecord> {
        let header = expected.header();
        if !content.starts_with(header.as_bytes()) {
            return Err(ResumeError::corrupt(format!(
                "does not start with expected \"{header}\""
            )));
        }

        let rest = String::from_utf8_lossy(&content[header.len()..]);
        let sep = rest
            .find(VERSION_SEPARATOR)
            .ok_or_else(|| ResumeError::corrupt("missing version separator"))?;
        let version = &rest[..sep];

        let mut fields = rest[sep + VERSION_SEPARATOR.len()..].split_ascii_whitespace();
        let current_class: i64 = next_field(&mut fields, "current class")?;
        let num_factors: i32 = next_field(&mut fields, "factor count")?;
        let factor_field = fields
            .next()
            .ok_or_else(|| ResumeError::corrupt("missing factor list"))?;
        let elapsed_ms: u64 = next_field(&mut fields, "elapsed time")?;

        let line = Self::from_parts(
            expected,
            version,
            current_class,
            num_factors,
            factor_field,
            elapsed_ms,
        );
        if !content.starts_with(line.signed().as_bytes()) {
            return Err(ResumeError::corrupt(format!(
                "content does not match \"{}\"",
                line.signed()
            )));
        }

        if current_class < 0 || current_class >= i64::from(expected.num_classes) {
            return Err(ResumeError::range(format!(
                "current class {current_class} outside 0..{}",
                expected.num_classes
            )));
        }
        if num_factors < 0 {
            return Err(ResumeError::range(format!(
                "negative factor count {num_factors}"
            )));
        }
        let sentinel_ok = (num_factors == 0 && factor_field == NO_FACTORS)
            || (num_factors >= 1 && factor_field.len() > 1);
        if !sentinel_ok {
            return Err(ResumeError::range(format!(
                "factor count {num_factors} does not fit factor list \"{factor_field}\""
            )));
        }

        let record = CheckpointRecord {
            exponent: expected.exponent,
            bit_min: expected.bit_min,
            bit_max: expected.bit_max,
            num_classes: expected.num_classes,
            version: version.to_string(),
            current_class,
            num_factors,
            factors: FactorList::from_field(factor_field),
            elapsed_ms,
        };

        // only accept what the writer can write back
        record.validate()?;
        validate_version(&record.version).map_err(|e| ResumeError::range(e.to_string()))?;
        Ok(record)
    }
}

fn next_field<'a, T: std::str::FromStr>(
    fields: &mut impl Iterator<Item = &'a str>,
    name: &str,
) -> Result<T> {
    let raw = fields
        .next()
        .ok_or_else(|| ResumeError::corrupt(format!("missing {name}")))?;
    raw.parse()
        .map_err(|_| ResumeError::corrupt(format!("unparseable {name} \"{raw}\"")))
}
