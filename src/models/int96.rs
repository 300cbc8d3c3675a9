//! Fixed-width 96-bit unsigned integer and its decimal codec.
//!
//! Epistemic foundation:
//! - K_i: Every trial factor fits in 96 bits (three 32-bit words)
//! - K_i: Base conversion only needs 32-bit words with 64-bit intermediates
//! - B_i: Decimal tokens may carry stray characters → skipped, never rejected
//! - I^B: Input above 2^96-1 → silently truncated to the low 96 bits

use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Decimal digits of the largest 96-bit value (2^96-1 has 29).
pub const MAX_DECIMAL_DIGITS: usize = 29;

/// Unsigned 96-bit integer stored as three 32-bit words.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Int96 {
    /// Least significant word
    pub lo: u32,
    /// Middle word
    pub mid: u32,
    /// Most significant word
    pub hi: u32,
}

impl Int96 {
    pub const ZERO: Self = Self::new(0, 0, 0);
    pub const MAX: Self = Self::new(u32::MAX, u32::MAX, u32::MAX);

    pub const fn new(lo: u32, mid: u32, hi: u32) -> Self {
        Self { lo, mid, hi }
    }

    pub const fn is_zero(&self) -> bool {
        self.lo == 0 && self.mid == 0 && self.hi == 0
    }

    /// Build from three 24-bit limbs (72-bit kernel layout).
    pub fn from_limbs24(d0: u32, d1: u32, d2: u32) -> Self {
        Self {
            lo: (d1 << 24).wrapping_add(d0),
            mid: (d2 << 16).wrapping_add(d1 >> 8),
            hi: d2 >> 16,
        }
    }

    /// Build from three 30-bit limbs (90-bit kernel layout).
    pub fn from_limbs30(d0: u32, d1: u32, d2: u32) -> Self {
        Self {
            lo: (d1 << 30).wrapping_add(d0),
            mid: (d2 << 28).wrapping_add(d1 >> 2),
            hi: d2 >> 4,
        }
    }

    /// Keep the low 96 bits of `value`.
    pub fn from_u128_wrapping(value: u128) -> Self {
        Self {
            lo: value as u32,
            mid: (value >> 32) as u32,
            hi: (value >> 64) as u32,
        }
    }

    /// Canonical base-10 rendering, no leading zeros.
    ///
    /// Each round divides the value by 10 word by word, most significant
    /// first, carrying `remainder << 32` into the next lower word. The last
    /// remainder of a round is the next decimal digit.
    pub fn encode(self) -> String {
        let mut digits = [0u8; MAX_DECIMAL_DIGITS];
        let mut count = 0;
        let Self {
            mut lo,
            mut mid,
            mut hi,
        } = self;

        while lo != 0 || mid != 0 || hi != 0 {
            let mut carry = u64::from(hi % 10);
            hi /= 10;

            let tmp = u64::from(mid) + (carry << 32);
            carry = tmp % 10;
            mid = (tmp / 10) as u32;

            let tmp = u64::from(lo) + (carry << 32);
            carry = tmp % 10;
            lo = (tmp / 10) as u32;

            digits[count] = b'0' + carry as u8;
            count += 1;
        }

        if count == 0 {
            return "0".to_string();
        }
        digits[..count].iter().rev().map(|&d| char::from(d)).collect()
    }

    /// Parse a decimal token.
    ///
    /// Leading zeros and non-digit characters are skipped. There is no
    /// overflow check: anything past 96 bits wraps.
    pub fn decode(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut start = 0;
        while start + 1 < bytes.len() && bytes[start] == b'0' {
            start += 1;
        }

        let mut result = Self::ZERO;
        for &byte in &bytes[start..] {
            if !byte.is_ascii_digit() {
                continue;
            }
            let digit = u64::from(byte - b'0');

            let mut carry = u64::from(result.lo) * 10 + digit;
            result.lo = carry as u32;
            carry >>= 32;

            carry += u64::from(result.mid) * 10;
            result.mid = carry as u32;
            carry >>= 32;

            carry += u64::from(result.hi) * 10;
            result.hi = carry as u32;
        }
        result
    }
}

impl From<Int96> for u128 {
    fn from(value: Int96) -> Self {
        u128::from(value.lo) | (u128::from(value.mid) << 32) | (u128::from(value.hi) << 64)
    }
}

impl From<u64> for Int96 {
    fn from(value: u64) -> Self {
        Self::new(value as u32, (value >> 32) as u32, 0)
    }
}

impl Ord for Int96 {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.hi, self.mid, self.lo).cmp(&(other.hi, other.mid, other.lo))
    }
}

impl PartialOrd for Int96 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Int96 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl Serialize for Int96 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
