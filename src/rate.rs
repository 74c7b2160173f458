//! Byte rates and the human-friendly rate grammar.
//!
//! A rate is a positive number of bytes per second. It can be written as a
//! plain integer (`"1000"`) or with a binary suffix: `k` multiplies by 1024 and
//! `m` by 1024², case-insensitively (`"5M"`, `"2100k"`). Nothing else is
//! accepted: no whitespace, no fractions, no other units.

use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;
use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;
const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

/// Why a rate value was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidRateKind {
    /// Not digits followed by an optional `k`/`m` suffix.
    #[error("expected digits with an optional k or m suffix")]
    Malformed,
    /// Parsed to zero bytes per second.
    #[error("rate must be greater than zero")]
    Zero,
    /// Does not fit in 64 bits once the suffix is applied.
    #[error("rate does not fit in 64 bits")]
    Overflow,
}

/// A rate value that could not be understood. Carries the offending input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid rate {value:?}: {kind}")]
pub struct InvalidRateError {
    value: String,
    kind: InvalidRateKind,
}

impl InvalidRateError {
    fn new(value: impl Into<String>, kind: InvalidRateKind) -> Self {
        Self { value: value.into(), kind }
    }

    /// The input that was rejected.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Why it was rejected.
    pub fn kind(&self) -> InvalidRateKind {
        self.kind
    }
}

/// Target sustained throughput in bytes per second. Always non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rate(NonZeroU64);

impl Rate {
    /// Rate of `bytes` per second. Fails for zero.
    pub fn bytes_per_second(bytes: u64) -> Result<Self, InvalidRateError> {
        NonZeroU64::new(bytes)
            .map(Rate)
            .ok_or_else(|| InvalidRateError::new(bytes.to_string(), InvalidRateKind::Zero))
    }

    /// Bytes per second as a plain integer.
    pub fn get(self) -> u64 {
        self.0.get()
    }

    /// Largest whole number of bytes this rate allows in `period`, rounded up
    /// and never less than one.
    pub fn bytes_in(self, period: Duration) -> u64 {
        let scaled = u128::from(self.get()) * period.as_nanos();
        let bytes = (scaled + NANOS_PER_SEC - 1) / NANOS_PER_SEC;
        u64::try_from(bytes).unwrap_or(u64::MAX).max(1)
    }

    /// Time needed to move `bytes` at this rate.
    pub fn time_for(self, bytes: u64) -> Duration {
        let nanos = u128::from(bytes) * NANOS_PER_SEC / u128::from(self.get());
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

impl FromStr for Rate {
    type Err = InvalidRateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (digits, multiplier) = match s.as_bytes().last() {
            Some(b'k' | b'K') => (&s[..s.len() - 1], KIB),
            Some(b'm' | b'M') => (&s[..s.len() - 1], MIB),
            _ => (s, 1),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidRateError::new(s, InvalidRateKind::Malformed));
        }
        let bytes = digits
            .parse::<u64>()
            .ok()
            .and_then(|n| n.checked_mul(multiplier))
            .ok_or_else(|| InvalidRateError::new(s, InvalidRateKind::Overflow))?;
        NonZeroU64::new(bytes).map(Rate).ok_or_else(|| InvalidRateError::new(s, InvalidRateKind::Zero))
    }
}

impl TryFrom<u64> for Rate {
    type Error = InvalidRateError;

    fn try_from(bytes: u64) -> Result<Self, Self::Error> {
        Rate::bytes_per_second(bytes)
    }
}

impl TryFrom<&str> for Rate {
    type Error = InvalidRateError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} B/s", self.get())
    }
}
