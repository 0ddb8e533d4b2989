use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// PostgreSQL Log Sequence Number: a monotonically increasing position in
/// the write-ahead log.
///
/// Events are acknowledged back to the replication slot by LSN, so this
/// is the token that ties an emitted output to the slot's confirmed
/// position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Lsn(pub u64);

impl Lsn {
    pub const ZERO: Lsn = Lsn(0);

    #[inline]
    pub fn new(val: u64) -> Self {
        Self(val)
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }

    /// Parse from PostgreSQL's `X/Y` hex format (e.g. `0/16B3740`).
    pub fn from_pg_str(s: &str) -> Result<Self, LsnParseError> {
        let invalid = || LsnParseError(s.to_string());
        let (hi, lo) = s.trim().split_once('/').ok_or_else(invalid)?;
        let hi = u32::from_str_radix(hi, 16).map_err(|_| invalid())?;
        let lo = u32::from_str_radix(lo, 16).map_err(|_| invalid())?;
        Ok(Self(((hi as u64) << 32) | lo as u64))
    }

    /// Format as PostgreSQL's `X/Y` hex format.
    pub fn to_pg_string(self) -> String {
        format!("{:X}/{:X}", (self.0 >> 32) as u32, self.0 as u32)
    }

    /// Returns true if this LSN is ahead of `other`.
    #[inline]
    pub fn is_ahead_of(self, other: Lsn) -> bool {
        self.0 > other.0
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_pg_string())
    }
}

impl FromStr for Lsn {
    type Err = LsnParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_pg_str(s)
    }
}

impl From<u64> for Lsn {
    #[inline]
    fn from(val: u64) -> Self {
        Self(val)
    }
}

impl From<Lsn> for u64 {
    #[inline]
    fn from(lsn: Lsn) -> Self {
        lsn.0
    }
}

/// Error returned when an LSN string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid LSN format: '{0}'")]
pub struct LsnParseError(pub String);
