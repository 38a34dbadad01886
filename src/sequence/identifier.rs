use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Tag between the year and the sequence number.
pub const IDENTIFIER_TAG: &str = "INT";

/// Minimum number of digits for the sequence part. Longer numbers are
/// written out in full.
pub const SEQUENCE_WIDTH: usize = 3;

/// Renders `"<year>-INT-<sequence>"` with the sequence zero-padded to
/// three digits: `(2025, 42)` gives `2025-INT-042`, `(2025, 1000)` gives
/// `2025-INT-1000`.
pub fn format_identifier(year: i32, sequence: u64) -> String {
    format!(
        "{:04}-{}-{:0width$}",
        year,
        IDENTIFIER_TAG,
        sequence,
        width = SEQUENCE_WIDTH
    )
}

/// A certificate identifier split into its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IssuedIdentifier {
    pub year: i32,
    pub sequence: u64,
}

impl IssuedIdentifier {
    pub fn new(year: i32, sequence: u64) -> Self {
        Self { year, sequence }
    }
}

impl fmt::Display for IssuedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_identifier(self.year, self.sequence))
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IdentifierParseError {
    #[error("expected YYYY-INT-NNN, got {0:?}")]
    Malformed(String),

    #[error("sequence must be positive")]
    ZeroSequence,

    #[error("sequence {0:?} is not in canonical form")]
    NonCanonical(String),
}

impl FromStr for IssuedIdentifier {
    type Err = IdentifierParseError;

    /// Accepts only what `format_identifier` produces.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || IdentifierParseError::Malformed(s.to_string());

        let mut parts = s.splitn(3, '-');
        let (year, tag, seq) = match (parts.next(), parts.next(), parts.next()) {
            (Some(y), Some(t), Some(n)) => (y, t, n),
            _ => return Err(malformed()),
        };

        let all_digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
        if tag != IDENTIFIER_TAG || year.len() != 4 || !all_digits(year) || !all_digits(seq) {
            return Err(malformed());
        }
        if seq.len() < SEQUENCE_WIDTH {
            return Err(IdentifierParseError::NonCanonical(seq.to_string()));
        }

        let year: i32 = year.parse().map_err(|_| malformed())?;
        let sequence: u64 = seq.parse().map_err(|_| malformed())?;
        if sequence == 0 {
            return Err(IdentifierParseError::ZeroSequence);
        }
        // 0042 or 01000 would format differently
        if seq.len() > SEQUENCE_WIDTH && seq.starts_with('0') {
            return Err(IdentifierParseError::NonCanonical(seq.to_string()));
        }

        Ok(Self { year, sequence })
    }
}
