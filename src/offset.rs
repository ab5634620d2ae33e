//! UTC offsets as reported by the remote time service.

use chrono::TimeDelta;

const MILLIS_PER_MINUTE: i64 = 60 * 1000;

/// A signed offset from UTC, in milliseconds.
///
/// Parsed from the `±HH:MM` wire format. The sign is mandatory and both fields
/// are exactly two digits, so `"+05:30"` and `"-03:00"` are accepted while
/// `"05:30"`, `"+5:30"` and `"Z"` are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtcOffset {
    millis: i64,
}

impl UtcOffset {
    /// UTC itself.
    pub const ZERO: Self = Self { millis: 0 };

    /// Largest accepted magnitude: 23:59.
    pub const MAX_MILLIS: i64 = (23 * 60 + 59) * MILLIS_PER_MINUTE;

    /// Creates an offset from whole minutes east of UTC.
    pub fn from_minutes(minutes: i32) -> Result<Self, OffsetParseError> {
        Self::from_millis(i64::from(minutes) * MILLIS_PER_MINUTE)
    }

    /// Creates an offset from milliseconds east of UTC.
    pub fn from_millis(millis: i64) -> Result<Self, OffsetParseError> {
        if millis.abs() > Self::MAX_MILLIS {
            return Err(OffsetParseError::OutOfRange);
        }
        Ok(Self { millis })
    }

    /// Parses the `±HH:MM` wire format.
    pub fn parse(text: &str) -> Result<Self, OffsetParseError> {
        let bytes = text.as_bytes();
        if bytes.len() != 6 || bytes[3] != b':' {
            return Err(OffsetParseError::Malformed);
        }

        let sign = match bytes[0] {
            b'+' => 1,
            b'-' => -1,
            _ => return Err(OffsetParseError::MissingSign),
        };

        let hours = two_digits(bytes[1], bytes[2])?;
        let minutes = two_digits(bytes[4], bytes[5])?;
        if hours > 23 || minutes > 59 {
            return Err(OffsetParseError::OutOfRange);
        }

        let total = i64::from(hours * 60 + minutes) * MILLIS_PER_MINUTE;
        Ok(Self {
            millis: sign * total,
        })
    }

    /// Signed offset in milliseconds.
    #[inline]
    pub fn as_millis(&self) -> i64 {
        self.millis
    }

    /// Offset as a chrono delta, for shifting UTC instants into local wall time.
    #[inline]
    pub fn to_time_delta(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.millis)
    }
}

fn two_digits(tens: u8, ones: u8) -> Result<u32, OffsetParseError> {
    if !tens.is_ascii_digit() || !ones.is_ascii_digit() {
        return Err(OffsetParseError::Malformed);
    }
    Ok(u32::from(tens - b'0') * 10 + u32::from(ones - b'0'))
}

impl core::str::FromStr for UtcOffset {
    type Err = OffsetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl core::fmt::Display for UtcOffset {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let sign = if self.millis < 0 { '-' } else { '+' };
        let total_minutes = self.millis.abs() / MILLIS_PER_MINUTE;
        write!(
            f,
            "{}{:02}:{:02}",
            sign,
            total_minutes / 60,
            total_minutes % 60
        )
    }
}

/// Reasons a `±HH:MM` offset string is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetParseError {
    /// Not of the shape `±HH:MM`.
    Malformed,

    /// Leading `+` or `-` missing.
    MissingSign,

    /// Hours above 23 or minutes above 59.
    OutOfRange,
}

impl core::fmt::Display for OffsetParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            OffsetParseError::Malformed => write!(f, "offset must have the form ±HH:MM"),
            OffsetParseError::MissingSign => write!(f, "offset must start with '+' or '-'"),
            OffsetParseError::OutOfRange => write!(f, "offset hours or minutes out of range"),
        }
    }
}

impl std::error::Error for OffsetParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positive_half_hour_offset() {
        let offset = UtcOffset::parse("+05:30").unwrap();
        assert_eq!(offset.as_millis(), 19_800_000);
    }

    #[test]
    fn negative_sign_applies_to_minutes_too() {
        let offset = UtcOffset::parse("-03:30").unwrap();
        assert_eq!(offset.as_millis(), -12_600_000);
    }

    #[test]
    fn rejects_unsigned_and_short_forms() {
        assert_eq!(UtcOffset::parse("05:30"), Err(OffsetParseError::Malformed));
        assert_eq!(UtcOffset::parse("+5:30"), Err(OffsetParseError::Malformed));
        assert_eq!(UtcOffset::parse("*05:30"), Err(OffsetParseError::MissingSign));
        assert_eq!(UtcOffset::parse(""), Err(OffsetParseError::Malformed));
        assert_eq!(UtcOffset::parse("Z"), Err(OffsetParseError::Malformed));
    }

    #[test]
    fn rejects_out_of_range_fields() {
        assert_eq!(UtcOffset::parse("+05:60"), Err(OffsetParseError::OutOfRange));
        assert_eq!(UtcOffset::parse("+24:00"), Err(OffsetParseError::OutOfRange));
    }

    #[test]
    fn rejects_non_ascii_without_panicking() {
        assert!(UtcOffset::parse("+0٥:30").is_err());
        assert!(UtcOffset::parse("+05:3x").is_err());
    }

    #[test]
    fn displays_in_wire_format() {
        assert_eq!(UtcOffset::parse("-09:45").unwrap().to_string(), "-09:45");
        assert_eq!(UtcOffset::ZERO.to_string(), "+00:00");
    }
}
