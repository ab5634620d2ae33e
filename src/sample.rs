//! Timezone identifiers, offset samples and the anchors derived from them.

use crate::offset::UtcOffset;
use crate::time::{TimeDuration, TimeInstant};
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};

/// A zone name as accepted by the remote time service, e.g. `"Asia/Kolkata"`.
///
/// Opaque: equality is exact string match and no zone database is consulted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimezoneId(String);

impl TimezoneId {
    /// Creates an identifier, rejecting empty strings and embedded whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidTimezone> {
        let id = id.into();
        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(InvalidTimezone(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for TimezoneId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl core::str::FromStr for TimezoneId {
    type Err = InvalidTimezone;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for TimezoneId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Rejected timezone identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTimezone(pub String);

impl core::fmt::Display for InvalidTimezone {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "invalid timezone identifier {:?}", self.0)
    }
}

impl std::error::Error for InvalidTimezone {}

/// One successful answer from the remote time service.
///
/// Immutable; the next successful resync supersedes it with a new sample.
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetSample<I> {
    /// Zone the sample was fetched for.
    pub timezone: TimezoneId,

    /// Offset reported for the zone at fetch time.
    pub utc_offset: UtcOffset,

    /// Authoritative instant reported by the service.
    pub remote_instant: DateTime<Utc>,

    /// Local monotonic reading taken right after the response arrived.
    pub local_instant_at_fetch: I,
}

impl<I: TimeInstant> OffsetSample<I> {
    /// Local wall-clock time in the sample's zone at `local_instant_at_fetch`.
    ///
    /// This is the only place the offset is applied.
    pub fn wall_time(&self) -> NaiveDateTime {
        self.remote_instant.naive_utc() + self.utc_offset.to_time_delta()
    }

    /// Anchor for local extrapolation from this sample.
    pub fn anchor(&self) -> Anchor<I> {
        Anchor::new(self.wall_time(), self.local_instant_at_fetch)
    }
}

/// Zero point for local tick extrapolation.
///
/// Pairs a wall-clock reading (offset already applied) with the local
/// monotonic instant it corresponds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor<I> {
    wall: NaiveDateTime,
    local: I,
}

impl<I: TimeInstant> Anchor<I> {
    pub fn new(wall: NaiveDateTime, local: I) -> Self {
        Self { wall, local }
    }

    pub fn wall(&self) -> NaiveDateTime {
        self.wall
    }

    pub fn local(&self) -> I {
        self.local
    }

    /// Wall-clock time at local instant `now`.
    ///
    /// Instants before the anchor extrapolate to the anchor itself.
    pub fn wall_at(&self, now: I) -> NaiveDateTime {
        let elapsed = now.duration_since(self.local).as_millis();
        let elapsed = i64::try_from(elapsed).unwrap_or(i64::MAX);
        self.wall
            .checked_add_signed(TimeDelta::milliseconds(elapsed))
            .unwrap_or(NaiveDateTime::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    fn kolkata_sample(local: std::time::Instant) -> OffsetSample<std::time::Instant> {
        OffsetSample {
            timezone: TimezoneId::new("Asia/Kolkata").unwrap(),
            utc_offset: UtcOffset::parse("+05:30").unwrap(),
            remote_instant: "2024-01-01T00:00:00Z".parse().unwrap(),
            local_instant_at_fetch: local,
        }
    }

    #[test]
    fn timezone_rejects_empty_and_whitespace() {
        assert!(TimezoneId::new("").is_err());
        assert!(TimezoneId::new("Asia/ Kolkata").is_err());
        assert_eq!(
            TimezoneId::new("America/Argentina/Buenos_Aires")
                .unwrap()
                .as_str(),
            "America/Argentina/Buenos_Aires"
        );
    }

    #[test]
    fn wall_time_applies_offset_once() {
        let sample = kolkata_sample(std::time::Instant::now());
        assert_eq!(
            sample.wall_time().to_string(),
            "2024-01-01 05:30:00"
        );
    }

    #[test]
    fn anchor_extrapolates_elapsed_local_time() {
        let start = std::time::Instant::now();
        let anchor = kolkata_sample(start).anchor();
        let later = start + Duration::from_millis(3_250);
        assert_eq!(anchor.wall_at(later).to_string(), "2024-01-01 05:30:03.250");
    }
}
