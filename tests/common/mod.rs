//! Shared test infrastructure for zone-clock integration tests

#![allow(dead_code)] // Items used across multiple test files; Rust analyzes per-file

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use tokio::sync::watch;
use zone_clock::{
    ClockSnapshot, OffsetResolver, OffsetSample, ResolveError, TimeDuration, TimeInstant,
    TimeSource, TimezoneId, UtcOffset,
};

// ============================================================================
// Mock Time Types
// ============================================================================

/// Mock duration type for testing (wraps milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TestDuration(pub u64);

impl TimeDuration for TestDuration {
    const ZERO: Self = TestDuration(0);

    fn as_millis(&self) -> u64 {
        self.0
    }

    fn from_millis(millis: u64) -> Self {
        TestDuration(millis)
    }

    fn saturating_sub(self, other: Self) -> Self {
        TestDuration(self.0.saturating_sub(other.0))
    }
}

/// Mock instant type for testing (milliseconds since an arbitrary origin)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TestInstant(pub u64);

impl TimeInstant for TestInstant {
    type Duration = TestDuration;

    fn duration_since(&self, earlier: Self) -> Self::Duration {
        TestDuration(self.0.saturating_sub(earlier.0))
    }

    fn checked_add(self, duration: Self::Duration) -> Option<Self> {
        self.0.checked_add(duration.0).map(TestInstant)
    }

    fn checked_sub(self, duration: Self::Duration) -> Option<Self> {
        self.0.checked_sub(duration.0).map(TestInstant)
    }
}

// ============================================================================
// Mock Time Source
// ============================================================================

/// Mock time source with controllable time advancement
pub struct MockTimeSource {
    current_time: core::cell::Cell<TestInstant>,
}

impl MockTimeSource {
    pub fn new() -> Self {
        Self {
            current_time: core::cell::Cell::new(TestInstant(0)),
        }
    }

    /// Advance time by the given number of milliseconds
    pub fn advance(&self, millis: u64) {
        let current = self.current_time.get();
        self.current_time.set(TestInstant(current.0 + millis));
    }
}

impl TimeSource<TestInstant> for MockTimeSource {
    fn now(&self) -> TestInstant {
        self.current_time.get()
    }
}

// ============================================================================
// Sample helpers
// ============================================================================

pub const NEW_YEAR_UTC: &str = "2024-01-01T00:00:00Z";

pub fn zone(id: &str) -> TimezoneId {
    TimezoneId::new(id).unwrap()
}

pub fn kolkata() -> TimezoneId {
    zone("Asia/Kolkata")
}

pub fn paris() -> TimezoneId {
    zone("Europe/Paris")
}

pub fn utc(text: &str) -> DateTime<Utc> {
    text.parse().unwrap()
}

/// Parses `YYYY-MM-DDTHH:MM:SS[.fff]` as a wall-clock reading
pub fn wall(text: &str) -> NaiveDateTime {
    text.parse().unwrap()
}

/// Builds a sample stamped with the given local instant
pub fn sample_at<I>(timezone: TimezoneId, offset: &str, remote: &str, local: I) -> OffsetSample<I> {
    OffsetSample {
        timezone,
        utc_offset: UtcOffset::parse(offset).unwrap(),
        remote_instant: utc(remote),
        local_instant_at_fetch: local,
    }
}

/// Kolkata at the start of 2024, stamped at the mock clock's current time
pub fn kolkata_sample(timer: &MockTimeSource) -> OffsetSample<TestInstant> {
    sample_at(kolkata(), "+05:30", NEW_YEAR_UTC, timer.now())
}

// ============================================================================
// Scripted resolver (tokio time)
// ============================================================================

/// One scripted answer from [`ScriptedResolver`]
#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer with this offset; the remote instant follows tokio's clock from `NEW_YEAR_UTC`
    Offset(&'static str),
    /// Like `Offset`, but the remote clock runs ahead by this many milliseconds
    Skewed(&'static str, i64),
    /// Fail with this error
    Fail(ResolveError),
    /// Wait, then give the inner reply
    Delayed(Duration, Box<Reply>),
    /// Never answer
    Hang,
}

/// In-memory time service driven by per-zone scripts.
///
/// Each zone's replies are consumed in order; the last one repeats forever.
pub struct ScriptedResolver {
    origin: tokio::time::Instant,
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn script(self, timezone: &str, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(timezone.to_string(), replies.into_iter().collect());
        self
    }

    /// Zones requested so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn next_reply(&self, timezone: &str) -> Reply {
        let mut scripts = self.scripts.lock().unwrap();
        let Some(queue) = scripts.get_mut(timezone) else {
            return Reply::Fail(ResolveError::InvalidResponse(format!(
                "unknown timezone {}",
                timezone
            )));
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or(Reply::Fail(ResolveError::Network("no script".into())))
        }
    }

    fn answer(
        &self,
        timezone: &TimezoneId,
        offset: &str,
        skew_millis: i64,
    ) -> Result<OffsetSample<tokio::time::Instant>, ResolveError> {
        let local = tokio::time::Instant::now();
        let elapsed = local.duration_since(self.origin).as_millis() as i64;
        let remote = utc(NEW_YEAR_UTC) + TimeDelta::milliseconds(elapsed + skew_millis);
        Ok(OffsetSample {
            timezone: timezone.clone(),
            utc_offset: UtcOffset::parse(offset)
                .map_err(|e| ResolveError::InvalidResponse(e.to_string()))?,
            remote_instant: remote,
            local_instant_at_fetch: local,
        })
    }
}

impl OffsetResolver<tokio::time::Instant> for ScriptedResolver {
    async fn fetch_offset(
        &self,
        timezone: &TimezoneId,
    ) -> Result<OffsetSample<tokio::time::Instant>, ResolveError> {
        self.calls.lock().unwrap().push(timezone.to_string());
        let mut reply = self.next_reply(timezone.as_str());

        loop {
            match reply {
                Reply::Offset(offset) => return self.answer(timezone, offset, 0),
                Reply::Skewed(offset, skew) => return self.answer(timezone, offset, skew),
                Reply::Fail(err) => return Err(err),
                Reply::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
                Reply::Hang => core::future::pending::<()>().await,
            }
        }
    }

    async fn list_timezones(&self) -> Result<Vec<TimezoneId>, ResolveError> {
        let mut zones: Vec<TimezoneId> = self
            .scripts
            .lock()
            .unwrap()
            .keys()
            .map(|id| zone(id))
            .collect();
        zones.sort();
        Ok(zones)
    }
}

// ============================================================================
// Snapshot helpers
// ============================================================================

/// Waits until a published snapshot satisfies `predicate`, and returns it
pub async fn wait_for(
    snapshots: &mut watch::Receiver<ClockSnapshot>,
    predicate: impl FnMut(&ClockSnapshot) -> bool,
) -> ClockSnapshot {
    snapshots
        .wait_for(predicate)
        .await
        .expect("clock task stopped")
        .clone()
}
