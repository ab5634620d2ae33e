//! Time abstraction traits for the local monotonic clock.
//!
//! The engine never reads the system clock directly. It asks a [`TimeSource`]
//! for the current local instant, which lets tests drive time by hand and lets
//! the tokio runtime use its own (pausable) clock.

use core::time::Duration;

/// Trait for abstracting time sources.
pub trait TimeSource<I: TimeInstant> {
    /// Returns the current time instant.
    fn now(&self) -> I;
}

impl<I: TimeInstant, T: TimeSource<I> + ?Sized> TimeSource<I> for &T {
    fn now(&self) -> I {
        (**self).now()
    }
}

impl<I: TimeInstant, T: TimeSource<I> + ?Sized> TimeSource<I> for std::sync::Arc<T> {
    fn now(&self) -> I {
        (**self).now()
    }
}

/// Trait abstraction for duration types.
pub trait TimeDuration: Copy + PartialEq + core::fmt::Debug {
    /// Zero duration constant.
    const ZERO: Self;

    /// Converts duration to milliseconds.
    fn as_millis(&self) -> u64;

    /// Creates duration from milliseconds.
    fn from_millis(millis: u64) -> Self;

    /// Saturating subtraction (returns ZERO on underflow).
    fn saturating_sub(self, other: Self) -> Self;
}

/// Trait abstraction for instant types.
pub trait TimeInstant: Copy + core::fmt::Debug {
    /// Duration type for this instant.
    type Duration: TimeDuration;

    /// Calculates duration since an earlier instant, saturating at zero.
    fn duration_since(&self, earlier: Self) -> Self::Duration;

    /// Adds duration to instant, returns None on overflow.
    fn checked_add(self, duration: Self::Duration) -> Option<Self>;

    /// Subtracts duration from instant, returns None on underflow.
    fn checked_sub(self, duration: Self::Duration) -> Option<Self>;
}

impl TimeDuration for Duration {
    const ZERO: Self = Duration::ZERO;

    fn as_millis(&self) -> u64 {
        u64::try_from(Duration::as_millis(self)).unwrap_or(u64::MAX)
    }

    fn from_millis(millis: u64) -> Self {
        Duration::from_millis(millis)
    }

    fn saturating_sub(self, other: Self) -> Self {
        Duration::saturating_sub(self, other)
    }
}

impl TimeInstant for std::time::Instant {
    type Duration = Duration;

    fn duration_since(&self, earlier: Self) -> Duration {
        self.saturating_duration_since(earlier)
    }

    fn checked_add(self, duration: Duration) -> Option<Self> {
        std::time::Instant::checked_add(&self, duration)
    }

    fn checked_sub(self, duration: Duration) -> Option<Self> {
        std::time::Instant::checked_sub(&self, duration)
    }
}

impl TimeInstant for tokio::time::Instant {
    type Duration = Duration;

    fn duration_since(&self, earlier: Self) -> Duration {
        self.saturating_duration_since(earlier)
    }

    fn checked_add(self, duration: Duration) -> Option<Self> {
        tokio::time::Instant::checked_add(&self, duration)
    }

    fn checked_sub(self, duration: Duration) -> Option<Self> {
        tokio::time::Instant::checked_sub(&self, duration)
    }
}

/// Reads tokio's clock, so paused-time tests and real deployments share one path.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimeSource;

impl TimeSource<tokio::time::Instant> for TokioTimeSource {
    fn now(&self) -> tokio::time::Instant {
        tokio::time::Instant::now()
    }
}
