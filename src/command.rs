//! Command-based control for clocks.

use crate::sample::TimezoneId;

/// Actions the presentation layer can issue against a clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClockAction {
    /// Switch to a timezone and resolve it.
    SelectTimezone(TimezoneId),
    /// Freeze the display.
    Pause,
    /// Continue from the frozen display.
    Resume,
    /// Pause when running, resume when paused.
    Toggle,
    /// Tear the clock down.
    Dispose,
}
