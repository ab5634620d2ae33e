//! Core types shared by the engine, the runtime and the presentation layer.

use crate::resolver::ResolveError;
use crate::sample::TimezoneId;
use chrono::NaiveDateTime;

/// Run mode of a clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunMode {
    /// Nothing selected, or the last selection failed to resolve. No time displayed.
    Stopped,

    /// A timezone is selected and its first sample is in flight. No time displayed yet.
    Resolving,

    /// Ticking locally and resyncing periodically.
    Running,

    /// Display frozen. No ticking, no resyncing.
    Paused,
}

/// How much the displayed time can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SyncHealth {
    /// The last resync attempt succeeded (or none has failed yet).
    #[default]
    Fresh,

    /// The last resync failed; time is extrapolated from an older sample.
    Stale,

    /// The first fetch for the current selection failed; nothing to display.
    ResolveFailed,
}

/// Identifies one resync request so late answers can be recognised and dropped.
///
/// Tokens are issued in strictly increasing order over an engine's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestToken(pub(crate) u64);

impl RequestToken {
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Identifies one armed pair of tick/resync timers.
///
/// Firings carrying an older epoch belong to timers that were cancelled and
/// must be ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerEpoch(pub(crate) u64);

impl TimerEpoch {
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Which of the two periodic timers fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Tick,
    Resync,
}

/// Timers the driver must keep armed. Present exactly while the clock is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSchedule<D> {
    pub epoch: TimerEpoch,
    pub tick_every: D,
    pub resync_every: D,
}

/// A fetch the driver must perform on the engine's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResyncRequest {
    pub token: RequestToken,
    pub timezone: TimezoneId,
}

/// Result of delivering a timer firing to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerFired {
    /// The display advanced to this value.
    Ticked(NaiveDateTime),

    /// A resync is due; the driver must perform this request.
    ResyncDue(ResyncRequest),

    /// Stale epoch, or a resync is already in flight. Nothing changed.
    Skipped,
}

/// Result of delivering a resolver answer to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResyncOutcome {
    /// First sample for the selection arrived; the clock is now running.
    Started,

    /// The anchor snapped to a fresh sample.
    ///
    /// `correction_millis` is how far the new anchor moved the display at the
    /// moment of application (positive means the clock jumped forward).
    Corrected { correction_millis: i64 },

    /// A periodic resync failed. Ticking continues from the previous sample.
    Stale(ResolveError),

    /// The first fetch for the selection failed.
    ResolveFailed(ResolveError),

    /// The answer no longer matches the pending request and was dropped.
    Discarded,
}

/// What the presentation layer sees after every state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockSnapshot {
    pub timezone: Option<TimezoneId>,
    pub display: Option<NaiveDateTime>,
    pub run_mode: RunMode,
    pub sync_health: SyncHealth,
}

impl ClockSnapshot {
    /// Snapshot of a clock with nothing selected.
    pub const fn stopped() -> Self {
        Self {
            timezone: None,
            display: None,
            run_mode: RunMode::Stopped,
            sync_health: SyncHealth::Fresh,
        }
    }

    /// Display formatted as `HH:MM:SS`, or `None` while there is nothing to show.
    pub fn display_text(&self) -> Option<String> {
        self.display
            .map(|display| display.format("%H:%M:%S").to_string())
    }
}

impl Default for ClockSnapshot {
    fn default() -> Self {
        Self::stopped()
    }
}
