//! Clock engine: the tick/pause/resume/resync state machine.
//!
//! Provides [`ClockEngine`], which turns offset samples into a locally ticking
//! wall-clock display. The engine performs no I/O and owns no real timers. It
//! reads local time through a [`TimeSource`], hands fetches to its driver as
//! [`ResyncRequest`]s, and describes the timers that must exist through an
//! epoch-tagged [`TimerSchedule`]. Every callback carries the token or epoch it
//! was created with, so anything that outlived its state is ignored.

use crate::command::ClockAction;
use crate::config::ClockConfig;
use crate::resolver::ResolveError;
use crate::sample::{Anchor, OffsetSample, TimezoneId};
use crate::time::{TimeDuration, TimeInstant, TimeSource};
use crate::types::{
    ClockSnapshot, RequestToken, ResyncOutcome, ResyncRequest, RunMode, SyncHealth, TimerEpoch,
    TimerFired, TimerKind, TimerSchedule,
};
use chrono::NaiveDateTime;

/// Errors returned by engine operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// Operation called from an invalid state.
    ///
    /// The `expected` field describes which state(s) are valid for this operation.
    InvalidState {
        /// Human-readable description of expected state(s), e.g. "Running" or "Running or Paused"
        expected: &'static str,
        /// The actual current state
        actual: RunMode,
    },
    /// The engine has been disposed.
    Disposed,
}

impl core::fmt::Display for EngineError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            EngineError::InvalidState { expected, actual } => {
                write!(
                    f,
                    "invalid state: expected {}, but clock is {:?}",
                    expected, actual
                )
            }
            EngineError::Disposed => write!(f, "clock has been disposed"),
        }
    }
}

impl std::error::Error for EngineError {}

/// Drives one wall-clock display for one selected timezone.
///
/// # Type Parameters
/// * `I` - Local monotonic instant type
/// * `T` - Time source implementation type
pub struct ClockEngine<I: TimeInstant, T: TimeSource<I>> {
    time_source: T,
    tick_every: I::Duration,
    resync_every: I::Duration,

    run_mode: RunMode,
    sync_health: SyncHealth,
    selected_timezone: Option<TimezoneId>,
    latest_sample: Option<OffsetSample<I>>,
    anchor: Option<Anchor<I>>,
    displayed: Option<NaiveDateTime>,
    frozen_display: Option<NaiveDateTime>,
    pending_resync: Option<RequestToken>,
    schedule: Option<TimerSchedule<I::Duration>>,

    last_token: u64,
    last_epoch: u64,
    disposed: bool,
}

impl<I: TimeInstant, T: TimeSource<I>> ClockEngine<I, T> {
    /// Creates a stopped engine with nothing selected.
    pub fn new(time_source: T, tick_every: I::Duration, resync_every: I::Duration) -> Self {
        Self {
            time_source,
            tick_every,
            resync_every,
            run_mode: RunMode::Stopped,
            sync_health: SyncHealth::Fresh,
            selected_timezone: None,
            latest_sample: None,
            anchor: None,
            displayed: None,
            frozen_display: None,
            pending_resync: None,
            schedule: None,
            last_token: 0,
            last_epoch: 0,
            disposed: false,
        }
    }

    /// Creates a stopped engine using the configured tick and resync cadences.
    pub fn from_config(time_source: T, config: &ClockConfig) -> Self {
        let resync_millis = config.resync_interval_secs.saturating_mul(1000);
        Self::new(
            time_source,
            I::Duration::from_millis(config.tick_interval_ms),
            I::Duration::from_millis(resync_millis),
        )
    }

    /// Handles a clock action by dispatching to the appropriate method.
    ///
    /// # Returns
    /// * `Ok(Some(request))` - The driver must perform this fetch now
    /// * `Ok(None)` - Nothing to fetch
    /// * `Err` - Operation failed (invalid state, disposed)
    pub fn handle_action(
        &mut self,
        action: ClockAction,
    ) -> Result<Option<ResyncRequest>, EngineError> {
        match action {
            ClockAction::SelectTimezone(timezone) => self.select_timezone(timezone).map(Some),
            ClockAction::Pause => self.pause().map(|_| None),
            ClockAction::Resume => self.resume().map(|_| None),
            ClockAction::Toggle => self.toggle().map(|_| None),
            ClockAction::Dispose => {
                self.dispose();
                Ok(None)
            }
        }
    }

    /// Selects a timezone. Can be called from any state.
    ///
    /// Invalidates any pending resync, forgets the previous sample, cancels
    /// the timers and enters `Resolving`. The returned request must be
    /// performed immediately; the clock starts running when its answer
    /// arrives through [`complete_resync`](Self::complete_resync).
    pub fn select_timezone(&mut self, timezone: TimezoneId) -> Result<ResyncRequest, EngineError> {
        self.ensure_live()?;

        let token = self.issue_token();
        self.pending_resync = Some(token);
        self.selected_timezone = Some(timezone.clone());
        self.latest_sample = None;
        self.anchor = None;
        self.displayed = None;
        self.frozen_display = None;
        self.sync_health = SyncHealth::Fresh;
        self.disarm();
        self.run_mode = RunMode::Resolving;

        tracing::debug!(%timezone, token = token.get(), "timezone selected");
        Ok(ResyncRequest { token, timezone })
    }

    /// Freezes the display at exactly the value currently shown.
    ///
    /// Must be called from `Running` state. Cancels both timers and drops any
    /// resync in flight.
    pub fn pause(&mut self) -> Result<(), EngineError> {
        self.ensure_live()?;
        self.require(RunMode::Running, "Running")?;

        let frozen = self.current_display();
        self.frozen_display = frozen;
        self.displayed = frozen;
        self.pending_resync = None;
        self.disarm();
        self.run_mode = RunMode::Paused;

        tracing::debug!(frozen = ?frozen, "clock paused");
        Ok(())
    }

    /// Resumes ticking from the frozen display.
    ///
    /// Must be called from `Paused` state. Re-anchors the frozen value at the
    /// current local instant, so the display continues without a jump, and
    /// re-arms the timers. No resync is issued until the next scheduled one.
    pub fn resume(&mut self) -> Result<(), EngineError> {
        self.ensure_live()?;
        self.require(RunMode::Paused, "Paused")?;

        let Some(frozen) = self.frozen_display.take() else {
            return Err(EngineError::InvalidState {
                expected: "Paused with a frozen display",
                actual: self.run_mode,
            });
        };

        let now = self.time_source.now();
        self.anchor = Some(Anchor::new(frozen, now));
        self.displayed = Some(frozen);
        self.arm();
        self.run_mode = RunMode::Running;

        tracing::debug!(%frozen, "clock resumed");
        Ok(())
    }

    /// Pauses when running, resumes when paused.
    pub fn toggle(&mut self) -> Result<(), EngineError> {
        self.ensure_live()?;
        match self.run_mode {
            RunMode::Running => self.pause(),
            RunMode::Paused => self.resume(),
            actual => Err(EngineError::InvalidState {
                expected: "Running or Paused",
                actual,
            }),
        }
    }

    /// Advances the display to the current local time.
    ///
    /// Must be called from `Running` state. The value is always derived from
    /// the anchor, never from the previous display, so ticks cannot accumulate
    /// drift.
    pub fn tick(&mut self) -> Result<NaiveDateTime, EngineError> {
        self.ensure_live()?;
        self.require(RunMode::Running, "Running")?;

        let anchor = self.anchor.ok_or(EngineError::InvalidState {
            expected: "Running with an anchor",
            actual: self.run_mode,
        })?;
        let shown = anchor.wall_at(self.time_source.now());
        self.displayed = Some(shown);

        tracing::trace!(display = %shown, "tick");
        Ok(shown)
    }

    /// Starts a periodic resync.
    ///
    /// Must be called from `Running` state. Returns `Ok(None)` while another
    /// request is still in flight.
    pub fn request_resync(&mut self) -> Result<Option<ResyncRequest>, EngineError> {
        self.ensure_live()?;
        self.require(RunMode::Running, "Running")?;

        if self.pending_resync.is_some() {
            tracing::debug!("resync already in flight, skipping");
            return Ok(None);
        }

        let Some(timezone) = self.selected_timezone.clone() else {
            return Ok(None);
        };

        let token = self.issue_token();
        self.pending_resync = Some(token);
        Ok(Some(ResyncRequest { token, timezone }))
    }

    /// Delivers a timer firing captured under `epoch`.
    ///
    /// Firings from cancelled timers are skipped without touching state.
    pub fn on_timer(&mut self, kind: TimerKind, epoch: TimerEpoch) -> TimerFired {
        if self.disposed || self.schedule.map(|s| s.epoch) != Some(epoch) {
            tracing::trace!(?kind, epoch = epoch.get(), "ignoring firing from cancelled timer");
            return TimerFired::Skipped;
        }

        match kind {
            TimerKind::Tick => self.tick().map_or(TimerFired::Skipped, TimerFired::Ticked),
            TimerKind::Resync => match self.request_resync() {
                Ok(Some(request)) => TimerFired::ResyncDue(request),
                _ => TimerFired::Skipped,
            },
        }
    }

    /// Delivers the answer to the request identified by `token`.
    ///
    /// Answers to anything but the pending request are discarded without any
    /// state change. Successful answers snap the anchor to the new sample.
    pub fn complete_resync(
        &mut self,
        token: RequestToken,
        result: Result<OffsetSample<I>, ResolveError>,
    ) -> ResyncOutcome {
        if self.disposed || self.pending_resync != Some(token) {
            tracing::debug!(token = token.get(), "discarding stale resync answer");
            return ResyncOutcome::Discarded;
        }

        match result {
            Ok(sample) => self.apply_sample(token, sample),
            Err(err) => self.apply_failure(token, err),
        }
    }

    fn apply_sample(&mut self, token: RequestToken, sample: OffsetSample<I>) -> ResyncOutcome {
        if self.selected_timezone.as_ref() != Some(&sample.timezone) {
            let reason = format!("answer for {} instead of the selected zone", sample.timezone);
            return self.apply_failure(token, ResolveError::InvalidResponse(reason));
        }

        let now = self.time_source.now();
        let anchor = sample.anchor();

        let outcome = match self.run_mode {
            RunMode::Resolving => {
                self.displayed = Some(anchor.wall_at(now));
                self.arm();
                self.run_mode = RunMode::Running;
                tracing::debug!(
                    timezone = %sample.timezone,
                    offset = %sample.utc_offset,
                    "first sample applied, clock running"
                );
                ResyncOutcome::Started
            }
            RunMode::Running => {
                let before = self.current_display_at(now);
                let after = anchor.wall_at(now);
                let correction_millis = before
                    .map(|before| (after - before).num_milliseconds())
                    .unwrap_or(0);
                tracing::debug!(
                    timezone = %sample.timezone,
                    correction_millis,
                    "resync applied"
                );
                ResyncOutcome::Corrected { correction_millis }
            }
            RunMode::Stopped | RunMode::Paused => {
                tracing::debug!(token = token.get(), "sample arrived outside a running clock");
                return ResyncOutcome::Discarded;
            }
        };

        self.pending_resync = None;
        self.anchor = Some(anchor);
        self.latest_sample = Some(sample);
        self.sync_health = SyncHealth::Fresh;
        outcome
    }

    fn apply_failure(&mut self, token: RequestToken, err: ResolveError) -> ResyncOutcome {
        match self.run_mode {
            RunMode::Resolving => {
                self.pending_resync = None;
                self.run_mode = RunMode::Stopped;
                self.sync_health = SyncHealth::ResolveFailed;
                tracing::warn!(
                    timezone = ?self.selected_timezone,
                    error = %err,
                    "initial resolve failed"
                );
                ResyncOutcome::ResolveFailed(err)
            }
            RunMode::Running => {
                self.pending_resync = None;
                self.sync_health = SyncHealth::Stale;
                tracing::warn!(
                    timezone = ?self.selected_timezone,
                    error = %err,
                    "resync failed, extrapolating from last sample"
                );
                ResyncOutcome::Stale(err)
            }
            RunMode::Stopped | RunMode::Paused => {
                tracing::debug!(token = token.get(), "failure arrived outside a running clock");
                ResyncOutcome::Discarded
            }
        }
    }

    /// Tears the engine down. Idempotent and valid from any state.
    ///
    /// Every later operation fails with [`EngineError::Disposed`], and every
    /// later timer firing or resync answer is ignored.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }

        self.disposed = true;
        self.pending_resync = None;
        self.disarm();
        self.selected_timezone = None;
        self.latest_sample = None;
        self.anchor = None;
        self.displayed = None;
        self.frozen_display = None;
        self.sync_health = SyncHealth::Fresh;
        self.run_mode = RunMode::Stopped;

        tracing::debug!("clock disposed");
    }

    /// Returns what the presentation layer should show.
    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            timezone: self.selected_timezone.clone(),
            display: self.displayed,
            run_mode: self.run_mode,
            sync_health: self.sync_health,
        }
    }

    /// Returns the current run mode.
    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    pub fn sync_health(&self) -> SyncHealth {
        self.sync_health
    }

    pub fn selected_timezone(&self) -> Option<&TimezoneId> {
        self.selected_timezone.as_ref()
    }

    pub fn latest_sample(&self) -> Option<&OffsetSample<I>> {
        self.latest_sample.as_ref()
    }

    /// Returns the last published display value.
    pub fn display(&self) -> Option<NaiveDateTime> {
        self.displayed
    }

    pub fn frozen_display(&self) -> Option<NaiveDateTime> {
        self.frozen_display
    }

    pub fn pending_resync(&self) -> Option<RequestToken> {
        self.pending_resync
    }

    /// Timers that must be armed right now, if any.
    pub fn schedule(&self) -> Option<TimerSchedule<I::Duration>> {
        self.schedule
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn current_display(&self) -> Option<NaiveDateTime> {
        self.displayed
            .or_else(|| self.current_display_at(self.time_source.now()))
    }

    fn current_display_at(&self, now: I) -> Option<NaiveDateTime> {
        self.anchor.map(|anchor| anchor.wall_at(now))
    }

    fn issue_token(&mut self) -> RequestToken {
        self.last_token += 1;
        RequestToken(self.last_token)
    }

    fn arm(&mut self) {
        self.last_epoch += 1;
        self.schedule = Some(TimerSchedule {
            epoch: TimerEpoch(self.last_epoch),
            tick_every: self.tick_every,
            resync_every: self.resync_every,
        });
    }

    fn disarm(&mut self) {
        self.schedule = None;
    }

    fn ensure_live(&self) -> Result<(), EngineError> {
        if self.disposed {
            return Err(EngineError::Disposed);
        }
        Ok(())
    }

    fn require(&self, expected_mode: RunMode, expected: &'static str) -> Result<(), EngineError> {
        if self.run_mode != expected_mode {
            return Err(EngineError::InvalidState {
                expected,
                actual: self.run_mode,
            });
        }
        Ok(())
    }
}
