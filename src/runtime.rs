//! Tokio driver for a [`ClockEngine`].
//!
//! One task owns the engine, its two interval timers and the resolver call in
//! flight. Commands, timer firings and resolver answers all arrive at that
//! task through a single `select!`, so engine operations never interleave.
//! After every event the task reconciles its timers with the engine's
//! [`TimerSchedule`] epoch and publishes a fresh [`ClockSnapshot`] on a watch
//! channel.

use crate::command::ClockAction;
use crate::config::ClockConfig;
use crate::engine::{ClockEngine, EngineError};
use crate::resolver::{OffsetResolver, ResolveError};
use crate::sample::{OffsetSample, TimezoneId};
use crate::time::TokioTimeSource;
use crate::types::{
    ClockSnapshot, RequestToken, ResyncOutcome, ResyncRequest, TimerEpoch, TimerFired, TimerKind,
    TimerSchedule,
};
use core::time::Duration;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

const COMMAND_QUEUE_DEPTH: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("clock runtime has shut down")]
    Closed,
}

struct Command {
    action: ClockAction,
    reply: oneshot::Sender<Result<(), EngineError>>,
}

struct Completion {
    token: RequestToken,
    result: Result<OffsetSample<Instant>, ResolveError>,
}

/// Resolver call in flight. Dropping it aborts the call.
struct InFlight {
    token: RequestToken,
    task: JoinHandle<()>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct ArmedTimer {
    epoch: TimerEpoch,
    interval: Interval,
}

impl ArmedTimer {
    /// First firing one full period from now.
    fn new(epoch: TimerEpoch, period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { epoch, interval }
    }
}

async fn next_firing(timer: &mut Option<ArmedTimer>) -> TimerEpoch {
    match timer {
        Some(timer) => {
            timer.interval.tick().await;
            timer.epoch
        }
        None => core::future::pending().await,
    }
}

/// Presentation-facing handle to a running clock.
///
/// Dropping the handle shuts the clock down, releasing its timers and any
/// request in flight.
pub struct ClockHandle<R> {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<ClockSnapshot>,
    resolver: Arc<R>,
}

impl<R> ClockHandle<R>
where
    R: OffsetResolver<Instant>,
{
    /// Spawns a clock task on the current tokio runtime.
    pub fn spawn(config: &ClockConfig, resolver: R) -> Self {
        let resolver = Arc::new(resolver);
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (snapshots_tx, snapshots_rx) = watch::channel(ClockSnapshot::stopped());

        let task = ClockTask {
            engine: ClockEngine::from_config(TokioTimeSource, config),
            resolver: Arc::clone(&resolver),
            request_timeout: config.request_timeout(),
            commands: commands_rx,
            completions_tx,
            completions_rx,
            in_flight: None,
            tick_timer: None,
            resync_timer: None,
            snapshots: snapshots_tx,
        };
        tokio::spawn(task.run());

        Self {
            commands: commands_tx,
            snapshots: snapshots_rx,
            resolver,
        }
    }

    pub async fn select_timezone(&self, timezone: TimezoneId) -> Result<(), RuntimeError> {
        self.send(ClockAction::SelectTimezone(timezone)).await
    }

    pub async fn pause(&self) -> Result<(), RuntimeError> {
        self.send(ClockAction::Pause).await
    }

    pub async fn resume(&self) -> Result<(), RuntimeError> {
        self.send(ClockAction::Resume).await
    }

    pub async fn toggle(&self) -> Result<(), RuntimeError> {
        self.send(ClockAction::Toggle).await
    }

    /// Shuts the clock down and waits for its task to finish.
    ///
    /// Idempotent: disposing an already disposed clock succeeds.
    pub async fn dispose(&self) -> Result<(), RuntimeError> {
        match self.send(ClockAction::Dispose).await {
            Ok(()) | Err(RuntimeError::Closed) => {}
            Err(err) => return Err(err),
        }
        self.commands.closed().await;
        Ok(())
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ClockSnapshot> {
        self.snapshots.clone()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> ClockSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Zones the time service accepts. Does not touch clock state.
    pub async fn list_timezones(&self) -> Result<Vec<TimezoneId>, RuntimeError> {
        Ok(self.resolver.list_timezones().await?)
    }

    async fn send(&self, action: ClockAction) -> Result<(), RuntimeError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command { action, reply })
            .await
            .map_err(|_| RuntimeError::Closed)?;
        response.await.map_err(|_| RuntimeError::Closed)??;
        Ok(())
    }
}

struct ClockTask<R> {
    engine: ClockEngine<Instant, TokioTimeSource>,
    resolver: Arc<R>,
    request_timeout: Duration,
    commands: mpsc::Receiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    in_flight: Option<InFlight>,
    tick_timer: Option<ArmedTimer>,
    resync_timer: Option<ArmedTimer>,
    snapshots: watch::Sender<ClockSnapshot>,
}

impl<R> ClockTask<R>
where
    R: OffsetResolver<Instant>,
{
    async fn run(mut self) {
        tracing::debug!("clock task started");

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(completion) = self.completions_rx.recv() => {
                    self.handle_completion(completion);
                }
                epoch = next_firing(&mut self.tick_timer) => {
                    self.handle_timer(TimerKind::Tick, epoch);
                }
                epoch = next_firing(&mut self.resync_timer) => {
                    self.handle_timer(TimerKind::Resync, epoch);
                }
            }

            if self.engine.is_disposed() {
                break;
            }
        }

        self.shutdown();
        tracing::debug!("clock task stopped");
    }

    fn handle_command(&mut self, command: Command) {
        let result = match self.engine.handle_action(command.action) {
            Ok(Some(request)) => {
                self.start_fetch(request);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => Err(err),
        };

        self.settle();
        // The caller may have given up waiting.
        let _ = command.reply.send(result);
    }

    fn handle_completion(&mut self, completion: Completion) {
        match self.engine.complete_resync(completion.token, completion.result) {
            ResyncOutcome::Corrected { correction_millis } if correction_millis.abs() >= 1000 => {
                tracing::info!(correction_millis, "clock corrected by resync");
            }
            ResyncOutcome::Discarded => {
                tracing::trace!(token = completion.token.get(), "stale answer discarded");
            }
            _ => {}
        }
        self.settle();
    }

    fn handle_timer(&mut self, kind: TimerKind, epoch: TimerEpoch) {
        if let TimerFired::ResyncDue(request) = self.engine.on_timer(kind, epoch) {
            self.start_fetch(request);
        }
        self.settle();
    }

    fn start_fetch(&mut self, request: ResyncRequest) {
        let ResyncRequest { token, timezone } = request;
        let resolver = Arc::clone(&self.resolver);
        let completions = self.completions_tx.clone();
        let timeout = self.request_timeout;

        let task = tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, resolver.fetch_offset(&timezone)).await
            {
                Ok(result) => result,
                Err(_) => Err(ResolveError::Network(format!(
                    "request for {} timed out after {:?}",
                    timezone, timeout
                ))),
            };
            // The clock task may already be gone.
            let _ = completions.send(Completion { token, result });
        });

        // Replacing the previous call aborts it.
        self.in_flight = Some(InFlight { token, task });
    }

    /// Brings timers and the in-flight call in line with the engine, then publishes.
    fn settle(&mut self) {
        let schedule = self.engine.schedule();
        let armed = self.tick_timer.as_ref().map(|timer| timer.epoch);
        if schedule.map(|s| s.epoch) != armed {
            self.rearm(schedule);
        }

        let pending = self.engine.pending_resync();
        if self.in_flight.as_ref().map(|call| call.token) != pending {
            self.in_flight = None;
        }

        let snapshot = self.engine.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }

    fn rearm(&mut self, schedule: Option<TimerSchedule<Duration>>) {
        self.tick_timer = None;
        self.resync_timer = None;

        if let Some(schedule) = schedule {
            tracing::trace!(epoch = schedule.epoch.get(), "arming timers");
            self.tick_timer = Some(ArmedTimer::new(schedule.epoch, schedule.tick_every));
            self.resync_timer = Some(ArmedTimer::new(schedule.epoch, schedule.resync_every));
        }
    }

    fn shutdown(&mut self) {
        self.engine.dispose();
        self.tick_timer = None;
        self.resync_timer = None;
        self.in_flight = None;
        self.snapshots.send_replace(self.engine.snapshot());
    }
}
