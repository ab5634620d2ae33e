#![doc = include_str!("../README.md")]

//! # Core Concepts
//!
//! - **`TimezoneId`**: Opaque zone name understood by the remote time service
//! - **`UtcOffset`**: Signed offset from UTC, parsed from `±HH:MM`
//! - **`OffsetSample`**: One authoritative answer: offset, remote instant and the local instant it arrived at
//! - **`OffsetResolver`**: Trait for fetching samples (`HttpOffsetResolver` talks to worldtimeapi.org)
//! - **`ClockEngine`**: Sans-IO state machine that ticks, pauses, resumes and resyncs
//! - **`ClockHandle`**: Tokio driver owning one engine, its timers and its in-flight request
//! - **`ClockSnapshot`**: What the presentation layer renders after every change
//! - **`TimeSource`**: Trait to implement for your local monotonic clock
//! - **`ClockAction`**: Commands that can be sent to control a clock
//!
//! The display is a `chrono::NaiveDateTime` holding the wall-clock reading in
//! the selected zone. The offset is applied once, when a sample becomes an
//! anchor; ticks only add elapsed local time to that anchor.

pub mod command;
pub mod config;
pub mod engine;
pub mod offset;
pub mod resolver;
pub mod runtime;
pub mod sample;
pub mod time;
pub mod types;

pub use command::ClockAction;
pub use config::{ClockConfig, ConfigError};
pub use engine::{ClockEngine, EngineError};
pub use offset::{OffsetParseError, UtcOffset};
pub use resolver::{HttpOffsetResolver, OffsetResolver, ResolveError};
pub use runtime::{ClockHandle, RuntimeError};
pub use sample::{Anchor, InvalidTimezone, OffsetSample, TimezoneId};
pub use time::{TimeDuration, TimeInstant, TimeSource, TokioTimeSource};
pub use types::{
    ClockSnapshot, RequestToken, ResyncOutcome, ResyncRequest, RunMode, SyncHealth, TimerEpoch,
    TimerFired, TimerKind, TimerSchedule,
};
