//! # Lightime Core Library
//!
//! Session core of the Lightime focus timer: one focus session at a time,
//! ticked from a monotonic clock, with a one-time warning before the end
//! and crash recovery through a single checkpoint slot.
//!
//! ## Architecture
//!
//! - **Session machine**: a pure state machine driven by clock deltas
//!   (`Stopped -> Running <-> Paused -> Completed | Stopped`)
//! - **Repository**: the single active-session slot plus checkpoint/restore
//! - **Service**: an actor task that serializes commands and ticks, a tick
//!   scheduler, and a checkpoint writer
//! - **Events**: a fan-out bus the UI and loggers subscribe to
//! - **Config**: validated TOML configuration with hot reload
//!
//! ## Key Components
//!
//! - [`spawn_session_service`]: start the service and restore any saved session
//! - [`SessionHandle`]: command API (`start`, `pause`, `resume`, `stop`, ...)
//! - [`SessionEvent`]: what subscribers receive
//! - [`TimerConfig`]: configuration value object

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod repository;
pub mod service;
pub mod session;
pub mod storage;

pub use clock::{Clock, ManualClock, MonoMillis, SystemClock, Timestamp};
pub use config::{ConfigWatcher, TimerConfig, WarningMode};
pub use error::{CheckpointError, ClockError, ConfigError, CoreError, SessionError};
pub use events::{EventBus, PauseChange, SessionEvent};
pub use repository::{
    Checkpoint, CheckpointStore, MemoryCheckpointStore, RestoreReport, SessionRepository,
    SessionStatus, SqliteCheckpointStore, StopResult,
};
pub use service::{
    spawn_session_service, spawn_session_service_with, CommandReply, SessionHandle,
    SessionService, TickMode,
};
pub use session::{
    CompletionStatus, Session, SessionId, SessionOutcome, SessionSettings, SessionSnapshot,
    SessionState,
};
