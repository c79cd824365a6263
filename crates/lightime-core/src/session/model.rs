use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::MonoMillis;
use crate::config::{TimerConfig, WarningMode};

pub const MIN_DURATION_MINUTES: u32 = 1;
pub const MAX_DURATION_MINUTES: u32 = 240;

/// Opaque session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Stopped,
    Running,
    Paused,
    Completed,
}

impl SessionState {
    /// Running or Paused.
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Running | SessionState::Paused)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Completed,
    ManuallyStopped,
    Invalidated,
}

/// Configuration values captured when a session starts.
///
/// A configuration reload never touches these for an in-flight session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub warning_threshold_secs: u64,
    pub resume_threshold_secs: u64,
    pub tick_interval_ms: u64,
    pub warning_mode: WarningMode,
}

impl SessionSettings {
    pub fn warning_threshold(&self) -> Duration {
        Duration::from_secs(self.warning_threshold_secs)
    }

    pub fn resume_threshold(&self) -> Duration {
        Duration::from_secs(self.resume_threshold_secs)
    }

    /// Largest tick delta still treated as ordinary scheduling jitter.
    pub fn tick_tolerance(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.saturating_mul(2))
    }
}

impl From<&TimerConfig> for SessionSettings {
    fn from(config: &TimerConfig) -> Self {
        Self {
            warning_threshold_secs: u64::from(config.warning_threshold_seconds),
            resume_threshold_secs: u64::from(config.resume_threshold_seconds),
            tick_interval_ms: config.tick_interval_ms,
            warning_mode: config.warning_mode,
        }
    }
}

/// The active session. Mutated only through the transition methods in
/// `machine.rs`, which the session actor serializes.
#[derive(Debug, Clone)]
pub struct Session {
    pub(crate) id: SessionId,
    pub(crate) planned_secs: u64,
    pub(crate) remaining_ms: u64,
    pub(crate) state: SessionState,
    pub(crate) warning_fired: bool,
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) paused_at: Option<DateTime<Utc>>,
    /// Monotonic twin of `paused_at`; absent after a restore.
    pub(crate) paused_mono: Option<MonoMillis>,
    pub(crate) completed_at: Option<DateTime<Utc>>,
    pub(crate) last_tick_at: MonoMillis,
    pub(crate) last_tick_wall: DateTime<Utc>,
    pub(crate) interruption_ms: u64,
    pub(crate) interruption_count: u32,
    pub(crate) settings: SessionSettings,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn planned_secs(&self) -> u64 {
        self.planned_secs
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    /// Whole seconds left, rounded up so a display never shows 0 early.
    pub fn remaining_secs(&self) -> u64 {
        self.remaining_ms.div_ceil(1000)
    }

    pub fn warning_fired(&self) -> bool {
        self.warning_fired
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// 0.0 .. 100.0 progress through the planned duration.
    pub fn progress_pct(&self) -> f64 {
        let total_ms = self.planned_secs.saturating_mul(1000);
        if total_ms == 0 {
            return 0.0;
        }
        let done = total_ms.saturating_sub(self.remaining_ms) as f64;
        (done / total_ms as f64 * 100.0).min(100.0)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            state: self.state,
            planned_secs: self.planned_secs,
            remaining_ms: self.remaining_ms,
            remaining_secs: self.remaining_secs(),
            warning_fired: self.warning_fired,
            started_at: self.started_at,
            paused_at: self.paused_at,
            completed_at: self.completed_at,
            interruption_secs: self.interruption_ms / 1000,
            progress_pct: self.progress_pct(),
        }
    }

    pub(crate) fn outcome(&self, status: CompletionStatus, ended_at: DateTime<Utc>) -> SessionOutcome {
        let remaining_secs = self.remaining_secs().min(self.planned_secs);
        SessionOutcome {
            id: self.id,
            planned_secs: self.planned_secs,
            actual_focused_secs: self.planned_secs - remaining_secs,
            status,
            warning_fired: self.warning_fired,
            interruption_secs: self.interruption_ms / 1000,
            total_interruption_secs: self.interruption_ms / 1000,
            interruption_count: self.interruption_count,
            started_at: self.started_at,
            ended_at,
        }
    }
}

/// Read-only view of a session carried on events and status queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub state: SessionState,
    pub planned_secs: u64,
    pub remaining_ms: u64,
    pub remaining_secs: u64,
    pub warning_fired: bool,
    pub started_at: DateTime<Utc>,
    pub paused_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub interruption_secs: u64,
    pub progress_pct: f64,
}

/// Terminal record of how a session ended. Emitted exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub id: SessionId,
    pub planned_secs: u64,
    pub actual_focused_secs: u64,
    pub status: CompletionStatus,
    pub warning_fired: bool,
    /// For an Invalidated session, the gap that invalidated it; otherwise
    /// the tolerated gap time.
    pub interruption_secs: u64,
    /// Every gap charged to the session, the invalidating one included.
    pub total_interruption_secs: u64,
    pub interruption_count: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl SessionOutcome {
    /// Terminal state the session ended in.
    pub fn final_state(&self) -> SessionState {
        match self.status {
            CompletionStatus::Completed => SessionState::Completed,
            CompletionStatus::ManuallyStopped | CompletionStatus::Invalidated => {
                SessionState::Stopped
            }
        }
    }
}
