//! Messages understood by the session actor.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::config::TimerConfig;
use crate::error::SessionError;
use crate::repository::SessionStatus;
use crate::session::{SessionOutcome, SessionSnapshot};

/// How the duration of a new session is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartRequest {
    Minutes(u32),
    /// `default_duration_minutes` of the current configuration.
    Default,
    /// Index into `preset_durations` of the current configuration.
    Preset(usize),
}

/// What a command or tick did to the slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum CommandReply {
    /// The session is still Running or Paused.
    Active { session: SessionSnapshot },
    /// This command produced the terminal outcome.
    Ended { outcome: SessionOutcome },
    /// `stop()` found no active session.
    AlreadyStopped,
    /// Nothing to act on.
    Idle,
}

impl CommandReply {
    pub fn outcome(&self) -> Option<&SessionOutcome> {
        match self {
            CommandReply::Ended { outcome } => Some(outcome),
            _ => None,
        }
    }

    pub fn session(&self) -> Option<&SessionSnapshot> {
        match self {
            CommandReply::Active { session } => Some(session),
            _ => None,
        }
    }
}

/// Commands sent to the session actor. Each carries a oneshot channel
/// for the reply; a dropped receiver is ignored.
#[derive(Debug)]
pub enum SessionCommand {
    Start {
        request: StartRequest,
        respond_to: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    Pause {
        respond_to: oneshot::Sender<Result<CommandReply, SessionError>>,
    },
    Resume {
        respond_to: oneshot::Sender<Result<CommandReply, SessionError>>,
    },
    Stop {
        respond_to: oneshot::Sender<Result<CommandReply, SessionError>>,
    },
    /// An OS-level report of time the process did not observe (sleep,
    /// lock screen).
    ReportInterruption {
        gap: Duration,
        respond_to: oneshot::Sender<Result<CommandReply, SessionError>>,
    },
    /// Sent by the scheduler without a reply channel.
    Tick {
        respond_to: Option<oneshot::Sender<Result<CommandReply, SessionError>>>,
    },
    GetState {
        respond_to: oneshot::Sender<SessionStatus>,
    },
    ReloadConfig {
        config: Arc<TimerConfig>,
        respond_to: oneshot::Sender<()>,
    },
    GetConfig {
        respond_to: oneshot::Sender<Arc<TimerConfig>>,
    },
    Shutdown {
        respond_to: oneshot::Sender<()>,
    },
}
