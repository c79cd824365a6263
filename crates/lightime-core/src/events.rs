//! Session events and the bus that fans them out.
//!
//! Every committed transition produces one or more [`SessionEvent`]s. The
//! session actor publishes them after the commit; the UI, the session
//! logger and the screen-lock trigger subscribe without the core knowing
//! about them.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::WarningMode;
use crate::session::{SessionOutcome, SessionSnapshot};

/// Why a pause/resume notification was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PauseChange {
    Paused,
    Resumed,
    /// A tolerated gap (suspend, restart) was forgiven and the session
    /// kept running.
    Recovered { gap_secs: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    SessionStarted {
        session: SessionSnapshot,
        at: DateTime<Utc>,
    },
    WarningTriggered {
        session: SessionSnapshot,
        threshold_secs: u64,
        mode: WarningMode,
        at: DateTime<Utc>,
    },
    SessionPausedOrResumed {
        change: PauseChange,
        session: SessionSnapshot,
        at: DateTime<Utc>,
    },
    SessionEnded {
        outcome: SessionOutcome,
        at: DateTime<Utc>,
    },
}

impl SessionEvent {
    pub fn outcome(&self) -> Option<&SessionOutcome> {
        match self {
            SessionEvent::SessionEnded { outcome, .. } => Some(outcome),
            _ => None,
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, SessionEvent::WarningTriggered { .. })
    }
}

/// Fan-out publisher with one unbounded queue per subscriber.
///
/// Publishing never blocks and never drops an event for a live
/// subscriber. Each subscriber sees events in publish order; there is no
/// ordering between subscribers.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<SessionEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. It receives every event published from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber and prune dropped ones.
    /// Returns the number of subscribers reached.
    pub fn publish(&self, event: &SessionEvent) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<SessionEvent>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
