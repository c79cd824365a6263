//! One-shot warning threshold detection.

use std::time::Duration;

use super::model::{Session, SessionState};

/// Decides when a running session crosses its warning threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarningEvaluator {
    threshold: Duration,
}

impl WarningEvaluator {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn for_session(session: &Session) -> Self {
        Self::new(session.settings.warning_threshold())
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Whether a session with this much time left is inside the warning window.
    pub fn is_crossed(&self, remaining: Duration) -> bool {
        remaining <= self.threshold
    }

    /// Marks the session warned and returns `true` the first time it is
    /// Running inside the window. Never fires twice, never fires while
    /// paused.
    pub fn evaluate(&self, session: &mut Session) -> bool {
        if session.state != SessionState::Running || session.warning_fired {
            return false;
        }
        if !self.is_crossed(Duration::from_millis(session.remaining_ms)) {
            return false;
        }
        session.warning_fired = true;
        true
    }
}
