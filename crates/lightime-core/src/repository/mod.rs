//! Single-slot session repository.
//!
//! Holds at most one active session, routes every command and tick to
//! it, releases the slot once a terminal outcome is produced, and
//! produces the crash-recovery checkpoint of the current slot.

mod store;

pub use store::{CheckpointStore, MemoryCheckpointStore, SqliteCheckpointStore};

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{MonoMillis, Timestamp};
use crate::error::SessionError;
use crate::session::{
    Session, SessionId, SessionOutcome, SessionSettings, SessionSnapshot, SessionState, Transition,
    MAX_DURATION_MINUTES, MIN_DURATION_MINUTES,
};

/// Minimal snapshot persisted after every committed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: SessionId,
    pub state: SessionState,
    pub remaining_ms: u64,
    /// Monotonic reading of the last tick; meaningless after a restart.
    pub last_tick_at: MonoMillis,
    /// Wall-clock twin of `last_tick_at`, used to measure the restart gap.
    pub last_tick_wall: DateTime<Utc>,
    pub planned_secs: u64,
    pub warning_fired: bool,
    pub started_at: DateTime<Utc>,
    pub paused_at: Option<DateTime<Utc>>,
    pub interruption_ms: u64,
    pub interruption_count: u32,
    pub settings: SessionSettings,
}

/// What `restore()` did with a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RestoreReport {
    /// Nothing was saved.
    Empty,
    /// The session is back in the slot, Running or Paused.
    Restored { session: SessionSnapshot },
    /// The restart gap was too long.
    Invalidated { outcome: SessionOutcome },
    /// The checkpoint was unusable and has been dropped.
    Discarded { reason: String },
}

/// Result of a `stop()` request.
#[derive(Debug, Clone, PartialEq)]
pub enum StopResult {
    Stopped(Transition),
    /// No active session; the stop was a no-op.
    AlreadyStopped,
}

/// Answer to a `current_state()` query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    /// State of the active session, or the terminal state of the last one.
    pub state: SessionState,
    pub active: Option<SessionSnapshot>,
    pub last_outcome: Option<SessionOutcome>,
}

#[derive(Debug, Default)]
pub struct SessionRepository {
    active: Option<Session>,
    last_outcome: Option<SessionOutcome>,
}

impl SessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&Session> {
        self.active.as_ref()
    }

    pub fn last_outcome(&self) -> Option<&SessionOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        let state = match (&self.active, &self.last_outcome) {
            (Some(session), _) => session.state(),
            (None, Some(outcome)) => outcome.final_state(),
            (None, None) => SessionState::Stopped,
        };
        SessionStatus {
            state,
            active: self.active.as_ref().map(Session::snapshot),
            last_outcome: self.last_outcome.clone(),
        }
    }

    /// # Errors
    /// `SessionAlreadyActive` if the slot is taken, `InvalidDuration` for
    /// an out-of-range duration. The slot is untouched on error.
    pub fn start(
        &mut self,
        minutes: u32,
        settings: SessionSettings,
        now: Timestamp,
    ) -> Result<(SessionSnapshot, Transition), SessionError> {
        if let Some(session) = &self.active {
            return Err(SessionError::SessionAlreadyActive { id: session.id() });
        }
        let (session, transition) = Session::start(minutes, settings, now)?;
        let snapshot = session.snapshot();
        self.active = Some(session);
        Ok((snapshot, transition))
    }

    /// # Errors
    /// `NotRunning` if there is no Running session.
    pub fn pause(&mut self, now: Timestamp) -> Result<Transition, SessionError> {
        let session = self.active.as_mut().ok_or(SessionError::NotRunning)?;
        let transition = session.pause(now)?;
        Ok(self.settle(transition))
    }

    /// # Errors
    /// `NotPaused` if there is no Paused session.
    pub fn resume(&mut self, now: Timestamp) -> Result<Transition, SessionError> {
        let session = self.active.as_mut().ok_or(SessionError::NotPaused)?;
        let transition = session.resume(now)?;
        Ok(self.settle(transition))
    }

    pub fn stop(&mut self, now: Timestamp) -> StopResult {
        match self.active.as_mut() {
            Some(session) => {
                let transition = session.stop(now);
                StopResult::Stopped(self.settle(transition))
            }
            None => StopResult::AlreadyStopped,
        }
    }

    pub fn tick(&mut self, now: Timestamp) -> Transition {
        match self.active.as_mut() {
            Some(session) => {
                let transition = session.tick(now);
                self.settle(transition)
            }
            None => Transition::none(),
        }
    }

    pub fn interrupt(&mut self, gap: Duration, now: Timestamp) -> Transition {
        match self.active.as_mut() {
            Some(session) => {
                let transition = session.interrupt(gap, now);
                self.settle(transition)
            }
            None => Transition::none(),
        }
    }

    /// Snapshot of the slot for the recovery store; `None` clears it.
    pub fn checkpoint(&self) -> Option<Checkpoint> {
        self.active.as_ref().map(|session| Checkpoint {
            id: session.id,
            state: session.state,
            remaining_ms: session.remaining_ms,
            last_tick_at: session.last_tick_at,
            last_tick_wall: session.last_tick_wall,
            planned_secs: session.planned_secs,
            warning_fired: session.warning_fired,
            started_at: session.started_at,
            paused_at: session.paused_at,
            interruption_ms: session.interruption_ms,
            interruption_count: session.interruption_count,
            settings: session.settings,
        })
    }

    /// Rebuild the session saved in `checkpoint` and route the restart
    /// gap (`now - last_tick_wall`) through the interruption policy, the
    /// same way a suspend is handled.
    ///
    /// `tick_interval_ms` is the period of the scheduler that will tick
    /// the restored session; it replaces the saved one.
    pub fn restore(
        &mut self,
        mut checkpoint: Checkpoint,
        tick_interval_ms: u64,
        now: Timestamp,
    ) -> (RestoreReport, Transition) {
        if self.active.is_some() {
            return (
                RestoreReport::Discarded {
                    reason: "a session is already active".into(),
                },
                Transition::none(),
            );
        }
        if !checkpoint.state.is_active() {
            return (
                RestoreReport::Discarded {
                    reason: format!("checkpoint is in terminal state {:?}", checkpoint.state),
                },
                Transition::none(),
            );
        }
        let planned_range =
            u64::from(MIN_DURATION_MINUTES) * 60..=u64::from(MAX_DURATION_MINUTES) * 60;
        if !planned_range.contains(&checkpoint.planned_secs) {
            return (
                RestoreReport::Discarded {
                    reason: format!(
                        "planned duration of {}s is out of range",
                        checkpoint.planned_secs
                    ),
                },
                Transition::none(),
            );
        }
        if checkpoint.remaining_ms > checkpoint.planned_secs * 1000 {
            return (
                RestoreReport::Discarded {
                    reason: "remaining time exceeds planned duration".into(),
                },
                Transition::none(),
            );
        }

        checkpoint.settings.tick_interval_ms = tick_interval_ms;
        let gap = now.wall_since(checkpoint.last_tick_wall);
        let mut session = Session::from_checkpoint(&checkpoint, now);
        let transition = session.interrupt(gap, now);
        if let Some(outcome) = transition.outcome() {
            let report = RestoreReport::Invalidated {
                outcome: outcome.clone(),
            };
            self.last_outcome = Some(outcome.clone());
            return (report, transition);
        }

        let report = RestoreReport::Restored {
            session: session.snapshot(),
        };
        self.active = Some(session);
        (report, transition)
    }

    fn settle(&mut self, transition: Transition) -> Transition {
        if let Some(outcome) = transition.outcome() {
            self.last_outcome = Some(outcome.clone());
            self.active = None;
        }
        transition
    }
}

impl Session {
    /// Monotonic fields are re-based on `now`; the paused instant keeps
    /// only its wall-clock value.
    pub(crate) fn from_checkpoint(checkpoint: &Checkpoint, now: Timestamp) -> Self {
        Session {
            id: checkpoint.id,
            planned_secs: checkpoint.planned_secs,
            remaining_ms: checkpoint.remaining_ms,
            state: checkpoint.state,
            warning_fired: checkpoint.warning_fired,
            started_at: checkpoint.started_at,
            paused_at: checkpoint.paused_at,
            paused_mono: None,
            completed_at: None,
            last_tick_at: now.mono,
            last_tick_wall: checkpoint.last_tick_wall,
            interruption_ms: checkpoint.interruption_ms,
            interruption_count: checkpoint.interruption_count,
            settings: checkpoint.settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::config::TimerConfig;
    use crate::session::CompletionStatus;

    fn clock() -> ManualClock {
        ManualClock::new(
            DateTime::parse_from_rfc3339("2026-03-02T09:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        )
    }

    fn settings() -> SessionSettings {
        SessionSettings::from(&TimerConfig::default())
    }

    fn tick_secs(repo: &mut SessionRepository, clock: &ManualClock, secs: u64) {
        for _ in 0..secs {
            clock.advance(Duration::from_secs(1));
            repo.tick(clock.now().unwrap());
        }
    }

    #[test]
    fn start_while_active_is_rejected_and_leaves_session_untouched() {
        let clock = clock();
        let mut repo = SessionRepository::new();
        repo.start(25, settings(), clock.now().unwrap()).unwrap();
        tick_secs(&mut repo, &clock, 3);
        let before = repo.active().unwrap().snapshot();

        let err = repo.start(10, settings(), clock.now().unwrap()).unwrap_err();
        assert_eq!(err, SessionError::SessionAlreadyActive { id: before.id });
        assert_eq!(repo.active().unwrap().snapshot(), before);

        repo.pause(clock.now().unwrap()).unwrap();
        assert!(matches!(
            repo.start(10, settings(), clock.now().unwrap()),
            Err(SessionError::SessionAlreadyActive { .. })
        ));
    }

    #[test]
    fn invalid_duration_creates_nothing() {
        let clock = clock();
        let mut repo = SessionRepository::new();
        assert!(repo.start(0, settings(), clock.now().unwrap()).is_err());
        assert!(repo.active().is_none());
        assert_eq!(repo.status().state, SessionState::Stopped);
    }

    #[test]
    fn commands_without_a_session() {
        let clock = clock();
        let mut repo = SessionRepository::new();
        let now = clock.now().unwrap();
        assert_eq!(repo.pause(now), Err(SessionError::NotRunning));
        assert_eq!(repo.resume(now), Err(SessionError::NotPaused));
        assert_eq!(repo.stop(now), StopResult::AlreadyStopped);
        assert!(repo.tick(now).is_empty());
    }

    #[test]
    fn terminal_transition_releases_the_slot() {
        let clock = clock();
        let mut repo = SessionRepository::new();
        repo.start(1, settings(), clock.now().unwrap()).unwrap();
        tick_secs(&mut repo, &clock, 60);
        assert!(repo.active().is_none());
        assert!(repo.checkpoint().is_none());
        assert_eq!(
            repo.last_outcome().map(|o| o.actual_focused_secs),
            Some(60)
        );
        let status = repo.status();
        assert_eq!(status.state, SessionState::Completed);
        assert_eq!(
            status.last_outcome.map(|o| o.status),
            Some(CompletionStatus::Completed)
        );

        // The slot is free for the next session.
        assert!(repo.start(5, settings(), clock.now().unwrap()).is_ok());
    }

    #[test]
    fn second_stop_is_benign() {
        let clock = clock();
        let mut repo = SessionRepository::new();
        repo.start(5, settings(), clock.now().unwrap()).unwrap();
        let now = clock.now().unwrap();
        assert!(matches!(repo.stop(now), StopResult::Stopped(t) if t.is_terminal()));
        assert_eq!(repo.stop(now), StopResult::AlreadyStopped);
    }

    #[test]
    fn restore_within_threshold_keeps_remaining() {
        let clock = clock();
        let mut repo = SessionRepository::new();
        repo.start(25, settings(), clock.now().unwrap()).unwrap();
        tick_secs(&mut repo, &clock, 90);
        let checkpoint = repo.checkpoint().unwrap();

        // Process dies; a new process starts with a fresh monotonic origin.
        clock.suspend(Duration::from_secs(120));
        let mut restored = SessionRepository::new();
        let (report, transition) = restored.restore(checkpoint.clone(), 1000, clock.now().unwrap());
        match report {
            RestoreReport::Restored { session } => {
                assert_eq!(session.id, checkpoint.id);
                assert_eq!(session.state, SessionState::Running);
                assert_eq!(session.remaining_ms, checkpoint.remaining_ms);
                assert_eq!(session.interruption_secs, 120);
            }
            other => panic!("expected Restored, got {other:?}"),
        }
        assert!(!transition.is_terminal());

        // Ticking resumes from the restored baseline.
        tick_secs(&mut restored, &clock, 1);
        assert_eq!(
            restored.active().unwrap().remaining_ms(),
            checkpoint.remaining_ms - 1000
        );
    }

    #[test]
    fn restore_after_long_gap_invalidates() {
        let clock = clock();
        let mut repo = SessionRepository::new();
        repo.start(25, settings(), clock.now().unwrap()).unwrap();
        tick_secs(&mut repo, &clock, 10);
        let checkpoint = repo.checkpoint().unwrap();

        clock.suspend(Duration::from_secs(3600));
        let mut restored = SessionRepository::new();
        let (report, transition) = restored.restore(checkpoint, 1000, clock.now().unwrap());
        match report {
            RestoreReport::Invalidated { outcome } => {
                assert_eq!(outcome.status, CompletionStatus::Invalidated);
                assert_eq!(outcome.interruption_secs, 3600);
                assert_eq!(outcome.actual_focused_secs, 10);
            }
            other => panic!("expected Invalidated, got {other:?}"),
        }
        assert!(transition.is_terminal());
        assert!(restored.active().is_none());
    }

    #[test]
    fn paused_checkpoint_restores_paused() {
        let clock = clock();
        let mut repo = SessionRepository::new();
        repo.start(25, settings(), clock.now().unwrap()).unwrap();
        tick_secs(&mut repo, &clock, 5);
        repo.pause(clock.now().unwrap()).unwrap();
        let checkpoint = repo.checkpoint().unwrap();
        assert_eq!(checkpoint.state, SessionState::Paused);

        clock.suspend(Duration::from_secs(60));
        let mut restored = SessionRepository::new();
        let (report, _) = restored.restore(checkpoint, 1000, clock.now().unwrap());
        assert!(matches!(
            report,
            RestoreReport::Restored { ref session } if session.state == SessionState::Paused
        ));

        // The whole pause, across the restart, is measured at resume.
        clock.advance(Duration::from_secs(30));
        let transition = restored.resume(clock.now().unwrap()).unwrap();
        assert!(!transition.is_terminal());
        assert_eq!(restored.active().unwrap().state(), SessionState::Running);
    }

    #[test]
    fn terminal_checkpoint_is_discarded() {
        let clock = clock();
        let mut repo = SessionRepository::new();
        repo.start(25, settings(), clock.now().unwrap()).unwrap();
        let mut checkpoint = repo.checkpoint().unwrap();
        checkpoint.state = SessionState::Completed;

        let mut restored = SessionRepository::new();
        let (report, _) = restored.restore(checkpoint, 1000, clock.now().unwrap());
        assert!(matches!(report, RestoreReport::Discarded { .. }));
        assert!(restored.active().is_none());
    }

    #[test]
    fn out_of_range_planned_duration_is_discarded() {
        let clock = clock();
        let mut repo = SessionRepository::new();
        repo.start(25, settings(), clock.now().unwrap()).unwrap();
        let saved = repo.checkpoint().unwrap();

        for planned_secs in [0, 59, 14_401, u64::MAX] {
            let mut checkpoint = saved.clone();
            checkpoint.planned_secs = planned_secs;
            let mut restored = SessionRepository::new();
            let (report, transition) = restored.restore(checkpoint, 1000, clock.now().unwrap());
            assert!(
                matches!(report, RestoreReport::Discarded { .. }),
                "planned_secs {planned_secs}: {report:?}"
            );
            assert!(transition.is_empty());
            assert!(restored.active().is_none());
        }
    }

    #[test]
    fn restore_adopts_the_running_tick_interval() {
        let clock = clock();
        let mut repo = SessionRepository::new();
        let mut fast = settings();
        fast.tick_interval_ms = 100;
        repo.start(5, fast, clock.now().unwrap()).unwrap();
        let checkpoint = repo.checkpoint().unwrap();
        assert_eq!(checkpoint.settings.tick_interval_ms, 100);

        let mut restored = SessionRepository::new();
        restored.restore(checkpoint, 1000, clock.now().unwrap());
        assert_eq!(restored.active().unwrap().settings().tick_interval_ms, 1000);

        // One-second ticks are within tolerance and count down normally.
        for _ in 0..10 {
            clock.advance(Duration::from_secs(1));
            let transition = restored.tick(clock.now().unwrap());
            assert!(transition.is_empty());
        }
        let session = restored.active().unwrap();
        assert_eq!(session.remaining_ms(), 290_000);
        assert_eq!(session.snapshot().interruption_count, 0);
    }
}
