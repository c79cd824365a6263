//! Session state machine.
//!
//! The machine works on clock deltas -- it has no thread and no clock of
//! its own. The caller supplies a [`Timestamp`] with every command and
//! every tick, and is responsible for serializing calls.
//!
//! ## State Transitions
//!
//! ```text
//! Stopped -> Running <-> Paused
//! Running -> Completed                (remaining reached zero)
//! Running | Paused -> Stopped         (manual stop or invalidated gap)
//! ```

use std::time::Duration;

use super::interruption::{InterruptionPolicy, RecoveryDecision};
use super::model::{
    CompletionStatus, Session, SessionId, SessionOutcome, SessionSettings, SessionState,
    MAX_DURATION_MINUTES, MIN_DURATION_MINUTES,
};
use super::warning::WarningEvaluator;
use crate::clock::Timestamp;
use crate::error::SessionError;
use crate::events::{PauseChange, SessionEvent};

/// Events produced by one committed transition, in emission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transition {
    events: Vec<SessionEvent>,
}

impl Transition {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[SessionEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<SessionEvent> {
        self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The terminal outcome, if this transition ended the session.
    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.events.iter().find_map(SessionEvent::outcome)
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome().is_some()
    }

    fn push(&mut self, event: SessionEvent) {
        self.events.push(event);
    }
}

/// Convert a requested duration to seconds.
///
/// # Errors
/// Returns `InvalidDuration` outside 1-240 minutes.
pub fn validate_duration(minutes: u32) -> Result<u64, SessionError> {
    if (MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&minutes) {
        Ok(u64::from(minutes) * 60)
    } else {
        Err(SessionError::InvalidDuration { minutes })
    }
}

impl Session {
    /// Create a Running session.
    ///
    /// # Errors
    /// Returns `InvalidDuration` if `minutes` is outside 1-240.
    pub fn start(
        minutes: u32,
        settings: SessionSettings,
        now: Timestamp,
    ) -> Result<(Session, Transition), SessionError> {
        let planned_secs = validate_duration(minutes)?;
        let session = Session {
            id: SessionId::new(),
            planned_secs,
            remaining_ms: planned_secs * 1000,
            state: SessionState::Running,
            warning_fired: false,
            started_at: now.wall,
            paused_at: None,
            paused_mono: None,
            completed_at: None,
            last_tick_at: now.mono,
            last_tick_wall: now.wall,
            interruption_ms: 0,
            interruption_count: 0,
            settings,
        };
        let mut transition = Transition::none();
        transition.push(SessionEvent::SessionStarted {
            session: session.snapshot(),
            at: now.wall,
        });
        Ok((session, transition))
    }

    pub fn policy(&self) -> InterruptionPolicy {
        InterruptionPolicy::new(self.settings.resume_threshold())
    }

    /// Advance a Running session by the time elapsed since the last tick.
    ///
    /// Elapsed time within the tick tolerance is charged against
    /// `remaining`; anything longer is handed to the interruption policy.
    /// Non-running sessions are left alone.
    pub fn tick(&mut self, now: Timestamp) -> Transition {
        if self.state != SessionState::Running {
            return Transition::none();
        }

        let observed = now.gap_since(self.last_tick_at, self.last_tick_wall);
        if observed > self.settings.tick_tolerance() {
            return self.interrupt(observed, now);
        }

        let elapsed = now.mono.saturating_since(self.last_tick_at);
        self.remaining_ms = self.remaining_ms.saturating_sub(elapsed.as_millis() as u64);
        self.mark_ticked(now);

        let mut transition = Transition::none();
        self.evaluate_warning(now, &mut transition);
        if self.remaining_ms == 0 {
            self.complete(now, &mut transition);
        }
        transition
    }

    /// # Errors
    /// Returns `NotRunning` unless the session is Running.
    pub fn pause(&mut self, now: Timestamp) -> Result<Transition, SessionError> {
        if self.state != SessionState::Running {
            return Err(SessionError::NotRunning);
        }
        // Charge the time since the last tick first.
        let mut transition = self.tick(now);
        if transition.is_terminal() {
            return Ok(transition);
        }
        self.state = SessionState::Paused;
        self.paused_at = Some(now.wall);
        self.paused_mono = Some(now.mono);
        transition.push(SessionEvent::SessionPausedOrResumed {
            change: PauseChange::Paused,
            session: self.snapshot(),
            at: now.wall,
        });
        Ok(transition)
    }

    /// Resume a Paused session, or invalidate it if the pause outlasted
    /// the resume threshold.
    ///
    /// # Errors
    /// Returns `NotPaused` unless the session is Paused.
    pub fn resume(&mut self, now: Timestamp) -> Result<Transition, SessionError> {
        if self.state != SessionState::Paused {
            return Err(SessionError::NotPaused);
        }
        let gap = self.pause_gap(now);
        match self.policy().decide(gap) {
            RecoveryDecision::Resume { gap } => {
                self.record_gap(gap);
                self.state = SessionState::Running;
                self.paused_at = None;
                self.paused_mono = None;
                self.mark_ticked(now);
                let mut transition = Transition::none();
                transition.push(SessionEvent::SessionPausedOrResumed {
                    change: PauseChange::Resumed,
                    session: self.snapshot(),
                    at: now.wall,
                });
                Ok(transition)
            }
            RecoveryDecision::Invalidate { gap } => Ok(self.invalidate(gap, now)),
        }
    }

    /// End the session by user request. Time since the last tick is
    /// charged if it is within the tick tolerance.
    pub fn stop(&mut self, now: Timestamp) -> Transition {
        if !self.state.is_active() {
            return Transition::none();
        }
        if self.state == SessionState::Running {
            let elapsed = now.mono.saturating_since(self.last_tick_at);
            if elapsed <= self.settings.tick_tolerance() {
                self.remaining_ms = self.remaining_ms.saturating_sub(elapsed.as_millis() as u64);
            }
        }
        self.state = SessionState::Stopped;
        self.paused_at = None;
        self.paused_mono = None;
        self.end(CompletionStatus::ManuallyStopped, now)
    }

    /// Apply an observed gap (suspend, starved scheduler, restart) to the
    /// session through the interruption policy.
    ///
    /// A forgiven gap leaves `remaining` unchanged; a Paused session stays
    /// Paused. A rejected gap invalidates the session from either state.
    pub fn interrupt(&mut self, gap: Duration, now: Timestamp) -> Transition {
        if !self.state.is_active() {
            return Transition::none();
        }
        match self.policy().decide(gap) {
            RecoveryDecision::Invalidate { gap } => self.invalidate(gap, now),
            RecoveryDecision::Resume { .. } if self.state == SessionState::Paused => {
                // The pause gap is measured when the user resumes.
                Transition::none()
            }
            RecoveryDecision::Resume { gap } => {
                self.record_gap(gap);
                self.mark_ticked(now);
                let mut transition = Transition::none();
                transition.push(SessionEvent::SessionPausedOrResumed {
                    change: PauseChange::Recovered {
                        gap_secs: gap.as_secs(),
                    },
                    session: self.snapshot(),
                    at: now.wall,
                });
                self.evaluate_warning(now, &mut transition);
                transition
            }
        }
    }

    fn pause_gap(&self, now: Timestamp) -> Duration {
        let paused_wall = self.paused_at.unwrap_or(self.last_tick_wall);
        match self.paused_mono {
            Some(mono) => now.gap_since(mono, paused_wall),
            None => now.wall_since(paused_wall),
        }
    }

    fn invalidate(&mut self, gap: Duration, now: Timestamp) -> Transition {
        self.record_gap(gap);
        self.state = SessionState::Stopped;
        self.paused_at = None;
        self.paused_mono = None;
        let mut outcome = self.outcome(CompletionStatus::Invalidated, now.wall);
        outcome.interruption_secs = gap.as_secs();
        Self::ended(outcome, now)
    }

    fn complete(&mut self, now: Timestamp, transition: &mut Transition) {
        self.state = SessionState::Completed;
        self.completed_at = Some(now.wall);
        let outcome = self.outcome(CompletionStatus::Completed, now.wall);
        transition.push(SessionEvent::SessionEnded {
            outcome,
            at: now.wall,
        });
    }

    fn end(&mut self, status: CompletionStatus, now: Timestamp) -> Transition {
        Self::ended(self.outcome(status, now.wall), now)
    }

    fn ended(outcome: SessionOutcome, now: Timestamp) -> Transition {
        let mut transition = Transition::none();
        transition.push(SessionEvent::SessionEnded {
            outcome,
            at: now.wall,
        });
        transition
    }

    fn evaluate_warning(&mut self, now: Timestamp, transition: &mut Transition) {
        let evaluator = WarningEvaluator::for_session(self);
        if evaluator.evaluate(self) {
            transition.push(SessionEvent::WarningTriggered {
                session: self.snapshot(),
                threshold_secs: evaluator.threshold().as_secs(),
                mode: self.settings.warning_mode,
                at: now.wall,
            });
        }
    }

    fn record_gap(&mut self, gap: Duration) {
        self.interruption_ms = self
            .interruption_ms
            .saturating_add(gap.as_millis() as u64);
        self.interruption_count += 1;
    }

    fn mark_ticked(&mut self, now: Timestamp) {
        self.last_tick_at = now.mono;
        self.last_tick_wall = now.wall;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::config::TimerConfig;
    use chrono::{DateTime, Utc};

    fn clock() -> ManualClock {
        let base: DateTime<Utc> = DateTime::parse_from_rfc3339("2026-03-02T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        ManualClock::new(base)
    }

    fn settings() -> SessionSettings {
        SessionSettings::from(&TimerConfig::default())
    }

    fn started(clock: &ManualClock, minutes: u32) -> Session {
        let (session, transition) = Session::start(minutes, settings(), clock.now().unwrap()).unwrap();
        assert!(matches!(
            transition.events(),
            [SessionEvent::SessionStarted { .. }]
        ));
        session
    }

    fn run_for(session: &mut Session, clock: &ManualClock, secs: u64) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        for _ in 0..secs {
            clock.advance(Duration::from_secs(1));
            events.extend(session.tick(clock.now().unwrap()).into_events());
        }
        events
    }

    #[test]
    fn start_rejects_out_of_range_durations() {
        let clock = clock();
        for minutes in [0, 241, 10_000] {
            let result = Session::start(minutes, settings(), clock.now().unwrap());
            assert_eq!(
                result.err(),
                Some(SessionError::InvalidDuration { minutes })
            );
        }
    }

    #[test]
    fn start_pause_resume() {
        let clock = clock();
        let mut session = started(&clock, 25);
        assert_eq!(session.state(), SessionState::Running);

        clock.advance(Duration::from_secs(1));
        session.pause(clock.now().unwrap()).unwrap();
        assert_eq!(session.state(), SessionState::Paused);
        assert_eq!(session.remaining_secs(), 25 * 60 - 1);

        clock.advance(Duration::from_secs(30));
        let transition = session.resume(clock.now().unwrap()).unwrap();
        assert_eq!(session.state(), SessionState::Running);
        assert!(matches!(
            transition.events(),
            [SessionEvent::SessionPausedOrResumed {
                change: PauseChange::Resumed,
                ..
            }]
        ));
        // Paused time is not charged.
        assert_eq!(session.remaining_secs(), 25 * 60 - 1);
    }

    #[test]
    fn misuse_is_rejected_without_changes() {
        let clock = clock();
        let mut session = started(&clock, 5);
        assert_eq!(
            session.resume(clock.now().unwrap()),
            Err(SessionError::NotPaused)
        );
        session.pause(clock.now().unwrap()).unwrap();
        assert_eq!(
            session.pause(clock.now().unwrap()),
            Err(SessionError::NotRunning)
        );
        assert_eq!(session.state(), SessionState::Paused);
    }

    #[test]
    fn ticks_subtract_real_elapsed_time() {
        let clock = clock();
        let mut session = started(&clock, 1);
        clock.advance(Duration::from_millis(1300));
        session.tick(clock.now().unwrap());
        clock.advance(Duration::from_millis(700));
        session.tick(clock.now().unwrap());
        assert_eq!(session.remaining_ms(), 58_000);
    }

    #[test]
    fn completes_exactly_once() {
        let clock = clock();
        let mut session = started(&clock, 1);
        let events = run_for(&mut session, &clock, 60);
        let ended: Vec<_> = events.iter().filter_map(SessionEvent::outcome).collect();
        assert_eq!(ended.len(), 1);
        assert_eq!(ended[0].status, CompletionStatus::Completed);
        assert_eq!(ended[0].actual_focused_secs, 60);
        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(session.remaining_ms(), 0);

        // Further ticks are no-ops.
        assert!(run_for(&mut session, &clock, 5).is_empty());
    }

    #[test]
    fn short_session_warns_after_first_tick() {
        let clock = clock();
        let mut session = started(&clock, 1);
        assert!(!session.warning_fired());
        let events = run_for(&mut session, &clock, 1);
        assert!(matches!(
            events.as_slice(),
            [SessionEvent::WarningTriggered { threshold_secs: 120, .. }]
        ));
        assert!(session.warning_fired());
    }

    #[test]
    fn paused_session_does_not_warn() {
        let clock = clock();
        let mut session = started(&clock, 1);
        session.pause(clock.now().unwrap()).unwrap();
        clock.advance(Duration::from_secs(5));
        assert!(session.tick(clock.now().unwrap()).is_empty());
        assert!(!session.warning_fired());
    }

    #[test]
    fn tolerated_suspend_leaves_remaining_unchanged() {
        let clock = clock();
        let mut session = started(&clock, 25);
        run_for(&mut session, &clock, 10);
        let before = session.remaining_ms();

        clock.suspend(Duration::from_secs(299));
        let transition = session.tick(clock.now().unwrap());
        assert!(matches!(
            transition.events(),
            [SessionEvent::SessionPausedOrResumed {
                change: PauseChange::Recovered { gap_secs: 299 },
                ..
            }]
        ));
        assert_eq!(session.remaining_ms(), before);
        assert_eq!(session.state(), SessionState::Running);

        // Normal ticking continues from the new baseline.
        run_for(&mut session, &clock, 1);
        assert_eq!(session.remaining_ms(), before - 1000);
    }

    #[test]
    fn long_suspend_invalidates() {
        let clock = clock();
        let mut session = started(&clock, 25);
        clock.suspend(Duration::from_secs(301));
        let transition = session.tick(clock.now().unwrap());
        let outcome = transition.outcome().unwrap();
        assert_eq!(outcome.status, CompletionStatus::Invalidated);
        assert_eq!(outcome.interruption_secs, 301);
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn invalidated_outcome_reports_only_the_invalidating_gap() {
        let clock = clock();
        let mut session = started(&clock, 25);
        run_for(&mut session, &clock, 1);
        session.pause(clock.now().unwrap()).unwrap();
        clock.advance(Duration::from_secs(30));
        session.resume(clock.now().unwrap()).unwrap();

        clock.advance(Duration::from_secs(301));
        let transition = session.tick(clock.now().unwrap());
        let outcome = transition.outcome().unwrap();
        assert_eq!(outcome.status, CompletionStatus::Invalidated);
        assert_eq!(outcome.interruption_secs, 301);
        assert_eq!(outcome.total_interruption_secs, 331);
        assert_eq!(outcome.interruption_count, 2);
    }

    #[test]
    fn long_pause_invalidates_on_resume() {
        let clock = clock();
        let mut session = started(&clock, 25);
        session.pause(clock.now().unwrap()).unwrap();
        clock.advance(Duration::from_secs(600));
        let transition = session.resume(clock.now().unwrap()).unwrap();
        assert_eq!(
            transition.outcome().map(|o| o.status),
            Some(CompletionStatus::Invalidated)
        );
    }

    #[test]
    fn forgiven_interruption_keeps_paused_session_paused() {
        let clock = clock();
        let mut session = started(&clock, 25);
        session.pause(clock.now().unwrap()).unwrap();
        let transition = session.interrupt(Duration::from_secs(60), clock.now().unwrap());
        assert!(transition.is_empty());
        assert_eq!(session.state(), SessionState::Paused);
    }

    #[test]
    fn stop_charges_elapsed_time_and_reports_manual_stop() {
        let clock = clock();
        let mut session = started(&clock, 10);
        run_for(&mut session, &clock, 30);
        clock.advance(Duration::from_millis(500));
        let transition = session.stop(clock.now().unwrap());
        let outcome = transition.outcome().unwrap();
        assert_eq!(outcome.status, CompletionStatus::ManuallyStopped);
        assert_eq!(outcome.actual_focused_secs, 30);
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(session.stop(clock.now().unwrap()).is_empty());
    }
}
