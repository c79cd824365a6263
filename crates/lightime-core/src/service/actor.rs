//! The serialization point.
//!
//! `SessionActor` owns the repository and the current configuration and
//! processes one command at a time. It performs no I/O: committed events
//! go to the bus and the latest checkpoint goes to a watch channel read
//! by the writer task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::commands::{CommandReply, SessionCommand, StartRequest};
use crate::clock::{Clock, Timestamp};
use crate::config::TimerConfig;
use crate::error::SessionError;
use crate::events::{EventBus, PauseChange, SessionEvent};
use crate::repository::{Checkpoint, SessionRepository, StopResult};
use crate::session::{CompletionStatus, SessionSettings, SessionSnapshot, Transition};

pub struct SessionActor {
    receiver: mpsc::Receiver<SessionCommand>,
    repository: SessionRepository,
    config: Arc<TimerConfig>,
    /// Scheduler period fixed at service start.
    tick_interval_ms: u64,
    clock: Arc<dyn Clock>,
    bus: EventBus,
    checkpoints: watch::Sender<Option<Checkpoint>>,
}

impl SessionActor {
    pub fn new(
        receiver: mpsc::Receiver<SessionCommand>,
        repository: SessionRepository,
        config: Arc<TimerConfig>,
        clock: Arc<dyn Clock>,
        bus: EventBus,
        checkpoints: watch::Sender<Option<Checkpoint>>,
    ) -> Self {
        let tick_interval_ms = config.tick_interval_ms;
        Self {
            receiver,
            repository,
            config,
            tick_interval_ms,
            clock,
            bus,
            checkpoints,
        }
    }

    /// Process commands until `Shutdown` arrives or every sender is gone.
    pub async fn run(mut self) {
        info!("Session actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            if !self.handle_command(cmd) {
                break;
            }
        }

        info!(
            "Session actor stopped (active session: {})",
            self.repository.active().is_some()
        );
    }

    /// Returns `false` when the actor should stop.
    fn handle_command(&mut self, cmd: SessionCommand) -> bool {
        match cmd {
            SessionCommand::Start { request, respond_to } => {
                let _ = respond_to.send(self.handle_start(request));
            }
            SessionCommand::Pause { respond_to } => {
                let result = self
                    .now()
                    .and_then(|now| self.repository.pause(now))
                    .map(|transition| self.commit(transition));
                let _ = respond_to.send(result);
            }
            SessionCommand::Resume { respond_to } => {
                let result = self
                    .now()
                    .and_then(|now| self.repository.resume(now))
                    .map(|transition| self.commit(transition));
                let _ = respond_to.send(result);
            }
            SessionCommand::Stop { respond_to } => {
                let _ = respond_to.send(self.handle_stop());
            }
            SessionCommand::ReportInterruption { gap, respond_to } => {
                let _ = respond_to.send(self.handle_interruption(gap));
            }
            SessionCommand::Tick { respond_to } => {
                let result = self.handle_tick();
                if let Some(respond_to) = respond_to {
                    let _ = respond_to.send(result);
                }
            }
            SessionCommand::GetState { respond_to } => {
                let _ = respond_to.send(self.repository.status());
            }
            SessionCommand::ReloadConfig { config, respond_to } => {
                info!(
                    default_minutes = config.default_duration_minutes,
                    warning_secs = config.warning_threshold_seconds,
                    resume_secs = config.resume_threshold_seconds,
                    "Configuration reloaded"
                );
                if config.tick_interval_ms != self.tick_interval_ms {
                    warn!(
                        current = self.tick_interval_ms,
                        requested = config.tick_interval_ms,
                        "tick_interval_ms takes effect on the next service start"
                    );
                }
                self.config = config;
                let _ = respond_to.send(());
            }
            SessionCommand::GetConfig { respond_to } => {
                let _ = respond_to.send(Arc::clone(&self.config));
            }
            SessionCommand::Shutdown { respond_to } => {
                let _ = respond_to.send(());
                return false;
            }
        }
        true
    }

    fn handle_start(&mut self, request: StartRequest) -> Result<SessionSnapshot, SessionError> {
        let minutes = match request {
            StartRequest::Minutes(minutes) => minutes,
            StartRequest::Default => self.config.default_duration_minutes,
            StartRequest::Preset(index) => {
                self.config
                    .preset(index)
                    .ok_or(SessionError::UnknownPreset {
                        index,
                        available: self.config.preset_durations.len(),
                    })?
            }
        };
        let now = self.now()?;
        let mut settings = SessionSettings::from(self.config.as_ref());
        settings.tick_interval_ms = self.tick_interval_ms;

        let (session, transition) = self.repository.start(minutes, settings, now)?;
        self.commit(transition);
        Ok(session)
    }

    fn handle_stop(&mut self) -> Result<CommandReply, SessionError> {
        let now = self.now()?;
        match self.repository.stop(now) {
            StopResult::Stopped(transition) => Ok(self.commit(transition)),
            StopResult::AlreadyStopped => {
                debug!("Stop ignored: no active session");
                Ok(CommandReply::AlreadyStopped)
            }
        }
    }

    fn handle_interruption(&mut self, gap: Duration) -> Result<CommandReply, SessionError> {
        let now = self.now()?;
        info!(gap_secs = gap.as_secs(), "Interruption reported");
        let transition = self.repository.interrupt(gap, now);
        Ok(self.commit(transition))
    }

    fn handle_tick(&mut self) -> Result<CommandReply, SessionError> {
        if self.repository.active().is_none() {
            return Ok(CommandReply::Idle);
        }
        let now = match self.now() {
            Ok(now) => now,
            Err(err) => {
                warn!("Skipping tick: {}", err);
                return Err(err);
            }
        };
        let transition = self.repository.tick(now);
        Ok(self.commit(transition))
    }

    fn now(&self) -> Result<Timestamp, SessionError> {
        self.clock.now().map_err(SessionError::ClockUnavailable)
    }

    /// Publish the transition's events, refresh the checkpoint and build
    /// the caller's reply.
    fn commit(&mut self, transition: Transition) -> CommandReply {
        for event in transition.events() {
            log_event(event);
            let delivered = self.bus.publish(event);
            debug!(subscribers = delivered, "Published event");
        }

        let latest = self.repository.checkpoint();
        self.checkpoints.send_if_modified(|current| {
            if *current == latest {
                false
            } else {
                *current = latest;
                true
            }
        });

        if let Some(outcome) = transition.outcome() {
            return CommandReply::Ended {
                outcome: outcome.clone(),
            };
        }
        match self.repository.active() {
            Some(session) => CommandReply::Active {
                session: session.snapshot(),
            },
            None => CommandReply::Idle,
        }
    }
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::SessionStarted { session, .. } => {
            info!(
                "Session {} started ({} min)",
                session.id,
                session.planned_secs / 60
            );
        }
        SessionEvent::WarningTriggered {
            session,
            threshold_secs,
            ..
        } => {
            info!(
                "Session {} warning: {}s left (threshold {}s)",
                session.id, session.remaining_secs, threshold_secs
            );
        }
        SessionEvent::SessionPausedOrResumed {
            change, session, ..
        } => match change {
            PauseChange::Paused => info!("Session {} paused", session.id),
            PauseChange::Resumed => info!("Session {} resumed", session.id),
            PauseChange::Recovered { gap_secs } => {
                warn!("Session {} recovered after a {}s gap", session.id, gap_secs)
            }
        },
        SessionEvent::SessionEnded { outcome, .. } => match outcome.status {
            CompletionStatus::Invalidated => warn!(
                "Session {} invalidated after {}s of interruption",
                outcome.id, outcome.interruption_secs
            ),
            status => info!(
                "Session {} ended: {:?} ({}s focused)",
                outcome.id, status, outcome.actual_focused_secs
            ),
        },
    }
}
