//! Client handle for the session actor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::commands::{CommandReply, SessionCommand, StartRequest};
use crate::config::TimerConfig;
use crate::error::{CoreError, SessionError};
use crate::events::{EventBus, SessionEvent};
use crate::repository::SessionStatus;
use crate::session::SessionSnapshot;

/// Cheap-to-clone entry point for every producer: UI, hotkeys, config
/// watcher, OS interruption reports.
///
/// Every method returns `SessionError::ServiceUnavailable` once the
/// actor has shut down.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionCommand>,
    bus: EventBus,
}

impl SessionHandle {
    pub(crate) fn new(sender: mpsc::Sender<SessionCommand>, bus: EventBus) -> Self {
        Self { sender, bus }
    }

    /// Start a session of `minutes` minutes.
    ///
    /// # Errors
    /// - `InvalidDuration` outside 1-240 minutes
    /// - `SessionAlreadyActive` if a session is Running or Paused
    pub async fn start(&self, minutes: u32) -> Result<SessionSnapshot, SessionError> {
        self.start_with(StartRequest::Minutes(minutes)).await
    }

    /// Start a session with the configured default duration.
    pub async fn start_default(&self) -> Result<SessionSnapshot, SessionError> {
        self.start_with(StartRequest::Default).await
    }

    /// Start a session with the duration of preset `index`.
    ///
    /// # Errors
    /// `UnknownPreset` if the index is out of range.
    pub async fn start_preset(&self, index: usize) -> Result<SessionSnapshot, SessionError> {
        self.start_with(StartRequest::Preset(index)).await
    }

    async fn start_with(&self, request: StartRequest) -> Result<SessionSnapshot, SessionError> {
        self.request(|respond_to| SessionCommand::Start {
            request,
            respond_to,
        })
        .await?
    }

    /// # Errors
    /// `NotRunning` unless a session is Running.
    pub async fn pause(&self) -> Result<CommandReply, SessionError> {
        self.request(|respond_to| SessionCommand::Pause { respond_to })
            .await?
    }

    /// Resume a Paused session. Returns `Ended` with an `Invalidated`
    /// outcome if the pause outlasted the resume threshold.
    ///
    /// # Errors
    /// `NotPaused` unless a session is Paused.
    pub async fn resume(&self) -> Result<CommandReply, SessionError> {
        self.request(|respond_to| SessionCommand::Resume { respond_to })
            .await?
    }

    /// Stop the active session. Safe from any state: with no active
    /// session the reply is `AlreadyStopped`.
    pub async fn stop(&self) -> Result<CommandReply, SessionError> {
        self.request(|respond_to| SessionCommand::Stop { respond_to })
            .await?
    }

    /// Feed a gap the process could not observe itself (system sleep,
    /// lock screen) through the interruption policy.
    pub async fn report_interruption(&self, gap: Duration) -> Result<CommandReply, SessionError> {
        self.request(|respond_to| SessionCommand::ReportInterruption { gap, respond_to })
            .await?
    }

    /// Force a tick now, in addition to the scheduler's.
    pub async fn tick(&self) -> Result<CommandReply, SessionError> {
        self.request(|respond_to| SessionCommand::Tick {
            respond_to: Some(respond_to),
        })
        .await?
    }

    pub async fn current_state(&self) -> Result<SessionStatus, SessionError> {
        self.request(|respond_to| SessionCommand::GetState { respond_to })
            .await
    }

    /// Validate `config` and swap it in. The active session keeps the
    /// settings it started with.
    ///
    /// # Errors
    /// `ConfigError::InvalidValue` if validation fails; the current
    /// configuration stays in force.
    pub async fn reload_config(&self, config: TimerConfig) -> Result<(), CoreError> {
        config.validate()?;
        let config = Arc::new(config);
        self.request(|respond_to| SessionCommand::ReloadConfig { config, respond_to })
            .await?;
        Ok(())
    }

    pub async fn config(&self) -> Result<Arc<TimerConfig>, SessionError> {
        self.request(|respond_to| SessionCommand::GetConfig { respond_to })
            .await
    }

    /// Subscribe to session events published from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        self.bus.subscribe()
    }

    /// Ask the actor to stop. The active session, if any, stays in the
    /// checkpoint for the next start. Succeeds if the actor is already
    /// gone.
    pub async fn shutdown(&self) {
        let _ = self
            .request(|respond_to| SessionCommand::Shutdown { respond_to })
            .await;
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub(crate) fn sender(&self) -> mpsc::Sender<SessionCommand> {
        self.sender.clone()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(make(tx))
            .await
            .map_err(|_| SessionError::ServiceUnavailable)?;
        rx.await.map_err(|_| SessionError::ServiceUnavailable)
    }
}
