//! Session service using the actor pattern.
//!
//! ```text
//!  tick scheduler ──┐
//!  SessionHandle ───┼──▶ SessionActor ──▶ EventBus ──▶ subscribers
//!  ConfigWatcher ───┘    (repository)  └─▶ watch ──▶ checkpoint writer
//! ```
//!
//! All producers funnel into one bounded command channel, so commands and
//! ticks are applied one at a time in arrival order.

mod actor;
mod commands;
mod handle;
mod scheduler;

pub use actor::SessionActor;
pub use commands::{CommandReply, SessionCommand, StartRequest};
pub use handle::SessionHandle;
pub use scheduler::spawn_tick_scheduler;

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::config::TimerConfig;
use crate::error::{CheckpointError, CoreError};
use crate::events::EventBus;
use crate::repository::{Checkpoint, CheckpointStore, RestoreReport, SessionRepository};

const COMMAND_BUFFER: usize = 64;

/// Whether the service drives its own ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickMode {
    /// A scheduler task ticks every `tick_interval_ms`.
    #[default]
    Scheduled,
    /// Ticks only happen through [`SessionHandle::tick`].
    Manual,
}

/// A running session service.
pub struct SessionService {
    pub handle: SessionHandle,
    /// What happened to the checkpoint found at startup.
    pub restore: RestoreReport,
    tasks: Vec<JoinHandle<()>>,
}

impl SessionService {
    /// Shut the actor down and wait for the scheduler and the checkpoint
    /// writer to drain.
    pub async fn shutdown(self) {
        self.handle.shutdown().await;
        self.join().await;
    }

    /// Wait for every service task to finish.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(err) = task.await {
                error!("Session service task failed: {}", err);
            }
        }
    }
}

/// Restore any saved session and start the service with a tick scheduler.
///
/// Events produced by the restore are published on `bus` before this
/// returns, so subscribe before calling.
///
/// # Errors
/// Returns an error if `config` is invalid or the clock cannot be read.
/// A corrupt checkpoint is not an error: it is discarded and reported.
pub fn spawn_session_service(
    config: TimerConfig,
    clock: Arc<dyn Clock>,
    store: Box<dyn CheckpointStore>,
    bus: EventBus,
) -> Result<SessionService, CoreError> {
    spawn_session_service_with(config, clock, store, bus, TickMode::Scheduled)
}

/// Like [`spawn_session_service`], choosing how ticks are produced.
///
/// # Errors
/// Same as [`spawn_session_service`].
pub fn spawn_session_service_with(
    config: TimerConfig,
    clock: Arc<dyn Clock>,
    store: Box<dyn CheckpointStore>,
    bus: EventBus,
    mode: TickMode,
) -> Result<SessionService, CoreError> {
    config.validate()?;
    let config = Arc::new(config);
    let tick_period = config.tick_interval();

    let mut repository = SessionRepository::new();
    let restore = match store.load() {
        Ok(Some(checkpoint)) => {
            let (report, transition) =
                repository.restore(checkpoint, config.tick_interval_ms, clock.now()?);
            for event in transition.events() {
                bus.publish(event);
            }
            report
        }
        Ok(None) => RestoreReport::Empty,
        Err(err) => discard_unreadable(err),
    };
    log_restore(&restore);

    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    // The writer persists this initial value first, which also clears a
    // slot that was invalidated or discarded above.
    let (checkpoint_tx, checkpoint_rx) = watch::channel(repository.checkpoint());

    let actor = SessionActor::new(
        cmd_rx,
        repository,
        config,
        clock,
        bus.clone(),
        checkpoint_tx,
    );

    let mut tasks = vec![
        tokio::spawn(actor.run()),
        tokio::spawn(run_checkpoint_writer(store, checkpoint_rx)),
    ];
    let handle = SessionHandle::new(cmd_tx, bus);
    if mode == TickMode::Scheduled {
        tasks.push(spawn_tick_scheduler(handle.sender(), tick_period));
    }

    Ok(SessionService {
        handle,
        restore,
        tasks,
    })
}

fn discard_unreadable(err: CheckpointError) -> RestoreReport {
    warn!("Discarding unreadable checkpoint: {}", err);
    RestoreReport::Discarded {
        reason: err.to_string(),
    }
}

fn log_restore(report: &RestoreReport) {
    match report {
        RestoreReport::Empty => info!("No saved session to restore"),
        RestoreReport::Restored { session } => info!(
            "Restored session {} ({:?}, {}s left)",
            session.id, session.state, session.remaining_secs
        ),
        RestoreReport::Invalidated { outcome } => warn!(
            "Saved session {} invalidated after {}s away",
            outcome.id, outcome.interruption_secs
        ),
        RestoreReport::Discarded { reason } => warn!("Saved session discarded: {}", reason),
    }
}

/// Persist the latest checkpoint whenever it changes. Intermediate values
/// are skipped if the store is slower than the actor.
async fn run_checkpoint_writer(
    mut store: Box<dyn CheckpointStore>,
    mut updates: watch::Receiver<Option<Checkpoint>>,
) {
    loop {
        let latest = updates.borrow_and_update().clone();
        store = match tokio::task::spawn_blocking(move || {
            persist(store.as_mut(), latest.as_ref());
            store
        })
        .await
        {
            Ok(store) => store,
            Err(err) => {
                error!("Checkpoint writer failed: {}", err);
                return;
            }
        };

        if updates.changed().await.is_err() {
            break;
        }
    }
}

fn persist(store: &mut dyn CheckpointStore, checkpoint: Option<&Checkpoint>) {
    let result = match checkpoint {
        Some(checkpoint) => store.save(checkpoint),
        None => store.clear(),
    };
    if let Err(err) = result {
        warn!("Failed to write checkpoint: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::repository::MemoryCheckpointStore;
    use crate::session::SessionState;
    use chrono::Utc;
    use std::time::Duration;

    #[tokio::test]
    async fn checkpoint_follows_the_session_and_survives_shutdown() {
        let clock = ManualClock::new(Utc::now());
        let store = MemoryCheckpointStore::new();
        let service = spawn_session_service_with(
            TimerConfig::default(),
            Arc::new(clock.clone()),
            Box::new(store.clone()),
            EventBus::new(),
            TickMode::Manual,
        )
        .unwrap();
        assert_eq!(service.restore, RestoreReport::Empty);

        let session = service.handle.start(25).await.unwrap();
        clock.advance(Duration::from_secs(1));
        service.handle.tick().await.unwrap();
        service.shutdown().await;

        let saved = store.current().unwrap();
        assert_eq!(saved.id, session.id);
        assert_eq!(saved.state, SessionState::Running);
        assert_eq!(saved.remaining_ms, 1_499_000);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_spawning() {
        let mut config = TimerConfig::default();
        config.tick_interval_ms = 10;
        let result = spawn_session_service(
            config,
            Arc::new(ManualClock::new(Utc::now())),
            Box::new(MemoryCheckpointStore::new()),
            EventBus::new(),
        );
        assert!(matches!(result, Err(CoreError::Config(_))));
    }

    #[tokio::test]
    async fn handles_fail_after_shutdown() {
        let service = spawn_session_service_with(
            TimerConfig::default(),
            Arc::new(ManualClock::new(Utc::now())),
            Box::new(MemoryCheckpointStore::new()),
            EventBus::new(),
            TickMode::Manual,
        )
        .unwrap();
        let handle = service.handle.clone();
        service.shutdown().await;
        assert!(handle.current_state().await.is_err());
    }
}
