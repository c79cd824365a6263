use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use super::commands::SessionCommand;

/// Spawn the periodic tick producer.
///
/// Ticks carry no elapsed time of their own; the actor reads the clock
/// when it processes one, so a late or missed tick only delays the
/// update. The task ends when the actor's channel closes.
pub fn spawn_tick_scheduler(sender: mpsc::Sender<SessionCommand>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if sender
                .send(SessionCommand::Tick { respond_to: None })
                .await
                .is_err()
            {
                debug!("Tick scheduler stopping: session channel closed");
                break;
            }
        }
    })
}
