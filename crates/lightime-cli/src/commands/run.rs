use std::sync::Arc;

use clap::Args;
use lightime_core::{
    spawn_session_service, CommandReply, ConfigWatcher, EventBus, RestoreReport, SessionEvent,
    SessionHandle, SqliteCheckpointStore, SystemClock, TimerConfig,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use super::Paths;

#[derive(Args)]
pub struct RunArgs {
    /// Session length in minutes (1-240)
    #[arg(long, conflicts_with = "preset")]
    pub minutes: Option<u32>,
    /// Use a configured preset by index
    #[arg(long)]
    pub preset: Option<usize>,
    /// Do not reload the config file when it changes
    #[arg(long)]
    pub no_watch: bool,
}

/// Restore or start a session and stream its events as JSON lines.
///
/// Reads `p`/`pause`, `r`/`resume`, `s`/`stop` and `status` from stdin.
/// Ctrl-C stops the session.
pub fn run(args: RunArgs, paths: &Paths) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_session(args, paths))
}

async fn run_session(args: RunArgs, paths: &Paths) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = paths.config_path()?;
    let config = TimerConfig::load_or_init(&config_path)?;
    let store = SqliteCheckpointStore::open(&paths.db_path()?)?;

    let bus = EventBus::new();
    let mut events = bus.subscribe();
    let service = spawn_session_service(config, Arc::new(SystemClock::new()), Box::new(store), bus)?;
    let handle = service.handle.clone();
    println!("{}", serde_json::json!({ "restore": service.restore }));

    // Forward whatever the restore published before deciding to start.
    while let Ok(event) = events.try_recv() {
        print_event(&event)?;
    }

    if let RestoreReport::Restored { .. } = service.restore {
        if args.minutes.is_some() || args.preset.is_some() {
            warn!("Continuing the restored session; duration flags ignored");
        }
    } else {
        let started = match (args.minutes, args.preset) {
            (Some(minutes), _) => handle.start(minutes).await,
            (None, Some(index)) => handle.start_preset(index).await,
            (None, None) => handle.start_default().await,
        };
        if let Err(e) = started {
            service.shutdown().await;
            return Err(e.into());
        }
    }

    let _watcher = if args.no_watch {
        None
    } else {
        match ConfigWatcher::spawn(config_path, handle.clone()) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!("Config hot reload disabled: {}", e);
                None
            }
        }
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                print_event(&event)?;
                if event.outcome().is_some() {
                    break;
                }
            }
            line = lines.next_line(), if stdin_open => {
                match line? {
                    Some(line) => {
                        if !handle_input(line.trim(), &handle).await? {
                            break;
                        }
                    }
                    None => stdin_open = false,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if !stop(&handle).await? {
                    break;
                }
            }
        }
    }

    // Events published after the terminal one (none expected) are dropped.
    service.shutdown().await;
    Ok(())
}

/// Returns `false` when there is nothing left to wait for.
async fn handle_input(line: &str, handle: &SessionHandle) -> Result<bool, Box<dyn std::error::Error>> {
    let result = match line {
        "" => return Ok(true),
        "p" | "pause" => handle.pause().await.map(|_| ()),
        "r" | "resume" => handle.resume().await.map(|_| ()),
        "s" | "stop" => return stop(handle).await,
        "status" => {
            let status = handle.current_state().await?;
            println!("{}", serde_json::json!({ "status": status }));
            Ok(())
        }
        other => {
            eprintln!("unknown command: {other} (pause, resume, stop, status)");
            Ok(())
        }
    };
    if let Err(e) = result {
        eprintln!("error: {e}");
    }
    Ok(true)
}

/// Returns `false` if there was no session to stop.
async fn stop(handle: &SessionHandle) -> Result<bool, Box<dyn std::error::Error>> {
    match handle.stop().await? {
        CommandReply::AlreadyStopped => Ok(false),
        // The SessionEnded event ends the loop.
        _ => Ok(true),
    }
}

fn print_event(event: &SessionEvent) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}
