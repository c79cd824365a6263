//! Hot reload of the TOML configuration file.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::TimerConfig;
use crate::error::{ConfigError, CoreError, SessionError};
use crate::service::SessionHandle;

/// Read, validate and apply the config file at `path`.
///
/// # Errors
/// `LoadFailed`, `ParseFailed` or `InvalidValue` leave the running
/// configuration untouched; `ServiceUnavailable` if the service is gone.
pub async fn reload_from_file(path: &Path, handle: &SessionHandle) -> Result<(), CoreError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    let config = TimerConfig::from_toml_str(&content)?;
    handle.reload_config(config).await
}

/// Watches the config file and pushes every valid change into the
/// session service. Dropping the watcher stops it.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl ConfigWatcher {
    /// Start watching `path`. The parent directory is watched so that
    /// editors which replace the file on save are still seen.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns `WatchFailed` if the file system watcher cannot be set up.
    pub fn spawn(path: PathBuf, handle: SessionHandle) -> Result<Self, ConfigError> {
        let watch_failed = |e: notify::Error| ConfigError::WatchFailed {
            path: path.clone(),
            message: e.to_string(),
        };
        let dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let file_name = path.file_name().map(|name| name.to_os_string());

        // Capacity 1: a burst of writes collapses into one reload.
        let (tx, mut rx) = mpsc::channel::<()>(1);
        let mut watcher =
            notify::recommended_watcher(move |res: std::result::Result<Event, notify::Error>| {
                match res {
                    Ok(event) => {
                        let relevant = matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
                            && event
                                .paths
                                .iter()
                                .any(|p| p.file_name() == file_name.as_deref());
                        if relevant {
                            let _ = tx.try_send(());
                        }
                    }
                    Err(e) => warn!("Config watch error: {}", e),
                }
            })
            .map_err(watch_failed)?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(watch_failed)?;
        info!("Watching {} for configuration changes", path.display());

        let task = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                match reload_from_file(&path, &handle).await {
                    Ok(()) => debug!("Applied configuration from {}", path.display()),
                    Err(CoreError::Session(SessionError::ServiceUnavailable)) => {
                        debug!("Config watcher stopping: session service is gone");
                        break;
                    }
                    Err(e) => warn!("Keeping previous configuration: {}", e),
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            task,
        })
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}
