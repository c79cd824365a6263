pub mod checkpoint;
pub mod config;
pub mod run;

use std::path::PathBuf;

use lightime_core::storage::default_db_path;
use lightime_core::TimerConfig;

/// File locations, overridable with `--config` and `--db`.
pub struct Paths {
    pub config: Option<PathBuf>,
    pub db: Option<PathBuf>,
}

impl Paths {
    pub fn config_path(&self) -> Result<PathBuf, Box<dyn std::error::Error>> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => Ok(TimerConfig::default_path()?),
        }
    }

    pub fn db_path(&self) -> Result<PathBuf, Box<dyn std::error::Error>> {
        match &self.db {
            Some(path) => Ok(path.clone()),
            None => Ok(default_db_path()?),
        }
    }
}
