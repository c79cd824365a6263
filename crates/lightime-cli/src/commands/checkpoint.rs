use clap::Subcommand;
use lightime_core::{CheckpointStore, SqliteCheckpointStore};

use super::Paths;

#[derive(Subcommand)]
pub enum CheckpointAction {
    /// Print the saved session as JSON (null if none)
    Show,
    /// Drop the saved session
    Clear,
}

pub fn run(action: CheckpointAction, paths: &Paths) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = SqliteCheckpointStore::open(&paths.db_path()?)?;
    match action {
        CheckpointAction::Show => {
            let checkpoint = store.load()?;
            println!("{}", serde_json::to_string_pretty(&checkpoint)?);
        }
        CheckpointAction::Clear => {
            store.clear()?;
            println!("checkpoint cleared");
        }
    }
    Ok(())
}
