use std::path::PathBuf;

/// Returns `~/.config/lightime[-dev]/` based on LIGHTIME_ENV.
///
/// Set LIGHTIME_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("LIGHTIME_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("lightime-dev")
    } else {
        base_dir.join("lightime")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Default location of the checkpoint database.
///
/// # Errors
/// Returns an error if the data directory cannot be created.
pub fn default_db_path() -> std::io::Result<PathBuf> {
    Ok(data_dir()?.join("lightime.db"))
}
