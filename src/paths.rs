use std::path::PathBuf;

use anyhow::{Context, Result};

const APP_DIR: &str = "aniqueue";

pub fn data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("unable to resolve data directory")?;
    Ok(base.join(APP_DIR))
}

pub fn database_file_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("aniqueue.db"))
}

pub fn log_file_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("aniqueue.log"))
}

/// Where the TUI writes an exported download queue.
pub fn queue_script_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("queue.sh"))
}
