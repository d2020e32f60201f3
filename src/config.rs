use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::Result;

use crate::cli::Cli;
use crate::paths::{database_file_path, log_file_path, queue_script_path};

pub const DEFAULT_API_BASE: &str = "https://consumet-srgm.vercel.app";
pub const DEFAULT_DOWNLOAD_DIR: &str = "~/Documents";

/// Runtime configuration resolved from flags, environment and platform paths.
/// User preferences (quality order, provider, player) live in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub log_path: PathBuf,
    pub queue_script_path: PathBuf,
    pub api_base: String,
    pub download_dir: String,
    /// Whether prompts may be shown; off for `--no-prompt` or a non-terminal stdin.
    pub interactive: bool,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let db_path = match &cli.db {
            Some(path) => path.clone(),
            None => database_file_path()?,
        };
        Ok(Self {
            db_path,
            log_path: log_file_path()?,
            queue_script_path: queue_script_path()?,
            api_base: non_blank(cli.api_base.as_deref()).unwrap_or(DEFAULT_API_BASE).to_string(),
            download_dir: non_blank(cli.download_dir.as_deref())
                .unwrap_or(DEFAULT_DOWNLOAD_DIR)
                .trim_end_matches('/')
                .to_string(),
            interactive: !cli.no_prompt && std::io::stdin().is_terminal(),
        })
    }
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}
