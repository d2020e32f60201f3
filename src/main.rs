mod app;
mod cli;
mod config;
mod db;
mod http;
mod logging;
mod paths;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    let config = config::Config::from_cli(&cli)?;
    if let Err(err) = logging::init(&config.log_path) {
        eprintln!("logging disabled: {err:#}");
    }
    app::run(cli, config)
}
