use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "aniqueue",
    version,
    about = "Track series progress and queue episode downloads"
)]
pub struct Cli {
    /// SQLite database holding the library and settings.
    #[arg(long, global = true, env = "ANIQUEUE_DB", value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Base URL of the consumet API.
    #[arg(long, global = true, env = "ANIQUEUE_API_BASE", value_name = "URL")]
    pub api_base: Option<String>,

    /// Directory the generated download commands write into.
    #[arg(long, global = true, env = "ANIQUEUE_DOWNLOAD_DIR", value_name = "DIR")]
    pub download_dir: Option<String>,

    /// Never ask; fail when an answer is needed.
    #[arg(long, global = true)]
    pub no_prompt: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search the provider for a series.
    Search { query: Vec<String> },
    /// Register a search hit with no progress.
    Add(HitArgs),
    /// Play an episode of a search hit.
    Watch(HitArgs),
    /// Queue downloads for a search hit.
    Download(HitArgs),
    /// Play the episode after the current one.
    Next(EntryArgs),
    /// Play the current episode again.
    Resume(EntryArgs),
    /// Play a chosen episode.
    Choose(EntryArgs),
    /// Queue downloads from the next episode up to a chosen one.
    Continue(EntryArgs),
    /// Queue downloads for a chosen range.
    Jump(EntryArgs),
    /// Show the tracked series.
    List,
    /// Stop tracking a series.
    Remove { name: String },
    /// Mark a series as fully watched and toggle its unread badge.
    MarkWatched { name: String },
    /// Re-fetch episode totals for every tracked series.
    Refresh,
    #[command(subcommand)]
    Queue(QueueCommand),
    #[command(subcommand)]
    Settings(SettingsCommand),
    Tui,
}

#[derive(Debug, Args)]
pub struct HitArgs {
    #[arg(required = true)]
    pub query: Vec<String>,

    /// Use the Nth search hit instead of asking.
    #[arg(long, value_name = "N")]
    pub pick: Option<usize>,
}

impl HitArgs {
    pub fn query(&self) -> String {
        self.query.join(" ")
    }
}

#[derive(Debug, Args)]
pub struct EntryArgs {
    /// Tracked series name; defaults to the most recent one.
    pub name: Vec<String>,
}

impl EntryArgs {
    pub fn name(&self) -> Option<String> {
        (!self.name.is_empty()).then(|| self.name.join(" "))
    }
}

#[derive(Debug, Subcommand)]
pub enum QueueCommand {
    /// List queued series and their episode ranges.
    Show,
    /// Print or write every queued command, then clear the queue.
    Export {
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    Clear,
    Remove { name: String },
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    Show,
    /// Pick qualities automatically from the preference order.
    SetAuto {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
    /// Replace the quality preference order, best first.
    SetOrder {
        #[arg(required = true)]
        tags: Vec<String>,
    },
    SetProvider { provider: String },
    /// Player command; leave empty to only print sources.
    SetPlayer { command: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn multi_word_names_are_joined() {
        let cli = Cli::try_parse_from(["aniqueue", "continue", "Spy", "x", "Family"]).expect("parse");
        let Some(Command::Continue(args)) = cli.command else {
            panic!("expected continue");
        };
        assert_eq!(args.name().as_deref(), Some("Spy x Family"));
    }

    #[test]
    fn entry_name_is_optional() {
        let cli = Cli::try_parse_from(["aniqueue", "next"]).expect("parse");
        let Some(Command::Next(args)) = cli.command else {
            panic!("expected next");
        };
        assert_eq!(args.name(), None);
    }

    #[test]
    fn global_flags_work_after_the_command() {
        let cli = Cli::try_parse_from([
            "aniqueue",
            "download",
            "frieren",
            "--pick",
            "2",
            "--no-prompt",
            "--download-dir",
            "/srv/anime",
        ])
        .expect("parse");
        assert!(cli.no_prompt);
        assert_eq!(cli.download_dir.as_deref(), Some("/srv/anime"));
        let Some(Command::Download(args)) = cli.command else {
            panic!("expected download");
        };
        assert_eq!(args.pick, Some(2));
        assert_eq!(args.query(), "frieren");
    }

    #[test]
    fn set_auto_takes_a_boolean() {
        let cli = Cli::try_parse_from(["aniqueue", "settings", "set-auto", "false"]).expect("parse");
        assert!(matches!(
            cli.command,
            Some(Command::Settings(SettingsCommand::SetAuto { enabled: false }))
        ));
    }
}
