pub(crate) mod cache;
mod decision;
mod error;
pub(crate) mod library;
mod maintenance;
mod orchestrator;
mod player;
mod prompt;
mod quality;
mod queue;
mod ranges;
mod resolver;
mod tui;

#[cfg(test)]
mod tests;

use std::io;

use anyhow::{Result, anyhow, bail};
use tracing::{error, info};

use crate::cli::{Cli, Command, HitArgs, QueueCommand, SettingsCommand};
use crate::config::Config;
use crate::db::Database;

use self::cache::{WatchEntry, format_progress_display, format_updated_display, truncate};
use self::decision::Action;
use self::error::ActionError;
use self::library::{DocumentStore, Provider, SettingsStore};
use self::orchestrator::{ActionReport, Orchestrator, find_entry};
use self::player::Player;
use self::prompt::{Answer, LinePrompter, NumberBounds, Prompter};
use self::quality::normalize_tag;
use self::queue::LinkBuilder;
use self::resolver::{ConsumetClient, MetadataResolver};

/// Everything a command needs: configuration, the store and the remote resolver.
pub(crate) struct AppContext {
    pub(crate) config: Config,
    pub(crate) db: Database,
    pub(crate) resolver: ConsumetClient,
    pub(crate) links: LinkBuilder,
}

impl AppContext {
    fn open(config: Config) -> Result<Self> {
        let db = Database::open(&config.db_path)?;
        db.migrate()?;
        let settings = db.load_settings()?;
        let resolver = ConsumetClient::new(&config.api_base, settings.provider);
        let links = LinkBuilder::new(config.download_dir.clone());
        Ok(Self {
            config,
            db,
            resolver,
            links,
        })
    }
}

pub fn run(cli: Cli, config: Config) -> Result<()> {
    let ctx = AppContext::open(config)?;
    info!(command = ?cli.command, "starting");

    match cli.command {
        Some(Command::Search { query }) => run_search(&ctx, &query.join(" "))?,
        Some(Command::Add(args)) => run_hit_action(&ctx, &args, Action::Add)?,
        Some(Command::Watch(args)) => run_hit_action(&ctx, &args, Action::Watch)?,
        Some(Command::Download(args)) => run_hit_action(&ctx, &args, Action::Download)?,
        Some(Command::Next(args)) => run_entry_action(&ctx, args.name(), Action::Next)?,
        Some(Command::Resume(args)) => run_entry_action(&ctx, args.name(), Action::Resume)?,
        Some(Command::Choose(args)) => run_entry_action(&ctx, args.name(), Action::Choose)?,
        Some(Command::Continue(args)) => run_entry_action(&ctx, args.name(), Action::Continue)?,
        Some(Command::Jump(args)) => run_entry_action(&ctx, args.name(), Action::Jump)?,
        Some(Command::List) => run_list(&ctx.db)?,
        Some(Command::Remove { name }) => {
            if maintenance::remove_entry(&ctx.db, &name)? {
                println!("Removed {name}.");
            } else {
                println!("{name} is not in your list.");
            }
        }
        Some(Command::MarkWatched { name }) => {
            let entry = maintenance::mark_watched(&ctx.db, &name)?;
            println!(
                "{} is now at {} ({}).",
                entry.name,
                format_progress_display(&entry),
                if entry.is_unread { "unread" } else { "read" }
            );
        }
        Some(Command::Refresh) => run_refresh(&ctx)?,
        Some(Command::Queue(command)) => run_queue(&ctx, command)?,
        Some(Command::Settings(command)) => run_settings(&ctx.db, command)?,
        Some(Command::Tui) | None => tui::run_tui(&ctx)?,
    }

    Ok(())
}

fn run_search(ctx: &AppContext, query: &str) -> Result<()> {
    let hits = ctx.resolver.search(query)?;
    if hits.is_empty() {
        println!("No results for '{query}'.");
        return Ok(());
    }
    print_hits(&hits);
    Ok(())
}

fn print_hits(hits: &[WatchEntry]) {
    println!("{:<4} {:<56} {:<20}", "#", "TITLE", "ID");
    for (idx, hit) in hits.iter().enumerate() {
        println!(
            "{:<4} {:<56} {:<20}",
            idx + 1,
            truncate(&hit.name, 56),
            truncate(&hit.source, 20)
        );
    }
}

type StdioPrompter = LinePrompter<io::StdinLock<'static>, io::Stdout>;

/// Stdin is locked once per command and only when prompts are allowed.
fn stdio_prompter(ctx: &AppContext) -> Option<StdioPrompter> {
    ctx.config.interactive.then(StdioPrompter::stdio)
}

fn as_prompter(line: &mut Option<StdioPrompter>) -> Option<&mut dyn Prompter> {
    match line {
        Some(line) => Some(line as &mut dyn Prompter),
        None => None,
    }
}

fn run_hit_action(ctx: &AppContext, args: &HitArgs, action: Action) -> Result<()> {
    let query = args.query();
    let hits = ctx.resolver.search(&query)?;
    let mut line = stdio_prompter(ctx);

    let Some(hit) = pick_hit(hits, &query, args.pick, as_prompter(&mut line))? else {
        println!("Nothing selected.");
        return Ok(());
    };
    perform(ctx, &hit, action, as_prompter(&mut line))
}

/// Chooses one search hit: an explicit `--pick`, an exact title match, a lone
/// hit, or else whatever the user answers.
fn pick_hit(
    hits: Vec<WatchEntry>,
    query: &str,
    pick: Option<usize>,
    prompter: Option<&mut dyn Prompter>,
) -> Result<Option<WatchEntry>> {
    if hits.is_empty() {
        bail!("no results for '{query}'");
    }
    if let Some(pick) = pick {
        let count = hits.len();
        return pick
            .checked_sub(1)
            .and_then(|idx| hits.into_iter().nth(idx))
            .map(Some)
            .ok_or_else(|| anyhow!("--pick {pick} is outside 1..={count}"));
    }
    if let Some(idx) = hits
        .iter()
        .position(|hit| hit.name.eq_ignore_ascii_case(query.trim()))
    {
        return Ok(hits.into_iter().nth(idx));
    }
    if hits.len() == 1 {
        return Ok(hits.into_iter().next());
    }

    let Some(prompter) = prompter else {
        print_hits(&hits);
        bail!("'{query}' matches {} series; choose one with --pick", hits.len());
    };
    print_hits(&hits);
    let bounds = NumberBounds {
        max: hits.len() as u32,
        initial: 1,
    };
    match prompter.ask_number("Which series?", bounds) {
        Answer::Picked(choice) if choice >= 1 && choice as usize <= hits.len() => {
            Ok(hits.into_iter().nth(choice as usize - 1))
        }
        Answer::Picked(choice) => Err(ActionError::OutOfBounds {
            value: choice,
            max: bounds.max,
        }
        .into()),
        Answer::Cancelled => Ok(None),
    }
}

fn run_entry_action(ctx: &AppContext, name: Option<String>, action: Action) -> Result<()> {
    let entry = find_entry(&ctx.db, name.as_deref())?;
    let mut line = stdio_prompter(ctx);
    perform(ctx, &entry, action, as_prompter(&mut line))
}

fn perform<'a>(
    ctx: &'a AppContext,
    entry: &WatchEntry,
    action: Action,
    prompter: Option<&'a mut dyn Prompter>,
) -> Result<()> {
    let mut orchestrator = Orchestrator::new(&ctx.db, &ctx.resolver, &ctx.links, prompter);

    let report = match orchestrator.run_action(entry, action) {
        Ok(report) => report,
        Err(err) => {
            if let Some(action_err) = err.downcast_ref::<ActionError>()
                && action_err.is_selection()
            {
                println!("{action_err}. Nothing was changed.");
                return Ok(());
            }
            error!(series = %entry.name, %action, error = %format!("{err:#}"), "action failed");
            return Err(err.context(format!("{action} failed for {}", entry.name)));
        }
    };

    println!("{}", report.message(&entry.name));
    if let ActionReport::Played {
        episode, source, ..
    } = &report
    {
        launch_player(&ctx.db, &entry.name, *episode, source)?;
    }
    Ok(())
}

fn launch_player(db: &Database, name: &str, episode: u32, source: &str) -> Result<()> {
    let settings = db.load_settings()?;
    let Some(player) = Player::from_setting(&settings.player) else {
        println!("Source: {source}");
        return Ok(());
    };
    if let Err(err) = player.play(source, &format!("{name} - {episode}")) {
        println!("Player failed: {err:#}");
        println!("Source: {source}");
    }
    Ok(())
}

fn run_list(db: &Database) -> Result<()> {
    let cache = db.load()?.cache;
    if cache.is_empty() {
        println!("No tracked series yet. Run `aniqueue add <title>` first.");
        return Ok(());
    }

    println!(
        "{:<44} {:<12} {:<7} {:<18}",
        "TITLE", "PROGRESS", "UNREAD", "UPDATED"
    );
    for entry in cache {
        println!(
            "{:<44} {:<12} {:<7} {:<18}",
            truncate(&entry.name, 44),
            format_progress_display(&entry),
            if entry.is_unread { "*" } else { "" },
            format_updated_display(entry.updated_at.as_deref())
        );
    }
    Ok(())
}

fn run_refresh(ctx: &AppContext) -> Result<()> {
    let summary = maintenance::refresh_totals(&ctx.db, &ctx.resolver)?;
    println!(
        "Checked {} series, {} updated.",
        summary.checked, summary.changed
    );
    if !summary.failed.is_empty() {
        println!("Kept unchanged after lookup errors: {}", summary.failed.join(", "));
    }
    Ok(())
}

fn run_queue(ctx: &AppContext, command: QueueCommand) -> Result<()> {
    match command {
        QueueCommand::Show => {
            let queue = ctx.db.load()?.queue;
            if queue.is_empty() {
                println!("The download queue is empty.");
                return Ok(());
            }
            println!("{:<44} {:<28} {:<8}", "TITLE", "EPISODES", "COMMANDS");
            for item in queue {
                println!(
                    "{:<44} {:<28} {:<8}",
                    truncate(&item.name, 44),
                    truncate(&item.episodes.to_string(), 28),
                    item.pending_commands()
                );
            }
        }
        QueueCommand::Export { output } => {
            let script = maintenance::export_queue(&ctx.db, output.as_deref())?;
            if script.is_empty() {
                println!("The download queue is empty.");
            } else if let Some(path) = output {
                println!(
                    "Wrote {} commands to {}. Queue cleared.",
                    script.lines().count(),
                    path.display()
                );
            } else {
                println!("{script}");
            }
        }
        QueueCommand::Clear => {
            let cleared = maintenance::clear_queue(&ctx.db)?;
            println!("Cleared {cleared} queued series.");
        }
        QueueCommand::Remove { name } => {
            if maintenance::remove_queued(&ctx.db, &name)? {
                println!("Removed {name} from the queue.");
            } else {
                println!("{name} is not queued.");
            }
        }
    }
    Ok(())
}

fn run_settings(db: &Database, command: SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::Show => {
            let settings = db.load_settings()?;
            println!("Provider:      {}", settings.provider.label());
            println!(
                "Auto quality:  {}",
                if settings.auto_quality { "on" } else { "off" }
            );
            println!("Quality order: {}", settings.quality_order.join(", "));
            println!(
                "Player:        {}",
                if settings.player.is_empty() {
                    "(print source only)"
                } else {
                    settings.player.as_str()
                }
            );
        }
        SettingsCommand::SetAuto { enabled } => {
            db.save_auto_quality(enabled)?;
            println!("Auto quality {}.", if enabled { "on" } else { "off" });
        }
        SettingsCommand::SetOrder { tags } => {
            let order = tags.iter().map(|tag| normalize_tag(tag)).collect::<Vec<_>>();
            db.save_quality_order(&order)?;
            println!("Quality order: {}", order.join(", "));
        }
        SettingsCommand::SetProvider { provider } => {
            let provider = provider.parse::<Provider>().map_err(|err| anyhow!(err))?;
            db.save_provider(provider)?;
            println!("Provider set to {}.", provider.label());
        }
        SettingsCommand::SetPlayer { command } => {
            let command = command.join(" ");
            db.save_player(command.trim())?;
            if command.trim().is_empty() {
                println!("No player; sources will be printed.");
            } else {
                println!("Player set to {}.", command.trim());
            }
        }
    }
    Ok(())
}
