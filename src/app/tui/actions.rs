use std::sync::mpsc;

use tracing::{error, warn};

use crate::db::Database;

use super::super::AppContext;
use super::super::cache::WatchEntry;
use super::super::decision::Action;
use super::super::error::ActionError;
use super::super::library::{DocumentStore, SettingsStore};
use super::super::maintenance::{self, RefreshSummary};
use super::super::orchestrator::{ActionReport, Orchestrator};
use super::super::player::Player;
use super::prompt::TuiPrompter;
use super::session::TuiSession;
use super::{PendingConfirm, PendingNotice, TuiState, TuiTerminal, View};

pub(super) type RefreshOutcome = Result<RefreshSummary, String>;

/// Reloads both collections. A failed read keeps the lists already on screen.
pub(super) fn refresh_items(db: &Database, state: &mut TuiState, preferred_name: Option<&str>) {
    let library = match db.load() {
        Ok(library) => library,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "reload failed; keeping previous lists");
            state.status = status_error(&format!("Reload failed: {err}"));
            return;
        }
    };
    state.library = library.cache;
    state.queue = library.queue;

    let rows = state.rows();
    if rows == 0 {
        state.table_state.select(None);
        return;
    }

    if state.view == View::Library
        && let Some(name) = preferred_name
        && let Some(idx) = state.library.iter().position(|entry| entry.name == name)
    {
        state.table_state.select(Some(idx));
        return;
    }

    match state.table_state.selected() {
        Some(selected) => state.table_state.select(Some(selected.min(rows - 1))),
        None => state.table_state.select(Some(0)),
    }
}

pub(super) fn status_info(msg: &str) -> String {
    format!("INFO: {msg}")
}

pub(super) fn status_error(msg: &str) -> String {
    format!("ERROR: {msg}")
}

/// Runs totals refresh on a worker with its own connection. The caller keeps
/// at most one in flight.
pub(super) fn spawn_refresh(ctx: &AppContext, tx: mpsc::Sender<RefreshOutcome>) {
    let db_path = ctx.config.db_path.clone();
    let resolver = ctx.resolver.clone();
    std::thread::spawn(move || {
        let outcome = Database::open(&db_path)
            .and_then(|db| {
                db.migrate()?;
                maintenance::refresh_totals(&db, &resolver)
            })
            .map_err(|err| format!("{err:#}"));
        let _ = tx.send(outcome);
    });
}

pub(super) fn confirm_pending(db: &Database, confirm: &PendingConfirm) -> String {
    let result = match confirm {
        PendingConfirm::RemoveEntry { name } => maintenance::remove_entry(db, name)
            .map(|removed| removal_message(removed, name, "Stopped tracking")),
        PendingConfirm::RemoveQueued { name } => maintenance::remove_queued(db, name)
            .map(|removed| removal_message(removed, name, "Dropped queued downloads for")),
        PendingConfirm::ClearQueue { .. } => maintenance::clear_queue(db)
            .map(|cleared| status_info(&format!("Cleared {cleared} queued series."))),
    };
    result.unwrap_or_else(|err| status_error(&format!("Update failed: {err:#}")))
}

fn removal_message(removed: bool, name: &str, verb: &str) -> String {
    if removed {
        status_info(&format!("{verb} {name}."))
    } else {
        status_error(&format!("{name} no longer exists."))
    }
}

pub(super) fn export_queue_script(ctx: &AppContext) -> (String, Option<PendingNotice>) {
    let path = &ctx.config.queue_script_path;
    match maintenance::export_queue(&ctx.db, Some(path.as_path())) {
        Ok(script) if script.is_empty() => (status_info("The queue is empty."), None),
        Ok(script) => {
            let count = script.lines().count();
            (
                status_info(&format!("Exported {count} commands. Queue cleared.")),
                Some(PendingNotice {
                    title: "Queue Exported",
                    message: format!(
                        "{count} commands written to\n\n{}\n\nRun it with `sh`.\n\nPress any key to continue.",
                        path.display()
                    ),
                }),
            )
        }
        Err(err) => (status_error(&format!("Export failed: {err:#}")), None),
    }
}

pub(super) struct EntryOutcome {
    pub(super) status: String,
    pub(super) notice: Option<PendingNotice>,
    pub(super) changed: bool,
}

impl EntryOutcome {
    fn info(message: String, changed: bool) -> Self {
        Self {
            status: status_info(&message),
            notice: None,
            changed,
        }
    }
}

/// Runs an action with modal prompts drawn in place. Playback suspends the
/// TUI while the player owns the terminal.
pub(super) fn run_entry_action(
    ctx: &AppContext,
    terminal: &mut TuiTerminal,
    session: &mut TuiSession,
    entry: &WatchEntry,
    action: Action,
) -> EntryOutcome {
    let result = {
        let mut prompter = TuiPrompter::new(terminal);
        let mut orchestrator =
            Orchestrator::new(&ctx.db, &ctx.resolver, &ctx.links, Some(&mut prompter));
        orchestrator.run_action(entry, action)
    };

    let report = match result {
        Ok(report) => report,
        Err(err) => {
            if let Some(action_err) = err.downcast_ref::<ActionError>()
                && action_err.is_selection()
            {
                return EntryOutcome::info(format!("{action_err}. Nothing was changed."), false);
            }
            error!(series = %entry.name, %action, error = %format!("{err:#}"), "action failed");
            return EntryOutcome {
                status: status_error(&format!("{action} failed for {}: {err:#}", entry.name)),
                notice: None,
                changed: false,
            };
        }
    };

    match &report {
        ActionReport::AtEnd => EntryOutcome {
            status: status_info("No next episode available."),
            notice: Some(PendingNotice {
                title: "Last Episode",
                message: format!("{}\n\nPress any key to continue.", report.message(&entry.name)),
            }),
            changed: false,
        },
        ActionReport::Played {
            episode, source, ..
        } => play_in_foreground(ctx, session, entry, *episode, source, report.message(&entry.name)),
        ActionReport::Cancelled | ActionReport::Undefined { .. } => {
            EntryOutcome::info(report.message(&entry.name), false)
        }
        ActionReport::Registered { .. } | ActionReport::Queued { .. } => {
            EntryOutcome::info(report.message(&entry.name), true)
        }
    }
}

fn play_in_foreground(
    ctx: &AppContext,
    session: &mut TuiSession,
    entry: &WatchEntry,
    episode: u32,
    source: &str,
    message: String,
) -> EntryOutcome {
    let player = match ctx.db.load_settings() {
        Ok(settings) => Player::from_setting(&settings.player),
        Err(err) => {
            warn!(error = %format!("{err:#}"), "settings unreadable; not launching a player");
            None
        }
    };
    let Some(player) = player else {
        return EntryOutcome {
            status: status_info(&message),
            notice: Some(PendingNotice {
                title: "Source",
                message: format!("{source}\n\nPress any key to continue."),
            }),
            changed: true,
        };
    };

    let played = session
        .suspended(|| player.play(source, &format!("{} - {episode}", entry.name)));
    match played {
        Ok(()) => EntryOutcome::info(message, true),
        Err(err) => EntryOutcome {
            status: status_error(&format!("Progress saved, but the player failed: {err:#}")),
            notice: None,
            changed: true,
        },
    }
}
