mod actions;
mod prompt;
mod render;
mod session;

use std::io;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::TableState;

use super::AppContext;
use super::cache::{Progress, WatchEntry, truncate};
use super::decision::Action;
use super::library::SettingsStore;
use super::queue::QueueItem;
use super::resolver::MetadataResolver;

use self::actions::{
    RefreshOutcome, confirm_pending, export_queue_script, refresh_items, run_entry_action,
    spawn_refresh, status_error, status_info,
};
use self::render::draw_tui;
use self::session::TuiSession;

pub(super) type TuiTerminal = Terminal<CrosstermBackend<io::Stdout>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum View {
    Library,
    Search,
    Queue,
}

impl View {
    pub(super) fn label(self) -> &'static str {
        match self {
            Self::Library => "LIBRARY",
            Self::Search => "SEARCH",
            Self::Queue => "QUEUE",
        }
    }
}

/// Index into the actions offered for the selected row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) struct ActionCursor(usize);

impl ActionCursor {
    pub(super) fn move_left(self) -> Self {
        Self(self.0.saturating_sub(1))
    }

    pub(super) fn move_right(self, offered: usize) -> Self {
        Self((self.0 + 1).min(offered.saturating_sub(1)))
    }

    pub(super) fn pick(self, offered: &[Action]) -> Option<Action> {
        offered
            .get(self.0.min(offered.len().saturating_sub(1)))
            .copied()
    }
}

pub(super) fn offered_for(entry: &WatchEntry) -> &'static [Action] {
    let current = entry.progress().map(|progress| progress.current).unwrap_or(0);
    Action::offered(entry.is_registered(), current)
}

#[derive(Debug, Clone)]
pub(super) enum PendingConfirm {
    RemoveEntry { name: String },
    RemoveQueued { name: String },
    ClearQueue { items: usize },
}

impl PendingConfirm {
    pub(super) fn question(&self) -> String {
        match self {
            Self::RemoveEntry { name } => {
                format!("Stop tracking this series?\n\n{}", truncate(name, 56))
            }
            Self::RemoveQueued { name } => {
                format!("Drop queued downloads?\n\n{}", truncate(name, 56))
            }
            Self::ClearQueue { items } => format!("Clear the whole queue?\n\n{items} series"),
        }
    }
}

#[derive(Debug, Clone)]
pub(super) struct PendingNotice {
    pub(super) title: &'static str,
    pub(super) message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RefreshState {
    Idle,
    Running,
}

pub(super) struct TuiState {
    pub(super) view: View,
    pub(super) library: Vec<WatchEntry>,
    pub(super) hits: Vec<WatchEntry>,
    pub(super) queue: Vec<QueueItem>,
    pub(super) table_state: TableState,
    pub(super) cursor: ActionCursor,
    pub(super) status: String,
    pub(super) pending_confirm: Option<PendingConfirm>,
    pub(super) pending_notice: Option<PendingNotice>,
    pub(super) search_input: Option<String>,
    pub(super) refresh: RefreshState,
    pub(super) auto_quality: bool,
}

impl TuiState {
    fn new() -> Self {
        Self {
            view: View::Library,
            library: Vec::new(),
            hits: Vec::new(),
            queue: Vec::new(),
            table_state: TableState::default(),
            cursor: ActionCursor::default(),
            status: status_info("Ready."),
            pending_confirm: None,
            pending_notice: None,
            search_input: None,
            refresh: RefreshState::Idle,
            auto_quality: true,
        }
    }

    pub(super) fn rows(&self) -> usize {
        match self.view {
            View::Library => self.library.len(),
            View::Search => self.hits.len(),
            View::Queue => self.queue.len(),
        }
    }

    pub(super) fn selected_entry(&self) -> Option<&WatchEntry> {
        let idx = self.table_state.selected()?;
        match self.view {
            View::Library => self.library.get(idx),
            View::Search => self.hits.get(idx),
            View::Queue => None,
        }
    }

    pub(super) fn selected_queued(&self) -> Option<&QueueItem> {
        let idx = self.table_state.selected()?;
        match self.view {
            View::Queue => self.queue.get(idx),
            View::Library | View::Search => None,
        }
    }

    fn switch_to(&mut self, view: View) {
        self.view = view;
        self.cursor = ActionCursor::default();
        self.table_state.select((self.rows() > 0).then_some(0));
    }
}

pub(crate) fn run_tui(ctx: &AppContext) -> Result<()> {
    let mut session = TuiSession::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .context("failed to initialize terminal backend")?;
    terminal.clear()?;

    let mut state = TuiState::new();
    state.auto_quality = ctx.db.load_settings()?.auto_quality;
    refresh_items(&ctx.db, &mut state, None);
    if state.library.is_empty() {
        state.status = status_info("No tracked series yet. Press `s` to search.");
    }
    let (refresh_tx, refresh_rx) = mpsc::channel::<RefreshOutcome>();

    loop {
        while let Ok(outcome) = refresh_rx.try_recv() {
            state.refresh = RefreshState::Idle;
            state.status = match outcome {
                Ok(summary) if summary.failed.is_empty() => status_info(&format!(
                    "Refreshed {} series, {} updated.",
                    summary.checked, summary.changed
                )),
                Ok(summary) => status_error(&format!(
                    "Refreshed {} series; lookups failed for {}.",
                    summary.checked,
                    summary.failed.join(", ")
                )),
                Err(err) => status_error(&format!("Refresh failed: {err}")),
            };
            refresh_items(&ctx.db, &mut state, None);
        }

        terminal.draw(|frame| draw_tui(frame, &mut state))?;

        if !event::poll(Duration::from_millis(200))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if state.pending_notice.is_some() {
            state.pending_notice = None;
            continue;
        }

        if let Some(confirm) = state.pending_confirm.clone() {
            match key.code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    state.pending_confirm = None;
                    state.status = confirm_pending(&ctx.db, &confirm);
                    refresh_items(&ctx.db, &mut state, None);
                }
                KeyCode::Esc | KeyCode::Char('n') => {
                    state.pending_confirm = None;
                    state.status = status_info("Canceled.");
                }
                _ => {}
            }
            continue;
        }

        if let Some(input) = state.search_input.as_mut() {
            match key.code {
                KeyCode::Esc => {
                    state.search_input = None;
                    state.status = status_info("Search canceled.");
                }
                KeyCode::Backspace => {
                    input.pop();
                }
                KeyCode::Char(ch) => input.push(ch),
                KeyCode::Enter => {
                    let query = input.trim().to_string();
                    state.search_input = None;
                    if query.is_empty() {
                        continue;
                    }
                    state.status = status_info(&format!("Searching for '{query}'..."));
                    terminal.draw(|frame| draw_tui(frame, &mut state))?;
                    match ctx.resolver.search(&query) {
                        Ok(hits) => {
                            state.status =
                                status_info(&format!("{} results for '{query}'.", hits.len()));
                            state.hits = hits;
                            state.switch_to(View::Search);
                        }
                        // Keep whatever list was showing.
                        Err(err) => state.status = status_error(&format!("Search failed: {err:#}")),
                    }
                }
                _ => {}
            }
            continue;
        }

        match key.code {
            KeyCode::Char('q') => break,
            KeyCode::Esc if state.view == View::Search => state.switch_to(View::Library),
            KeyCode::Tab => {
                let next = match state.view {
                    View::Library | View::Search => View::Queue,
                    View::Queue => View::Library,
                };
                state.switch_to(next);
            }
            KeyCode::Char('s') | KeyCode::Char('/') => {
                state.search_input = Some(String::new());
                state.status = status_info("Type a title, Enter to search, Esc to cancel.");
            }
            KeyCode::Up => {
                if let Some(selected) = state.table_state.selected() {
                    state.table_state.select(Some(selected.saturating_sub(1)));
                    state.cursor = ActionCursor::default();
                }
            }
            KeyCode::Down => {
                if let Some(selected) = state.table_state.selected()
                    && state.rows() > 0
                {
                    let next = (selected + 1).min(state.rows() - 1);
                    state.table_state.select(Some(next));
                    state.cursor = ActionCursor::default();
                }
            }
            KeyCode::Left => state.cursor = state.cursor.move_left(),
            KeyCode::Right => {
                let offered = state.selected_entry().map(offered_for).unwrap_or(&[]);
                state.cursor = state.cursor.move_right(offered.len());
            }
            KeyCode::Char('r') => {
                if state.refresh == RefreshState::Running {
                    state.status = status_info("Refresh already running.");
                    continue;
                }
                state.refresh = RefreshState::Running;
                state.status = status_info("Refreshing episode totals...");
                spawn_refresh(ctx, refresh_tx.clone());
            }
            KeyCode::Char('a') => {
                let enabled = !state.auto_quality;
                match ctx.db.save_auto_quality(enabled) {
                    Ok(()) => {
                        state.auto_quality = enabled;
                        state.status = status_info(&format!(
                            "Auto quality {}.",
                            if enabled { "on" } else { "off" }
                        ));
                    }
                    Err(err) => state.status = status_error(&format!("Settings failed: {err}")),
                }
            }
            KeyCode::Char('w') if state.view == View::Library => {
                let Some(name) = state.selected_entry().map(|entry| entry.name.clone()) else {
                    continue;
                };
                match super::maintenance::mark_watched(&ctx.db, &name) {
                    Ok(entry) => {
                        state.status = status_info(&format!(
                            "{} marked {} ({}).",
                            entry.name,
                            if entry.is_unread { "unread" } else { "read" },
                            entry.episodes
                        ));
                        refresh_items(&ctx.db, &mut state, Some(&name));
                    }
                    Err(err) => state.status = status_error(&format!("{err:#}")),
                }
            }
            KeyCode::Char('d') => {
                state.pending_confirm = match state.view {
                    View::Library => state
                        .selected_entry()
                        .map(|entry| PendingConfirm::RemoveEntry {
                            name: entry.name.clone(),
                        }),
                    View::Queue => state
                        .selected_queued()
                        .map(|item| PendingConfirm::RemoveQueued {
                            name: item.name.clone(),
                        }),
                    View::Search => None,
                };
                if state.pending_confirm.is_none() {
                    state.status = status_error("Nothing selected to remove.");
                }
            }
            KeyCode::Char('c') if state.view == View::Queue && !state.queue.is_empty() => {
                state.pending_confirm = Some(PendingConfirm::ClearQueue {
                    items: state.queue.len(),
                });
            }
            KeyCode::Char('x') if state.view == View::Queue => {
                let (status, notice) = export_queue_script(ctx);
                state.status = status;
                state.pending_notice = notice;
                refresh_items(&ctx.db, &mut state, None);
            }
            KeyCode::Enter => {
                let Some(entry) = state.selected_entry().cloned() else {
                    continue;
                };
                let Some(action) = state.cursor.pick(offered_for(&entry)) else {
                    continue;
                };
                let outcome =
                    run_entry_action(ctx, &mut terminal, &mut session, &entry, action);
                state.status = outcome.status;
                state.pending_notice = outcome.notice;
                terminal.clear()?;

                if state.view == View::Search && action == Action::Add && outcome.changed {
                    state.switch_to(View::Library);
                }
                refresh_items(&ctx.db, &mut state, Some(&entry.name));
            }
            _ => {}
        }
    }

    terminal.show_cursor()?;
    session.leave()?;
    Ok(())
}

/// Ratio and label for the selected series' progress gauge.
pub(super) fn progress_gauge(entry: &WatchEntry) -> Option<(f64, String)> {
    let Progress { current, total } = entry.progress().ok()?;
    if total == 0 {
        return None;
    }
    let ratio = (f64::from(current) / f64::from(total)).clamp(0.0, 1.0);
    Some((ratio, format!("{current}/{total}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(episodes: &str) -> WatchEntry {
        WatchEntry {
            name: "Show".to_string(),
            source: "1".to_string(),
            episodes: episodes.to_string(),
            img: String::new(),
            is_unread: false,
            updated_at: None,
        }
    }

    #[test]
    fn cursor_stays_within_offered_actions() {
        let offered = offered_for(&entry("3/12"));
        let mut cursor = ActionCursor::default();
        for _ in 0..10 {
            cursor = cursor.move_right(offered.len());
        }
        assert_eq!(cursor.pick(offered), Some(Action::Jump));
        assert_eq!(cursor.move_left().pick(offered), Some(Action::Continue));
        assert_eq!(ActionCursor::default().move_left().pick(offered), Some(Action::Next));
    }

    #[test]
    fn search_hits_offer_add_watch_download() {
        assert_eq!(
            offered_for(&entry("0")),
            &[Action::Add, Action::Watch, Action::Download]
        );
        assert!(!offered_for(&entry("0/12")).contains(&Action::Resume));
    }

    #[test]
    fn cursor_past_a_shorter_list_picks_the_last_action() {
        let cursor = ActionCursor(4);
        assert_eq!(
            cursor.pick(offered_for(&entry("0"))),
            Some(Action::Download)
        );
        assert_eq!(cursor.pick(&[]), None);
    }

    #[test]
    fn gauge_reflects_progress() {
        assert_eq!(progress_gauge(&entry("3/12")), Some((0.25, "3/12".to_string())));
        assert_eq!(progress_gauge(&entry("0/0")), None);
        assert_eq!(progress_gauge(&entry("0")), None);
    }

    #[test]
    fn switching_views_resets_selection() {
        let mut state = TuiState::new();
        state.library = vec![entry("1/2"), entry("2/2")];
        state.table_state.select(Some(1));
        state.cursor = ActionCursor(3);
        state.switch_to(View::Queue);
        assert_eq!(state.table_state.selected(), None);
        assert_eq!(state.cursor, ActionCursor::default());
        state.switch_to(View::Library);
        assert_eq!(state.table_state.selected(), Some(0));
    }
}
