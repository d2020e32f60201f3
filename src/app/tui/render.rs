use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Cell, Clear, Gauge, List, ListItem, ListState, Padding, Paragraph,
    Row, Table, Wrap,
};

use super::super::cache::{WatchEntry, format_progress_display, format_updated_display, truncate};
use super::super::decision::Action;
use super::prompt::NumberInput;
use super::{ActionCursor, RefreshState, TuiState, View, offered_for, progress_gauge};

const ACCENT: Color = Color::Rgb(110, 170, 255);
const MUTED: Color = Color::Rgb(185, 195, 210);
const TEXT: Color = Color::Rgb(230, 230, 230);

pub(super) fn draw_tui(frame: &mut Frame, state: &mut TuiState) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    frame.render_widget(header(state), chunks[0]);

    let body_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(64), Constraint::Percentage(36)])
        .split(chunks[1]);
    let details_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(3)])
        .split(body_chunks[1]);

    draw_table(frame, state, body_chunks[0]);
    draw_details(frame, state, details_chunks[0], details_chunks[1]);

    let controls = Paragraph::new(controls_line(state))
        .alignment(Alignment::Center)
        .block(panel_block("Controls"));
    frame.render_widget(controls, chunks[2]);

    let status_widget = Paragraph::new(state.status.clone())
        .style(status_style(&state.status))
        .block(panel_block("Status"));
    frame.render_widget(status_widget, chunks[3]);

    if let Some(confirm) = state.pending_confirm.as_ref() {
        let text = format!(
            "{}\n\nThis cannot be undone.\n\n[y / Enter] Confirm   [n / Esc] Cancel",
            confirm.question()
        );
        draw_modal(frame, "Confirm", &text);
    } else if let Some(notice) = state.pending_notice.as_ref() {
        draw_modal(frame, notice.title, &notice.message);
    } else if let Some(input) = state.search_input.as_ref() {
        let text = format!("{input}_\n\n[Enter] Search   [Esc] Cancel");
        draw_modal(frame, "Search", &text);
    }
}

fn header(state: &TuiState) -> Paragraph<'static> {
    let selected_text = state
        .table_state
        .selected()
        .map(|idx| (idx + 1).to_string())
        .unwrap_or_else(|| "-".to_string());
    let mut spans = vec![
        Span::styled(
            "ANIQUEUE",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
        Span::styled(state.view.label(), Style::default().fg(Color::Yellow)),
        Span::raw("   "),
        Span::styled(
            format!("{} rows", state.rows()),
            Style::default().fg(MUTED),
        ),
        Span::raw("   "),
        Span::styled(format!("selected {selected_text}"), Style::default().fg(MUTED)),
        Span::raw("   "),
        Span::styled(
            format!("{} queued", state.queue.len()),
            Style::default().fg(MUTED),
        ),
        Span::raw("   "),
        Span::styled(
            if state.auto_quality {
                "auto quality"
            } else {
                "manual quality"
            },
            Style::default().fg(MUTED),
        ),
    ];
    if state.refresh == RefreshState::Running {
        spans.push(Span::raw("   "));
        spans.push(Span::styled("refreshing...", Style::default().fg(Color::Yellow)));
    }
    Paragraph::new(Line::from(spans))
        .alignment(Alignment::Center)
        .block(panel_block("Dashboard"))
}

fn highlight_style() -> Style {
    Style::default()
        .bg(ACCENT)
        .fg(Color::Black)
        .add_modifier(Modifier::BOLD)
}

fn header_style() -> Style {
    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
}

fn draw_table(frame: &mut Frame, state: &mut TuiState, area: Rect) {
    let table = match state.view {
        View::Library => Table::new(
            state.library.iter().map(library_row).collect::<Vec<_>>(),
            [
                Constraint::Percentage(52),
                Constraint::Length(12),
                Constraint::Length(7),
                Constraint::Length(18),
            ],
        )
        .header(Row::new(vec!["Title", "Progress", "Unread", "Updated"]).style(header_style()))
        .block(panel_block("Library")),
        View::Search => Table::new(
            state
                .hits
                .iter()
                .map(|hit| {
                    Row::new(vec![
                        Cell::from(hit.name.clone()),
                        Cell::from(truncate(&hit.source, 24)),
                    ])
                })
                .collect::<Vec<_>>(),
            [Constraint::Percentage(70), Constraint::Percentage(30)],
        )
        .header(Row::new(vec!["Title", "Id"]).style(header_style()))
        .block(panel_block("Search Results")),
        View::Queue => Table::new(
            state
                .queue
                .iter()
                .map(|item| {
                    Row::new(vec![
                        Cell::from(item.name.clone()),
                        Cell::from(item.episodes.to_string()),
                        Cell::from(item.pending_commands().to_string()),
                    ])
                })
                .collect::<Vec<_>>(),
            [
                Constraint::Percentage(50),
                Constraint::Percentage(35),
                Constraint::Length(9),
            ],
        )
        .header(Row::new(vec!["Title", "Episodes", "Commands"]).style(header_style()))
        .block(panel_block("Download Queue")),
    };
    let table = table
        .row_highlight_style(highlight_style())
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, area, &mut state.table_state);
}

fn library_row(entry: &WatchEntry) -> Row<'static> {
    Row::new(vec![
        Cell::from(entry.name.clone()),
        Cell::from(entry.episodes.clone()),
        Cell::from(if entry.is_unread { "●" } else { "" }),
        Cell::from(format_updated_display(entry.updated_at.as_deref())),
    ])
}

fn draw_details(frame: &mut Frame, state: &TuiState, text_area: Rect, gauge_area: Rect) {
    let (text, gauge) = if let Some(item) = state.selected_queued() {
        let commands = item
            .episode_commands()
            .take(3)
            .map(|command| truncate(command, 38))
            .collect::<Vec<_>>()
            .join("\n");
        (
            format!(
                "Title\n{}\n\nEpisodes\n{}\n\nCommands\n{}\n{}",
                truncate(&item.name, 40),
                item.episodes,
                item.pending_commands(),
                commands
            ),
            None,
        )
    } else if let Some(entry) = state.selected_entry() {
        (
            format!(
                "Title\n{}\n\nEpisode\n{}\n\nSource\n{}\n\nUpdated\n{}",
                truncate(&entry.name, 40),
                format_progress_display(entry),
                truncate(&entry.source, 28),
                format_updated_display(entry.updated_at.as_deref()),
            ),
            progress_gauge(entry),
        )
    } else {
        let empty = match state.view {
            View::Library => "No tracked series yet.\n\nPress s to search and add one.",
            View::Search => "No results.\n\nPress s to search again.",
            View::Queue => "The download queue is empty.",
        };
        (empty.to_string(), None)
    };

    let details = Paragraph::new(text)
        .style(Style::default().fg(TEXT))
        .block(panel_block("Selected"))
        .alignment(Alignment::Left);
    frame.render_widget(details, text_area);

    if let Some((ratio, label)) = gauge {
        let progress = Gauge::default()
            .block(panel_block("Progress"))
            .gauge_style(
                Style::default()
                    .fg(Color::Rgb(130, 190, 255))
                    .bg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            )
            .label(label)
            .ratio(ratio);
        frame.render_widget(progress, gauge_area);
    }
}

fn panel_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn modal_block(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(
            Style::default()
                .fg(Color::Rgb(160, 190, 235))
                .add_modifier(Modifier::BOLD),
        )
        .title(title)
        .padding(Padding::new(2, 2, 1, 1))
}

fn pill(label: &str, active: bool) -> Span<'static> {
    let style = if active {
        highlight_style()
    } else {
        Style::default()
            .bg(Color::Rgb(72, 82, 96))
            .fg(Color::Rgb(230, 235, 242))
    };
    Span::styled(format!(" {} ", label.to_uppercase()), style)
}

fn action_pills(offered: &[Action], cursor: ActionCursor) -> Vec<Span<'static>> {
    let current = cursor.pick(offered);
    let mut spans = Vec::with_capacity(offered.len() * 2);
    for action in offered {
        spans.push(pill(action.label(), Some(*action) == current));
        spans.push(Span::raw(" "));
    }
    spans
}

fn controls_line(state: &TuiState) -> Line<'static> {
    let mut spans = match state.selected_entry() {
        Some(entry) => action_pills(offered_for(entry), state.cursor),
        None => Vec::new(),
    };
    let help = match state.view {
        View::Library => "  ←/→ action  Enter run  s search  r refresh  w watched  d remove  a auto  Tab queue  q quit",
        View::Search => "  ←/→ action  Enter run  s search  Esc back  q quit",
        View::Queue => "  x export  d remove  c clear  Tab library  q quit",
    };
    spans.push(Span::styled(help, Style::default().fg(MUTED)));
    Line::from(spans)
}

fn status_style(status: &str) -> Style {
    if status.starts_with("ERROR:") {
        Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD)
    } else if status.starts_with("INFO:") {
        Style::default().fg(Color::Rgb(205, 165, 255))
    } else {
        Style::default().fg(Color::Rgb(230, 235, 242))
    }
}

fn draw_modal(frame: &mut Frame, title: &str, text: &str) {
    let area = popup_rect_for_text(frame.area(), text);
    render_popup_shadow(frame, area);
    frame.render_widget(Clear, area);
    let popup = Paragraph::new(text.to_string())
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(modal_block(title));
    frame.render_widget(popup, area);
}

pub(super) fn draw_number_prompt(frame: &mut Frame, title: &str, input: &NumberInput) {
    let shown = if input.buffer.is_empty() {
        format!("{} (suggested)", input.bounds.initial)
    } else {
        input.buffer.clone()
    };
    let text = format!(
        "{shown}_\n\nEpisodes 1 to {}\n\n[Enter] Accept   [↑/↓] Step   [Esc] Cancel",
        input.bounds.max
    );
    draw_modal(frame, title, &text);
}

pub(super) fn draw_quality_prompt(frame: &mut Frame, title: &str, options: &[String], selected: usize) {
    let height = (options.len() as u16).saturating_add(6);
    let width = options
        .iter()
        .map(|option| option.chars().count() as u16)
        .max()
        .unwrap_or(0)
        .saturating_add(16)
        .max(40);
    let area = centered_fixed_rect(width, height, frame.area());
    render_popup_shadow(frame, area);
    frame.render_widget(Clear, area);

    let items = options
        .iter()
        .map(|option| ListItem::new(option.trim_start_matches('-').to_string()))
        .collect::<Vec<_>>();
    let list = List::new(items)
        .block(modal_block(title))
        .style(Style::default().fg(TEXT))
        .highlight_style(highlight_style())
        .highlight_symbol("▸ ");
    let mut list_state = ListState::default();
    list_state.select(Some(selected));
    frame.render_stateful_widget(list, area, &mut list_state);
}

pub(super) fn draw_progress(frame: &mut Frame, done: usize, total: usize) {
    let area = centered_fixed_rect(52, 5, frame.area());
    frame.render_widget(Clear, area);
    let ratio = if total == 0 {
        1.0
    } else {
        (done as f64 / total as f64).clamp(0.0, 1.0)
    };
    let gauge = Gauge::default()
        .block(modal_block("Resolving sources"))
        .gauge_style(Style::default().fg(ACCENT).bg(Color::Black))
        .label(format!("{done}/{total}"))
        .ratio(ratio);
    frame.render_widget(gauge, area);
}

fn centered_fixed_rect(width: u16, height: u16, area: Rect) -> Rect {
    let clamped_width = width.min(area.width.max(1));
    let clamped_height = height.min(area.height.max(1));
    let x = area.x + area.width.saturating_sub(clamped_width) / 2;
    let y = area.y + area.height.saturating_sub(clamped_height) / 2;
    Rect::new(x, y, clamped_width, clamped_height)
}

fn render_popup_shadow(frame: &mut Frame, popup_area: Rect) {
    let area = frame.area();
    let shadow = Rect::new(
        (popup_area.x + 1).min(area.x + area.width.saturating_sub(1)),
        (popup_area.y + 1).min(area.y + area.height.saturating_sub(1)),
        popup_area.width.saturating_sub(1),
        popup_area.height.saturating_sub(1),
    );
    if shadow.width == 0 || shadow.height == 0 {
        return;
    }
    let shadow_block = Block::default().style(Style::default().bg(Color::Rgb(14, 16, 24)));
    frame.render_widget(shadow_block, shadow);
}

fn popup_rect_for_text(area: Rect, text: &str) -> Rect {
    let widest = text
        .lines()
        .map(|line| line.chars().count() as u16)
        .max()
        .unwrap_or(0);
    let lines = text.lines().count() as u16;

    let available_width = area.width.saturating_sub(2).max(1);
    let width = widest
        .saturating_add(12)
        .clamp(40.min(available_width), 76.min(available_width));

    let available_height = area.height.saturating_sub(2).max(1);
    let height = lines
        .saturating_add(6)
        .clamp(8.min(available_height), 20.min(available_height));

    centered_fixed_rect(width, height, area)
}
