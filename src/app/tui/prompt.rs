use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use tracing::warn;

use super::super::prompt::{Answer, NumberBounds, Prompter};
use super::TuiTerminal;
use super::render::{draw_number_prompt, draw_progress, draw_quality_prompt};

const MAX_DIGITS: usize = 6;

/// Digits typed into the number modal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct NumberInput {
    pub(super) bounds: NumberBounds,
    pub(super) buffer: String,
}

impl NumberInput {
    fn new(bounds: NumberBounds) -> Self {
        Self {
            bounds,
            buffer: String::new(),
        }
    }

    /// `Some` once the modal is done. Empty input accepts the suggestion.
    fn handle(&mut self, key: KeyCode) -> Option<Answer<u32>> {
        match key {
            KeyCode::Esc => Some(Answer::Cancelled),
            KeyCode::Enter if self.buffer.is_empty() => Some(Answer::Picked(self.bounds.initial)),
            KeyCode::Enter => self.buffer.parse::<u32>().ok().map(Answer::Picked),
            KeyCode::Backspace => {
                self.buffer.pop();
                None
            }
            KeyCode::Up => {
                self.step(1);
                None
            }
            KeyCode::Down => {
                self.step(-1);
                None
            }
            KeyCode::Char(ch) if ch.is_ascii_digit() && self.buffer.len() < MAX_DIGITS => {
                self.buffer.push(ch);
                None
            }
            _ => None,
        }
    }

    fn step(&mut self, delta: i64) {
        let current = self
            .buffer
            .parse::<u32>()
            .unwrap_or(self.bounds.initial);
        let next = (i64::from(current) + delta).clamp(1, i64::from(self.bounds.max.max(1)));
        self.buffer = next.to_string();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct QualityPicker {
    pub(super) selected: usize,
    len: usize,
}

impl QualityPicker {
    fn new(len: usize) -> Self {
        Self { selected: 0, len }
    }

    fn handle(&mut self, key: KeyCode) -> Option<Answer<usize>> {
        match key {
            KeyCode::Esc => Some(Answer::Cancelled),
            KeyCode::Enter => Some(Answer::Picked(self.selected)),
            KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
                None
            }
            KeyCode::Down => {
                self.selected = (self.selected + 1).min(self.len.saturating_sub(1));
                None
            }
            _ => None,
        }
    }
}

/// Answers prompts with modal dialogs drawn on the live terminal.
pub(super) struct TuiPrompter<'t> {
    terminal: &'t mut TuiTerminal,
}

impl<'t> TuiPrompter<'t> {
    pub(super) fn new(terminal: &'t mut TuiTerminal) -> Self {
        Self { terminal }
    }
}

fn next_key() -> Result<Option<KeyCode>> {
    if !event::poll(Duration::from_millis(200))? {
        return Ok(None);
    }
    match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => Ok(Some(key.code)),
        _ => Ok(None),
    }
}

impl TuiPrompter<'_> {
    fn number_loop(&mut self, title: &str, bounds: NumberBounds) -> Result<Answer<u32>> {
        let mut input = NumberInput::new(bounds);
        loop {
            self.terminal
                .draw(|frame| draw_number_prompt(frame, title, &input))?;
            if let Some(key) = next_key()?
                && let Some(answer) = input.handle(key)
            {
                return Ok(answer);
            }
        }
    }

    fn quality_loop(&mut self, title: &str, options: &[String]) -> Result<Answer<String>> {
        let mut picker = QualityPicker::new(options.len());
        loop {
            self.terminal
                .draw(|frame| draw_quality_prompt(frame, title, options, picker.selected))?;
            if let Some(key) = next_key()?
                && let Some(answer) = picker.handle(key)
            {
                return Ok(match answer {
                    Answer::Picked(idx) => options
                        .get(idx)
                        .cloned()
                        .map_or(Answer::Cancelled, Answer::Picked),
                    Answer::Cancelled => Answer::Cancelled,
                });
            }
        }
    }
}

impl Prompter for TuiPrompter<'_> {
    fn ask_number(&mut self, title: &str, bounds: NumberBounds) -> Answer<u32> {
        self.number_loop(title, bounds).unwrap_or_else(|err| {
            warn!(error = %err, "number prompt failed; treating as cancel");
            Answer::Cancelled
        })
    }

    fn ask_quality(&mut self, title: &str, options: &[String]) -> Answer<String> {
        if options.is_empty() {
            return Answer::Cancelled;
        }
        self.quality_loop(title, options).unwrap_or_else(|err| {
            warn!(error = %err, "quality prompt failed; treating as cancel");
            Answer::Cancelled
        })
    }

    fn progress(&mut self, done: usize, total: usize) {
        if let Err(err) = self
            .terminal
            .draw(|frame| draw_progress(frame, done, total))
        {
            warn!(error = %err, "progress redraw failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(max: u32, initial: u32) -> NumberInput {
        NumberInput::new(NumberBounds { max, initial })
    }

    #[test]
    fn enter_on_empty_input_takes_the_suggestion() {
        assert_eq!(input(12, 4).handle(KeyCode::Enter), Some(Answer::Picked(4)));
    }

    #[test]
    fn typed_digits_are_returned_unchecked() {
        let mut number = input(12, 4);
        for key in [KeyCode::Char('1'), KeyCode::Char('x'), KeyCode::Char('5')] {
            assert_eq!(number.handle(key), None);
        }
        assert_eq!(number.buffer, "15");
        assert_eq!(number.handle(KeyCode::Enter), Some(Answer::Picked(15)));
    }

    #[test]
    fn arrows_step_within_bounds() {
        let mut number = input(3, 3);
        number.handle(KeyCode::Up);
        assert_eq!(number.buffer, "3");
        number.handle(KeyCode::Down);
        number.handle(KeyCode::Down);
        number.handle(KeyCode::Down);
        assert_eq!(number.buffer, "1");
    }

    #[test]
    fn escape_cancels_both_modals() {
        assert_eq!(input(3, 1).handle(KeyCode::Esc), Some(Answer::Cancelled));
        assert_eq!(QualityPicker::new(2).handle(KeyCode::Esc), Some(Answer::Cancelled));
    }

    #[test]
    fn quality_picker_clamps_selection() {
        let mut picker = QualityPicker::new(2);
        picker.handle(KeyCode::Up);
        assert_eq!(picker.selected, 0);
        picker.handle(KeyCode::Down);
        picker.handle(KeyCode::Down);
        assert_eq!(picker.handle(KeyCode::Enter), Some(Answer::Picked(1)));
    }
}
