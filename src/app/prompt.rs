use std::io::{self, BufRead, Write};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Answer<T> {
    Picked(T),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NumberBounds {
    pub(crate) max: u32,
    pub(crate) initial: u32,
}

/// Asks the user for input. Implementations block until the user answers or
/// cancels; a cancel must come back as `Answer::Cancelled`.
pub(crate) trait Prompter {
    fn ask_number(&mut self, title: &str, bounds: NumberBounds) -> Answer<u32>;
    fn ask_quality(&mut self, title: &str, options: &[String]) -> Answer<String>;

    /// Called while a batch resolves its sources, once per finished step.
    fn progress(&mut self, _done: usize, _total: usize) {}
}

/// Line-based prompter for plain terminal use. Empty input accepts the
/// suggested value, `q` or end of input cancels.
pub(crate) struct LinePrompter<R, W> {
    input: R,
    output: W,
}

impl LinePrompter<io::StdinLock<'static>, io::Stdout> {
    pub(crate) fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> LinePrompter<R, W> {
    pub(crate) fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }
}

impl<R: BufRead, W: Write> Prompter for LinePrompter<R, W> {
    fn ask_number(&mut self, title: &str, bounds: NumberBounds) -> Answer<u32> {
        loop {
            let _ = write!(
                self.output,
                "{title} [{} of {}] (q to cancel): ",
                bounds.initial, bounds.max
            );
            let _ = self.output.flush();

            let Some(line) = self.read_line() else {
                return Answer::Cancelled;
            };
            if line.eq_ignore_ascii_case("q") {
                return Answer::Cancelled;
            }
            if line.is_empty() {
                return Answer::Picked(bounds.initial);
            }
            // Range checks belong to the caller; only reject non-numbers here.
            match line.parse::<u32>() {
                Ok(value) => return Answer::Picked(value),
                Err(_) => {
                    let _ = writeln!(self.output, "Not a number: {line}");
                }
            }
        }
    }

    fn ask_quality(&mut self, title: &str, options: &[String]) -> Answer<String> {
        if options.is_empty() {
            return Answer::Cancelled;
        }
        let _ = writeln!(self.output, "{title}");
        for (idx, option) in options.iter().enumerate() {
            let _ = writeln!(
                self.output,
                "  {}) {}",
                idx + 1,
                option.trim_start_matches('-')
            );
        }

        loop {
            let _ = write!(self.output, "Pick 1-{} (q to cancel): ", options.len());
            let _ = self.output.flush();

            let Some(line) = self.read_line() else {
                return Answer::Cancelled;
            };
            if line.eq_ignore_ascii_case("q") {
                return Answer::Cancelled;
            }
            match line.parse::<usize>() {
                Ok(choice) if (1..=options.len()).contains(&choice) => {
                    return Answer::Picked(options[choice - 1].clone());
                }
                _ => {
                    let _ = writeln!(self.output, "Invalid choice: {line}");
                }
            }
        }
    }

    fn progress(&mut self, done: usize, total: usize) {
        let _ = write!(self.output, "\rResolving sources {done}/{total}");
        if done == total {
            let _ = writeln!(self.output);
        }
        let _ = self.output.flush();
    }
}

#[cfg(test)]
pub(crate) struct ScriptedPrompter {
    numbers: std::collections::VecDeque<Answer<u32>>,
    qualities: std::collections::VecDeque<Answer<String>>,
    number_prompts: usize,
    quality_prompts: usize,
}

#[cfg(test)]
impl ScriptedPrompter {
    pub(crate) fn new(numbers: Vec<Answer<u32>>, qualities: Vec<Answer<String>>) -> Self {
        Self {
            numbers: numbers.into(),
            qualities: qualities.into(),
            number_prompts: 0,
            quality_prompts: 0,
        }
    }

    pub(crate) fn number_prompts(&self) -> usize {
        self.number_prompts
    }

    pub(crate) fn quality_prompts(&self) -> usize {
        self.quality_prompts
    }
}

#[cfg(test)]
impl Prompter for ScriptedPrompter {
    fn ask_number(&mut self, _title: &str, _bounds: NumberBounds) -> Answer<u32> {
        self.number_prompts += 1;
        self.numbers.pop_front().unwrap_or(Answer::Cancelled)
    }

    fn ask_quality(&mut self, _title: &str, _options: &[String]) -> Answer<String> {
        self.quality_prompts += 1;
        self.qualities.pop_front().unwrap_or(Answer::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompter(input: &str) -> LinePrompter<&[u8], Vec<u8>> {
        LinePrompter::new(input.as_bytes(), Vec::new())
    }

    #[test]
    fn empty_line_accepts_the_suggestion() {
        let mut p = prompter("\n");
        let answer = p.ask_number("Episode", NumberBounds { max: 12, initial: 4 });
        assert_eq!(answer, Answer::Picked(4));
    }

    #[test]
    fn non_numbers_are_asked_again() {
        let mut p = prompter("abc\n7\n");
        let answer = p.ask_number("Episode", NumberBounds { max: 12, initial: 4 });
        assert_eq!(answer, Answer::Picked(7));
        let shown = String::from_utf8(p.output).expect("utf8");
        assert!(shown.contains("Not a number: abc"));
    }

    #[test]
    fn q_and_end_of_input_cancel() {
        let bounds = NumberBounds { max: 3, initial: 1 };
        assert_eq!(prompter("q\n").ask_number("x", bounds), Answer::Cancelled);
        assert_eq!(prompter("").ask_number("x", bounds), Answer::Cancelled);
    }

    #[test]
    fn quality_choice_is_by_position() {
        let options = vec!["-1080p".to_string(), "-720p".to_string()];
        let mut p = prompter("5\n2\n");
        assert_eq!(
            p.ask_quality("Which quality?", &options),
            Answer::Picked("-720p".to_string())
        );
    }
}
