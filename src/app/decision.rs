use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Action {
    Next,
    Resume,
    Add,
    Jump,
    Continue,
    Choose,
    Watch,
    Download,
}

impl Action {
    pub(crate) const ALL: [Action; 8] = [
        Action::Next,
        Action::Resume,
        Action::Add,
        Action::Jump,
        Action::Continue,
        Action::Choose,
        Action::Watch,
        Action::Download,
    ];

    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Next => "Next",
            Self::Resume => "Resume",
            Self::Add => "Add",
            Self::Jump => "Jump",
            Self::Continue => "Continue",
            Self::Choose => "Choose",
            Self::Watch => "Watch",
            Self::Download => "Download",
        }
    }

    /// Actions whose prompted number ends a download batch rather than naming
    /// an episode to play.
    pub(crate) fn is_download(self) -> bool {
        matches!(self, Self::Continue | Self::Jump | Self::Download)
    }

    /// Actions offered for an entry. Search hits that were never registered
    /// have no progress; a registered entry at episode 0 shows `Next` as a
    /// start button and hides `Resume`.
    pub(crate) fn offered(registered: bool, current: u32) -> &'static [Action] {
        if !registered {
            return &[Self::Add, Self::Watch, Self::Download];
        }
        if current == 0 {
            &[Self::Next, Self::Choose, Self::Continue, Self::Jump]
        } else {
            &[
                Self::Next,
                Self::Resume,
                Self::Choose,
                Self::Continue,
                Self::Jump,
            ]
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.label().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| format!("unknown action '{raw}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Play this episode without asking.
    Direct { episode: u32 },
    /// Register the series with no progress.
    FirstAdd,
    /// Ask for one episode number in `1..=bound`.
    AskRange { bound: u32 },
    /// Ask for a start and an end episode, both in `1..=bound`.
    AskTwice { bound: u32 },
    /// Exactly one episode is left to queue.
    SingleCurrentOnly { episode: u32 },
    AtEnd,
    Undefined,
}

pub(crate) fn decide(current: u32, total: u32, action: Action) -> Outcome {
    let next = current.saturating_add(1);
    match action {
        Action::Next if total >= next => Outcome::Direct { episode: next },
        Action::Next => Outcome::AtEnd,
        Action::Resume => Outcome::Direct { episode: current },
        Action::Add => Outcome::FirstAdd,
        Action::Jump => Outcome::AskTwice { bound: total },
        Action::Continue if total == next => Outcome::SingleCurrentOnly { episode: next },
        Action::Continue => Outcome::AskRange { bound: total },
        Action::Choose => Outcome::AskRange { bound: total },
        Action::Watch if total > 1 => Outcome::AskRange { bound: total },
        Action::Watch => Outcome::Direct { episode: 1 },
        Action::Download if total == 1 => Outcome::SingleCurrentOnly { episode: next },
        Action::Download => Outcome::AskRange { bound: total },
    }
}

/// Label-driven entry point; anything that is not a known action is `Undefined`.
pub(crate) fn decide_label(current: u32, total: u32, label: &str) -> Outcome {
    match label.parse::<Action>() {
        Ok(action) => decide(current, total, action),
        Err(_) => Outcome::Undefined,
    }
}
