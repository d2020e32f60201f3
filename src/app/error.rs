use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum ProgressError {
    #[error("progress '{0}' is not in current/total form")]
    Malformed(String),
    #[error("progress {current}/{total} is past the last episode")]
    PastEnd { current: u32, total: u32 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum MergeError {
    #[error("queue item '{name}' does not start with a directory command")]
    MissingDirectoryCommand { name: String },
}

#[derive(Debug, Error)]
pub(crate) enum ActionError {
    #[error("episode {value} is outside 1..={max}")]
    OutOfBounds { value: u32, max: u32 },
    #[error("start episode {start} is after end episode {end}")]
    InvertedRange { start: u32, end: u32 },
    #[error("episode {picked} is not past the current episode {current}")]
    NothingToQueue { picked: u32, current: u32 },
    #[error("no preferred quality matches {available:?} and no prompt is available")]
    MissingQuality { available: Vec<String> },
    #[error("episode {episode} has no source id (series has {known} known episodes)")]
    UnknownEpisode { episode: u32, known: usize },
    #[error("'{title}' needs an answer but prompting is disabled")]
    PromptUnavailable { title: String },
    #[error("resolution failed: {0}")]
    Resolution(String),
    #[error(transparent)]
    Merge(#[from] MergeError),
}

impl ActionError {
    /// Selection errors abort the action without touching the store; they are
    /// user mistakes rather than failures.
    pub(crate) fn is_selection(&self) -> bool {
        matches!(
            self,
            Self::OutOfBounds { .. } | Self::InvertedRange { .. } | Self::NothingToQueue { .. }
        )
    }
}
