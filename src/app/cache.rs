use std::fmt;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use super::error::ProgressError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WatchEntry {
    pub(crate) name: String,
    pub(crate) source: String,
    /// `"current/total"` once registered, `"0"` for a bare search hit.
    pub(crate) episodes: String,
    #[serde(default)]
    pub(crate) img: String,
    #[serde(default)]
    pub(crate) is_unread: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) updated_at: Option<String>,
}

impl WatchEntry {
    pub(crate) fn with_progress(
        name: &str,
        source: &str,
        img: &str,
        progress: Progress,
        is_unread: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
            episodes: progress.to_string(),
            img: img.to_string(),
            is_unread,
            updated_at: Some(Utc::now().to_rfc3339()),
        }
    }

    pub(crate) fn is_registered(&self) -> bool {
        self.episodes.contains('/')
    }

    pub(crate) fn progress(&self) -> Result<Progress, ProgressError> {
        Progress::parse(&self.episodes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Progress {
    pub(crate) current: u32,
    pub(crate) total: u32,
}

impl Progress {
    pub(crate) fn new(current: u32, total: u32) -> Result<Self, ProgressError> {
        if current > total {
            return Err(ProgressError::PastEnd { current, total });
        }
        Ok(Self { current, total })
    }

    pub(crate) fn parse(raw: &str) -> Result<Self, ProgressError> {
        let malformed = || ProgressError::Malformed(raw.to_string());
        let (current, total) = raw.trim().split_once('/').ok_or_else(malformed)?;
        let current = current.trim().parse::<u32>().map_err(|_| malformed())?;
        let total = total.trim().parse::<u32>().map_err(|_| malformed())?;
        Self::new(current, total)
    }

    pub(crate) fn remaining(self) -> u32 {
        self.total - self.current
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.current, self.total)
    }
}

/// Replaces any entry with the same name and puts `entry` first.
pub(crate) fn upsert_cache(mut list: Vec<WatchEntry>, entry: WatchEntry) -> Vec<WatchEntry> {
    list.retain(|existing| existing.name != entry.name);
    list.insert(0, entry);
    list
}

pub(crate) fn format_progress_display(entry: &WatchEntry) -> String {
    match entry.progress() {
        Ok(progress) => format!("{} of {}", progress.current, progress.total),
        Err(_) if !entry.is_registered() => "-".to_string(),
        Err(_) => entry.episodes.clone(),
    }
}

pub(crate) fn format_updated_display(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return "-".to_string();
    };
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| {
            dt.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_else(|_| raw.to_string())
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    let mut out = s.to_string();
    if out.chars().count() > max {
        out = out.chars().take(max.saturating_sub(3)).collect::<String>() + "...";
    }
    out
}
