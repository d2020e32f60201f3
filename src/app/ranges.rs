use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const RANGE_SEPARATOR: &str = " to ";

/// Ordered set of distinct positive episode numbers.
///
/// Persisted and displayed as its canonical range string, e.g. `"1, 3 to 4"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct EpisodeSet(BTreeSet<u32>);

impl EpisodeSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, episode: u32) -> bool {
        if episode == 0 {
            return false;
        }
        self.0.insert(episode)
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    pub(crate) fn union(&self, other: &EpisodeSet) -> EpisodeSet {
        EpisodeSet(self.0.union(&other.0).copied().collect())
    }
}

impl FromIterator<u32> for EpisodeSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut set = EpisodeSet::new();
        for episode in iter {
            set.insert(episode);
        }
        set
    }
}

impl fmt::Display for EpisodeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_ranges(self.iter()))
    }
}

impl Serialize for EpisodeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EpisodeSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(parse_ranges(&raw))
    }
}

/// Parses `"1, 3 to 4, 12"` style lists. Tokens that are not a positive
/// integer or an ascending `A to B` pair are skipped.
pub(crate) fn parse_ranges(raw: &str) -> EpisodeSet {
    let mut set = EpisodeSet::new();
    for token in raw.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        match token.split_once(RANGE_SEPARATOR) {
            Some((start, end)) => {
                let (Some(start), Some(end)) = (parse_positive(start), parse_positive(end)) else {
                    continue;
                };
                if start > end {
                    continue;
                }
                for episode in start..=end {
                    set.insert(episode);
                }
            }
            None => {
                if let Some(episode) = parse_positive(token) {
                    set.insert(episode);
                }
            }
        }
    }
    set
}

fn parse_positive(raw: &str) -> Option<u32> {
    let value = raw.trim().parse::<u32>().ok()?;
    (value > 0).then_some(value)
}

pub(crate) fn format_ranges<I>(episodes: I) -> String
where
    I: IntoIterator<Item = u32>,
{
    let mut sorted = episodes.into_iter().collect::<Vec<_>>();
    sorted.sort_unstable();
    sorted.dedup();

    let mut parts = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return String::new();
    };

    let mut run_start = first;
    let mut run_end = first;
    for episode in iter {
        if run_end.checked_add(1) == Some(episode) {
            run_end = episode;
            continue;
        }
        parts.push(render_run(run_start, run_end));
        run_start = episode;
        run_end = episode;
    }
    parts.push(render_run(run_start, run_end));

    parts.join(", ")
}

fn render_run(start: u32, end: u32) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{start}{RANGE_SEPARATOR}{end}")
    }
}
