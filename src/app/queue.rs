use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::MergeError;
use super::ranges::EpisodeSet;

const DIRECTORY_COMMAND_PREFIX: &str = "mkdir ";
const EPISODE_MARKER: &str = "\\ -\\ ";
const EPISODE_EXTENSION: &str = ".mp4";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueueItem {
    pub(crate) name: String,
    pub(crate) source: String,
    #[serde(default)]
    pub(crate) episodes: EpisodeSet,
    #[serde(default)]
    pub(crate) img: String,
    /// Directory command first, then one command per episode.
    #[serde(default)]
    pub(crate) links: Vec<String>,
    #[serde(default = "default_unread")]
    pub(crate) is_unread: bool,
}

fn default_unread() -> bool {
    true
}

impl QueueItem {
    pub(crate) fn directory_command(&self) -> Option<&str> {
        self.links
            .first()
            .map(String::as_str)
            .filter(|command| is_directory_command(command))
    }

    pub(crate) fn episode_commands(&self) -> impl Iterator<Item = &String> {
        self.links
            .iter()
            .filter(|command| !is_directory_command(command))
    }

    /// Episode numbers found in the commands themselves.
    pub(crate) fn scanned_episodes(&self) -> EpisodeSet {
        self.episode_commands()
            .filter_map(|command| episode_from_command(command))
            .collect()
    }

    pub(crate) fn pending_commands(&self) -> usize {
        self.episode_commands().count()
    }
}

/// Builds the shell commands stored in queue items.
#[derive(Debug, Clone)]
pub(crate) struct LinkBuilder {
    download_dir: PathBuf,
}

impl LinkBuilder {
    pub(crate) fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
        }
    }

    pub(crate) fn directory_command(&self, series: &str) -> String {
        format!("{DIRECTORY_COMMAND_PREFIX}{}", escape_spaces(series))
    }

    pub(crate) fn episode_command(&self, series: &str, source: &str, episode: u32) -> String {
        let escaped = escape_spaces(series);
        let dir = escape_spaces(&self.download_dir.display().to_string());
        format!(
            "ffmpeg -i \"{source}\" -c copy {dir}/{escaped}/{escaped}{EPISODE_MARKER}{episode}{EPISODE_EXTENSION}"
        )
    }
}

fn escape_spaces(raw: &str) -> String {
    raw.replace(' ', "\\ ")
}

pub(crate) fn is_directory_command(command: &str) -> bool {
    command.starts_with(DIRECTORY_COMMAND_PREFIX)
}

/// Reads the episode number from the `\ -\ <n>.mp4` tail of an episode command.
pub(crate) fn episode_from_command(command: &str) -> Option<u32> {
    let stem = command.trim_end().strip_suffix(EPISODE_EXTENSION)?;
    let (_, digits) = stem.rsplit_once(EPISODE_MARKER)?;
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u32>().ok().filter(|episode| *episode > 0)
}

fn commands_by_episode(item: &QueueItem) -> BTreeMap<u32, String> {
    let mut map = BTreeMap::new();
    for command in item.episode_commands() {
        match episode_from_command(command) {
            Some(episode) => {
                map.insert(episode, command.clone());
            }
            None => debug!(series = %item.name, command = %command, "dropping command without an episode number"),
        }
    }
    map
}

/// Folds `incoming` into the queue, keyed by series name. The merged (or new)
/// item ends up first.
pub(crate) fn merge_queue_item(
    mut queue: Vec<QueueItem>,
    incoming: QueueItem,
) -> Result<Vec<QueueItem>, MergeError> {
    let Some(incoming_dir) = incoming.directory_command().map(str::to_string) else {
        return Err(MergeError::MissingDirectoryCommand {
            name: incoming.name,
        });
    };

    let Some(index) = queue.iter().position(|item| item.name == incoming.name) else {
        let commands = commands_by_episode(&incoming);
        let mut links = Vec::with_capacity(commands.len() + 1);
        links.push(incoming_dir);
        links.extend(commands.values().cloned());
        let fresh = QueueItem {
            episodes: commands.keys().copied().collect(),
            links,
            ..incoming
        };
        queue.insert(0, fresh);
        return Ok(queue);
    };

    let existing = queue.remove(index);
    if existing.source != incoming.source {
        warn!(
            series = %incoming.name,
            previous_source = %existing.source,
            source = %incoming.source,
            "queue merge key collision: same name, different source; keeping latest metadata"
        );
    }

    let episodes = existing.scanned_episodes().union(&incoming.scanned_episodes());
    let mut commands = commands_by_episode(&existing);
    commands.extend(commands_by_episode(&incoming));

    let directory = existing
        .directory_command()
        .map(str::to_string)
        .unwrap_or(incoming_dir);
    let mut links = Vec::with_capacity(commands.len() + 1);
    links.push(directory);
    links.extend(commands.into_values());

    debug!(series = %incoming.name, episodes = %episodes, "merged queue item");
    let merged = QueueItem {
        episodes,
        links,
        is_unread: true,
        ..incoming
    };
    queue.insert(0, merged);
    Ok(queue)
}

pub(crate) fn remove_queue_item(mut queue: Vec<QueueItem>, name: &str) -> (Vec<QueueItem>, bool) {
    let before = queue.len();
    queue.retain(|item| item.name != name);
    let removed = queue.len() != before;
    (queue, removed)
}

/// Every command of every item, in queue order.
pub(crate) fn export_script(queue: &[QueueItem]) -> String {
    queue
        .iter()
        .flat_map(|item| item.links.iter())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n")
}
