use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};

use super::cache::{Progress, WatchEntry};
use super::library::DocumentStore;
use super::queue::{export_script, remove_queue_item};
use super::resolver::MetadataResolver;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RefreshSummary {
    pub(crate) checked: usize,
    pub(crate) changed: usize,
    pub(crate) failed: Vec<String>,
}

/// New totals for every registered series. Lookups happen before the store is
/// touched; a series whose lookup fails keeps its stored entry.
pub(crate) fn refresh_totals<S, R>(store: &S, resolver: &R) -> Result<RefreshSummary>
where
    S: DocumentStore,
    R: MetadataResolver,
{
    let snapshot = store.load()?.cache;
    let mut summary = RefreshSummary::default();
    let mut refreshed = Vec::new();

    for entry in snapshot.iter().filter(|entry| entry.is_registered()) {
        summary.checked += 1;
        let progress = match entry.progress() {
            Ok(progress) => progress,
            Err(err) => {
                warn!(series = %entry.name, error = %err, "skipping refresh of unreadable progress");
                summary.failed.push(entry.name.clone());
                continue;
            }
        };
        let info = match resolver.series_info(entry) {
            Ok(info) => info,
            Err(err) => {
                warn!(series = %entry.name, error = %format!("{err:#}"), "refresh lookup failed");
                summary.failed.push(entry.name.clone());
                continue;
            }
        };

        let total = info.total();
        let fresh = Progress::new(progress.current.min(total), total)?;
        let is_unread = fresh.remaining() > 0;
        if fresh == progress && is_unread == entry.is_unread {
            continue;
        }
        refreshed.push(WatchEntry {
            episodes: fresh.to_string(),
            is_unread,
            ..entry.clone()
        });
    }

    summary.changed = refreshed.len();
    if refreshed.is_empty() {
        return Ok(summary);
    }

    store.update_cache(|mut cache| {
        for entry in cache.iter_mut() {
            if let Some(fresh) = refreshed.iter().find(|fresh| fresh.name == entry.name) {
                *entry = fresh.clone();
            }
        }
        Ok(cache)
    })?;
    info!(checked = summary.checked, changed = summary.changed, "refreshed totals");
    Ok(summary)
}

/// Flips the unread badge and moves progress to the last episode.
pub(crate) fn mark_watched<S: DocumentStore>(store: &S, name: &str) -> Result<WatchEntry> {
    let mut marked = None;
    store.update_cache(|mut cache| {
        let entry = cache
            .iter_mut()
            .find(|entry| entry.name == name)
            .ok_or_else(|| anyhow!("'{name}' is not in your list"))?;
        let progress = entry
            .progress()
            .with_context(|| format!("cannot mark '{name}' as watched"))?;
        entry.episodes = Progress::new(progress.total, progress.total)?.to_string();
        entry.is_unread = !entry.is_unread;
        marked = Some(entry.clone());
        Ok(cache)
    })?;
    marked.ok_or_else(|| anyhow!("'{name}' is not in your list"))
}

pub(crate) fn remove_entry<S: DocumentStore>(store: &S, name: &str) -> Result<bool> {
    let before = store.load()?.cache.len();
    let cache = store.update_cache(|mut cache| {
        cache.retain(|entry| entry.name != name);
        Ok(cache)
    })?;
    Ok(cache.len() != before)
}

pub(crate) fn remove_queued<S: DocumentStore>(store: &S, name: &str) -> Result<bool> {
    let mut removed = false;
    store.update_queue(|queue| {
        let (queue, gone) = remove_queue_item(queue, name);
        removed = gone;
        Ok(queue)
    })?;
    Ok(removed)
}

pub(crate) fn clear_queue<S: DocumentStore>(store: &S) -> Result<usize> {
    let mut cleared = 0;
    store.update_queue(|queue| {
        cleared = queue.len();
        Ok(Vec::new())
    })?;
    Ok(cleared)
}

/// Writes the download script and empties the queue. With no path the script
/// is returned for printing. The queue is kept if the file cannot be written.
pub(crate) fn export_queue<S: DocumentStore>(store: &S, path: Option<&Path>) -> Result<String> {
    let library = store.load()?;
    if library.queue.is_empty() {
        return Ok(String::new());
    }
    let script = export_script(&library.queue);

    if let Some(path) = path {
        fs::write(path, format!("{script}\n"))
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    clear_queue(store)?;
    info!(items = library.queue.len(), "exported queue");
    Ok(script)
}
