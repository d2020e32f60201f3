use anyhow::{Result, anyhow};
use tracing::{debug, info, warn};

use super::cache::{Progress, WatchEntry, upsert_cache};
use super::decision::{Action, Outcome, decide_label};
use super::error::{ActionError, ProgressError};
use super::library::{DocumentStore, Settings, SettingsStore};
use super::prompt::{Answer, NumberBounds, Prompter};
use super::quality::{PickMode, QualitySession};
use super::queue::{LinkBuilder, QueueItem, merge_queue_item};
use super::ranges::EpisodeSet;
use super::resolver::{MetadataResolver, SeriesInfo};

const AT_END_MESSAGE: &str = "That was the last episode. Use resume to play it again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ActionReport {
    /// Progress was recorded; `source` is what the player should open.
    Played {
        episode: u32,
        source: String,
        progress: Progress,
    },
    Registered {
        progress: Progress,
    },
    Queued {
        batch: EpisodeSet,
        queued: EpisodeSet,
        progress: Progress,
    },
    AtEnd,
    Cancelled,
    Undefined {
        label: String,
    },
}

impl ActionReport {
    pub(crate) fn message(&self, series: &str) -> String {
        match self {
            Self::Played {
                episode, progress, ..
            } => format!("Playing {series} episode {episode} ({progress})."),
            Self::Registered { progress } => {
                format!("Added {series} ({} episodes).", progress.total)
            }
            Self::Queued {
                batch,
                queued,
                progress,
            } => format!(
                "Queued {} episode(s) of {series}: {batch}. Pending for this series: {queued}. Progress {progress}.",
                batch.len()
            ),
            Self::AtEnd => AT_END_MESSAGE.to_string(),
            Self::Cancelled => "Cancelled. Nothing was changed.".to_string(),
            Self::Undefined { label } => format!("Action '{label}' is not supported."),
        }
    }
}

/// Runs one user action against a series: resolve, decide, prompt, then commit.
/// Every prompt and remote lookup finishes before the first write.
pub(crate) struct Orchestrator<'a, S, R> {
    store: &'a S,
    resolver: &'a R,
    links: &'a LinkBuilder,
    prompter: Option<&'a mut dyn Prompter>,
}

impl<'a, S, R> Orchestrator<'a, S, R>
where
    S: DocumentStore + SettingsStore,
    R: MetadataResolver,
{
    pub(crate) fn new(
        store: &'a S,
        resolver: &'a R,
        links: &'a LinkBuilder,
        prompter: Option<&'a mut dyn Prompter>,
    ) -> Self {
        Self {
            store,
            resolver,
            links,
            prompter,
        }
    }

    fn prompter(&mut self) -> Option<&mut dyn Prompter> {
        match self.prompter.as_mut() {
            Some(prompter) => Some(&mut **prompter),
            None => None,
        }
    }

    pub(crate) fn run_action(&mut self, entry: &WatchEntry, action: Action) -> Result<ActionReport> {
        self.run_label(entry, action.label())
    }

    pub(crate) fn run_label(&mut self, entry: &WatchEntry, label: &str) -> Result<ActionReport> {
        let info = self
            .resolver
            .series_info(entry)
            .map_err(|err| ActionError::Resolution(format!("{err:#}")))?;
        let total = info.total();
        let current = stored_current(entry, total);
        let outcome = decide_label(current, total, label);
        debug!(
            series = %entry.name,
            resolved = %info.name,
            id = %info.id,
            label,
            current,
            total,
            ?outcome,
            "decided"
        );

        let settings = self.store.load_settings()?;
        let download = label.parse::<Action>().is_ok_and(Action::is_download);

        match outcome {
            Outcome::Direct { episode } => self.play(entry, &info, episode, &settings),
            Outcome::FirstAdd => self.register(entry, &info),
            Outcome::AskRange { bound } if download => {
                let title = format!("End episode for {}", entry.name);
                let Answer::Picked(end) = self.ask(&title, bound, current.saturating_add(1))? else {
                    return Ok(ActionReport::Cancelled);
                };
                check_bounds(end, bound)?;
                if end <= current {
                    return Err(ActionError::NothingToQueue {
                        picked: end,
                        current,
                    }
                    .into());
                }
                self.enqueue(entry, &info, current + 1, end, &settings)
            }
            Outcome::AskRange { bound } => {
                let title = format!("Episode number for {}", entry.name);
                let Answer::Picked(episode) =
                    self.ask(&title, bound, current.saturating_add(1))?
                else {
                    return Ok(ActionReport::Cancelled);
                };
                check_bounds(episode, bound)?;
                self.play(entry, &info, episode, &settings)
            }
            Outcome::AskTwice { bound } => {
                let title = format!("Start episode for {}", entry.name);
                let Answer::Picked(start) = self.ask(&title, bound, current.saturating_add(1))?
                else {
                    return Ok(ActionReport::Cancelled);
                };
                check_bounds(start, bound)?;
                let title = format!("End episode for {}", entry.name);
                let Answer::Picked(end) = self.ask(&title, bound, start)? else {
                    return Ok(ActionReport::Cancelled);
                };
                check_bounds(end, bound)?;
                if start > end {
                    return Err(ActionError::InvertedRange { start, end }.into());
                }
                self.enqueue(entry, &info, start, end, &settings)
            }
            Outcome::SingleCurrentOnly { episode } => {
                self.enqueue(entry, &info, episode, episode, &settings)
            }
            Outcome::AtEnd => {
                info!(series = %entry.name, "already at the last episode");
                Ok(ActionReport::AtEnd)
            }
            Outcome::Undefined => {
                warn!(series = %entry.name, label, "unsupported action");
                Ok(ActionReport::Undefined {
                    label: label.to_string(),
                })
            }
        }
    }

    fn ask(&mut self, title: &str, bound: u32, suggested: u32) -> Result<Answer<u32>> {
        let Some(prompter) = self.prompter() else {
            return Err(ActionError::PromptUnavailable {
                title: title.to_string(),
            }
            .into());
        };
        let bounds = NumberBounds {
            max: bound,
            initial: suggested.clamp(1, bound.max(1)),
        };
        Ok(prompter.ask_number(title, bounds))
    }

    fn play(
        &mut self,
        entry: &WatchEntry,
        info: &SeriesInfo,
        episode: u32,
        settings: &Settings,
    ) -> Result<ActionReport> {
        let total = info.total();
        check_bounds(episode, total)?;

        let mut session = QualitySession::new(
            settings.quality_order.clone(),
            settings.auto_quality,
            PickMode::Single,
        );
        let Some(source) = self.pick_source(&mut session, info, episode)? else {
            return Ok(ActionReport::Cancelled);
        };

        let progress = Progress::new(episode, total)?;
        let updated = WatchEntry::with_progress(
            &entry.name,
            &entry.source,
            image_for(entry, info),
            progress,
            progress.remaining() > 0,
        );
        self.store
            .update_cache(|cache| Ok(upsert_cache(cache, updated)))?;
        self.commit_learned_order(&session)?;

        info!(series = %entry.name, episode, %progress, "recorded playback");
        Ok(ActionReport::Played {
            episode,
            source,
            progress,
        })
    }

    fn register(&mut self, entry: &WatchEntry, info: &SeriesInfo) -> Result<ActionReport> {
        let progress = Progress::new(0, info.total())?;
        let added = WatchEntry::with_progress(
            &entry.name,
            &entry.source,
            image_for(entry, info),
            progress,
            true,
        );
        self.store
            .update_cache(|cache| Ok(upsert_cache(cache, added)))?;
        info!(series = %entry.name, total = progress.total, "registered series");
        Ok(ActionReport::Registered { progress })
    }

    fn enqueue(
        &mut self,
        entry: &WatchEntry,
        info: &SeriesInfo,
        start: u32,
        end: u32,
        settings: &Settings,
    ) -> Result<ActionReport> {
        let total = info.total();
        check_bounds(start, total)?;
        check_bounds(end, total)?;

        let mut session = QualitySession::new(
            settings.quality_order.clone(),
            settings.auto_quality,
            PickMode::Batch,
        );
        let steps = (end - start + 1) as usize;
        let mut links = Vec::with_capacity(steps + 1);
        links.push(self.links.directory_command(&entry.name));

        for (done, episode) in (start..=end).enumerate() {
            self.report_progress(done, steps);
            let Some(source) = self.pick_source(&mut session, info, episode)? else {
                return Ok(ActionReport::Cancelled);
            };
            links.push(self.links.episode_command(&entry.name, &source, episode));
        }
        self.report_progress(steps, steps);

        let batch = (start..=end).collect::<EpisodeSet>();
        let item = QueueItem {
            name: entry.name.clone(),
            source: entry.source.clone(),
            episodes: batch.clone(),
            img: image_for(entry, info).to_string(),
            links,
            is_unread: true,
        };
        let progress = Progress::new(end, total)?;
        let advanced = WatchEntry::with_progress(
            &entry.name,
            &entry.source,
            image_for(entry, info),
            progress,
            progress.remaining() > 0,
        );
        let library = self.store.update_library(|library| {
            library.queue = merge_queue_item(std::mem::take(&mut library.queue), item)?;
            library.cache = upsert_cache(std::mem::take(&mut library.cache), advanced);
            Ok(())
        })?;
        let queued = library
            .queue
            .iter()
            .find(|item| item.name == entry.name)
            .map(|item| item.episodes.clone())
            .unwrap_or_default();
        self.commit_learned_order(&session)?;

        info!(series = %entry.name, batch = %batch, queued = %queued, "queued downloads");
        Ok(ActionReport::Queued {
            batch,
            queued,
            progress,
        })
    }

    fn pick_source(
        &mut self,
        session: &mut QualitySession,
        info: &SeriesInfo,
        episode: u32,
    ) -> Result<Option<String>> {
        let Some(episode_id) = info.episode_id(episode) else {
            return Err(ActionError::UnknownEpisode {
                episode,
                known: info.episode_ids.len(),
            }
            .into());
        };
        let sources = self
            .resolver
            .episode_sources(episode_id)
            .map_err(|err| ActionError::Resolution(format!("{err:#}")))?;
        debug!(episode, episode_id, tags = sources.len(), "resolved sources");

        match session.choose(&sources, self.prompter())? {
            Answer::Picked(source) => Ok(Some(source)),
            Answer::Cancelled => {
                info!(episode, "quality prompt cancelled");
                Ok(None)
            }
        }
    }

    fn report_progress(&mut self, done: usize, total: usize) {
        debug!(done, total, "batch resolution progress");
        if let Some(prompter) = self.prompter() {
            prompter.progress(done, total);
        }
    }

    fn commit_learned_order(&self, session: &QualitySession) -> Result<()> {
        if let Some(order) = session.learned_order() {
            self.store.save_quality_order(order)?;
        }
        Ok(())
    }
}

/// Current episode from the stored progress. Unreadable progress counts as
/// nothing watched; progress past a shrunken series is pinned to its end.
fn stored_current(entry: &WatchEntry, total: u32) -> u32 {
    let current = match entry.progress() {
        Ok(progress) => progress.current,
        Err(err @ ProgressError::PastEnd { .. }) => {
            warn!(series = %entry.name, error = %err, "stored progress is past the end; starting over");
            0
        }
        Err(err) => {
            if entry.is_registered() {
                warn!(series = %entry.name, error = %err, "stored progress is malformed; starting over");
            }
            0
        }
    };
    if current > total {
        warn!(series = %entry.name, current, total, "series has fewer episodes than watched");
        return total;
    }
    current
}

fn check_bounds(value: u32, max: u32) -> Result<(), ActionError> {
    if value == 0 || value > max {
        return Err(ActionError::OutOfBounds { value, max });
    }
    Ok(())
}

fn image_for<'e>(entry: &'e WatchEntry, info: &'e SeriesInfo) -> &'e str {
    if entry.img.is_empty() {
        &info.img
    } else {
        &entry.img
    }
}

/// Finds a registered series by name, or the most recently touched one.
pub(crate) fn find_entry<S: DocumentStore>(store: &S, name: Option<&str>) -> Result<WatchEntry> {
    let library = store.load()?;
    match name {
        Some(name) => library
            .cache
            .into_iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| anyhow!("'{name}' is not in your list")),
        None => library
            .cache
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("your list is empty; add a series first")),
    }
}
