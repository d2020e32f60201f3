use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::cache::WatchEntry;
use super::queue::QueueItem;
use super::quality::default_quality_order;

/// The whole persisted document. Every write replaces it wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Library {
    #[serde(default)]
    pub(crate) cache: Vec<WatchEntry>,
    #[serde(default)]
    pub(crate) queue: Vec<QueueItem>,
}

pub(crate) trait DocumentStore {
    fn load(&self) -> Result<Library>;
    fn save(&self, library: &Library) -> Result<()>;

    /// Re-reads the document, rewrites the cache collection only.
    fn update_cache<F>(&self, f: F) -> Result<Vec<WatchEntry>>
    where
        F: FnOnce(Vec<WatchEntry>) -> Result<Vec<WatchEntry>>,
        Self: Sized,
    {
        let mut library = self.load()?;
        library.cache = f(std::mem::take(&mut library.cache))?;
        self.save(&library)?;
        Ok(library.cache)
    }

    /// Re-reads the document, rewrites the queue collection only.
    fn update_queue<F>(&self, f: F) -> Result<Vec<QueueItem>>
    where
        F: FnOnce(Vec<QueueItem>) -> Result<Vec<QueueItem>>,
        Self: Sized,
    {
        let mut library = self.load()?;
        library.queue = f(std::mem::take(&mut library.queue))?;
        self.save(&library)?;
        Ok(library.queue)
    }

    /// Re-reads the document and rewrites both collections in a single save.
    fn update_library<F>(&self, f: F) -> Result<Library>
    where
        F: FnOnce(&mut Library) -> Result<()>,
        Self: Sized,
    {
        let mut library = self.load()?;
        f(&mut library)?;
        self.save(&library)?;
        Ok(library)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Provider {
    Anilist,
    Animepahe,
}

impl Provider {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Anilist => "anilist",
            Self::Animepahe => "animepahe",
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "anilist" => Ok(Self::Anilist),
            "animepahe" => Ok(Self::Animepahe),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Settings {
    pub(crate) quality_order: Vec<String>,
    pub(crate) auto_quality: bool,
    pub(crate) provider: Provider,
    /// Player command; empty means only print the source.
    pub(crate) player: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quality_order: default_quality_order(),
            auto_quality: true,
            provider: Provider::Anilist,
            player: "mpv".to_string(),
        }
    }
}

pub(crate) trait SettingsStore {
    fn load_settings(&self) -> Result<Settings>;
    fn save_quality_order(&self, order: &[String]) -> Result<()>;
    fn save_auto_quality(&self, enabled: bool) -> Result<()>;
    fn save_provider(&self, provider: Provider) -> Result<()>;
    fn save_player(&self, player: &str) -> Result<()>;
}
