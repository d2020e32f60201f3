use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::cache::WatchEntry;
use super::library::Provider;
use super::quality::QualityMap;
use crate::http::HttpClient;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(4);
const READ_TIMEOUT: Duration = Duration::from_secs(15);

/// Freshly resolved metadata for one series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SeriesInfo {
    pub(crate) name: String,
    pub(crate) id: String,
    pub(crate) img: String,
    /// Source ids of whole-numbered episodes; index 0 is episode 1.
    pub(crate) episode_ids: Vec<String>,
}

impl SeriesInfo {
    pub(crate) fn total(&self) -> u32 {
        self.episode_ids.len() as u32
    }

    pub(crate) fn episode_id(&self, episode: u32) -> Option<&str> {
        let idx = usize::try_from(episode).ok()?.checked_sub(1)?;
        self.episode_ids.get(idx).map(String::as_str)
    }
}

pub(crate) trait MetadataResolver {
    fn search(&self, query: &str) -> Result<Vec<WatchEntry>>;
    fn series_info(&self, entry: &WatchEntry) -> Result<SeriesInfo>;
    fn episode_sources(&self, episode_id: &str) -> Result<QualityMap>;
}

#[derive(Debug, Clone)]
pub(crate) struct ConsumetClient {
    http: HttpClient,
    provider: Provider,
}

impl ConsumetClient {
    pub(crate) fn new(base_url: &str, provider: Provider) -> Self {
        Self {
            http: HttpClient::new(base_url, CONNECT_TIMEOUT, READ_TIMEOUT),
            provider,
        }
    }

    fn search_anilist(&self, query: &str) -> Result<Vec<WatchEntry>> {
        let cleaned = query.replace('/', " ");
        let path = format!("/meta/anilist/{}", urlencoding::encode(cleaned.trim()));
        let body: SearchResponse = self
            .http
            .get_json(&path, &[])
            .with_context(|| format!("anilist search for '{query}' failed"))?;
        Ok(body.into_hits())
    }

    fn search_animepahe(&self, query: &str) -> Result<Vec<WatchEntry>> {
        let cleaned = query
            .chars()
            .filter(|ch| ch.is_alphanumeric() || ch.is_whitespace())
            .collect::<String>();
        let path = format!("/anime/animepahe/{}", urlencoding::encode(cleaned.trim()));
        let body: SearchResponse = self
            .http
            .get_json(&path, &[])
            .with_context(|| format!("animepahe search for '{query}' failed"))?;
        Ok(body.into_hits())
    }

    fn info_anilist(&self, entry: &WatchEntry) -> Result<SeriesInfo> {
        let path = format!("/meta/anilist/info/{}", urlencoding::encode(&entry.source));
        let body: InfoResponse = self
            .http
            .get_json(&path, &[("provider", "animepahe")])
            .with_context(|| format!("anilist info for '{}' failed", entry.name))?;
        Ok(body.into_series(&entry.img))
    }

    fn info_animepahe(&self, entry: &WatchEntry) -> Result<SeriesInfo> {
        let hits = self.search_animepahe(&entry.name)?;
        let Some(hit) = hits.into_iter().find(|hit| hit.name == entry.name) else {
            return Err(anyhow!("animepahe has no exact match for '{}'", entry.name));
        };
        debug!(series = %entry.name, id = %hit.source, "animepahe exact match");

        let path = format!("/anime/animepahe/info/{}", urlencoding::encode(&hit.source));
        let body: InfoResponse = self
            .http
            .get_json(&path, &[])
            .with_context(|| format!("animepahe info for '{}' failed", entry.name))?;
        Ok(body.into_series(&entry.img))
    }
}

impl MetadataResolver for ConsumetClient {
    fn search(&self, query: &str) -> Result<Vec<WatchEntry>> {
        info!(
            provider = self.provider.label(),
            base = self.http.base_url(),
            query,
            "searching"
        );
        match self.provider {
            Provider::Anilist => self.search_anilist(query),
            Provider::Animepahe => self.search_animepahe(query),
        }
    }

    fn series_info(&self, entry: &WatchEntry) -> Result<SeriesInfo> {
        // Animepahe ids are slugs with dashes; anilist ids are numeric.
        if entry.source.contains('-') {
            self.info_animepahe(entry)
        } else {
            self.info_anilist(entry)
        }
    }

    fn episode_sources(&self, episode_id: &str) -> Result<QualityMap> {
        let body: WatchResponse = self
            .http
            .get_json("/anime/animepahe/watch", &[("episodeId", episode_id)])
            .with_context(|| format!("source lookup for episode '{episode_id}' failed"))?;
        Ok(body.into_quality_map())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: Value,
    title: Title,
    #[serde(default)]
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Title {
    Plain(String),
    Localized {
        romaji: Option<String>,
        english: Option<String>,
    },
}

impl Title {
    fn display(&self) -> String {
        match self {
            Self::Plain(title) => title.trim().to_string(),
            Self::Localized { romaji, english } => romaji
                .as_deref()
                .or(english.as_deref())
                .unwrap_or_default()
                .trim()
                .to_string(),
        }
    }
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

impl SearchResponse {
    fn into_hits(self) -> Vec<WatchEntry> {
        self.results
            .into_iter()
            .filter_map(|result| {
                let source = id_text(&result.id)?;
                let name = result.title.display();
                if name.is_empty() {
                    return None;
                }
                Some(WatchEntry {
                    name,
                    source,
                    episodes: "0".to_string(),
                    img: result.image.unwrap_or_default(),
                    is_unread: false,
                    updated_at: None,
                })
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    id: Value,
    title: Title,
    #[serde(default)]
    episodes: Vec<EpisodeResult>,
}

#[derive(Debug, Deserialize)]
struct EpisodeResult {
    id: String,
    #[serde(default)]
    number: Option<f64>,
}

impl InfoResponse {
    fn into_series(self, img: &str) -> SeriesInfo {
        let episode_ids = self
            .episodes
            .into_iter()
            .filter(|episode| {
                episode
                    .number
                    .is_some_and(|number| number != 0.0 && number.fract() == 0.0)
            })
            .map(|episode| episode.id)
            .collect();
        SeriesInfo {
            name: self.title.display(),
            id: id_text(&self.id).unwrap_or_default(),
            img: img.to_string(),
            episode_ids,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WatchResponse {
    #[serde(default)]
    sources: Vec<SourceResult>,
}

#[derive(Debug, Deserialize)]
struct SourceResult {
    quality: String,
    url: String,
}

impl WatchResponse {
    fn into_quality_map(self) -> QualityMap {
        let mut map = QualityMap::new();
        for source in self.sources {
            // "HLS · 1080p eng" -> "-1080p eng"; dubbed variants are skipped.
            let label = source.quality.split(" · ").nth(1).unwrap_or_default().trim();
            let tag = format!("-{label}");
            if tag.ends_with("eng") {
                continue;
            }
            map.insert(tag, source.url);
        }
        map
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_hits_accept_numeric_and_slug_ids() {
        let raw = r#"{"results":[
            {"id": 21, "title": {"romaji": "One Piece"}, "image": "op.jpg"},
            {"id": "abc-123", "title": "Frieren", "image": null},
            {"id": "", "title": "No Id"}
        ]}"#;
        let parsed: SearchResponse = serde_json::from_str(raw).expect("parse");
        let hits = parsed.into_hits();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].name, "One Piece");
        assert_eq!(hits[0].source, "21");
        assert_eq!(hits[0].episodes, "0");
        assert_eq!(hits[1].source, "abc-123");
        assert_eq!(hits[1].img, "");
    }

    #[test]
    fn info_keeps_only_whole_nonzero_episodes() {
        let raw = r#"{"id": "x-1", "title": {"romaji": "Show"}, "episodes": [
            {"id": "e0", "number": 0},
            {"id": "e1", "number": 1},
            {"id": "e1.5", "number": 1.5},
            {"id": "e2", "number": 2}
        ]}"#;
        let parsed: InfoResponse = serde_json::from_str(raw).expect("parse");
        let info = parsed.into_series("poster.jpg");
        assert_eq!(info.total(), 2);
        assert_eq!(info.episode_id(1), Some("e1"));
        assert_eq!(info.episode_id(2), Some("e2"));
        assert_eq!(info.episode_id(0), None);
        assert_eq!(info.episode_id(3), None);
        assert_eq!(info.img, "poster.jpg");
    }

    #[test]
    fn info_skips_episodes_without_a_number() {
        let raw = r#"{"id": "x-1", "title": "Show", "episodes": [
            {"id": "e1", "number": 1},
            {"id": "special"},
            {"id": "e2", "number": null},
            {"id": "e3", "number": 2}
        ]}"#;
        let parsed: InfoResponse = serde_json::from_str(raw).expect("parse");
        let info = parsed.into_series("");
        assert_eq!(info.total(), 2);
        assert_eq!(info.episode_id(2), Some("e3"));
    }

    #[test]
    fn watch_sources_become_tags_without_dubs() {
        let raw = r#"{"sources":[
            {"quality": "HLS · 1080p", "url": "u1"},
            {"quality": "HLS · 1080p eng", "url": "u2"},
            {"quality": "HLS · 720p", "url": "u3"}
        ]}"#;
        let parsed: WatchResponse = serde_json::from_str(raw).expect("parse");
        let map = parsed.into_quality_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("-1080p").map(String::as_str), Some("u1"));
        assert_eq!(map.get("-720p").map(String::as_str), Some("u3"));
    }
}
