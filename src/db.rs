use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::warn;

use crate::app::library::{DocumentStore, Library, Provider, Settings, SettingsStore};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const LIBRARY_DOCUMENT: &str = "library";

const KEY_QUALITY_ORDER: &str = "settings.qualityOrder";
const KEY_AUTO_QUALITY: &str = "settings.autoQuality";
const KEY_PROVIDER: &str = "settings.provider";
const KEY_PLAYER: &str = "settings.player";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        // The TUI refresh worker holds a second connection.
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("failed to set database busy timeout")?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Ok(Self { conn })
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                name TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn read_document(&self, name: &str) -> Result<Option<String>> {
        let body = self
            .conn
            .query_row(
                "SELECT body FROM documents WHERE name = ?1",
                params![name],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(body)
    }

    fn write_document(&self, name: &str, body: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r#"
            INSERT INTO documents (name, body, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(name) DO UPDATE SET
                body = excluded.body,
                updated_at = excluded.updated_at
            "#,
            params![name, body, now],
        )?;
        Ok(())
    }

    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value, now],
        )?;
        Ok(())
    }
}

impl DocumentStore for Database {
    fn load(&self) -> Result<Library> {
        let Some(body) = self.read_document(LIBRARY_DOCUMENT)? else {
            return Ok(Library::default());
        };
        match serde_json::from_str::<Library>(&body) {
            Ok(library) => Ok(library),
            Err(err) => {
                warn!(error = %err, "stored library document is unreadable; starting empty");
                Ok(Library::default())
            }
        }
    }

    fn save(&self, library: &Library) -> Result<()> {
        let body = serde_json::to_string(library).context("failed to encode library document")?;
        self.write_document(LIBRARY_DOCUMENT, &body)
    }
}

impl SettingsStore for Database {
    fn load_settings(&self) -> Result<Settings> {
        let mut settings = Settings::default();

        if let Some(raw) = self.get_setting(KEY_QUALITY_ORDER)? {
            match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(order) => settings.quality_order = order,
                Err(err) => warn!(error = %err, "ignoring unreadable quality order"),
            }
        }
        if let Some(raw) = self.get_setting(KEY_AUTO_QUALITY)? {
            settings.auto_quality = raw != "false";
        }
        if let Some(raw) = self.get_setting(KEY_PROVIDER)? {
            match raw.parse::<Provider>() {
                Ok(provider) => settings.provider = provider,
                Err(err) => warn!(error = %err, "ignoring unknown provider setting"),
            }
        }
        if let Some(raw) = self.get_setting(KEY_PLAYER)? {
            settings.player = raw;
        }

        Ok(settings)
    }

    fn save_quality_order(&self, order: &[String]) -> Result<()> {
        let raw = serde_json::to_string(order).context("failed to encode quality order")?;
        self.set_setting(KEY_QUALITY_ORDER, &raw)
    }

    fn save_auto_quality(&self, enabled: bool) -> Result<()> {
        self.set_setting(KEY_AUTO_QUALITY, if enabled { "true" } else { "false" })
    }

    fn save_provider(&self, provider: Provider) -> Result<()> {
        self.set_setting(KEY_PROVIDER, provider.label())
    }

    fn save_player(&self, player: &str) -> Result<()> {
        self.set_setting(KEY_PLAYER, player)
    }
}
