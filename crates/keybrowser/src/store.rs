//! Durable storage for the persisted subset of browser state

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::warn;

/// The only browser state written to durable storage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub open_folders: BTreeSet<String>,
}

impl PersistedState {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize browser state")
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Failed to parse browser state")
    }
}

/// Load/save port keyed by a caller-supplied storage key
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<PersistedState>>;
    async fn save(&self, key: &str, state: &PersistedState) -> Result<()>;
    /// Every storage key with saved state
    async fn list_keys(&self) -> Result<Vec<String>>;
}

/// SQLite-backed store, one row per storage key
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        Self::connect(options, 5).await
    }

    /// Private in-memory database, handy for tests and dry runs
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        Self::connect(options, 1).await
    }

    async fn connect(options: SqliteConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn load(&self, key: &str) -> Result<Option<PersistedState>> {
        let row = sqlx::query("SELECT state FROM browser_state WHERE storage_key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let raw: String = row.get("state");
                PersistedState::from_json(&raw).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn save(&self, key: &str, state: &PersistedState) -> Result<()> {
        let raw = state.to_json()?;
        let updated_at = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO browser_state (storage_key, state, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(storage_key) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(&raw)
        .bind(&updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Newest first
    async fn list_keys(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT storage_key FROM browser_state ORDER BY updated_at DESC")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get("storage_key")).collect())
    }
}

const JSON_EXTENSION: &str = ".json";

/// One JSON file per storage key inside a directory.
///
/// File names are the percent-encoded key, so distinct keys never share a
/// file and the key can be read back from the name.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}{JSON_EXTENSION}", urlencoding::encode(key)))
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self, key: &str) -> Result<Option<PersistedState>> {
        let path = self.path_for(key);

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }

        let contents = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read browser state from {}", path.display()))?;

        PersistedState::from_json(&contents).map(Some)
    }

    async fn save(&self, key: &str, state: &PersistedState) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create directory {}", self.dir.display()))?;

        let path = self.path_for(key);
        tokio::fs::write(&path, state.to_json()?)
            .await
            .with_context(|| format!("Failed to write browser state to {}", path.display()))?;

        Ok(())
    }

    /// Sorted by key
    async fn list_keys(&self) -> Result<Vec<String>> {
        if !tokio::fs::try_exists(&self.dir).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Failed to read directory {}", self.dir.display()))?;

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(encoded) = file_name
                .to_str()
                .and_then(|name| name.strip_suffix(JSON_EXTENSION))
            else {
                continue;
            };
            match urlencoding::decode(encoded) {
                Ok(key) => keys.push(key.into_owned()),
                Err(e) => warn!(file = encoded, "skipping state file with undecodable name: {e}"),
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Raw JSON strings in memory. Raw storage lets tests plant corrupt records.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_raw(&self, key: &str, raw: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.insert(key.to_string(), raw.to_string());
        }
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.records.lock().ok()?.get(key).cloned()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<PersistedState>> {
        match self.raw(key) {
            Some(raw) => PersistedState::from_json(&raw).map(Some),
            None => Ok(None),
        }
    }

    async fn save(&self, key: &str, state: &PersistedState) -> Result<()> {
        self.insert_raw(key, &state.to_json()?);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = match self.records.lock() {
            Ok(records) => records.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_state() -> PersistedState {
        PersistedState {
            open_folders: ["docs/".to_string(), "src/utils/".to_string()].into(),
        }
    }

    #[tokio::test]
    async fn test_sqlite_save_and_load() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert_eq!(store.load("browser").await.unwrap(), None);

        store.save("browser", &sample_state()).await.unwrap();
        assert_eq!(store.load("browser").await.unwrap(), Some(sample_state()));

        // Saving again overwrites instead of adding a row
        store
            .save("browser", &PersistedState::default())
            .await
            .unwrap();
        assert_eq!(
            store.load("browser").await.unwrap(),
            Some(PersistedState::default())
        );
        assert_eq!(store.list_keys().await.unwrap(), vec!["browser"]);
    }

    #[tokio::test]
    async fn test_sqlite_file_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("state.db");

        let store = SqliteStore::new(&db_path).await.unwrap();
        store.save("a", &sample_state()).await.unwrap();
        drop(store);

        let reopened = SqliteStore::new(&db_path).await.unwrap();
        assert_eq!(reopened.load("a").await.unwrap(), Some(sample_state()));
    }

    #[tokio::test]
    async fn test_json_file_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("state"));

        assert_eq!(store.load("my/browser").await.unwrap(), None);
        store.save("my/browser", &sample_state()).await.unwrap();
        assert_eq!(
            store.load("my/browser").await.unwrap(),
            Some(sample_state())
        );

        let raw = std::fs::read_to_string(temp_dir.path().join("state/my%2Fbrowser.json")).unwrap();
        assert!(raw.contains("open_folders"));
        assert!(raw.contains("src/utils/"));
        assert_eq!(store.list_keys().await.unwrap(), vec!["my/browser"]);
    }

    #[tokio::test]
    async fn test_json_file_store_keeps_similar_keys_apart() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp_dir.path());

        store.save("my/browser", &sample_state()).await.unwrap();
        assert_eq!(store.load("my_browser").await.unwrap(), None);
        assert_eq!(store.load("my browser").await.unwrap(), None);

        store
            .save("my_browser", &PersistedState::default())
            .await
            .unwrap();
        assert_eq!(
            store.load("my/browser").await.unwrap(),
            Some(sample_state())
        );
        assert_eq!(
            store.list_keys().await.unwrap(),
            vec!["my/browser", "my_browser"]
        );
    }

    #[tokio::test]
    async fn test_json_file_store_missing_directory_lists_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("absent"));
        assert!(store.list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_an_error() {
        let store = MemoryStore::new();
        store.insert_raw("browser", "{not json");
        assert!(store.load("browser").await.is_err());
    }

    #[test]
    fn test_missing_field_defaults() {
        let state = PersistedState::from_json("{}").unwrap();
        assert!(state.open_folders.is_empty());
    }
}
