use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tokio::sync::RwLock;
use tracing::warn;

/// Storage key holding the serialized list of saved article ids.
pub const SAVED_IDS_KEY: &str = "savedArticleIds";

/// Flat key-value capability backing the saved-article set. Injected so the
/// set can live in any persistent store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    async fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// SQLite-backed key-value store. Each write fully replaces the prior value,
/// so no transaction discipline is needed.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM kv_entries WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_entries (key, value)
            VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM kv_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// The bookmarked-article set: an ordered id list kept in memory and written
/// back in full on every mutation.
pub struct SavedArticles {
    store: Arc<dyn KeyValueStore>,
    ids: RwLock<Vec<String>>,
}

impl SavedArticles {
    /// Load the persisted set. A corrupt stored value is discarded, logged,
    /// and replaced with an empty set; it is never surfaced to the user.
    pub async fn load(store: Arc<dyn KeyValueStore>) -> anyhow::Result<Self> {
        let ids = match store.get(SAVED_IDS_KEY).await? {
            Some(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(ids) => ids,
                Err(e) => {
                    warn!("Discarding corrupt saved-article data: {}", e);
                    store.remove(SAVED_IDS_KEY).await?;
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        Ok(Self {
            store,
            ids: RwLock::new(ids),
        })
    }

    pub async fn is_saved(&self, id: &str) -> bool {
        self.ids.read().await.iter().any(|saved| saved == id)
    }

    pub async fn saved_ids(&self) -> Vec<String> {
        self.ids.read().await.clone()
    }

    /// Flip membership of `id` and persist the full updated set. Returns the
    /// new membership state.
    pub async fn toggle(&self, id: &str) -> anyhow::Result<bool> {
        let mut ids = self.ids.write().await;

        let saved = if let Some(pos) = ids.iter().position(|saved| saved == id) {
            ids.remove(pos);
            false
        } else {
            ids.push(id.to_string());
            true
        };

        let serialized = serde_json::to_string(&*ids)?;
        self.store.set(SAVED_IDS_KEY, &serialized).await?;

        Ok(saved)
    }
}
