use asha_field_core::{KeyValueStore, StorageError};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations
pub async fn init_db(path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite:{}?mode=rwc", path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Key-value storage in the `kv` table.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database at `path`.
    pub async fn open(path: &Path) -> Result<Self, sqlx::Error> {
        Ok(Self::new(init_db(path).await?))
    }
}

fn backend(e: sqlx::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        sqlx::query_scalar::<_, String>("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO kv (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(&value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asha_field_core::{ModuleKey, RecordStore};
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_init_db_creates_tables() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("test.db");

        let pool = init_db(&db_path).await.unwrap();

        // Verify tables exist
        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        let table_names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        assert!(table_names.contains(&"kv"));
    }

    #[tokio::test]
    async fn test_get_set_roundtrip() {
        let temp_dir = tempdir().unwrap();
        let store = SqliteStore::open(&temp_dir.path().join("test.db"))
            .await
            .unwrap();

        assert_eq!(store.get("pregnancy").await.unwrap(), None);

        store.set("pregnancy", "[]".to_string()).await.unwrap();
        store.set("pregnancy", "[1]".to_string()).await.unwrap();

        assert_eq!(store.get("pregnancy").await.unwrap().as_deref(), Some("[1]"));
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let payload = json!({
            "topic": "Handwashing",
            "targetGroup": "Mothers",
            "location": "School"
        })
        .as_object()
        .cloned()
        .unwrap();

        {
            let store = RecordStore::new(Arc::new(SqliteStore::open(&db_path).await.unwrap()));
            store
                .create(ModuleKey::HealthAwareness, payload.clone(), "ASHA-1")
                .await
                .unwrap();
        }

        let store = RecordStore::new(Arc::new(SqliteStore::open(&db_path).await.unwrap()));
        let records = store.list(ModuleKey::HealthAwareness).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].client_id, "HA00001");

        let next = store
            .create(ModuleKey::HealthAwareness, payload, "ASHA-1")
            .await
            .unwrap();
        assert_eq!(next.client_id, "HA00002");
    }
}
