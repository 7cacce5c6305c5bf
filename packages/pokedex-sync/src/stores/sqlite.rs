//! SQLite-backed entry store.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use super::{EntryStore, ImportSource, ImportSummary, PokedexEntry, StoreError};

/// Entry store over a SQLite pool.
///
/// Cloning shares the pool, so one store can be handed to the sync service
/// while readers keep their own handle.
#[derive(Clone)]
pub struct SqliteEntryStore {
    pool: SqlitePool,
}

impl SqliteEntryStore {
    /// Connect and run migrations.
    ///
    /// # Example URLs
    /// - `sqlite::memory:` - in-memory database (ephemeral)
    /// - `sqlite:pokedex.db?mode=rwc` - file database, created if missing
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        Self::with_options(database_url, SqlitePoolOptions::new().max_connections(5)).await
    }

    /// Create an in-memory store (for testing).
    pub async fn in_memory() -> Result<Self, StoreError> {
        // A memory database lives and dies with its connection, so the
        // pool must never open a second one.
        Self::with_options("sqlite::memory:", SqlitePoolOptions::new().max_connections(1)).await
    }

    async fn with_options(
        database_url: &str,
        options: SqlitePoolOptions,
    ) -> Result<Self, StoreError> {
        let pool = options.connect(database_url).await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pokedex_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                position INTEGER NOT NULL,
                name TEXT NOT NULL UNIQUE,
                url TEXT NOT NULL,
                imported_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_pokedex_entries_position
                ON pokedex_entries(position);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl EntryStore for SqliteEntryStore {
    async fn import_entries(
        &self,
        sources: Vec<ImportSource>,
    ) -> Result<ImportSummary, StoreError> {
        // Any error before commit drops the transaction and rolls the
        // whole batch back.
        let mut tx = self.pool.begin().await?;
        let imported_at = Utc::now();
        let mut summary = ImportSummary::default();

        for source in &sources {
            let (name, url) = source.fields()?;

            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM pokedex_entries WHERE name = ?1)",
            )
            .bind(name)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO pokedex_entries (position, name, url, imported_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(name) DO UPDATE SET
                    position = excluded.position,
                    url = excluded.url,
                    imported_at = excluded.imported_at
                "#,
            )
            .bind(source.index as i64)
            .bind(name)
            .bind(url)
            .bind(imported_at)
            .execute(&mut *tx)
            .await?;

            if exists {
                summary.updated += 1;
            } else {
                summary.inserted += 1;
            }
        }

        tx.commit().await?;
        Ok(summary)
    }

    async fn list_entries(&self) -> Result<Vec<PokedexEntry>, StoreError> {
        let entries = sqlx::query_as::<_, PokedexEntry>(
            "SELECT id, position, name, url, imported_at FROM pokedex_entries ORDER BY position",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn entry_count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pokedex_entries")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }
}
