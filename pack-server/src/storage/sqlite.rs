//! SQLite registration log.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use pack_content::{ContentError, Registration, RegistrationLog, StoreStats};
use pack_types::ContentHash;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// SQLite-backed registration log.
///
/// Uses WAL mode for concurrent reads/writes.
#[derive(Clone)]
pub struct SqliteRegistry {
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRegistry")
            .field("connections", &self.pool.size())
            .finish()
    }
}

impl SqliteRegistry {
    /// Open a registry at `path`, creating the database if needed.
    pub async fn new(path: &Path) -> StorageResult<Self> {
        let path_str = path.to_str().ok_or_else(|| StorageError::InvalidPath {
            path: path.to_path_buf(),
        })?;
        let options = SqliteConnectOptions::from_str(path_str)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        let registry = Self { pool };
        registry.run_migrations().await?;
        Ok(registry)
    }

    /// Create an in-memory registry (for testing).
    pub async fn in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str(":memory:")?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        // One connection: each in-memory connection is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let registry = Self { pool };
        registry.run_migrations().await?;
        Ok(registry)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS registrations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content_hash TEXT NOT NULL,
                external_id TEXT NOT NULL,
                source_ip TEXT NOT NULL,
                size INTEGER NOT NULL,
                stored_at INTEGER NOT NULL,
                deduplicated INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_registrations_hash ON registrations(content_hash)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_registrations_external_id ON registrations(external_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert(&self, r: &Registration) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO registrations
                (content_hash, external_id, source_ip, size, stored_at, deduplicated)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(r.content_hash.to_hex())
        .bind(&r.external_id)
        .bind(&r.source_ip)
        .bind(r.size as i64)
        .bind(r.stored_at)
        .bind(r.deduplicated)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn select_history(&self, hash: &ContentHash) -> StorageResult<Vec<Registration>> {
        let rows = sqlx::query_as::<_, RegistrationRow>(
            r#"
            SELECT content_hash, external_id, source_ip, size, stored_at, deduplicated
            FROM registrations
            WHERE content_hash = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(hash.to_hex())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Registration::try_from).collect()
    }

    async fn select_latest(&self, external_id: &str) -> StorageResult<Option<Registration>> {
        let row = sqlx::query_as::<_, RegistrationRow>(
            r#"
            SELECT content_hash, external_id, source_ip, size, stored_at, deduplicated
            FROM registrations
            WHERE external_id = ?1
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Registration::try_from).transpose()
    }

    async fn select_stats(&self) -> StorageResult<StoreStats> {
        let (registrations, distinct): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(DISTINCT content_hash) FROM registrations",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StoreStats {
            registrations: registrations as u64,
            distinct_packs: distinct as u64,
        })
    }
}

#[async_trait]
impl RegistrationLog for SqliteRegistry {
    async fn record(&self, registration: &Registration) -> Result<(), ContentError> {
        Ok(self.insert(registration).await?)
    }

    async fn history(&self, hash: &ContentHash) -> Result<Vec<Registration>, ContentError> {
        Ok(self.select_history(hash).await?)
    }

    async fn latest_for_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Registration>, ContentError> {
        Ok(self.select_latest(external_id).await?)
    }

    async fn stats(&self) -> Result<StoreStats, ContentError> {
        Ok(self.select_stats().await?)
    }
}

/// Internal row type for SQLite queries.
#[derive(sqlx::FromRow)]
struct RegistrationRow {
    content_hash: String,
    external_id: String,
    source_ip: String,
    size: i64,
    stored_at: i64,
    deduplicated: bool,
}

impl TryFrom<RegistrationRow> for Registration {
    type Error = StorageError;

    fn try_from(row: RegistrationRow) -> Result<Self, Self::Error> {
        Ok(Registration {
            content_hash: ContentHash::from_hex(&row.content_hash).map_err(|e| {
                StorageError::CorruptRow {
                    reason: e.to_string(),
                }
            })?,
            external_id: row.external_id,
            source_ip: row.source_ip,
            size: row.size as u64,
            stored_at: row.stored_at,
            deduplicated: row.deduplicated,
        })
    }
}
