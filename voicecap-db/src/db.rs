//! Database connection pool and migration bootstrap.

use std::path::PathBuf;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::info;

use crate::error::{DbError, DbResult};

/// Database pool wrapper.
#[derive(Debug, Clone)]
pub struct DbPool {
    pool: SqlitePool,
}

impl DbPool {
    /// Initialize the database: ensure the data directory exists, open (or
    /// create) the file, and run migrations.
    pub async fn new() -> DbResult<Self> {
        let db_path = Self::db_path()?;
        info!("Initializing database at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite:{}", db_path.display());
        let pool = Self::create_pool(&db_url).await?;
        Self::run_migrations(&pool).await?;

        info!("Database initialized successfully");
        Ok(Self { pool })
    }

    /// In-memory pool for tests, also running migrations.
    pub async fn new_in_memory() -> DbResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;
        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Get the inner SQLx pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get the database file path under the platform data directory.
    pub fn db_path() -> DbResult<PathBuf> {
        let data_dir = dirs::data_dir().ok_or(DbError::NoConfigDir)?;
        Ok(data_dir.join("voicecap").join("db.sqlite3"))
    }

    async fn create_pool(database_url: &str) -> DbResult<SqlitePool> {
        let options = SqliteConnectOptions::new()
            .filename(database_url.strip_prefix("sqlite:").unwrap_or(database_url))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA cache_size = -64000")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await?;

        Ok(pool)
    }

    const MIGRATIONS: &'static [&'static str] = &[
        include_str!("../migrations/001_jobs.sql"),
        include_str!("../migrations/002_prefs.sql"),
        include_str!("../migrations/003_transcripts.sql"),
        include_str!("../migrations/004_ledger.sql"),
        include_str!("../migrations/005_keys.sql"),
        include_str!("../migrations/006_audio.sql"),
    ];

    async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
        for migration_sql in Self::MIGRATIONS {
            for statement in migration_sql.split(';') {
                let stmt = statement.trim();
                if !stmt.is_empty() {
                    sqlx::query(stmt).execute(pool).await.map_err(|e| {
                        DbError::Migration(format!("failed to execute migration: {e}"))
                    })?;
                }
            }
        }
        info!("Database migrations completed");
        Ok(())
    }

    /// Close the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
