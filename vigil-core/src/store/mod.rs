//! Durable state: tags, rules, activities, settings and media assets.
//!
//! A single-file SQLite store in WAL mode. Multiple readers and a
//! serialised writer share one pool; every statement is short and
//! localised so the monitor loop is never blocked for longer than a
//! single statement.

mod activities;
mod assets;
mod rules;
mod schema;
mod settings;
mod tags;

pub use activities::{HourlyStat, ProcessStat, TagStat, UrlUsage};
pub use assets::AssetKind;

use std::{path::Path, path::PathBuf, time::Duration};

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use tracing::{info, warn};

use crate::error::{CoreError, Result};

/// Statements hitting a busy database are retried this many times before
/// the error surfaces to the caller.
pub(crate) const BUSY_RETRIES: u32 = 3;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
    path: PathBuf,
}

impl Database {
    /// Open (creating if missing) the store at `path`.
    ///
    /// Runs, in order: the integrity gate, schema creation, additive
    /// migrations, default seeding and crash repair. An integrity failure
    /// aborts start-up.
    pub async fn open(path: &Path) -> Result<Self> {
        let db = Self::connect(path).await?;
        db.check_integrity().await?;
        schema::migrate(db.pool()).await?;
        schema::seed_defaults(db.pool()).await?;
        let repaired = db.repair_open_activities().await?;
        if repaired > 0 {
            info!(repaired, "closed activities left open by a previous run");
        }
        Ok(db)
    }

    /// Open without migration or repair, for inspecting foreign database
    /// files (backup validation).
    pub async fn connect(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        Ok(Self {
            pool,
            path: path.to_owned(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn check_integrity(&self) -> Result<()> {
        let verdict: String = sqlx::query_scalar("PRAGMA integrity_check")
            .fetch_one(&self.pool)
            .await?;
        if verdict == "ok" {
            Ok(())
        } else {
            Err(CoreError::Integrity(verdict))
        }
    }

    /// Release every connection. Used before replacing the database file.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// SQLite reports lock contention as a database error rather than a
/// distinct variant; both the table-level and file-level messages count.
pub(crate) fn is_busy(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            let msg = db.message();
            msg.contains("database is locked") || msg.contains("database table is locked")
        }
        _ => false,
    }
}

pub(crate) fn warn_busy_retry(attempt: u32, what: &str) {
    warn!(attempt, what, "statement hit a busy database, retrying");
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Database;

    /// A fresh store on a temp file, fully migrated and seeded.
    pub async fn open_temp() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::open(&dir.path().join("vigil-test.db"))
            .await
            .expect("open store");
        (db, dir)
    }
}
