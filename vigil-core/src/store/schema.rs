//! Canonical schema, additive migrations and default seeding.
//!
//! Every step is idempotent: re-opening an already-migrated store is a
//! no-op, and seeding respects presence by unique name.

use sqlx::SqlitePool;
use tracing::info;

use vigil_model::{PROCESS_IDLE, PROCESS_LOCKED, TAG_AWAY, TAG_UNCLASSIFIED};

use crate::error::Result;

const CREATE_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        color TEXT NOT NULL,
        category TEXT NOT NULL DEFAULT 'other',
        alert_enabled INTEGER NOT NULL DEFAULT 0,
        alert_message TEXT,
        alert_cooldown INTEGER NOT NULL DEFAULT 30,
        block_enabled INTEGER NOT NULL DEFAULT 0,
        block_start_time TEXT,
        block_end_time TEXT,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS rules (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        priority INTEGER NOT NULL DEFAULT 0,
        enabled INTEGER NOT NULL DEFAULT 1,
        process_pattern TEXT,
        url_pattern TEXT,
        window_title_pattern TEXT,
        browser_profile TEXT,
        process_path_pattern TEXT,
        tag_id INTEGER NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
    )",
    "CREATE TABLE IF NOT EXISTS activities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        start_time TIMESTAMP NOT NULL,
        end_time TIMESTAMP,
        process_name TEXT,
        window_title TEXT,
        browser_url TEXT,
        browser_profile TEXT,
        tag_id INTEGER,
        rule_id INTEGER,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE SET NULL,
        FOREIGN KEY (rule_id) REFERENCES rules(id) ON DELETE SET NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_activities_time ON activities(start_time, end_time)",
    "CREATE INDEX IF NOT EXISTS idx_activities_tag ON activities(tag_id)",
    "CREATE INDEX IF NOT EXISTS idx_activities_process ON activities(process_name)",
    "CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT
    )",
    "CREATE TABLE IF NOT EXISTS alert_sounds (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        file_path TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS alert_images (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        file_path TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
];

/// Columns that later releases bolted onto existing tables. Stores created
/// before those releases gain them here; fresh stores already carry them.
const ADDITIVE_COLUMNS: &[&str] = &[
    "ALTER TABLE rules ADD COLUMN process_path_pattern TEXT",
    "ALTER TABLE tags ADD COLUMN alert_enabled INTEGER NOT NULL DEFAULT 0",
    "ALTER TABLE tags ADD COLUMN alert_message TEXT",
    "ALTER TABLE tags ADD COLUMN alert_cooldown INTEGER NOT NULL DEFAULT 30",
    "ALTER TABLE tags ADD COLUMN block_enabled INTEGER NOT NULL DEFAULT 0",
    "ALTER TABLE tags ADD COLUMN block_start_time TEXT",
    "ALTER TABLE tags ADD COLUMN block_end_time TEXT",
    "ALTER TABLE tags ADD COLUMN category TEXT NOT NULL DEFAULT 'other'",
];

pub(crate) async fn migrate(pool: &SqlitePool) -> Result<()> {
    for statement in CREATE_TABLES {
        sqlx::query(statement).execute(pool).await?;
    }
    for statement in ADDITIVE_COLUMNS {
        add_column(pool, statement).await?;
    }
    Ok(())
}

async fn add_column(pool: &SqlitePool, statement: &str) -> Result<()> {
    match sqlx::query(statement).execute(pool).await {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db)) if db.message().contains("duplicate column name") => Ok(()),
        Err(err) => Err(err.into()),
    }
}

const DEFAULT_TAGS: &[(&str, &str, &str)] = &[
    ("Work", "#4CAF50", "work"),
    ("Distraction", "#FF5722", "non_work"),
    (TAG_AWAY, "#9E9E9E", "other"),
    (TAG_UNCLASSIFIED, "#607D8B", "other"),
];

pub(crate) async fn seed_defaults(pool: &SqlitePool) -> Result<()> {
    for (name, color, category) in DEFAULT_TAGS {
        sqlx::query("INSERT INTO tags (name, color, category) VALUES (?, ?, ?) ON CONFLICT(name) DO NOTHING")
            .bind(name)
            .bind(color)
            .bind(category)
            .execute(pool)
            .await?;
    }

    let away_id: Option<i64> = sqlx::query_scalar("SELECT id FROM tags WHERE name = ?")
        .bind(TAG_AWAY)
        .fetch_optional(pool)
        .await?;
    let Some(away_id) = away_id else {
        return Ok(());
    };

    seed_rule(pool, "Screen locked", 100, PROCESS_LOCKED, away_id).await?;
    seed_rule(pool, "Idle", 90, PROCESS_IDLE, away_id).await?;
    Ok(())
}

async fn seed_rule(
    pool: &SqlitePool,
    name: &str,
    priority: i64,
    process_pattern: &str,
    tag_id: i64,
) -> Result<()> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rules WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(());
    }
    sqlx::query("INSERT INTO rules (name, priority, process_pattern, tag_id) VALUES (?, ?, ?, ?)")
        .bind(name)
        .bind(priority)
        .bind(process_pattern)
        .bind(tag_id)
        .execute(pool)
        .await?;
    info!(name, priority, "seeded built-in rule");
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::store::test_support::open_temp;
    use vigil_model::{TAG_AWAY, TAG_UNCLASSIFIED};

    #[tokio::test]
    async fn migration_and_seeding_are_idempotent() {
        let (db, _dir) = open_temp().await;

        // Re-running the whole open-time sequence must not duplicate rows.
        super::migrate(db.pool()).await.unwrap();
        super::seed_defaults(db.pool()).await.unwrap();

        let tags: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tags")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(tags, 4);

        let rules: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rules")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(rules, 2);
    }

    #[tokio::test]
    async fn reserved_tags_exist_after_open() {
        let (db, _dir) = open_temp().await;
        for name in [TAG_AWAY, TAG_UNCLASSIFIED] {
            let tag = db.tag_by_name(name).await.unwrap();
            assert!(tag.is_some(), "{name} missing after seeding");
        }
    }

    #[tokio::test]
    async fn sentinel_rules_target_away_by_priority() {
        let (db, _dir) = open_temp().await;
        let rules = db.list_rules(true).await.unwrap();
        assert_eq!(rules[0].priority, 100);
        assert_eq!(rules[0].process_pattern.as_deref(), Some("__LOCKED__"));
        assert_eq!(rules[0].tag_name, TAG_AWAY);
        assert_eq!(rules[1].priority, 90);
        assert_eq!(rules[1].process_pattern.as_deref(), Some("__IDLE__"));
    }
}
