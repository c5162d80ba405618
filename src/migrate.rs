//! Database schema migrations.
//!
//! All statements are idempotent, so `collsearch init` can be re-run
//! safely. Entity tables mirror the collections application's documents;
//! each searchable entity gets an FTS5 table keyed by its id:
//!
//! | FTS table | Indexed columns |
//! |-----------|-----------------|
//! | `items_fts` | `body` (item name + textual field values) |
//! | `tags_fts` | `label`, `value` |
//! | `comments_fts` | `text` |

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table, FTS index and secondary index on `pool`.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            user_id TEXT NOT NULL,
            description TEXT,
            topic TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            collection_id TEXT NOT NULL,
            fields_json TEXT NOT NULL DEFAULT '[]'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            id TEXT PRIMARY KEY,
            label TEXT NOT NULL,
            value TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Link order (rowid) is the order of a tag's item list.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS item_tags (
            item_id TEXT NOT NULL,
            tag_id TEXT NOT NULL,
            UNIQUE(item_id, tag_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id TEXT PRIMARY KEY,
            item_id TEXT NOT NULL,
            author_id TEXT NOT NULL,
            text TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 CREATE is not idempotent natively, so we check first
    let fts_tables = [
        (
            "items_fts",
            "CREATE VIRTUAL TABLE items_fts USING fts5(item_id UNINDEXED, body)",
        ),
        (
            "tags_fts",
            "CREATE VIRTUAL TABLE tags_fts USING fts5(tag_id UNINDEXED, label, value)",
        ),
        (
            "comments_fts",
            "CREATE VIRTUAL TABLE comments_fts USING fts5(comment_id UNINDEXED, text)",
        ),
    ];
    for (name, ddl) in fts_tables {
        let exists: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?",
        )
        .bind(name)
        .fetch_one(pool)
        .await?;

        if !exists {
            sqlx::query(ddl).execute(pool).await?;
        }
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_collection_id ON items(collection_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_item_tags_tag_id ON item_tags(tag_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_item_id ON comments(item_id)")
        .execute(pool)
        .await?;

    Ok(())
}
