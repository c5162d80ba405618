//! SQLite-backed [`ContentStore`] implementation.
//!
//! Entities live in plain tables; full-text search goes through one FTS5
//! table per entity kind (see [`migrate`](crate::migrate)). Batch lookups
//! are issued as `IN (...)` queries, split into groups of
//! [`MAX_BIND_PARAMS`] ids to stay under SQLite's bind parameter limit.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashMap;

use collections_search_core::models::{Collection, Comment, FieldValue, Item, Tag, User};
use collections_search_core::store::{query_terms, ContentStore, StoreStats};

/// Ids bound per `IN (...)` query.
pub const MAX_BIND_PARAMS: usize = 500;

/// SQLite implementation of the [`ContentStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run `<prefix> IN (<ids>) <suffix>` in batches and concatenate rows.
    async fn fetch_in(&self, prefix: &str, ids: &[String], suffix: &str) -> Result<Vec<SqliteRow>> {
        let mut rows = Vec::new();
        for batch in ids.chunks(MAX_BIND_PARAMS) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(prefix);
            qb.push(" IN (");
            {
                let mut list = qb.separated(", ");
                for id in batch {
                    list.push_bind(id.clone());
                }
            }
            qb.push(") ");
            qb.push(suffix);
            rows.extend(qb.build().fetch_all(&self.pool).await?);
        }
        Ok(rows)
    }

    /// Linked ids grouped by owner id, each group in insertion (rowid)
    /// order. The query must select `link_order`, `owner_col` and
    /// `linked_col`.
    async fn links(
        &self,
        prefix: &str,
        ids: &[String],
        owner_col: &str,
        linked_col: &str,
    ) -> Result<HashMap<String, Vec<String>>> {
        let mut rows: Vec<(i64, String, String)> = self
            .fetch_in(prefix, ids, "")
            .await?
            .iter()
            .map(|r| (r.get("link_order"), r.get(owner_col), r.get(linked_col)))
            .collect();
        rows.sort_by_key(|(order, _, _)| *order);

        let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
        for (_, owner, linked) in rows {
            grouped.entry(owner).or_default().push(linked);
        }
        Ok(grouped)
    }

    /// Build full [`Item`]s from `items` rows, loading tag and comment
    /// references in bulk.
    async fn hydrate_items(&self, rows: &[SqliteRow]) -> Result<Vec<Item>> {
        let ids: Vec<String> = rows.iter().map(|r| r.get("id")).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut tags = self
            .links(
                "SELECT rowid AS link_order, item_id, tag_id FROM item_tags WHERE item_id",
                &ids,
                "item_id",
                "tag_id",
            )
            .await?;
        let mut comments = self
            .links(
                "SELECT rowid AS link_order, item_id, id FROM comments WHERE item_id",
                &ids,
                "item_id",
                "id",
            )
            .await?;

        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                let fields_json: String = row.get("fields_json");
                let fields: Vec<FieldValue> = serde_json::from_str(&fields_json)
                    .with_context(|| format!("corrupt fields_json for item {}", id))?;
                Ok(Item {
                    tag_ids: tags.remove(&id).unwrap_or_default(),
                    comment_ids: comments.remove(&id).unwrap_or_default(),
                    name: row.get("name"),
                    collection_id: row.get("collection_id"),
                    fields,
                    id,
                })
            })
            .collect()
    }
}

/// Turn free text into an FTS5 query that matches any of its terms.
///
/// Each term is quoted, so operators and column filters in user input are
/// searched for literally instead of being interpreted.
pub fn fts_match_expr(query: &str) -> Option<String> {
    let terms = query_terms(query);
    if terms.is_empty() {
        return None;
    }
    Some(
        terms
            .iter()
            .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn search_items(&self, query: &str) -> Result<Vec<Item>> {
        let Some(expr) = fts_match_expr(query) else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query(
            r#"
            SELECT i.id, i.name, i.collection_id, i.fields_json
            FROM (SELECT item_id, rank FROM items_fts WHERE items_fts MATCH ?) AS m
            JOIN items i ON i.id = m.item_id
            ORDER BY m.rank, i.id
            "#,
        )
        .bind(expr)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate_items(&rows).await
    }

    async fn search_tags(&self, query: &str) -> Result<Vec<Tag>> {
        let Some(expr) = fts_match_expr(query) else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.label, t.value
            FROM (SELECT tag_id, rank FROM tags_fts WHERE tags_fts MATCH ?) AS m
            JOIN tags t ON t.id = m.tag_id
            ORDER BY m.rank, t.id
            "#,
        )
        .bind(expr)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<String> = rows.iter().map(|r| r.get("id")).collect();
        let mut items = if ids.is_empty() {
            HashMap::new()
        } else {
            self.links(
                "SELECT rowid AS link_order, tag_id, item_id FROM item_tags WHERE tag_id",
                &ids,
                "tag_id",
                "item_id",
            )
            .await?
        };

        Ok(rows
            .iter()
            .map(|row| {
                let id: String = row.get("id");
                Tag {
                    item_ids: items.remove(&id).unwrap_or_default(),
                    label: row.get("label"),
                    value: row.get("value"),
                    id,
                }
            })
            .collect())
    }

    async fn search_comments(&self, query: &str) -> Result<Vec<Comment>> {
        let Some(expr) = fts_match_expr(query) else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.item_id, c.author_id, c.text, c.created_at
            FROM (SELECT comment_id, rank FROM comments_fts WHERE comments_fts MATCH ?) AS m
            JOIN comments c ON c.id = m.comment_id
            ORDER BY m.rank, c.id
            "#,
        )
        .bind(expr)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Comment {
                id: row.get("id"),
                item_id: row.get("item_id"),
                author_id: row.get("author_id"),
                text: row.get("text"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn get_items(&self, ids: &[String]) -> Result<Vec<Item>> {
        let rows = self
            .fetch_in(
                "SELECT id, name, collection_id, fields_json FROM items WHERE id",
                ids,
                "",
            )
            .await?;
        self.hydrate_items(&rows).await
    }

    async fn get_collections(&self, ids: &[String]) -> Result<Vec<Collection>> {
        let rows = self
            .fetch_in(
                "SELECT id, name, user_id, description, topic FROM collections WHERE id",
                ids,
                "",
            )
            .await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let mut items = self
            .links(
                "SELECT rowid AS link_order, collection_id, id FROM items WHERE collection_id",
                ids,
                "collection_id",
                "id",
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let id: String = row.get("id");
                Collection {
                    item_ids: items.remove(&id).unwrap_or_default(),
                    name: row.get("name"),
                    user_id: row.get("user_id"),
                    description: row.get("description"),
                    topic: row.get("topic"),
                    id,
                }
            })
            .collect())
    }

    async fn get_users(&self, ids: &[String]) -> Result<Vec<User>> {
        let rows = self
            .fetch_in("SELECT id, username FROM users WHERE id", ids, "")
            .await?;
        Ok(rows
            .iter()
            .map(|row| User {
                id: row.get("id"),
                username: row.get("username"),
            })
            .collect())
    }

    async fn find_tag_by_value(&self, value: &str) -> Result<Option<Tag>> {
        let row = sqlx::query("SELECT id, label, value FROM tags WHERE value = ?")
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let id: String = row.get("id");
        let mut items = self
            .links(
                "SELECT rowid AS link_order, tag_id, item_id FROM item_tags WHERE tag_id",
                std::slice::from_ref(&id),
                "tag_id",
                "item_id",
            )
            .await?;
        Ok(Some(Tag {
            item_ids: items.remove(&id).unwrap_or_default(),
            label: row.get("label"),
            value: row.get("value"),
            id,
        }))
    }

    async fn upsert_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username) VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET username = excluded.username
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_collection(&self, collection: &Collection) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO collections (id, name, user_id, description, topic)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                user_id = excluded.user_id,
                description = excluded.description,
                topic = excluded.topic
            "#,
        )
        .bind(&collection.id)
        .bind(&collection.name)
        .bind(&collection.user_id)
        .bind(&collection.description)
        .bind(&collection.topic)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_item(&self, item: &Item) -> Result<()> {
        let fields_json = serde_json::to_string(&item.fields)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO items (id, name, collection_id, fields_json)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                collection_id = excluded.collection_id,
                fields_json = excluded.fields_json
            "#,
        )
        .bind(&item.id)
        .bind(&item.name)
        .bind(&item.collection_id)
        .bind(&fields_json)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM item_tags WHERE item_id = ?")
            .bind(&item.id)
            .execute(&mut *tx)
            .await?;
        for tag_id in &item.tag_ids {
            sqlx::query("INSERT OR IGNORE INTO item_tags (item_id, tag_id) VALUES (?, ?)")
                .bind(&item.id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM items_fts WHERE item_id = ?")
            .bind(&item.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO items_fts (item_id, body) VALUES (?, ?)")
            .bind(&item.id)
            .bind(item.indexed_text())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn upsert_tag(&self, tag: &Tag) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO tags (id, label, value) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                label = excluded.label,
                value = excluded.value
            "#,
        )
        .bind(&tag.id)
        .bind(&tag.label)
        .bind(&tag.value)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to upsert tag '{}'", tag.value))?;

        sqlx::query("DELETE FROM tags_fts WHERE tag_id = ?")
            .bind(&tag.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO tags_fts (tag_id, label, value) VALUES (?, ?, ?)")
            .bind(&tag.id)
            .bind(&tag.label)
            .bind(&tag.value)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn upsert_comment(&self, comment: &Comment) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO comments (id, item_id, author_id, text, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                item_id = excluded.item_id,
                author_id = excluded.author_id,
                text = excluded.text,
                created_at = excluded.created_at
            "#,
        )
        .bind(&comment.id)
        .bind(&comment.item_id)
        .bind(&comment.author_id)
        .bind(&comment.text)
        .bind(comment.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM comments_fts WHERE comment_id = ?")
            .bind(&comment.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO comments_fts (comment_id, text) VALUES (?, ?)")
            .bind(&comment.id)
            .bind(&comment.text)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let count = |table: &'static str| {
            let pool = self.pool.clone();
            async move {
                let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
                    .fetch_one(&pool)
                    .await?;
                anyhow::Ok(n)
            }
        };

        Ok(StoreStats {
            users: count("users").await?,
            collections: count("collections").await?,
            items: count("items").await?,
            tags: count("tags").await?,
            comments: count("comments").await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fts_match_expr_quotes_terms() {
        assert_eq!(
            fts_match_expr("Brass sextant").as_deref(),
            Some("\"brass\" OR \"sextant\"")
        );
        assert_eq!(
            fts_match_expr("name:\"x\" NEAR").as_deref(),
            Some("\"name:\"\"x\"\"\" OR \"near\"")
        );
        assert_eq!(fts_match_expr("   "), None);
    }
}
