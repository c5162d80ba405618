//! Import a JSON export of the collections application into a store.
//!
//! The export carries users, collections, items and comments. Items name
//! their tags by display label; tags are upserted by normalized value, so
//! `"Brass"`, `"brass "` and `"BRASS"` all link to one tag whose label is
//! the first form seen.
//!
//! ```json
//! {
//!   "users": [{ "id": "u1", "username": "ada" }],
//!   "collections": [{ "id": "c1", "name": "Instruments", "user_id": "u1" }],
//!   "items": [{ "id": "i1", "name": "Brass sextant", "collection_id": "c1",
//!               "tags": ["Brass", "Navigation"],
//!               "fields": [{ "name": "maker", "kind": "string", "value": "Heath & Co" }] }],
//!   "comments": [{ "item_id": "i1", "author_id": "u1", "text": "Lovely patina" }]
//! }
//! ```
//!
//! Items and comments without an `id` get a fresh UUID. Comments without
//! `created_at` are stamped with the import time.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use collections_search_core::models::{Collection, Comment, FieldValue, Item, Tag, User};
use collections_search_core::store::ContentStore;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Top-level shape of an export file.
#[derive(Debug, Deserialize, Default)]
pub struct ExportFile {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub collections: Vec<Collection>,
    #[serde(default)]
    pub items: Vec<ExportItem>,
    #[serde(default)]
    pub comments: Vec<ExportComment>,
}

#[derive(Debug, Deserialize)]
pub struct ExportItem {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub collection_id: String,
    /// Tag display labels.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldValue>,
}

#[derive(Debug, Deserialize)]
pub struct ExportComment {
    #[serde(default)]
    pub id: Option<String>,
    pub item_id: String,
    pub author_id: String,
    pub text: String,
    #[serde(default)]
    pub created_at: Option<i64>,
}

/// Counts of what an import wrote.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub users: usize,
    pub collections: usize,
    pub items: usize,
    pub tags_created: usize,
    pub tags_linked: usize,
    pub comments: usize,
}

/// Parse an export file from disk.
pub fn read_export(path: &Path) -> Result<ExportFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read export file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse export file: {}", path.display()))
}

/// Write every entity of `export` into `store`.
pub async fn import_export<S>(store: &S, export: ExportFile) -> Result<ImportReport>
where
    S: ContentStore + ?Sized,
{
    let mut report = ImportReport::default();

    for user in &export.users {
        store.upsert_user(user).await?;
        report.users += 1;
    }

    for collection in &export.collections {
        store.upsert_collection(collection).await?;
        report.collections += 1;
    }

    let mut tag_ids: HashMap<String, String> = HashMap::new();
    for entry in export.items {
        let mut item_tag_ids = Vec::with_capacity(entry.tags.len());
        for label in &entry.tags {
            let value = Tag::normalize(label);
            if value.is_empty() {
                continue;
            }
            let tag_id = match tag_ids.get(&value) {
                Some(id) => id.clone(),
                None => {
                    let id = match store.find_tag_by_value(&value).await? {
                        Some(existing) => existing.id,
                        None => {
                            let tag = Tag {
                                id: Uuid::new_v4().to_string(),
                                label: label.trim().to_string(),
                                value: value.clone(),
                                item_ids: Vec::new(),
                            };
                            store.upsert_tag(&tag).await?;
                            report.tags_created += 1;
                            tag.id
                        }
                    };
                    tag_ids.insert(value, id.clone());
                    id
                }
            };
            if !item_tag_ids.contains(&tag_id) {
                item_tag_ids.push(tag_id);
                report.tags_linked += 1;
            }
        }

        let item = Item {
            id: entry.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            name: entry.name,
            collection_id: entry.collection_id,
            tag_ids: item_tag_ids,
            comment_ids: Vec::new(),
            fields: entry.fields,
        };
        store
            .upsert_item(&item)
            .await
            .with_context(|| format!("Failed to import item '{}'", item.name))?;
        report.items += 1;
    }

    let now = chrono::Utc::now().timestamp();
    for entry in export.comments {
        let comment = Comment {
            id: entry.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            item_id: entry.item_id,
            author_id: entry.author_id,
            text: entry.text,
            created_at: entry.created_at.unwrap_or(now),
        };
        store.upsert_comment(&comment).await?;
        report.comments += 1;
    }

    Ok(report)
}

/// CLI entry point for `collsearch import <file>`.
pub async fn run_import(config: &Config, path: &Path) -> Result<()> {
    let export = read_export(path)?;
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let report = import_export(&store, export).await?;
    info!(
        file = %path.display(),
        items = report.items,
        comments = report.comments,
        "import finished"
    );

    println!("import {}", path.display());
    println!("  users: {}", report.users);
    println!("  collections: {}", report.collections);
    println!("  items: {}", report.items);
    println!(
        "  tags: {} created, {} links",
        report.tags_created, report.tags_linked
    );
    println!("  comments: {}", report.comments);
    println!("ok");

    pool.close().await;
    Ok(())
}
