//! Content store abstraction for Collections Search.
//!
//! The [`ContentStore`] trait is the seam between the search aggregator
//! and whatever persists the collections application's entities. The
//! aggregator only ever calls the read side; the write side exists so
//! importers and tests can populate a store.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{Collection, Comment, Item, Tag, User};

/// Per-entity row counts, reported by `collsearch stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub users: i64,
    pub collections: i64,
    pub items: i64,
    pub tags: i64,
    pub comments: i64,
}

/// Abstract storage backend holding users, collections, items, tags and
/// comments.
///
/// # Full-text queries
///
/// `search_*` methods split the query on whitespace and return documents
/// matching any term, ordered by the backend's relevance ranking with the
/// document id as tie-break. A blank query matches nothing.
///
/// # Batch lookups
///
/// `get_*` methods take a set of ids and return the documents that exist,
/// in no particular order. Missing ids are skipped, not reported.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`search_items`](ContentStore::search_items) | Full-text over item name and textual fields |
/// | [`search_tags`](ContentStore::search_tags) | Full-text over tag label and value |
/// | [`search_comments`](ContentStore::search_comments) | Full-text over comment text |
/// | [`get_items`](ContentStore::get_items) | Batch item lookup |
/// | [`get_collections`](ContentStore::get_collections) | Batch collection lookup |
/// | [`get_users`](ContentStore::get_users) | Batch user lookup |
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn search_items(&self, query: &str) -> Result<Vec<Item>>;

    async fn search_tags(&self, query: &str) -> Result<Vec<Tag>>;

    async fn search_comments(&self, query: &str) -> Result<Vec<Comment>>;

    async fn get_items(&self, ids: &[String]) -> Result<Vec<Item>>;

    async fn get_collections(&self, ids: &[String]) -> Result<Vec<Collection>>;

    async fn get_users(&self, ids: &[String]) -> Result<Vec<User>>;

    /// Look up a tag by its normalized value (see [`Tag::normalize`]).
    async fn find_tag_by_value(&self, value: &str) -> Result<Option<Tag>>;

    async fn upsert_user(&self, user: &User) -> Result<()>;

    async fn upsert_collection(&self, collection: &Collection) -> Result<()>;

    /// Insert or replace an item together with its field values, tag links
    /// and full-text entry.
    async fn upsert_item(&self, item: &Item) -> Result<()>;

    async fn upsert_tag(&self, tag: &Tag) -> Result<()>;

    async fn upsert_comment(&self, comment: &Comment) -> Result<()>;

    async fn stats(&self) -> Result<StoreStats>;
}

/// Split a free-text query into lowercase match terms.
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_terms() {
        assert_eq!(query_terms("  Brass  SEXTANT\t"), vec!["brass", "sextant"]);
        assert!(query_terms("   ").is_empty());
    }
}
