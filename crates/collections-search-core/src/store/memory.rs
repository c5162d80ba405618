//! In-memory [`ContentStore`] implementation for testing and embedding.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock`. Full-text search is
//! a case-insensitive substring scan scored by the number of distinct
//! query terms a document contains.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::models::{Collection, Comment, Item, Tag, User};

use super::{query_terms, ContentStore, StoreStats};

/// In-memory store for tests and single-process use.
///
/// Items, tags and comments are kept in insertion order; an upsert moves
/// the document to the end, as a delete-then-insert would in SQL.
pub struct InMemoryStore {
    users: RwLock<HashMap<String, User>>,
    collections: RwLock<HashMap<String, Collection>>,
    items: RwLock<Vec<Item>>,
    tags: RwLock<Vec<Tag>>,
    comments: RwLock<Vec<Comment>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            collections: RwLock::new(HashMap::new()),
            items: RwLock::new(Vec::new()),
            tags: RwLock::new(Vec::new()),
            comments: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

/// Number of distinct terms contained in any of `texts`.
fn score(terms: &[String], texts: &[&str]) -> usize {
    let lowered: Vec<String> = texts.iter().map(|t| t.to_lowercase()).collect();
    terms
        .iter()
        .filter(|term| lowered.iter().any(|t| t.contains(term.as_str())))
        .count()
}

/// Keep documents with a positive score, best first, id as tie-break.
fn rank<T: Clone>(docs: &[T], id: impl Fn(&T) -> &str, score: impl Fn(&T) -> usize) -> Vec<T> {
    let mut scored: Vec<(usize, &T)> = docs
        .iter()
        .map(|d| (score(d), d))
        .filter(|(s, _)| *s > 0)
        .collect();
    scored.sort_by(|(sa, a), (sb, b)| sb.cmp(sa).then_with(|| id(*a).cmp(id(*b))));
    scored.into_iter().map(|(_, d)| d.clone()).collect()
}

impl InMemoryStore {
    fn hydrate_item(item: &Item, comments: &[Comment]) -> Item {
        let mut item = item.clone();
        item.comment_ids = comments
            .iter()
            .filter(|c| c.item_id == item.id)
            .map(|c| c.id.clone())
            .collect();
        item
    }

    fn hydrate_tag(tag: &Tag, items: &[Item]) -> Tag {
        let mut tag = tag.clone();
        tag.item_ids = items
            .iter()
            .filter(|i| i.tag_ids.contains(&tag.id))
            .map(|i| i.id.clone())
            .collect();
        tag
    }
}

#[async_trait]
impl ContentStore for InMemoryStore {
    async fn search_items(&self, query: &str) -> Result<Vec<Item>> {
        let terms = query_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let items = read(&self.items)?;
        let comments = read(&self.comments)?;
        let matched = rank(
            items.as_slice(),
            |i| i.id.as_str(),
            |i| score(&terms, &[i.indexed_text().as_str()]),
        );
        Ok(matched
            .iter()
            .map(|i| Self::hydrate_item(i, &comments))
            .collect())
    }

    async fn search_tags(&self, query: &str) -> Result<Vec<Tag>> {
        let terms = query_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let tags = read(&self.tags)?;
        let items = read(&self.items)?;
        let matched = rank(
            tags.as_slice(),
            |t| t.id.as_str(),
            |t| score(&terms, &[t.label.as_str(), t.value.as_str()]),
        );
        Ok(matched
            .iter()
            .map(|t| Self::hydrate_tag(t, &items))
            .collect())
    }

    async fn search_comments(&self, query: &str) -> Result<Vec<Comment>> {
        let terms = query_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let comments = read(&self.comments)?;
        Ok(rank(
            comments.as_slice(),
            |c| c.id.as_str(),
            |c| score(&terms, &[c.text.as_str()]),
        ))
    }

    async fn get_items(&self, ids: &[String]) -> Result<Vec<Item>> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let items = read(&self.items)?;
        let comments = read(&self.comments)?;
        Ok(items
            .iter()
            .filter(|i| wanted.contains(i.id.as_str()))
            .map(|i| Self::hydrate_item(i, &comments))
            .collect())
    }

    async fn get_collections(&self, ids: &[String]) -> Result<Vec<Collection>> {
        let collections = read(&self.collections)?;
        let items = read(&self.items)?;
        let mut found = Vec::new();
        for id in ids.iter().collect::<HashSet<_>>() {
            if let Some(c) = collections.get(id) {
                let mut c = c.clone();
                c.item_ids = items
                    .iter()
                    .filter(|i| i.collection_id == c.id)
                    .map(|i| i.id.clone())
                    .collect();
                found.push(c);
            }
        }
        Ok(found)
    }

    async fn get_users(&self, ids: &[String]) -> Result<Vec<User>> {
        let users = read(&self.users)?;
        Ok(ids
            .iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .filter_map(|id| users.get(id).cloned())
            .collect())
    }

    async fn find_tag_by_value(&self, value: &str) -> Result<Option<Tag>> {
        let tags = read(&self.tags)?;
        let items = read(&self.items)?;
        Ok(tags
            .iter()
            .find(|t| t.value == value)
            .map(|t| Self::hydrate_tag(t, &items)))
    }

    async fn upsert_user(&self, user: &User) -> Result<()> {
        write(&self.users)?.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn upsert_collection(&self, collection: &Collection) -> Result<()> {
        let mut stored = collection.clone();
        stored.item_ids.clear();
        write(&self.collections)?.insert(stored.id.clone(), stored);
        Ok(())
    }

    async fn upsert_item(&self, item: &Item) -> Result<()> {
        let mut stored = item.clone();
        stored.comment_ids.clear();
        let mut items = write(&self.items)?;
        items.retain(|i| i.id != item.id);
        items.push(stored);
        Ok(())
    }

    async fn upsert_tag(&self, tag: &Tag) -> Result<()> {
        let mut tags = write(&self.tags)?;
        if tags.iter().any(|t| t.value == tag.value && t.id != tag.id) {
            bail!("tag value '{}' already belongs to another tag", tag.value);
        }
        let mut stored = tag.clone();
        stored.item_ids.clear();
        tags.retain(|t| t.id != tag.id);
        tags.push(stored);
        Ok(())
    }

    async fn upsert_comment(&self, comment: &Comment) -> Result<()> {
        let mut comments = write(&self.comments)?;
        comments.retain(|c| c.id != comment.id);
        comments.push(comment.clone());
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            users: read(&self.users)?.len() as i64,
            collections: read(&self.collections)?.len() as i64,
            items: read(&self.items)?.len() as i64,
            tags: read(&self.tags)?.len() as i64,
            comments: read(&self.comments)?.len() as i64,
        })
    }
}
