//! Federated search across items, tags and comments.
//!
//! A single request fans out to three full-text queries, one per entity
//! kind, and folds the answers into one page of items. The algorithm
//! operates entirely through the [`ContentStore`] trait.
//!
//! # Pipeline
//!
//! 1. **Query**: run the item, tag and comment queries concurrently. Each
//!    match is wrapped in a [`RawMatch`] variant for its kind.
//! 2. **Resolve**: map every match to the item(s) it refers to (an item is
//!    itself, a tag fans out to its items, a comment points at its item),
//!    then batch-load those items' collections and the collections' owners.
//! 3. **Group**: concatenate the expanded streams in the fixed order
//!    items → tags → comments and fold them into one [`GroupedResult`] per
//!    item, accumulating the distinct [`SourceKind`]s that matched it.
//! 4. **Paginate**: slice the grouped list into a [`SearchPage`].
//!
//! Steps 1 and 2 run as three independent branches joined with
//! [`futures::try_join!`]: the first failing branch fails the request and
//! the others are dropped. Nothing is written, so an aborted request
//! leaves nothing to undo.
//!
//! Results keep first-occurrence order across the fixed branch order. The
//! backends' relevance ranking decides order only within a branch.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::error::SearchError;
use crate::models::{Collection, Comment, Item, Tag, User};
use crate::store::ContentStore;

/// Results per page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// The entity kind a match originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Items,
    Tags,
    Comments,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Items => "items",
            SourceKind::Tags => "tags",
            SourceKind::Comments => "comments",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document returned by one of the per-entity full-text queries.
#[derive(Debug, Clone)]
pub enum RawMatch {
    Item(Item),
    Tag(Tag),
    Comment(Comment),
}

impl RawMatch {
    /// Ids of the items this match stands for.
    pub fn item_refs(&self) -> Vec<&str> {
        match self {
            RawMatch::Item(item) => vec![item.id.as_str()],
            RawMatch::Tag(tag) => tag.item_ids.iter().map(String::as_str).collect(),
            RawMatch::Comment(comment) => vec![comment.item_id.as_str()],
        }
    }
}

/// Owner of a collection, as embedded in results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
}

/// A collection with its owner resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub user: OwnerRef,
}

/// One matching item attributed to one source kind, before grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedResult {
    pub item_id: String,
    pub item_name: String,
    pub collection: CollectionRef,
    pub source: SourceKind,
}

/// One item in the merged result set with every kind that matched it.
///
/// `source` is never empty and never repeats a kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupedResult {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "collectionId")]
    pub collection: CollectionRef,
    pub source: Vec<SourceKind>,
}

/// One page of grouped results plus totals over the whole result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub results: Vec<GroupedResult>,
    pub current_page: i64,
    pub total_pages: i64,
    pub total_results: i64,
}

/// Inputs for a single search invocation.
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    /// Free-text query. `None` or blank disables the search for this
    /// request and yields an empty page.
    pub query: Option<&'a str>,
    /// 1-based page number.
    pub page: i64,
    pub page_size: usize,
}

impl<'a> SearchRequest<'a> {
    pub fn new(query: Option<&'a str>, page: i64) -> Self {
        Self {
            query,
            page,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Run a federated search against a [`ContentStore`].
///
/// This is the function every frontend (CLI, HTTP) delegates to.
pub async fn search<S>(store: &S, req: &SearchRequest<'_>) -> Result<SearchPage, SearchError>
where
    S: ContentStore + ?Sized,
{
    if req.page < 1 {
        return Err(SearchError::InvalidPaging(req.page));
    }

    let query = match req.query.map(str::trim) {
        Some(q) if !q.is_empty() => q,
        _ => return paginate(Vec::new(), req.page, req.page_size),
    };

    let (items, tags, comments) = futures::try_join!(
        run_branch(store, SourceKind::Items, query),
        run_branch(store, SourceKind::Tags, query),
        run_branch(store, SourceKind::Comments, query)
    )?;

    let grouped = group_results(items.into_iter().chain(tags).chain(comments));
    paginate(grouped, req.page, req.page_size)
}

async fn run_branch<S>(
    store: &S,
    kind: SourceKind,
    query: &str,
) -> Result<Vec<ExpandedResult>, SearchError>
where
    S: ContentStore + ?Sized,
{
    let matches = query_entity(store, kind, query).await?;
    let match_count = matches.len();
    let expanded = resolve(store, kind, &matches).await?;
    debug!(
        kind = %kind,
        matches = match_count,
        expanded = expanded.len(),
        "search branch resolved"
    );
    Ok(expanded)
}

/// Run the full-text query for one entity kind.
pub async fn query_entity<S>(
    store: &S,
    kind: SourceKind,
    query: &str,
) -> Result<Vec<RawMatch>, SearchError>
where
    S: ContentStore + ?Sized,
{
    let matches: anyhow::Result<Vec<RawMatch>> = match kind {
        SourceKind::Items => store
            .search_items(query)
            .await
            .map(|v| v.into_iter().map(RawMatch::Item).collect()),
        SourceKind::Tags => store
            .search_tags(query)
            .await
            .map(|v| v.into_iter().map(RawMatch::Tag).collect()),
        SourceKind::Comments => store
            .search_comments(query)
            .await
            .map(|v| v.into_iter().map(RawMatch::Comment).collect()),
    };
    matches.map_err(|e| SearchError::query(kind, e))
}

/// Expand one branch's matches into item-shaped results.
///
/// Each item appears at most once per branch, at its first reference.
/// References that cannot be followed (a comment on a deleted item, an
/// item whose collection or owner is gone) are dropped. The collection
/// and owner rule applies to direct item matches too, so an item match
/// yields no result when its collection or owner cannot be loaded.
///
/// Lookups are batched: at most one fetch each for items, collections and
/// users, regardless of the number of matches.
pub async fn resolve<S>(
    store: &S,
    kind: SourceKind,
    matches: &[RawMatch],
) -> Result<Vec<ExpandedResult>, SearchError>
where
    S: ContentStore + ?Sized,
{
    let mut seen = HashSet::new();
    let item_ids: Vec<&str> = matches
        .iter()
        .flat_map(RawMatch::item_refs)
        .filter(|id| seen.insert(*id))
        .collect();
    if item_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut items: HashMap<String, Item> = matches
        .iter()
        .filter_map(|m| match m {
            RawMatch::Item(item) => Some((item.id.clone(), item.clone())),
            _ => None,
        })
        .collect();
    let missing: Vec<String> = item_ids
        .iter()
        .filter(|id| !items.contains_key(**id))
        .map(|id| id.to_string())
        .collect();
    if !missing.is_empty() {
        let fetched = store
            .get_items(&missing)
            .await
            .map_err(|e| SearchError::resolve(kind, e))?;
        items.extend(fetched.into_iter().map(|i| (i.id.clone(), i)));
    }

    let collection_ids = distinct(items.values().map(|i| i.collection_id.as_str()));
    let collections: HashMap<String, Collection> = store
        .get_collections(&collection_ids)
        .await
        .map_err(|e| SearchError::resolve(kind, e))?
        .into_iter()
        .map(|c| (c.id.clone(), c))
        .collect();

    let user_ids = distinct(collections.values().map(|c| c.user_id.as_str()));
    let users: HashMap<String, User> = if user_ids.is_empty() {
        HashMap::new()
    } else {
        store
            .get_users(&user_ids)
            .await
            .map_err(|e| SearchError::resolve(kind, e))?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect()
    };

    let mut expanded = Vec::with_capacity(item_ids.len());
    for id in item_ids {
        let Some(item) = items.get(id) else {
            debug!(kind = %kind, item_id = id, "dropping dangling item reference");
            continue;
        };
        match expand_item(item, &collections, &users, kind) {
            Some(result) => expanded.push(result),
            None => debug!(
                kind = %kind,
                item_id = id,
                collection_id = %item.collection_id,
                "dropping item with unresolved collection or owner"
            ),
        }
    }
    Ok(expanded)
}

/// Map a resolved item into its [`ExpandedResult`], or `None` when its
/// collection or the collection's owner is unknown.
pub fn expand_item(
    item: &Item,
    collections: &HashMap<String, Collection>,
    users: &HashMap<String, User>,
    source: SourceKind,
) -> Option<ExpandedResult> {
    let collection = collections.get(&item.collection_id)?;
    let owner = users.get(&collection.user_id)?;
    Some(ExpandedResult {
        item_id: item.id.clone(),
        item_name: item.name.clone(),
        collection: CollectionRef {
            id: collection.id.clone(),
            name: collection.name.clone(),
            user: OwnerRef {
                id: owner.id.clone(),
                username: owner.username.clone(),
            },
        },
        source,
    })
}

fn distinct<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}

/// Fold expanded results into one [`GroupedResult`] per item.
///
/// Output order is the order in which each item was first seen. A kind is
/// appended to an item's `source` only if it is not already there.
pub fn group_results(expanded: impl IntoIterator<Item = ExpandedResult>) -> Vec<GroupedResult> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut grouped: Vec<GroupedResult> = Vec::new();

    for result in expanded {
        match index.get(&result.item_id) {
            Some(&pos) => {
                let sources = &mut grouped[pos].source;
                if !sources.contains(&result.source) {
                    sources.push(result.source);
                }
            }
            None => {
                index.insert(result.item_id.clone(), grouped.len());
                grouped.push(GroupedResult {
                    id: result.item_id,
                    name: result.item_name,
                    collection: result.collection,
                    source: vec![result.source],
                });
            }
        }
    }

    grouped
}

/// Slice a grouped result list into a 1-based page.
///
/// A page past the end is empty, not an error. `page_size` of zero is
/// treated as one.
pub fn paginate(
    grouped: Vec<GroupedResult>,
    page: i64,
    page_size: usize,
) -> Result<SearchPage, SearchError> {
    if page < 1 {
        return Err(SearchError::InvalidPaging(page));
    }
    let page_size = page_size.max(1);
    let total = grouped.len();
    let total_pages = total.div_ceil(page_size);

    let results = match usize::try_from(page - 1)
        .ok()
        .and_then(|p| p.checked_mul(page_size))
    {
        Some(start) if start < total => grouped.into_iter().skip(start).take(page_size).collect(),
        _ => Vec::new(),
    };

    Ok(SearchPage {
        results,
        current_page: page,
        total_pages: total_pages as i64,
        total_results: total as i64,
    })
}
