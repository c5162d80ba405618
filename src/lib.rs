//! # Collections Search
//!
//! Federated full-text search for a collections application: one query is
//! run against items, tags and comments at once, every hit is resolved to
//! the item it concerns, and the hits are merged into one page of items
//! that records which content types matched.
//!
//! ## Architecture
//!
//! ```text
//!                ┌──────────────┐
//!   q, page ───▶ │  aggregator  │  collections_search_core::search
//!                └──────┬───────┘
//!        ┌──────────────┼──────────────┐
//!        ▼              ▼              ▼
//!   items_fts       tags_fts      comments_fts     (concurrent)
//!        └──────────────┼──────────────┘
//!                       ▼
//!        item → collection → user (batched)
//!                       ▼
//!            group by item, paginate
//! ```
//!
//! The aggregator and the [`ContentStore`](collections_search_core::store::ContentStore)
//! seam live in `collections-search-core`; this crate provides the SQLite
//! store, the CLI and the HTTP server.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema and full-text index migrations |
//! | [`sqlite_store`] | `ContentStore` over SQLite FTS5 |
//! | [`import`] | JSON export import |
//! | [`search`] | CLI search |
//! | [`stats`] | Entity counts |
//! | [`server`] | HTTP search server |

pub mod config;
pub mod db;
pub mod import;
pub mod migrate;
pub mod search;
pub mod server;
pub mod sqlite_store;
pub mod stats;
