//! # Collections Search Core
//!
//! Shared logic for Collections Search: entity models, the content store
//! abstraction, and the federated search aggregator.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies. Storage backends live in the application
//! crate and plug in through [`store::ContentStore`].

pub mod error;
pub mod models;
pub mod search;
pub mod store;

pub use error::SearchError;
