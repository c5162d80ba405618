//! CLI search over the SQLite store.
//!
//! Runs the same aggregator as `GET /api/search` and prints one page,
//! either as a numbered list or as the JSON body the endpoint returns.

use anyhow::Result;

use collections_search_core::search::{self, SearchPage, SearchRequest};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Search the configured database and return one page of grouped results.
pub async fn search_collections(config: &Config, query: &str, page: i64) -> Result<SearchPage> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let mut request = SearchRequest::new(Some(query), page);
    request.page_size = config.search.page_size;
    let result = search::search(&store, &request).await;

    pool.close().await;
    Ok(result?)
}

/// CLI entry point for `collsearch search`.
pub async fn run_search(config: &Config, query: &str, page: i64, json: bool) -> Result<()> {
    let page_data = search_collections(config, query, page).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&page_data)?);
        return Ok(());
    }

    if page_data.results.is_empty() {
        if page_data.total_results > 0 {
            println!(
                "No results on page {} ({} results over {} pages).",
                page_data.current_page, page_data.total_results, page_data.total_pages
            );
        } else {
            println!("No results.");
        }
        return Ok(());
    }

    let offset = (page_data.current_page - 1).max(0) as usize * config.search.page_size;
    for (i, result) in page_data.results.iter().enumerate() {
        let sources: Vec<&str> = result.source.iter().map(|s| s.as_str()).collect();
        println!("{}. {}", offset + i + 1, result.name);
        println!(
            "    collection: {} (by {})",
            result.collection.name, result.collection.user.username
        );
        println!("    matched: {}", sources.join(", "));
        println!("    id: {}", result.id);
        println!();
    }
    println!(
        "page {} of {} ({} results)",
        page_data.current_page, page_data.total_pages, page_data.total_results
    );

    Ok(())
}
