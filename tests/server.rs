//! HTTP contract tests: the router is served on an ephemeral port over an
//! in-memory store, or over a store whose every call fails.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use collections_search::server::router;
use collections_search_core::models::{Collection, Comment, Item, Tag, User};
use collections_search_core::store::memory::InMemoryStore;
use collections_search_core::store::{ContentStore, StoreStats};

async fn serve(store: Arc<dyn ContentStore>, page_size: usize) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(store, page_size)).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn get(url: String) -> (u16, Value) {
    let resp = reqwest::get(url).await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

async fn widget_store(count: usize) -> Arc<dyn ContentStore> {
    let store = InMemoryStore::new();
    store
        .upsert_user(&User {
            id: "u1".into(),
            username: "ada".into(),
        })
        .await
        .unwrap();
    store
        .upsert_collection(&Collection {
            id: "c1".into(),
            name: "Workshop".into(),
            user_id: "u1".into(),
            description: None,
            topic: None,
            item_ids: vec![],
        })
        .await
        .unwrap();
    store
        .upsert_tag(&Tag {
            id: "t1".into(),
            label: "Gears".into(),
            value: "gears".into(),
            item_ids: vec![],
        })
        .await
        .unwrap();
    for n in 0..count {
        store
            .upsert_item(&Item {
                id: format!("w{:02}", n),
                name: format!("Widget {}", n),
                collection_id: "c1".into(),
                tag_ids: if n == 0 { vec!["t1".into()] } else { vec![] },
                comment_ids: vec![],
                fields: vec![],
            })
            .await
            .unwrap();
    }
    Arc::new(store)
}

struct FailingStore;

#[async_trait]
impl ContentStore for FailingStore {
    async fn search_items(&self, _query: &str) -> Result<Vec<Item>> {
        bail!("database is locked")
    }
    async fn search_tags(&self, _query: &str) -> Result<Vec<Tag>> {
        bail!("database is locked")
    }
    async fn search_comments(&self, _query: &str) -> Result<Vec<Comment>> {
        bail!("database is locked")
    }
    async fn get_items(&self, _ids: &[String]) -> Result<Vec<Item>> {
        bail!("database is locked")
    }
    async fn get_collections(&self, _ids: &[String]) -> Result<Vec<Collection>> {
        bail!("database is locked")
    }
    async fn get_users(&self, _ids: &[String]) -> Result<Vec<User>> {
        bail!("database is locked")
    }
    async fn find_tag_by_value(&self, _value: &str) -> Result<Option<Tag>> {
        bail!("database is locked")
    }
    async fn upsert_user(&self, _user: &User) -> Result<()> {
        bail!("read-only")
    }
    async fn upsert_collection(&self, _collection: &Collection) -> Result<()> {
        bail!("read-only")
    }
    async fn upsert_item(&self, _item: &Item) -> Result<()> {
        bail!("read-only")
    }
    async fn upsert_tag(&self, _tag: &Tag) -> Result<()> {
        bail!("read-only")
    }
    async fn upsert_comment(&self, _comment: &Comment) -> Result<()> {
        bail!("read-only")
    }
    async fn stats(&self) -> Result<StoreStats> {
        bail!("database is locked")
    }
}

#[tokio::test]
async fn test_search_pages_through_results() {
    let base = serve(widget_store(23).await, 10).await;

    let (status, first) = get(format!("{}/api/search?q=widget", base)).await;
    assert_eq!(status, 200);
    assert_eq!(first["currentPage"], 1);
    assert_eq!(first["totalPages"], 3);
    assert_eq!(first["totalResults"], 23);
    assert_eq!(first["results"].as_array().unwrap().len(), 10);

    let (_, last) = get(format!("{}/api/search?q=widget&page=3", base)).await;
    assert_eq!(last["results"].as_array().unwrap().len(), 3);
    assert_eq!(last["currentPage"], 3);
}

#[tokio::test]
async fn test_result_wire_shape() {
    let base = serve(widget_store(2).await, 10).await;

    let (status, page) = get(format!("{}/api/search?q=gears", base)).await;
    assert_eq!(status, 200);
    assert_eq!(
        page,
        json!({
            "results": [{
                "_id": "w00",
                "name": "Widget 0",
                "collectionId": {
                    "_id": "c1",
                    "name": "Workshop",
                    "user": { "_id": "u1", "username": "ada" }
                },
                "source": ["tags"]
            }],
            "currentPage": 1,
            "totalPages": 1,
            "totalResults": 1
        })
    );
}

#[tokio::test]
async fn test_page_zero_is_rejected() {
    let base = serve(widget_store(2).await, 10).await;

    let (status, body) = get(format!("{}/api/search?q=widget&page=0", base)).await;
    assert_eq!(status, 400);
    assert_eq!(body, json!({ "error": "invalid_paging" }));

    let (status, body) = get(format!("{}/api/search?q=widget&page=-4", base)).await;
    assert_eq!(status, 400);
    assert_eq!(body, json!({ "error": "invalid_paging" }));
}

#[tokio::test]
async fn test_non_integer_page_is_rejected() {
    let base = serve(widget_store(2).await, 10).await;

    let (status, body) = get(format!("{}/api/search?q=widget&page=abc", base)).await;
    assert_eq!(status, 400);
    assert_eq!(body, json!({ "error": "invalid_paging" }));
}

#[tokio::test]
async fn test_repeated_page_is_rejected() {
    let base = serve(widget_store(2).await, 10).await;

    let (status, body) = get(format!("{}/api/search?q=widget&page=1&page=2", base)).await;
    assert_eq!(status, 400);
    assert_eq!(body, json!({ "error": "invalid_paging" }));
}

#[tokio::test]
async fn test_page_past_end_is_empty() {
    let base = serve(widget_store(12).await, 10).await;

    let (status, page) = get(format!("{}/api/search?q=widget&page=4", base)).await;
    assert_eq!(status, 200);
    assert_eq!(page["results"], json!([]));
    assert_eq!(page["currentPage"], 4);
    assert_eq!(page["totalPages"], 2);
    assert_eq!(page["totalResults"], 12);
}

#[tokio::test]
async fn test_missing_and_blank_query_return_empty_page() {
    let base = serve(widget_store(3).await, 10).await;
    let empty = json!({ "results": [], "currentPage": 1, "totalPages": 0, "totalResults": 0 });

    let (status, page) = get(format!("{}/api/search", base)).await;
    assert_eq!(status, 200);
    assert_eq!(page, empty);

    let (status, page) = get(format!("{}/api/search?q=%20%20", base)).await;
    assert_eq!(status, 200);
    assert_eq!(page, empty);
}

#[tokio::test]
async fn test_store_failure_is_500() {
    let base = serve(Arc::new(FailingStore), 10).await;

    let (status, body) = get(format!("{}/api/search?q=widget", base)).await;
    assert_eq!(status, 500);
    assert_eq!(body, json!({ "error": "search_results_fetch_failed" }));
}

#[tokio::test]
async fn test_paging_checked_before_store() {
    let base = serve(Arc::new(FailingStore), 10).await;

    let (status, body) = get(format!("{}/api/search?q=widget&page=0", base)).await;
    assert_eq!(status, 400);
    assert_eq!(body, json!({ "error": "invalid_paging" }));
}

#[tokio::test]
async fn test_health() {
    let base = serve(Arc::new(FailingStore), 10).await;

    let (status, body) = get(format!("{}/health", base)).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
