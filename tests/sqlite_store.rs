//! `SqliteStore` against a real temporary database.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tempfile::TempDir;

use collections_search::migrate;
use collections_search::sqlite_store::{SqliteStore, MAX_BIND_PARAMS};
use collections_search_core::models::{Collection, Comment, FieldKind, FieldValue, Item, Tag, User};
use collections_search_core::search::{search, SearchRequest, SourceKind};
use collections_search_core::store::ContentStore;

async fn open_store() -> (TempDir, SqliteStore) {
    let tmp = TempDir::new().unwrap();
    let options = SqliteConnectOptions::new()
        .filename(tmp.path().join("test.sqlite"))
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .unwrap();
    migrate::apply(&pool).await.unwrap();
    (tmp, SqliteStore::new(pool))
}

fn item(id: &str, name: &str, tags: &[&str]) -> Item {
    Item {
        id: id.to_string(),
        name: name.to_string(),
        collection_id: "c1".to_string(),
        tag_ids: tags.iter().map(|t| t.to_string()).collect(),
        comment_ids: vec![],
        fields: vec![],
    }
}

fn tag(id: &str, label: &str) -> Tag {
    Tag {
        id: id.to_string(),
        label: label.to_string(),
        value: Tag::normalize(label),
        item_ids: vec![],
    }
}

fn comment(id: &str, item_id: &str, text: &str) -> Comment {
    Comment {
        id: id.to_string(),
        item_id: item_id.to_string(),
        author_id: "u1".to_string(),
        text: text.to_string(),
        created_at: 1_700_000_000,
    }
}

async fn seed_owner(store: &SqliteStore) {
    store
        .upsert_user(&User {
            id: "u1".to_string(),
            username: "ada".to_string(),
        })
        .await
        .unwrap();
    store
        .upsert_collection(&Collection {
            id: "c1".to_string(),
            name: "Instruments".to_string(),
            user_id: "u1".to_string(),
            description: Some("Brass and glass".to_string()),
            topic: None,
            item_ids: vec![],
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let (_tmp, store) = open_store().await;
    migrate::apply(store.pool()).await.unwrap();
    assert_eq!(store.stats().await.unwrap().items, 0);
}

#[tokio::test]
async fn test_item_search_covers_name_and_text_fields() {
    let (_tmp, store) = open_store().await;
    let mut sextant = item("i1", "Sextant", &[]);
    sextant.fields = vec![
        FieldValue {
            name: "maker".to_string(),
            kind: FieldKind::String,
            value: serde_json::json!("Heath"),
        },
        FieldValue {
            name: "year".to_string(),
            kind: FieldKind::Integer,
            value: serde_json::json!(1887),
        },
    ];
    store.upsert_item(&sextant).await.unwrap();
    store.upsert_item(&item("i2", "Globe", &[])).await.unwrap();

    let by_name = store.search_items("sextant").await.unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].fields.len(), 2);

    let by_field = store.search_items("heath").await.unwrap();
    assert_eq!(by_field.len(), 1);
    assert_eq!(by_field[0].id, "i1");

    assert!(store.search_items("1887").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_item_upsert_replaces_index_entry() {
    let (_tmp, store) = open_store().await;
    store.upsert_item(&item("i1", "Sextant", &[])).await.unwrap();
    store.upsert_item(&item("i1", "Octant", &[])).await.unwrap();

    assert!(store.search_items("sextant").await.unwrap().is_empty());
    assert_eq!(store.search_items("octant").await.unwrap().len(), 1);
    assert_eq!(store.stats().await.unwrap().items, 1);
}

#[tokio::test]
async fn test_tag_search_returns_items_in_link_order() {
    let (_tmp, store) = open_store().await;
    store.upsert_tag(&tag("t1", "Nautical")).await.unwrap();
    store.upsert_item(&item("i3", "Anchor", &["t1"])).await.unwrap();
    store.upsert_item(&item("i1", "Sextant", &["t1"])).await.unwrap();

    let tags = store.search_tags("nautical").await.unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].label, "Nautical");
    assert_eq!(tags[0].item_ids, vec!["i3", "i1"]);

    let found = store.find_tag_by_value("nautical").await.unwrap().unwrap();
    assert_eq!(found.id, "t1");
    assert!(store.find_tag_by_value("optics").await.unwrap().is_none());
}

#[tokio::test]
async fn test_tag_value_is_unique() {
    let (_tmp, store) = open_store().await;
    store.upsert_tag(&tag("t1", "Maps")).await.unwrap();
    assert!(store.upsert_tag(&tag("t2", "maps")).await.is_err());
    store.upsert_tag(&tag("t1", "MAPS")).await.unwrap();
    assert_eq!(store.search_tags("maps").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_comment_search_and_item_comment_refs() {
    let (_tmp, store) = open_store().await;
    store.upsert_item(&item("i1", "Sextant", &[])).await.unwrap();
    store
        .upsert_comment(&comment("m1", "i1", "Lovely patina"))
        .await
        .unwrap();
    store
        .upsert_comment(&comment("m2", "i1", "Mirror is cracked"))
        .await
        .unwrap();

    let found = store.search_comments("patina").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].item_id, "i1");

    let items = store.get_items(&["i1".to_string()]).await.unwrap();
    assert_eq!(items[0].comment_ids, vec!["m1", "m2"]);
}

#[tokio::test]
async fn test_query_syntax_is_searched_literally() {
    let (_tmp, store) = open_store().await;
    store.upsert_item(&item("i1", "Sextant", &[])).await.unwrap();

    for query in ["body:sextant", "sextant*", "NEAR(", "a AND", "-x"] {
        assert!(
            store.search_items(query).await.is_ok(),
            "query {:?} should not be a syntax error",
            query
        );
    }
    assert!(store.search_items("   ").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_batch_lookup_spans_multiple_chunks() {
    let (_tmp, store) = open_store().await;
    seed_owner(&store).await;
    let count = MAX_BIND_PARAMS + 20;
    for n in 0..count {
        store
            .upsert_item(&item(&format!("i{:04}", n), "Widget", &[]))
            .await
            .unwrap();
    }

    let mut ids: Vec<String> = (0..count).map(|n| format!("i{:04}", n)).collect();
    ids.push("missing".to_string());
    let found = store.get_items(&ids).await.unwrap();
    assert_eq!(found.len(), count);

    let collections = store.get_collections(&["c1".to_string()]).await.unwrap();
    assert_eq!(collections[0].item_ids.len(), count);
    assert_eq!(collections[0].description.as_deref(), Some("Brass and glass"));

    let users = store
        .get_users(&["u1".to_string(), "u9".to_string()])
        .await
        .unwrap();
    assert_eq!(users.len(), 1);
}

#[tokio::test]
async fn test_federated_search_over_sqlite() {
    let (_tmp, store) = open_store().await;
    seed_owner(&store).await;
    store.upsert_tag(&tag("t1", "Brass")).await.unwrap();
    store
        .upsert_item(&item("i1", "Brass sextant", &["t1"]))
        .await
        .unwrap();
    store.upsert_item(&item("i2", "Compass", &["t1"])).await.unwrap();
    store.upsert_item(&item("i3", "Telescope", &[])).await.unwrap();
    store
        .upsert_comment(&comment("m1", "i3", "brass fittings"))
        .await
        .unwrap();
    store
        .upsert_comment(&comment("m2", "gone", "brass ghost"))
        .await
        .unwrap();

    let page = search(&store, &SearchRequest::new(Some("brass"), 1))
        .await
        .unwrap();
    assert_eq!(page.total_results, 3);
    assert_eq!(page.total_pages, 1);

    let summary: Vec<(&str, &[SourceKind])> = page
        .results
        .iter()
        .map(|r| (r.id.as_str(), r.source.as_slice()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("i1", &[SourceKind::Items, SourceKind::Tags][..]),
            ("i2", &[SourceKind::Tags][..]),
            ("i3", &[SourceKind::Comments][..]),
        ]
    );
    assert_eq!(page.results[0].collection.user.username, "ada");
}
