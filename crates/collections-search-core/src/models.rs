//! Entity models owned by the collections application.
//!
//! Search treats all of these as read-only. They are written by the
//! collection/item CRUD layer (or by `collsearch import`) and only read
//! back through [`ContentStore`](crate::store::ContentStore).

use serde::{Deserialize, Serialize};

/// A registered user. Only the username is surfaced in search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
}

/// A user-owned collection of items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub user_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    /// Items belonging to this collection. Derived from the items'
    /// `collection_id` on read; ignored on write.
    #[serde(default)]
    pub item_ids: Vec<String>,
}

/// Type of a custom field declared by a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Text,
    Integer,
    Boolean,
    Date,
}

/// A value for one custom field on an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub name: String,
    pub kind: FieldKind,
    pub value: serde_json::Value,
}

impl FieldValue {
    /// Text contributed by this field to the item's full-text index.
    ///
    /// Only textual kinds are indexed; numbers, booleans and dates are not
    /// meaningful free-text targets.
    pub fn indexed_text(&self) -> Option<&str> {
        match self.kind {
            FieldKind::String | FieldKind::Text => self.value.as_str(),
            _ => None,
        }
    }
}

/// An item inside a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub collection_id: String,
    #[serde(default)]
    pub tag_ids: Vec<String>,
    /// Comments on this item. Derived from the comments' `item_id` on read;
    /// ignored on write.
    #[serde(default)]
    pub comment_ids: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldValue>,
}

impl Item {
    /// All text indexed for this item: its name followed by every textual
    /// field value.
    pub fn indexed_text(&self) -> String {
        let mut text = self.name.clone();
        for value in self.fields.iter().filter_map(FieldValue::indexed_text) {
            text.push('\n');
            text.push_str(value);
        }
        text
    }
}

/// A tag shared across items, keyed by its normalized `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub label: String,
    pub value: String,
    /// Items carrying this tag, in link order. Derived from the items'
    /// `tag_ids` on read; ignored on write.
    #[serde(default)]
    pub item_ids: Vec<String>,
}

impl Tag {
    /// Normalize a display label into the tag's lookup key.
    pub fn normalize(label: &str) -> String {
        label.trim().to_lowercase()
    }
}

/// A comment left by a user on an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub item_id: String,
    pub author_id: String,
    pub text: String,
    /// Unix timestamp (seconds).
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_indexed_text_skips_non_textual_fields() {
        let item = Item {
            id: "i1".to_string(),
            name: "Brass Sextant".to_string(),
            collection_id: "c1".to_string(),
            tag_ids: vec![],
            comment_ids: vec![],
            fields: vec![
                FieldValue {
                    name: "maker".to_string(),
                    kind: FieldKind::String,
                    value: json!("Heath & Co"),
                },
                FieldValue {
                    name: "year".to_string(),
                    kind: FieldKind::Integer,
                    value: json!(1890),
                },
                FieldValue {
                    name: "notes".to_string(),
                    kind: FieldKind::Text,
                    value: json!("Recovered from a naval auction."),
                },
            ],
        };
        assert_eq!(
            item.indexed_text(),
            "Brass Sextant\nHeath & Co\nRecovered from a naval auction."
        );
    }

    #[test]
    fn test_tag_normalize() {
        assert_eq!(Tag::normalize("  Vintage Maps "), "vintage maps");
    }
}
