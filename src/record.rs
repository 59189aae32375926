/// The normalized post record kept in the working set
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::normalize::normalize_text;

/// One captured post, as stored under the `posts` key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub content: String,
    pub author: String,
    /// When the post was captured, not when it was published.
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub profile_link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_url: Option<String>,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub shares: u64,
}

impl Record {
    /// Build a record with a fresh id. Returns `None` when either required
    /// field is empty after normalization.
    pub fn new(content: &str, author: &str, timestamp: DateTime<Utc>) -> Option<Record> {
        let content = normalize_text(content);
        let author = normalize_text(author);
        if content.is_empty() || author.is_empty() {
            return None;
        }

        Some(Record {
            id: Uuid::new_v4().to_string(),
            content,
            author,
            timestamp,
            profile_link: String::new(),
            image_url: None,
            post_url: None,
            likes: 0,
            comments: 0,
            shares: 0,
        })
    }

    /// Whether the record can be persisted at all.
    pub fn is_complete(&self) -> bool {
        !normalize_text(&self.content).is_empty() && !normalize_text(&self.author).is_empty()
    }
}
