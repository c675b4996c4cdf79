use serde::{Deserialize, Serialize};

/// A saved bookmark with its AI-assigned classification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub id: String,
    pub url: String,
    pub title: String,
    /// AI-generated summary of the page (shown as the note body).
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

impl Note {
    pub fn new(
        url: &str,
        title: &str,
        description: Option<String>,
        category: Option<String>,
        tags: Vec<String>,
    ) -> Self {
        Note {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.to_string(),
            title: title.to_string(),
            description,
            category,
            tags,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// A category name with the number of notes using it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryCount {
    pub name: String,
    pub count: i64,
}

/// A tag name with the number of notes carrying it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagCount {
    pub name: String,
    pub count: i64,
}

/// Encode a tag list for the TEXT column. Tags are stored as a JSON array.
pub(crate) fn tags_to_json(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

/// Decode the tags column. Malformed content reads as no tags.
pub(crate) fn tags_from_json(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}
