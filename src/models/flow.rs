use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named, ordered collection of match occurrences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Flow {
    /// An unsaved flow. `id` stays 0 until the store assigns one.
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: name.into(),
            description,
            archived: false,
            created_at: now,
            updated_at: now,
        }
    }
}
