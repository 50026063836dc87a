use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Annotation attached to one occurrence of a match within a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchNote {
    /// `None` until stored; `add_or_update_note` inserts or updates based on it.
    pub id: Option<i64>,
    pub flow_match_id: i64,
    pub name: Option<String>,
    pub note: String,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MatchNote {
    pub fn new(flow_match_id: i64, note: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            flow_match_id,
            name: None,
            note: note.into(),
            archived: false,
            created_at: now,
            updated_at: now,
        }
    }
}
