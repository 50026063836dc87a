use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MatchNote;

/// A search hit as produced by the search provider, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMatch {
    pub line: String,
    pub file_path: String,
    pub file_name: String,
    pub line_no: Option<i64>,
    pub grep_meta: Option<serde_json::Value>,
}

impl NewMatch {
    pub fn new(line: impl Into<String>, file_path: impl Into<String>, line_no: Option<i64>) -> Self {
        let file_path = file_path.into();
        let file_name = Path::new(&file_path)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| file_path.clone());

        Self {
            line: line.into(),
            file_path,
            file_name,
            line_no,
            grep_meta: None,
        }
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.grep_meta = Some(meta);
        self
    }
}

/// A persisted, deduplicated search hit. `(line, file_path)` identifies a live row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: i64,
    pub line: String,
    pub file_path: String,
    pub file_name: String,
    pub line_no: Option<i64>,
    pub grep_meta: Option<serde_json::Value>,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<NewMatch> for Match {
    fn from(candidate: NewMatch) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            line: candidate.line,
            file_path: candidate.file_path,
            file_name: candidate.file_name,
            line_no: candidate.line_no,
            grep_meta: candidate.grep_meta,
            archived: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One occurrence of a match inside a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowMatch {
    pub id: i64,
    pub flow_id: i64,
    pub match_id: i64,
    pub order_index: i64,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FlowMatch {
    pub fn new(flow_id: i64, match_id: i64, order_index: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            flow_id,
            match_id,
            order_index,
            archived: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A row of a flow as the Steps view displays it.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowStep {
    pub matched: Match,
    pub occurrence: FlowMatch,
    pub note: Option<MatchNote>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_match_derives_file_name_from_path() {
        let hit = NewMatch::new("let x = 1;", "src/lib/mod.rs", Some(12));
        assert_eq!(hit.file_name, "mod.rs");
        assert_eq!(hit.line_no, Some(12));
        assert!(hit.grep_meta.is_none());
    }

    #[test]
    fn match_from_candidate_is_unsaved_and_live() {
        let hit = NewMatch::new("x", "/a.py", Some(7)).with_meta(serde_json::json!({"k": 1}));
        let m = Match::from(hit);
        assert_eq!(m.id, 0);
        assert!(!m.archived);
        assert_eq!(m.file_name, "a.py");
        assert_eq!(m.grep_meta, Some(serde_json::json!({"k": 1})));
    }
}
