use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// "Flow X was made active at time T". Rows are never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowHistory {
    pub id: i64,
    pub flow_id: i64,
    pub created_at: DateTime<Utc>,
}

impl FlowHistory {
    pub fn new(flow_id: i64) -> Self {
        Self {
            id: 0,
            flow_id,
            created_at: Utc::now(),
        }
    }
}

/// An activation joined with the flow it activated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowHistoryEntry {
    pub id: i64,
    pub flow_id: i64,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub description: Option<String>,
}
