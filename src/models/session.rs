use chrono::{DateTime, Utc};

/// Scopes which activation-log entries count toward "current".
///
/// Data persists across runs; the window only decides whether a run starts
/// with a clean "no active flow" slate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionContext {
    pub session_start: Option<DateTime<Utc>>,
}

impl SessionContext {
    /// No boundary: the latest activation ever recorded is eligible.
    pub fn persistent() -> Self {
        Self {
            session_start: None,
        }
    }

    pub fn starting_now() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(session_start: DateTime<Utc>) -> Self {
        Self {
            session_start: Some(session_start),
        }
    }

    pub fn lower_bound(&self) -> DateTime<Utc> {
        self.session_start.unwrap_or(DateTime::UNIX_EPOCH)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveFlow {
    #[default]
    Inactive,
    Active(i64),
}

impl ActiveFlow {
    pub fn flow_id(self) -> Option<i64> {
        match self {
            ActiveFlow::Inactive => None,
            ActiveFlow::Active(id) => Some(id),
        }
    }
}
