use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Flow {0} does not exist")]
    FlowNotFound(i64),

    /// A swap or normalize was rolled back. The in-memory order is stale and
    /// must be reloaded from storage.
    #[error("Reordering flow {flow_id} failed: {reason}")]
    Reorder { flow_id: i64, reason: String },

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Editor failed: {0}")]
    Editor(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Errors the UI reports in its status line instead of exiting on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Reorder { .. } | AppError::Search(_) | AppError::Editor(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
