use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(thiserror::Error, Debug)]
pub enum RepositoryError {
    #[error("Persistence is disabled")]
    Disabled,

    #[error("Record not found")]
    NotFound,

    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// A free-text operational log row.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub context: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>, context: serde_json::Value) -> Self {
        Self {
            level,
            message: message.into(),
            context,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait ActivityLog: Clone + Send + Sync + 'static {
    async fn append_log(&self, entry: &LogEntry) -> Result<(), RepositoryError>;
}

/// Writes a log row, keeping store failures out of the caller's way.
pub async fn record_activity<L: ActivityLog>(log: &L, entry: LogEntry) {
    if let Err(e) = log.append_log(&entry).await {
        tracing::warn!(error.cause_chain = ?e, "Failed to store gateway log entry");
    }
}
