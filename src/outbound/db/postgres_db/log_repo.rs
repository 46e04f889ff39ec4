use anyhow::Context;
use async_trait::async_trait;

use super::PostgresDb;
use crate::domain::repository::{ActivityLog, LogEntry, RepositoryError};

#[async_trait]
impl ActivityLog for PostgresDb {
    #[tracing::instrument(name = "Append gateway log", skip(self, entry), fields(level = entry.level.as_str()))]
    async fn append_log(&self, entry: &LogEntry) -> Result<(), RepositoryError> {
        let Ok(pool) = self.pool() else {
            return Ok(());
        };
        sqlx::query(
            r#"INSERT INTO gateway_logs (level, message, context, created_at)
            VALUES ($1, $2, $3, $4)"#,
        )
        .bind(entry.level.as_str())
        .bind(&entry.message)
        .bind(&entry.context)
        .bind(entry.created_at)
        .execute(pool)
        .await
        .context("Failed to append the gateway log entry")?;
        Ok(())
    }
}
