use anyhow::Context;
use async_trait::async_trait;

use super::{
    inbound_repo::{ReceivedRow, RECEIVED_COLUMNS},
    outbound_repo::{SentRow, SENT_COLUMNS},
    PostgresDb,
};
use crate::domain::history::{
    models::{HistoryQuery, MailStats},
    ports::HistoryRepository,
};
use crate::domain::inbound::models::message::InboundMessage;
use crate::domain::outbound::models::message::OutboundMessage;
use crate::domain::repository::RepositoryError;

#[async_trait]
impl HistoryRepository for PostgresDb {
    #[tracing::instrument(name = "List sent emails", skip(self))]
    async fn list_sent(&self, query: &HistoryQuery) -> Result<Vec<OutboundMessage>, RepositoryError> {
        let Ok(pool) = self.pool() else {
            return Ok(Vec::new());
        };
        let rows: Vec<SentRow> = sqlx::query_as(&format!(
            r#"SELECT {} FROM sent_emails
            WHERE ($1::text IS NULL OR domain = $1)
            ORDER BY sent_at DESC LIMIT $2 OFFSET $3"#,
            SENT_COLUMNS
        ))
        .bind(query.domain.as_deref())
        .bind(i64::from(query.limit))
        .bind(i64::from(query.offset))
        .fetch_all(pool)
        .await
        .context("Failed to list sent emails")?;

        rows.into_iter().map(OutboundMessage::try_from).collect()
    }

    #[tracing::instrument(name = "List received emails", skip(self))]
    async fn list_received(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<InboundMessage>, RepositoryError> {
        let Ok(pool) = self.pool() else {
            return Ok(Vec::new());
        };
        let rows: Vec<ReceivedRow> = sqlx::query_as(&format!(
            r#"SELECT {} FROM received_emails
            WHERE ($1::text IS NULL OR domain = $1)
            ORDER BY received_at DESC LIMIT $2 OFFSET $3"#,
            RECEIVED_COLUMNS
        ))
        .bind(query.domain.as_deref())
        .bind(i64::from(query.limit))
        .bind(i64::from(query.offset))
        .fetch_all(pool)
        .await
        .context("Failed to list received emails")?;

        Ok(rows.into_iter().map(InboundMessage::from).collect())
    }

    #[tracing::instrument(name = "Compute mail stats", skip(self))]
    async fn stats(&self) -> Result<MailStats, RepositoryError> {
        let Ok(pool) = self.pool() else {
            return Ok(MailStats::default());
        };
        let by_status: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM sent_emails GROUP BY status")
                .fetch_all(pool)
                .await
                .context("Failed to count sent emails")?;
        let (received_total, received_pending_content): (i64, i64) = sqlx::query_as(
            r#"SELECT COUNT(*), COUNT(*) FILTER (WHERE content_fetched_at IS NULL)
            FROM received_emails"#,
        )
        .fetch_one(pool)
        .await
        .context("Failed to count received emails")?;

        let sent_by_status: std::collections::BTreeMap<String, u64> = by_status
            .into_iter()
            .map(|(status, count)| (status, count.max(0) as u64))
            .collect();
        Ok(MailStats {
            sent_total: sent_by_status.values().sum(),
            sent_by_status,
            received_total: received_total.max(0) as u64,
            received_pending_content: received_pending_content.max(0) as u64,
        })
    }
}
