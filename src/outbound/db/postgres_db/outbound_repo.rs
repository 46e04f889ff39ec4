use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::PostgresDb;
use crate::domain::outbound::{
    models::message::{DeliveryStatus, DeliveryUpdate, OutboundMessage},
    ports::OutboundRepository,
};
use crate::domain::repository::RepositoryError;

pub(super) const SENT_COLUMNS: &str = "id, provider_message_id, domain, from_address, \
    to_addresses, cc_addresses, bcc_addresses, subject, html, text, status, sent_at, \
    delivered_at, opened_at, clicked_at";

#[derive(sqlx::FromRow)]
pub(super) struct SentRow {
    id: uuid::Uuid,
    provider_message_id: String,
    domain: String,
    from_address: String,
    to_addresses: Vec<String>,
    cc_addresses: Vec<String>,
    bcc_addresses: Vec<String>,
    subject: String,
    html: Option<String>,
    text: Option<String>,
    status: String,
    sent_at: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
    opened_at: Option<DateTime<Utc>>,
    clicked_at: Option<DateTime<Utc>>,
}

impl TryFrom<SentRow> for OutboundMessage {
    type Error = RepositoryError;

    fn try_from(row: SentRow) -> Result<Self, Self::Error> {
        let status = DeliveryStatus::parse(&row.status)
            .map_err(|e| RepositoryError::InvalidRecord(e.to_string()))?;
        Ok(OutboundMessage {
            id: row.id,
            provider_message_id: row.provider_message_id,
            domain: row.domain,
            from: row.from_address,
            to: row.to_addresses,
            cc: row.cc_addresses,
            bcc: row.bcc_addresses,
            subject: row.subject,
            html: row.html,
            text: row.text,
            status,
            sent_at: row.sent_at,
            delivered_at: row.delivered_at,
            opened_at: row.opened_at,
            clicked_at: row.clicked_at,
        })
    }
}

#[async_trait]
impl OutboundRepository for PostgresDb {
    #[tracing::instrument(name = "Record sent email", skip(self, message), fields(provider_message_id = %message.provider_message_id))]
    async fn record_sent(&self, message: &OutboundMessage) -> Result<(), RepositoryError> {
        let Ok(pool) = self.pool() else {
            return Ok(());
        };
        sqlx::query(
            r#"
            INSERT INTO sent_emails (id, provider_message_id, domain, from_address, to_addresses,
                cc_addresses, bcc_addresses, subject, html, text, status, sent_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, now())
            ON CONFLICT (provider_message_id) DO NOTHING
            "#,
        )
        .bind(message.id)
        .bind(&message.provider_message_id)
        .bind(&message.domain)
        .bind(&message.from)
        .bind(&message.to)
        .bind(&message.cc)
        .bind(&message.bcc)
        .bind(&message.subject)
        .bind(message.html.as_deref())
        .bind(message.text.as_deref())
        .bind(message.status.as_str())
        .bind(message.sent_at)
        .execute(pool)
        .await
        .context("Failed to record the sent email")?;
        Ok(())
    }

    #[tracing::instrument(name = "Find sent email", skip(self))]
    async fn find_sent(
        &self,
        provider_message_id: &str,
    ) -> Result<Option<OutboundMessage>, RepositoryError> {
        let Ok(pool) = self.pool() else {
            return Ok(None);
        };
        let row: Option<SentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM sent_emails WHERE provider_message_id = $1",
            SENT_COLUMNS
        ))
        .bind(provider_message_id)
        .fetch_optional(pool)
        .await
        .context("Failed to read the sent email")?;

        row.map(OutboundMessage::try_from).transpose()
    }

    #[tracing::instrument(name = "Update delivery status", skip(self, update), fields(status = %update.status))]
    async fn update_delivery(
        &self,
        provider_message_id: &str,
        update: &DeliveryUpdate,
    ) -> Result<(), RepositoryError> {
        let Ok(pool) = self.pool() else {
            return Ok(());
        };
        sqlx::query(
            r#"
            UPDATE sent_emails
            SET status = $2,
                delivered_at = COALESCE(delivered_at, $3),
                opened_at = COALESCE(opened_at, $4),
                clicked_at = COALESCE(clicked_at, $5),
                updated_at = now()
            WHERE provider_message_id = $1
            "#,
        )
        .bind(provider_message_id)
        .bind(update.status.as_str())
        .bind(update.delivered_at)
        .bind(update.opened_at)
        .bind(update.clicked_at)
        .execute(pool)
        .await
        .context("Failed to update the delivery status")?;
        Ok(())
    }
}
