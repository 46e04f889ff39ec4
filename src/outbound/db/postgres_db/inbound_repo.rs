use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;

use super::PostgresDb;
use crate::domain::inbound::{
    models::message::{AttachmentMeta, InboundMessage, ReceivedContent},
    ports::InboundRepository,
};
use crate::domain::repository::RepositoryError;

pub(super) const RECEIVED_COLUMNS: &str = "id, provider_message_id, internal_message_id, domain, \
    from_address, to_addresses, cc_addresses, subject, html, text, attachments, headers, \
    received_at, content_fetched_at";

#[derive(sqlx::FromRow)]
pub(super) struct ReceivedRow {
    id: uuid::Uuid,
    provider_message_id: String,
    internal_message_id: Option<String>,
    domain: String,
    from_address: String,
    to_addresses: Vec<String>,
    cc_addresses: Vec<String>,
    subject: String,
    html: Option<String>,
    text: Option<String>,
    attachments: Json<Vec<AttachmentMeta>>,
    headers: serde_json::Value,
    received_at: DateTime<Utc>,
    content_fetched_at: Option<DateTime<Utc>>,
}

impl From<ReceivedRow> for InboundMessage {
    fn from(row: ReceivedRow) -> Self {
        InboundMessage {
            id: row.id,
            provider_message_id: row.provider_message_id,
            internal_message_id: row.internal_message_id,
            domain: row.domain,
            from: row.from_address,
            to: row.to_addresses,
            cc: row.cc_addresses,
            subject: row.subject,
            html: row.html,
            text: row.text,
            attachments: row.attachments.0,
            headers: row.headers,
            received_at: row.received_at,
            content_fetched_at: row.content_fetched_at,
        }
    }
}

#[async_trait]
impl InboundRepository for PostgresDb {
    #[tracing::instrument(name = "Log webhook event", skip(self, payload))]
    async fn log_event(
        &self,
        event_type: &str,
        provider_message_id: Option<&str>,
        payload: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        let Ok(pool) = self.pool() else {
            return Ok(());
        };
        sqlx::query(
            r#"INSERT INTO webhook_events (event_type, provider_message_id, payload, received_at)
            VALUES ($1, $2, $3, now())"#,
        )
        .bind(event_type)
        .bind(provider_message_id)
        .bind(payload)
        .execute(pool)
        .await
        .context("Failed to log the webhook event")?;
        Ok(())
    }

    #[tracing::instrument(name = "Insert received email stub", skip(self, message), fields(provider_message_id = %message.provider_message_id))]
    async fn insert_stub(&self, message: &InboundMessage) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO received_emails (id, provider_message_id, internal_message_id, domain,
                from_address, to_addresses, cc_addresses, subject, attachments, headers, received_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (provider_message_id) DO NOTHING
            "#,
        )
        .bind(message.id)
        .bind(&message.provider_message_id)
        .bind(message.internal_message_id.as_deref())
        .bind(&message.domain)
        .bind(&message.from)
        .bind(&message.to)
        .bind(&message.cc)
        .bind(&message.subject)
        .bind(Json(&message.attachments))
        .bind(&message.headers)
        .bind(message.received_at)
        .execute(self.pool()?)
        .await
        .context("Failed to store the received email")?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(name = "Find received email", skip(self))]
    async fn find_received(
        &self,
        provider_message_id: &str,
    ) -> Result<Option<InboundMessage>, RepositoryError> {
        let Ok(pool) = self.pool() else {
            return Ok(None);
        };
        let row: Option<ReceivedRow> = sqlx::query_as(&format!(
            "SELECT {} FROM received_emails WHERE provider_message_id = $1",
            RECEIVED_COLUMNS
        ))
        .bind(provider_message_id)
        .fetch_optional(pool)
        .await
        .context("Failed to read the received email")?;

        Ok(row.map(InboundMessage::from))
    }

    #[tracing::instrument(name = "Store received email content", skip(self, content))]
    async fn store_content(
        &self,
        provider_message_id: &str,
        content: &ReceivedContent,
        fetched_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let Ok(pool) = self.pool() else {
            return Ok(());
        };
        sqlx::query(
            r#"
            UPDATE received_emails
            SET html = $2,
                text = $3,
                headers = $4,
                attachments = CASE WHEN jsonb_array_length($5) > 0 THEN $5 ELSE attachments END,
                content_fetched_at = $6
            WHERE provider_message_id = $1
            "#,
        )
        .bind(provider_message_id)
        .bind(content.html.as_deref())
        .bind(content.text.as_deref())
        .bind(&content.headers)
        .bind(Json(&content.attachments))
        .bind(fetched_at)
        .execute(pool)
        .await
        .context("Failed to store the received email content")?;
        Ok(())
    }
}
