use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    errors::InboundError,
    models::message::{
        AttachmentDownload, InboundMessage, ProviderAttachment, ReceivedContent, WebhookOutcome,
    },
};
use crate::domain::{
    credentials::models::ApiKey, provider::ProviderError, repository::RepositoryError,
};

#[async_trait]
/// Store of received emails and the raw notification log
pub trait InboundRepository: Clone + Send + Sync + 'static {
    async fn log_event(
        &self,
        event_type: &str,
        provider_message_id: Option<&str>,
        payload: &serde_json::Value,
    ) -> Result<(), RepositoryError>;

    /// `true` when the stub was created, `false` when the message was already known
    async fn insert_stub(&self, message: &InboundMessage) -> Result<bool, RepositoryError>;

    async fn find_received(
        &self,
        provider_message_id: &str,
    ) -> Result<Option<InboundMessage>, RepositoryError>;

    async fn store_content(
        &self,
        provider_message_id: &str,
        content: &ReceivedContent,
        fetched_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
/// Upstream API holding the content of received emails
pub trait ReceivedEmailSource: Clone + Send + Sync + 'static {
    async fn fetch_received(
        &self,
        api_key: &ApiKey,
        provider_message_id: &str,
    ) -> Result<ReceivedContent, ProviderError>;

    async fn list_attachments(
        &self,
        api_key: &ApiKey,
        provider_message_id: &str,
    ) -> Result<Vec<ProviderAttachment>, ProviderError>;

    async fn download_attachment(
        &self,
        attachment: &ProviderAttachment,
    ) -> Result<AttachmentDownload, ProviderError>;
}

#[async_trait]
pub trait InboundService: Clone + Send + Sync + 'static {
    async fn handle_webhook(
        &self,
        payload: serde_json::Value,
    ) -> Result<WebhookOutcome, InboundError>;

    /// Fetches the content of a received email now, bypassing the background runner.
    async fn refetch(&self, provider_message_id: &str) -> Result<InboundMessage, InboundError>;

    async fn attachments(
        &self,
        provider_message_id: &str,
    ) -> Result<Vec<ProviderAttachment>, InboundError>;

    async fn download_attachment(
        &self,
        provider_message_id: &str,
        attachment_id: &str,
    ) -> Result<AttachmentDownload, InboundError>;
}
