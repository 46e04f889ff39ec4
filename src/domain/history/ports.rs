use async_trait::async_trait;

use super::models::{HistoryQuery, MailStats};
use crate::domain::{
    inbound::models::message::InboundMessage, outbound::models::message::OutboundMessage,
    repository::RepositoryError,
};

#[async_trait]
/// Read side of the message store, newest first
pub trait HistoryRepository: Clone + Send + Sync + 'static {
    async fn list_sent(&self, query: &HistoryQuery) -> Result<Vec<OutboundMessage>, RepositoryError>;

    async fn list_received(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<InboundMessage>, RepositoryError>;

    async fn stats(&self) -> Result<MailStats, RepositoryError>;
}

#[async_trait]
pub trait HistoryService: Clone + Send + Sync + 'static {
    async fn list_sent(&self, query: HistoryQuery) -> Vec<OutboundMessage>;

    async fn list_received(&self, query: HistoryQuery) -> Vec<InboundMessage>;

    async fn get_received(&self, provider_message_id: &str) -> Option<InboundMessage>;

    async fn stats(&self) -> MailStats;
}
