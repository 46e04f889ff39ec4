use async_trait::async_trait;

use super::{
    errors::DispatchError,
    models::{
        email::{OutboundEmail, SendEmailRequest},
        message::{BatchItemOutcome, DeliveryUpdate, OutboundMessage, SendOutcome},
    },
};
use crate::domain::{
    credentials::models::ApiKey, provider::ProviderError, repository::RepositoryError,
};

#[async_trait]
/// Store of messages accepted by the provider
pub trait OutboundRepository: Clone + Send + Sync + 'static {
    async fn record_sent(&self, message: &OutboundMessage) -> Result<(), RepositoryError>;

    async fn find_sent(
        &self,
        provider_message_id: &str,
    ) -> Result<Option<OutboundMessage>, RepositoryError>;

    async fn update_delivery(
        &self,
        provider_message_id: &str,
        update: &DeliveryUpdate,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
/// Upstream API accepting outbound mail
pub trait EmailSender: Clone + Send + Sync + 'static {
    /// Returns the provider's id for the accepted message.
    async fn send_email(
        &self,
        api_key: &ApiKey,
        from: &str,
        email: &OutboundEmail,
    ) -> Result<String, ProviderError>;
}

#[async_trait]
pub trait DispatchService: Clone + Send + Sync + 'static {
    async fn send(&self, request: SendEmailRequest) -> Result<SendOutcome, DispatchError>;

    /// Items are dispatched independently; the result keeps input order.
    async fn send_batch(
        &self,
        requests: Vec<SendEmailRequest>,
    ) -> Result<Vec<BatchItemOutcome>, DispatchError>;
}
