use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;

use super::{
    errors::DispatchError,
    models::{
        email::{OutboundEmail, SendEmailRequest},
        message::{BatchItemOutcome, OutboundMessage, SendOutcome},
    },
    ports::{DispatchService, EmailSender, OutboundRepository},
};
use crate::domain::{
    credentials::ports::CredentialService,
    registry::DomainRegistry,
    repository::{record_activity, ActivityLog, LogEntry, LogLevel},
};

pub const MAX_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct Dispatcher<R, S, C>
where
    R: OutboundRepository + ActivityLog,
    S: EmailSender,
    C: CredentialService,
{
    pub repo: Arc<R>,
    pub sender: Arc<S>,
    credentials: C,
    registry: Arc<DomainRegistry>,
}

impl<R, S, C> Dispatcher<R, S, C>
where
    R: OutboundRepository + ActivityLog,
    S: EmailSender,
    C: CredentialService,
{
    pub fn new(repo: Arc<R>, sender: Arc<S>, credentials: C, registry: Arc<DomainRegistry>) -> Self {
        Self {
            repo,
            sender,
            credentials,
            registry,
        }
    }

    #[tracing::instrument(
        name = "Dispatch an outbound email",
        skip(self, email),
        fields(domain = tracing::field::Empty, provider_message_id = tracing::field::Empty)
    )]
    async fn dispatch(&self, email: OutboundEmail) -> Result<SendOutcome, DispatchError> {
        let from = email.from.as_ref().map(|f| (f.as_ref(), f.domain()));
        let sender = self.registry.select_sender(from, email.domain.as_deref());
        tracing::Span::current().record("domain", tracing::field::display(&sender.domain));

        let api_key = match self.credentials.resolve(Some(sender.domain.as_str())).await {
            Some(key) => key,
            None => {
                let message = format!("No API key configured for domain {}", sender.domain);
                record_activity(
                    self.repo.as_ref(),
                    LogEntry::new(
                        LogLevel::Error,
                        message.clone(),
                        serde_json::json!({ "domain": sender.domain.as_str() }),
                    ),
                )
                .await;
                return Err(DispatchError::ConfigurationError(message));
            }
        };

        let provider_message_id = match self.sender.send_email(&api_key, &sender.from, &email).await
        {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error.cause_chain = ?e, "Provider rejected the email");
                record_activity(
                    self.repo.as_ref(),
                    LogEntry::new(
                        LogLevel::Warn,
                        format!("Send failed: {}", e),
                        serde_json::json!({
                            "domain": sender.domain.as_str(),
                            "status": e.status(),
                        }),
                    ),
                )
                .await;
                return Err(e.into());
            }
        };
        tracing::Span::current().record(
            "provider_message_id",
            tracing::field::display(&provider_message_id),
        );

        let message = OutboundMessage::sent(provider_message_id, &sender, &email, Utc::now());
        if let Err(e) = self.repo.record_sent(&message).await {
            tracing::warn!(error.cause_chain = ?e, "Email sent but could not be recorded");
        }

        Ok(SendOutcome {
            id: message.provider_message_id,
            domain: message.domain,
            from: message.from,
        })
    }
}

#[async_trait]
impl<R, S, C> DispatchService for Dispatcher<R, S, C>
where
    R: OutboundRepository + ActivityLog,
    S: EmailSender,
    C: CredentialService,
{
    async fn send(&self, request: SendEmailRequest) -> Result<SendOutcome, DispatchError> {
        let email = OutboundEmail::try_from(request)?;
        self.dispatch(email).await
    }

    #[tracing::instrument(name = "Dispatch a batch of emails", skip(self, requests), fields(size = requests.len()))]
    async fn send_batch(
        &self,
        requests: Vec<SendEmailRequest>,
    ) -> Result<Vec<BatchItemOutcome>, DispatchError> {
        if requests.is_empty() {
            return Err(DispatchError::ValidationError(
                "Batch must contain at least one email".to_string(),
            ));
        }
        if requests.len() > MAX_BATCH_SIZE {
            return Err(DispatchError::ValidationError(format!(
                "Batch cannot contain more than {} emails",
                MAX_BATCH_SIZE
            )));
        }

        let sends = requests
            .into_iter()
            .enumerate()
            .map(|(index, request)| async move {
                match self.send(request).await {
                    Ok(outcome) => BatchItemOutcome::succeeded(index, outcome),
                    Err(e) => BatchItemOutcome::failed(index, e.to_string(), e.status_code()),
                }
            });
        Ok(join_all(sends).await)
    }
}
