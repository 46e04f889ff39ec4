use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::{
    errors::InboundError,
    models::{
        event::{event_summary, InboundArrival, WebhookEvent},
        message::{
            AttachmentDownload, FetchPolicy, InboundMessage, ProviderAttachment, ReceivedContent,
            WebhookOutcome,
        },
    },
    ports::{InboundRepository, InboundService, ReceivedEmailSource},
};
use crate::domain::{
    credentials::{models::ApiKey, ports::CredentialService},
    outbound::{models::message::DeliveryEvent, ports::OutboundRepository},
    registry::DomainRegistry,
    repository::{record_activity, ActivityLog, LogEntry, LogLevel, RepositoryError},
    tasks::BackgroundTasks,
};

/// Interprets provider notifications: delivery updates for sent mail and
/// arrival of received mail, whose content is fetched in the background.
#[derive(Debug, Clone)]
pub struct WebhookHandler<R, P, C>
where
    R: InboundRepository + OutboundRepository + ActivityLog,
    P: ReceivedEmailSource,
    C: CredentialService,
{
    pub repo: Arc<R>,
    pub source: Arc<P>,
    credentials: C,
    registry: Arc<DomainRegistry>,
    tasks: BackgroundTasks,
    policy: FetchPolicy,
}

impl<R, P, C> WebhookHandler<R, P, C>
where
    R: InboundRepository + OutboundRepository + ActivityLog,
    P: ReceivedEmailSource,
    C: CredentialService,
{
    pub fn new(
        repo: Arc<R>,
        source: Arc<P>,
        credentials: C,
        registry: Arc<DomainRegistry>,
        tasks: BackgroundTasks,
        policy: FetchPolicy,
    ) -> Self {
        Self {
            repo,
            source,
            credentials,
            registry,
            tasks,
            policy,
        }
    }

    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    #[tracing::instrument(name = "Apply a delivery notification", skip(self, event), fields(provider_message_id = %event.provider_message_id, status = %event.status))]
    async fn apply_delivery(&self, event: DeliveryEvent) -> WebhookOutcome {
        let message = match self.repo.find_sent(&event.provider_message_id).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                tracing::info!("Notification for a message that was not sent through this gateway");
                return WebhookOutcome::UnknownMessage;
            }
            Err(e) => {
                tracing::warn!(error.cause_chain = ?e, "Failed to look up the sent message");
                return WebhookOutcome::UnknownMessage;
            }
        };
        let update = message.apply(&event);
        if let Err(e) = self
            .repo
            .update_delivery(&event.provider_message_id, &update)
            .await
        {
            tracing::warn!(error.cause_chain = ?e, "Failed to store the delivery status");
        }
        WebhookOutcome::StatusUpdated
    }

    #[tracing::instrument(name = "Store a received email", skip(self, arrival), fields(provider_message_id = %arrival.provider_message_id))]
    async fn store_arrival(&self, arrival: InboundArrival) -> WebhookOutcome {
        let domain = self.registry.owning_domain(arrival.recipient_domains());
        let stub = InboundMessage::stub(arrival, &domain);

        match self.repo.insert_stub(&stub).await {
            Ok(true) => {
                self.schedule_fetch(stub.provider_message_id, stub.domain);
                WebhookOutcome::Stored {
                    fetch_scheduled: true,
                }
            }
            Ok(false) => {
                tracing::info!("Received email already stored, skipping the content fetch");
                WebhookOutcome::Duplicate
            }
            Err(RepositoryError::Disabled) => WebhookOutcome::NotStored,
            Err(e) => {
                tracing::warn!(error.cause_chain = ?e, "Failed to store the received email");
                WebhookOutcome::NotStored
            }
        }
    }

    fn schedule_fetch(&self, provider_message_id: String, domain: String) {
        let handler = self.clone();
        self.tasks.spawn(async move {
            // Failures are logged inside.
            let _ = handler.fetch_content(&provider_message_id, &domain).await;
        });
    }

    async fn credential_for(&self, domain: &str) -> Result<ApiKey, InboundError> {
        match self.credentials.resolve(Some(domain)).await {
            Some(key) => Ok(key),
            None => {
                let message = format!("No API key configured for domain {}", domain);
                record_activity(
                    self.repo.as_ref(),
                    LogEntry::new(
                        LogLevel::Error,
                        message.clone(),
                        serde_json::json!({ "domain": domain }),
                    ),
                )
                .await;
                Err(InboundError::ConfigurationError(message))
            }
        }
    }

    /// Downloads and stores the content of a received email, retrying provider
    /// failures according to the fetch policy.
    #[tracing::instrument(name = "Fetch received email content", skip(self))]
    pub async fn fetch_content(
        &self,
        provider_message_id: &str,
        domain: &str,
    ) -> Result<(ReceivedContent, DateTime<Utc>), InboundError> {
        let api_key = self.credential_for(domain).await?;

        let mut attempt = 1;
        let content = loop {
            let delay = self.policy.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match self
                .source
                .fetch_received(&api_key, provider_message_id)
                .await
            {
                Ok(content) => break content,
                Err(e) if attempt < self.policy.attempts => {
                    tracing::warn!(error.cause_chain = ?e, attempt, "Content fetch failed, retrying");
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(error.cause_chain = ?e, attempt, "Content fetch failed, giving up");
                    record_activity(
                        self.repo.as_ref(),
                        LogEntry::new(
                            LogLevel::Error,
                            format!("Content fetch failed after {} attempts: {}", attempt, e),
                            serde_json::json!({
                                "provider_message_id": provider_message_id,
                                "domain": domain,
                            }),
                        ),
                    )
                    .await;
                    return Err(e.into());
                }
            }
        };

        let fetched_at = Utc::now();
        self.repo
            .store_content(provider_message_id, &content, fetched_at)
            .await
            .context("Failed to store the fetched content")?;
        Ok((content, fetched_at))
    }

    async fn find_received(&self, provider_message_id: &str) -> Result<InboundMessage, InboundError> {
        self.repo
            .find_received(provider_message_id)
            .await
            .context("Failed to look up the received email")?
            .ok_or_else(|| InboundError::NotFound(format!("received email {}", provider_message_id)))
    }
}

#[async_trait]
impl<R, P, C> InboundService for WebhookHandler<R, P, C>
where
    R: InboundRepository + OutboundRepository + ActivityLog,
    P: ReceivedEmailSource,
    C: CredentialService,
{
    #[tracing::instrument(name = "Handle a provider notification", skip(self, payload), fields(event_type = tracing::field::Empty))]
    async fn handle_webhook(
        &self,
        payload: serde_json::Value,
    ) -> Result<WebhookOutcome, InboundError> {
        let (event_type, provider_message_id) = event_summary(&payload);
        tracing::Span::current().record("event_type", tracing::field::display(&event_type));
        if let Err(e) = self
            .repo
            .log_event(&event_type, provider_message_id.as_deref(), &payload)
            .await
        {
            tracing::warn!(error.cause_chain = ?e, "Failed to log the notification");
        }

        match WebhookEvent::parse(&payload)? {
            WebhookEvent::Delivery(event) => Ok(self.apply_delivery(event).await),
            WebhookEvent::Arrival(arrival) => Ok(self.store_arrival(arrival).await),
            WebhookEvent::Ignored(event_type) => {
                tracing::info!("Ignoring notification of type {}", event_type);
                Ok(WebhookOutcome::Ignored(event_type))
            }
        }
    }

    #[tracing::instrument(name = "Refetch received email content", skip(self))]
    async fn refetch(&self, provider_message_id: &str) -> Result<InboundMessage, InboundError> {
        let mut message = self.find_received(provider_message_id).await?;
        let (content, fetched_at) = self
            .fetch_content(provider_message_id, &message.domain)
            .await?;
        message.fill(content, fetched_at);
        Ok(message)
    }

    #[tracing::instrument(name = "List received email attachments", skip(self))]
    async fn attachments(
        &self,
        provider_message_id: &str,
    ) -> Result<Vec<ProviderAttachment>, InboundError> {
        let message = self.find_received(provider_message_id).await?;
        let api_key = self.credential_for(&message.domain).await?;
        Ok(self
            .source
            .list_attachments(&api_key, provider_message_id)
            .await?)
    }

    #[tracing::instrument(name = "Download a received email attachment", skip(self))]
    async fn download_attachment(
        &self,
        provider_message_id: &str,
        attachment_id: &str,
    ) -> Result<AttachmentDownload, InboundError> {
        let attachment = self
            .attachments(provider_message_id)
            .await?
            .into_iter()
            .find(|a| a.id == attachment_id)
            .ok_or_else(|| InboundError::NotFound(format!("attachment {}", attachment_id)))?;
        Ok(self.source.download_attachment(&attachment).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::WebhookHandler;
    use crate::domain::credentials::{
        models::{ApiKey, StaticCredentials},
        service::CredentialResolver,
    };
    use crate::domain::inbound::{
        errors::InboundError,
        models::message::{
            AttachmentDownload, FetchPolicy, InboundState, ProviderAttachment, ReceivedContent,
            WebhookOutcome,
        },
        ports::{InboundService, ReceivedEmailSource},
    };
    use crate::domain::outbound::models::email::{OneOrMany, OutboundEmail, SendEmailRequest};
    use crate::domain::outbound::models::message::{DeliveryStatus, OutboundMessage};
    use crate::domain::outbound::ports::OutboundRepository;
    use crate::domain::provider::ProviderError;
    use crate::domain::registry::DomainRegistry;
    use crate::domain::tasks::BackgroundTasks;
    use crate::outbound::db::memory_db::MemoryDb;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;

    /// Fails a configured number of times before returning content.
    #[derive(Clone, Default)]
    struct ScriptedSource {
        failures: Arc<AtomicUsize>,
        calls: Arc<Mutex<Vec<Instant>>>,
    }

    impl ScriptedSource {
        fn failing(times: usize) -> Self {
            let source = Self::default();
            source.failures.store(times, Ordering::SeqCst);
            source
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReceivedEmailSource for ScriptedSource {
        async fn fetch_received(
            &self,
            _api_key: &ApiKey,
            _provider_message_id: &str,
        ) -> Result<ReceivedContent, ProviderError> {
            self.calls.lock().unwrap().push(Instant::now());
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(ProviderError::Rejected {
                    status: 503,
                    message: "try later".into(),
                });
            }
            Ok(ReceivedContent {
                html: Some("<p>hello</p>".into()),
                text: Some("hello".into()),
                headers: json!({"x-test": "1"}),
                attachments: vec![],
            })
        }

        async fn list_attachments(
            &self,
            _api_key: &ApiKey,
            _provider_message_id: &str,
        ) -> Result<Vec<ProviderAttachment>, ProviderError> {
            Ok(vec![ProviderAttachment {
                id: "att_1".into(),
                filename: Some("a.txt".into()),
                content_type: Some("text/plain".into()),
                size: Some(2),
                download_url: "https://files.test/att_1".into(),
                expires_at: None,
            }])
        }

        async fn download_attachment(
            &self,
            attachment: &ProviderAttachment,
        ) -> Result<AttachmentDownload, ProviderError> {
            Ok(AttachmentDownload {
                filename: attachment.filename.clone(),
                content_type: "text/plain".into(),
                bytes: b"hi".to_vec(),
            })
        }
    }

    type TestHandler = WebhookHandler<MemoryDb, ScriptedSource, CredentialResolver<MemoryDb>>;

    fn handler(db: &MemoryDb, source: &ScriptedSource, default_key: Option<&str>) -> TestHandler {
        let registry = Arc::new(DomainRegistry::parse("foo.com,bar.io", None));
        let credentials = CredentialResolver::new(
            Arc::new(db.clone()),
            Arc::new(StaticCredentials::new(
                default_key.map(|k| ApiKey::new(k.into())),
                Default::default(),
            )),
            Arc::clone(&registry),
            Duration::from_secs(60),
        );
        WebhookHandler::new(
            Arc::new(db.clone()),
            Arc::new(source.clone()),
            credentials,
            registry,
            BackgroundTasks::new(),
            FetchPolicy::default(),
        )
    }

    fn arrival(id: &str) -> serde_json::Value {
        json!({
            "type": "email.received",
            "created_at": "2024-05-01T10:00:00Z",
            "data": {
                "email_id": id,
                "from": "alice@example.org",
                "to": ["someone@gmail.com", "support@bar.io"],
                "subject": "Question"
            }
        })
    }

    fn delivery(event_type: &str, id: &str) -> serde_json::Value {
        json!({"type": event_type, "created_at": "2024-05-01T10:00:00Z", "data": {"email_id": id}})
    }

    async fn sent_message(db: &MemoryDb, id: &str) {
        let registry = DomainRegistry::parse("foo.com", None);
        let email = OutboundEmail::try_from(SendEmailRequest {
            to: Some(OneOrMany::One("a@x.com".into())),
            subject: Some("Hi".into()),
            text: Some("hi".into()),
            ..Default::default()
        })
        .unwrap();
        let message =
            OutboundMessage::sent(id.into(), &registry.select_sender(None, None), &email, Utc::now());
        db.record_sent(&message).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn arrival_stores_a_stub_owned_by_the_registry_domain_and_fetches_content() {
        let db = MemoryDb::new();
        let source = ScriptedSource::default();
        let handler = handler(&db, &source, Some("re_default"));

        let outcome = handler.handle_webhook(arrival("in_1")).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::Stored { fetch_scheduled: true });
        handler.tasks().drain().await;

        let stored = db.received_messages();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].domain, "bar.io");
        assert_eq!(stored[0].state(), InboundState::ContentFetched);
        assert_eq!(stored[0].text.as_deref(), Some("hello"));
        assert_eq!(db.webhook_events().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_arrival_is_stored_once_and_fetched_once() {
        let db = MemoryDb::new();
        let source = ScriptedSource::default();
        let handler = handler(&db, &source, Some("re_default"));

        handler.handle_webhook(arrival("in_1")).await.unwrap();
        let outcome = handler.handle_webhook(arrival("in_1")).await.unwrap();
        handler.tasks().drain().await;

        assert_eq!(outcome, WebhookOutcome::Duplicate);
        assert_eq!(db.received_messages().len(), 1);
        assert_eq!(source.call_times().len(), 1);
        assert_eq!(db.webhook_events().len(), 2, "every notification is logged");
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_is_retried_with_linear_backoff_until_it_succeeds() {
        let db = MemoryDb::new();
        let source = ScriptedSource::failing(2);
        let handler = handler(&db, &source, Some("re_default"));

        handler.handle_webhook(arrival("in_1")).await.unwrap();
        handler.tasks().drain().await;

        let calls = source.call_times();
        assert_eq!(calls.len(), 3);
        assert!(calls[1] - calls[0] >= Duration::from_secs(1));
        assert!(calls[2] - calls[1] >= Duration::from_secs(2));
        assert_eq!(db.received_messages()[0].state(), InboundState::ContentFetched);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_fetch_leaves_the_stub_untouched() {
        let db = MemoryDb::new();
        let source = ScriptedSource::failing(3);
        let handler = handler(&db, &source, Some("re_default"));

        handler.handle_webhook(arrival("in_1")).await.unwrap();
        handler.tasks().drain().await;

        assert_eq!(source.call_times().len(), 3);
        let stored = &db.received_messages()[0];
        assert_eq!(stored.state(), InboundState::Received);
        assert!(stored.html.is_none());
        assert_eq!(db.logs().len(), 1);
    }

    #[tokio::test]
    async fn fetch_without_a_credential_gives_up_immediately() {
        let db = MemoryDb::new();
        let source = ScriptedSource::default();
        let handler = handler(&db, &source, None);

        handler.handle_webhook(arrival("in_1")).await.unwrap();
        handler.tasks().drain().await;

        assert!(source.call_times().is_empty());
        assert_eq!(db.received_messages()[0].state(), InboundState::Received);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_refetch_populates_a_stub() {
        let db = MemoryDb::new();
        let source = ScriptedSource::failing(3);
        let handler = handler(&db, &source, Some("re_default"));
        handler.handle_webhook(arrival("in_1")).await.unwrap();
        handler.tasks().drain().await;

        let message = handler.refetch("in_1").await.unwrap();

        assert_eq!(message.state(), InboundState::ContentFetched);
        assert_eq!(db.received_messages()[0].state(), InboundState::ContentFetched);
    }

    #[tokio::test]
    async fn refetch_of_an_unknown_message_is_not_found() {
        let db = MemoryDb::new();
        let handler = handler(&db, &ScriptedSource::default(), Some("re_default"));

        let outcome = handler.refetch("missing").await;

        assert!(matches!(outcome, Err(InboundError::NotFound(_))));
    }

    #[tokio::test]
    async fn delivery_notifications_never_regress_the_status() {
        let db = MemoryDb::new();
        let handler = handler(&db, &ScriptedSource::default(), Some("re_default"));
        sent_message(&db, "out_1").await;

        for event_type in ["email.delivered", "email.opened", "email.delivered"] {
            let outcome = handler.handle_webhook(delivery(event_type, "out_1")).await;
            assert_eq!(outcome.unwrap(), WebhookOutcome::StatusUpdated);
        }

        let message = db.find_sent("out_1").await.unwrap().unwrap();
        assert_eq!(message.status, DeliveryStatus::Opened);
        assert!(message.delivered_at.is_some());
        assert!(message.opened_at.is_some());
        assert!(message.clicked_at.is_none());
    }

    #[tokio::test]
    async fn notification_for_an_unknown_message_is_accepted() {
        let db = MemoryDb::new();
        let handler = handler(&db, &ScriptedSource::default(), Some("re_default"));

        let outcome = handler
            .handle_webhook(delivery("email.clicked", "never_sent"))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::UnknownMessage);
    }

    #[tokio::test]
    async fn unknown_event_types_are_logged_and_ignored() {
        let db = MemoryDb::new();
        let handler = handler(&db, &ScriptedSource::default(), Some("re_default"));

        let outcome = handler
            .handle_webhook(json!({"type": "domain.updated", "data": {}}))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Ignored("domain.updated".into()));
        assert_eq!(db.webhook_events().len(), 1);
        assert!(db.received_messages().is_empty());
    }

    #[tokio::test]
    async fn attachments_are_downloaded_by_id() {
        let db = MemoryDb::new();
        let source = ScriptedSource::default();
        let handler = handler(&db, &source, Some("re_default"));
        handler.handle_webhook(arrival("in_1")).await.unwrap();
        handler.tasks().drain().await;

        let download = handler.download_attachment("in_1", "att_1").await.unwrap();
        let missing = handler.download_attachment("in_1", "att_9").await;

        assert_eq!(download.bytes, b"hi");
        assert!(matches!(missing, Err(InboundError::NotFound(_))));
    }
}
