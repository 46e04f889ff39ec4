use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::event::InboundArrival;
use crate::domain::registry::DomainName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InboundState {
    Received,
    ContentFetched,
}

/// Attachment metadata as carried by notifications and stored with the message.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AttachmentMeta {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InboundMessage {
    pub id: uuid::Uuid,
    pub provider_message_id: String,
    pub internal_message_id: Option<String>,
    pub domain: String,
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub html: Option<String>,
    pub text: Option<String>,
    pub attachments: Vec<AttachmentMeta>,
    pub headers: serde_json::Value,
    pub received_at: DateTime<Utc>,
    pub content_fetched_at: Option<DateTime<Utc>>,
}

impl InboundMessage {
    pub fn stub(arrival: InboundArrival, domain: &DomainName) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            provider_message_id: arrival.provider_message_id,
            internal_message_id: arrival.internal_message_id,
            domain: domain.to_string(),
            from: arrival.from,
            to: arrival.to,
            cc: arrival.cc,
            subject: arrival.subject,
            html: None,
            text: None,
            attachments: arrival.attachments,
            headers: arrival.headers,
            received_at: arrival.received_at,
            content_fetched_at: None,
        }
    }

    pub fn state(&self) -> InboundState {
        match self.content_fetched_at {
            Some(_) => InboundState::ContentFetched,
            None => InboundState::Received,
        }
    }

    pub fn fill(&mut self, content: ReceivedContent, fetched_at: DateTime<Utc>) {
        self.html = content.html;
        self.text = content.text;
        self.headers = content.headers;
        if !content.attachments.is_empty() {
            self.attachments = content.attachments;
        }
        self.content_fetched_at = Some(fetched_at);
    }
}

/// Body and metadata of a received email as returned by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedContent {
    pub html: Option<String>,
    pub text: Option<String>,
    pub headers: serde_json::Value,
    pub attachments: Vec<AttachmentMeta>,
}

/// An attachment as listed by the provider, with a short-lived download link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderAttachment {
    pub id: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub size: Option<u64>,
    #[serde(skip_serializing)]
    pub download_url: String,
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AttachmentDownload {
    pub filename: Option<String>,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// What a notification led to.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Stored { fetch_scheduled: bool },
    Duplicate,
    NotStored,
    StatusUpdated,
    UnknownMessage,
    Ignored(String),
}

/// How many times a content fetch is attempted and how far apart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchPolicy {
    pub attempts: u32,
    pub step: Duration,
}

impl FetchPolicy {
    pub fn new(attempts: u32, step: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            step,
        }
    }

    /// Delay before the 1-based `attempt`: `(attempt - 1) * step`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.step * attempt.saturating_sub(1)
    }
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}
