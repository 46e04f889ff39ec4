use super::email::OutboundEmail;
use crate::domain::registry::SenderSelection;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(thiserror::Error, Debug)]
pub enum DeliveryStatusError {
    #[error("Unknown delivery status: {0}")]
    UnknownStatus(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    DeliveryDelayed,
    Delivered,
    Bounced,
    Opened,
    Clicked,
    Complained,
}

impl DeliveryStatus {
    const SENT: &'static str = "sent";
    const DELIVERY_DELAYED: &'static str = "delivery_delayed";
    const DELIVERED: &'static str = "delivered";
    const BOUNCED: &'static str = "bounced";
    const OPENED: &'static str = "opened";
    const CLICKED: &'static str = "clicked";
    const COMPLAINED: &'static str = "complained";

    pub fn parse(status: &str) -> Result<DeliveryStatus, DeliveryStatusError> {
        match status {
            Self::SENT => Ok(DeliveryStatus::Sent),
            Self::DELIVERY_DELAYED => Ok(DeliveryStatus::DeliveryDelayed),
            Self::DELIVERED => Ok(DeliveryStatus::Delivered),
            Self::BOUNCED => Ok(DeliveryStatus::Bounced),
            Self::OPENED => Ok(DeliveryStatus::Opened),
            Self::CLICKED => Ok(DeliveryStatus::Clicked),
            Self::COMPLAINED => Ok(DeliveryStatus::Complained),
            _ => Err(DeliveryStatusError::UnknownStatus(status.into())),
        }
    }

    /// Maps a provider notification type such as `email.delivered`.
    pub fn from_event_type(event_type: &str) -> Option<DeliveryStatus> {
        event_type
            .strip_prefix("email.")
            .and_then(|status| Self::parse(status).ok())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => Self::SENT,
            DeliveryStatus::DeliveryDelayed => Self::DELIVERY_DELAYED,
            DeliveryStatus::Delivered => Self::DELIVERED,
            DeliveryStatus::Bounced => Self::BOUNCED,
            DeliveryStatus::Opened => Self::OPENED,
            DeliveryStatus::Clicked => Self::CLICKED,
            DeliveryStatus::Complained => Self::COMPLAINED,
        }
    }

    /// Position in the forward progression. A status only moves to an equal or
    /// higher rank.
    pub fn rank(&self) -> u8 {
        match self {
            DeliveryStatus::Sent | DeliveryStatus::DeliveryDelayed => 0,
            DeliveryStatus::Delivered | DeliveryStatus::Bounced => 1,
            DeliveryStatus::Opened => 2,
            DeliveryStatus::Clicked => 3,
            DeliveryStatus::Complained => 4,
        }
    }
}

impl From<DeliveryStatus> for String {
    fn from(value: DeliveryStatus) -> Self {
        value.as_str().into()
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message the provider accepted for delivery.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    pub id: uuid::Uuid,
    pub provider_message_id: String,
    pub domain: String,
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub html: Option<String>,
    pub text: Option<String>,
    pub status: DeliveryStatus,
    pub sent_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    pub clicked_at: Option<DateTime<Utc>>,
}

impl OutboundMessage {
    pub fn sent(
        provider_message_id: String,
        sender: &SenderSelection,
        email: &OutboundEmail,
        sent_at: DateTime<Utc>,
    ) -> Self {
        let addresses = |list: &[super::email::EmailAddress]| {
            list.iter().map(|a| a.as_ref().to_string()).collect::<Vec<_>>()
        };
        Self {
            id: uuid::Uuid::new_v4(),
            provider_message_id,
            domain: sender.domain.to_string(),
            from: sender.from.clone(),
            to: addresses(&email.to),
            cc: addresses(&email.cc),
            bcc: addresses(&email.bcc),
            subject: email.subject.as_ref().to_string(),
            html: email.body.html().map(str::to_string),
            text: email.body.text().map(str::to_string),
            status: DeliveryStatus::Sent,
            sent_at,
            delivered_at: None,
            opened_at: None,
            clicked_at: None,
        }
    }

    /// The state after a delivery notification. The status never moves to a
    /// lower rank; timestamps are filled in the first time they are reported.
    pub fn apply(&self, event: &DeliveryEvent) -> DeliveryUpdate {
        let status = if event.status.rank() >= self.status.rank() {
            event.status
        } else {
            self.status
        };
        let first = |current: Option<DateTime<Utc>>, wanted: DeliveryStatus| {
            current.or((event.status == wanted).then_some(event.occurred_at))
        };
        DeliveryUpdate {
            status,
            delivered_at: first(self.delivered_at, DeliveryStatus::Delivered),
            opened_at: first(self.opened_at, DeliveryStatus::Opened),
            clicked_at: first(self.clicked_at, DeliveryStatus::Clicked),
        }
    }
}

/// A delivery notification for a previously sent message.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryEvent {
    pub provider_message_id: String,
    pub status: DeliveryStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryUpdate {
    pub status: DeliveryStatus,
    pub delivered_at: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    pub clicked_at: Option<DateTime<Utc>>,
}

/// What a send returns to the caller.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SendOutcome {
    pub id: String,
    pub domain: String,
    pub from: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItemOutcome {
    pub index: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl BatchItemOutcome {
    pub fn succeeded(index: usize, outcome: SendOutcome) -> Self {
        Self {
            index,
            success: true,
            id: Some(outcome.id),
            domain: Some(outcome.domain),
            from: Some(outcome.from),
            error: None,
            status_code: None,
        }
    }

    pub fn failed(index: usize, error: String, status_code: u16) -> Self {
        Self {
            index,
            success: false,
            id: None,
            domain: None,
            from: None,
            error: Some(error),
            status_code: Some(status_code),
        }
    }
}
