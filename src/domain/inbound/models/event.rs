use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::message::AttachmentMeta;
use crate::domain::inbound::errors::InboundError;
use crate::domain::outbound::models::message::{DeliveryEvent, DeliveryStatus};

pub const RECEIVED_EVENT: &str = "email.received";

#[derive(Debug, Deserialize)]
struct Envelope {
    created_at: Option<String>,
    #[serde(default)]
    data: EventData,
}

#[derive(Debug, Default, Deserialize)]
struct EventData {
    email_id: Option<String>,
    message_id: Option<String>,
    from: Option<String>,
    #[serde(default)]
    to: Vec<String>,
    #[serde(default)]
    cc: Vec<String>,
    subject: Option<String>,
    #[serde(default)]
    attachments: Vec<AttachmentMeta>,
    headers: Option<serde_json::Value>,
    created_at: Option<String>,
}

/// Notice that an email arrived for one of our domains. The body is not part
/// of the notification and has to be fetched separately.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundArrival {
    pub provider_message_id: String,
    pub internal_message_id: Option<String>,
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub attachments: Vec<AttachmentMeta>,
    pub headers: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl InboundArrival {
    pub fn recipient_domains(&self) -> impl Iterator<Item = &str> {
        self.to.iter().filter_map(|a| address_domain(a))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    Delivery(DeliveryEvent),
    Arrival(InboundArrival),
    Ignored(String),
}

impl WebhookEvent {
    /// Only arrivals have their `data` interpreted in full. Other types are
    /// classified from `type` and `data.email_id` alone, so an unexpected
    /// shape elsewhere in the payload never rejects them.
    pub fn parse(payload: &serde_json::Value) -> Result<WebhookEvent, InboundError> {
        if !payload.is_object() {
            return Err(InboundError::ValidationError(
                "Malformed webhook payload: expected a JSON object".into(),
            ));
        }
        let event_type = payload
            .get("type")
            .and_then(|t| t.as_str())
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| InboundError::ValidationError("Webhook payload has no type".into()))?;

        if event_type == RECEIVED_EVENT {
            return Self::arrival(payload).map(WebhookEvent::Arrival);
        }

        let (_, email_id) = event_summary(payload);
        match (DeliveryStatus::from_event_type(event_type), email_id) {
            (Some(status), Some(provider_message_id)) => Ok(WebhookEvent::Delivery(DeliveryEvent {
                provider_message_id,
                status,
                occurred_at: parse_timestamp(payload.get("created_at").and_then(|t| t.as_str())),
            })),
            _ => Ok(WebhookEvent::Ignored(event_type.to_string())),
        }
    }

    fn arrival(payload: &serde_json::Value) -> Result<InboundArrival, InboundError> {
        let envelope = Envelope::deserialize(payload)
            .map_err(|e| InboundError::ValidationError(format!("Malformed webhook payload: {}", e)))?;
        let occurred_at = parse_timestamp(envelope.created_at.as_deref());
        let data = envelope.data;
        let provider_message_id = data.email_id.ok_or_else(|| {
            InboundError::ValidationError("Received email has no email_id".into())
        })?;

        Ok(InboundArrival {
            provider_message_id,
            internal_message_id: data.message_id,
            from: data.from.unwrap_or_default(),
            to: data.to,
            cc: data.cc,
            subject: data.subject.unwrap_or_default(),
            attachments: data.attachments,
            headers: data
                .headers
                .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
            received_at: data
                .created_at
                .as_deref()
                .map(|ts| parse_timestamp(Some(ts)))
                .unwrap_or(occurred_at),
        })
    }
}

/// The type and message id of a payload, read without interpreting it.
pub fn event_summary(payload: &serde_json::Value) -> (String, Option<String>) {
    let event_type = payload
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or("unknown")
        .to_string();
    let provider_message_id = payload
        .pointer("/data/email_id")
        .and_then(|id| id.as_str())
        .map(str::to_string);
    (event_type, provider_message_id)
}

/// Domain part of `a@b.com` or `Name <a@b.com>`.
pub fn address_domain(address: &str) -> Option<&str> {
    let address = match (address.rfind('<'), address.rfind('>')) {
        (Some(start), Some(end)) if start < end => &address[start + 1..end],
        _ => address,
    };
    address
        .trim()
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|d| !d.is_empty())
}

fn parse_timestamp(value: Option<&str>) -> DateTime<Utc> {
    value
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}
