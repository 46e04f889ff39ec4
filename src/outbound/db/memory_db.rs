use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::{
    credentials::{
        models::{ApiKey, CredentialRecord, CredentialUpdate, NewCredential},
        ports::CredentialRepository,
    },
    history::{
        models::{HistoryQuery, MailStats},
        ports::HistoryRepository,
    },
    inbound::{
        models::message::{InboundMessage, ReceivedContent},
        ports::InboundRepository,
    },
    outbound::{
        models::message::{DeliveryUpdate, OutboundMessage},
        ports::OutboundRepository,
    },
    registry::DomainName,
    repository::{ActivityLog, LogEntry, RepositoryError},
};

#[derive(Debug, Clone)]
pub struct WebhookEventRecord {
    pub event_type: String,
    pub provider_message_id: Option<String>,
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryState {
    credentials: Vec<CredentialRecord>,
    sent: Vec<OutboundMessage>,
    received: Vec<InboundMessage>,
    events: Vec<WebhookEventRecord>,
    logs: Vec<LogEntry>,
}

/// Process-local store with the same behaviour as the Postgres one. Can be
/// switched to fail every operation.
#[derive(Debug, Clone, Default)]
pub struct MemoryDb {
    state: Arc<Mutex<MemoryState>>,
    unavailable: Arc<AtomicBool>,
    credential_loads: Arc<AtomicUsize>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn available(&self) -> Result<MutexGuard<'_, MemoryState>, RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unexpected(anyhow::anyhow!(
                "memory store is unavailable"
            )));
        }
        Ok(self.state())
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Stores an active key for `domain`, replacing any existing one.
    pub fn insert_credential(&self, domain: &str, api_key: &str) {
        let Ok(domain) = DomainName::parse(domain) else {
            tracing::warn!("Not storing a key for invalid domain {}", domain);
            return;
        };
        let mut state = self.state();
        upsert(
            &mut state,
            &NewCredential {
                domain,
                api_key: ApiKey::new(api_key.to_string()),
                description: None,
            },
        );
    }

    /// Number of full key reloads served so far.
    pub fn credential_loads(&self) -> usize {
        self.credential_loads.load(Ordering::SeqCst)
    }

    pub fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.state().sent.clone()
    }

    pub fn received_messages(&self) -> Vec<InboundMessage> {
        self.state().received.clone()
    }

    pub fn webhook_events(&self) -> Vec<WebhookEventRecord> {
        self.state().events.clone()
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.state().logs.clone()
    }
}

fn upsert(state: &mut MemoryState, credential: &NewCredential) -> CredentialRecord {
    let now = Utc::now();
    match state
        .credentials
        .iter_mut()
        .find(|r| r.domain == credential.domain)
    {
        Some(record) => {
            record.api_key = credential.api_key.clone();
            if credential.description.is_some() {
                record.description = credential.description.clone();
            }
            record.active = true;
            record.updated_at = now;
            record.clone()
        }
        None => {
            let record = CredentialRecord {
                id: uuid::Uuid::new_v4(),
                domain: credential.domain.clone(),
                api_key: credential.api_key.clone(),
                description: credential.description.clone(),
                active: true,
                created_at: now,
                updated_at: now,
            };
            state.credentials.push(record.clone());
            record
        }
    }
}

fn page<T: Clone>(items: Vec<&T>, query: &HistoryQuery) -> Vec<T> {
    items
        .into_iter()
        .skip(query.offset as usize)
        .take(query.limit as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl CredentialRepository for MemoryDb {
    async fn load_active_keys(&self) -> Result<Vec<(DomainName, ApiKey)>, RepositoryError> {
        let state = self.available()?;
        self.credential_loads.fetch_add(1, Ordering::SeqCst);
        Ok(state
            .credentials
            .iter()
            .filter(|r| r.active)
            .map(|r| (r.domain.clone(), r.api_key.clone()))
            .collect())
    }

    async fn list_credentials(&self) -> Result<Vec<CredentialRecord>, RepositoryError> {
        let mut records = self.available()?.credentials.clone();
        records.sort_by(|a, b| a.domain.cmp(&b.domain));
        Ok(records)
    }

    async fn upsert_credential(
        &self,
        credential: &NewCredential,
    ) -> Result<CredentialRecord, RepositoryError> {
        let mut state = self.available()?;
        Ok(upsert(&mut state, credential))
    }

    async fn update_credential(
        &self,
        domain: &DomainName,
        update: &CredentialUpdate,
    ) -> Result<CredentialRecord, RepositoryError> {
        let mut state = self.available()?;
        let record = state
            .credentials
            .iter_mut()
            .find(|r| &r.domain == domain)
            .ok_or(RepositoryError::NotFound)?;
        if let Some(api_key) = &update.api_key {
            record.api_key = api_key.clone();
        }
        if let Some(description) = &update.description {
            record.description = Some(description.clone());
        }
        if let Some(active) = update.active {
            record.active = active;
        }
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn delete_credential(&self, domain: &DomainName) -> Result<(), RepositoryError> {
        let mut state = self.available()?;
        let before = state.credentials.len();
        state.credentials.retain(|r| &r.domain != domain);
        if state.credentials.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl ActivityLog for MemoryDb {
    async fn append_log(&self, entry: &LogEntry) -> Result<(), RepositoryError> {
        self.available()?.logs.push(entry.clone());
        Ok(())
    }
}

#[async_trait]
impl OutboundRepository for MemoryDb {
    async fn record_sent(&self, message: &OutboundMessage) -> Result<(), RepositoryError> {
        let mut state = self.available()?;
        if !state
            .sent
            .iter()
            .any(|m| m.provider_message_id == message.provider_message_id)
        {
            state.sent.push(message.clone());
        }
        Ok(())
    }

    async fn find_sent(
        &self,
        provider_message_id: &str,
    ) -> Result<Option<OutboundMessage>, RepositoryError> {
        Ok(self
            .available()?
            .sent
            .iter()
            .find(|m| m.provider_message_id == provider_message_id)
            .cloned())
    }

    async fn update_delivery(
        &self,
        provider_message_id: &str,
        update: &DeliveryUpdate,
    ) -> Result<(), RepositoryError> {
        let mut state = self.available()?;
        if let Some(message) = state
            .sent
            .iter_mut()
            .find(|m| m.provider_message_id == provider_message_id)
        {
            message.status = update.status;
            message.delivered_at = update.delivered_at;
            message.opened_at = update.opened_at;
            message.clicked_at = update.clicked_at;
        }
        Ok(())
    }
}

#[async_trait]
impl InboundRepository for MemoryDb {
    async fn log_event(
        &self,
        event_type: &str,
        provider_message_id: Option<&str>,
        payload: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        self.available()?.events.push(WebhookEventRecord {
            event_type: event_type.to_string(),
            provider_message_id: provider_message_id.map(str::to_string),
            payload: payload.clone(),
            received_at: Utc::now(),
        });
        Ok(())
    }

    async fn insert_stub(&self, message: &InboundMessage) -> Result<bool, RepositoryError> {
        let mut state = self.available()?;
        if state
            .received
            .iter()
            .any(|m| m.provider_message_id == message.provider_message_id)
        {
            return Ok(false);
        }
        state.received.push(message.clone());
        Ok(true)
    }

    async fn find_received(
        &self,
        provider_message_id: &str,
    ) -> Result<Option<InboundMessage>, RepositoryError> {
        Ok(self
            .available()?
            .received
            .iter()
            .find(|m| m.provider_message_id == provider_message_id)
            .cloned())
    }

    async fn store_content(
        &self,
        provider_message_id: &str,
        content: &ReceivedContent,
        fetched_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.available()?;
        if let Some(message) = state
            .received
            .iter_mut()
            .find(|m| m.provider_message_id == provider_message_id)
        {
            message.fill(content.clone(), fetched_at);
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryRepository for MemoryDb {
    async fn list_sent(&self, query: &HistoryQuery) -> Result<Vec<OutboundMessage>, RepositoryError> {
        let state = self.available()?;
        let mut matching: Vec<&OutboundMessage> = state
            .sent
            .iter()
            .filter(|m| query.domain.as_deref().map_or(true, |d| m.domain == d))
            .collect();
        matching.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        Ok(page(matching, query))
    }

    async fn list_received(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<InboundMessage>, RepositoryError> {
        let state = self.available()?;
        let mut matching: Vec<&InboundMessage> = state
            .received
            .iter()
            .filter(|m| query.domain.as_deref().map_or(true, |d| m.domain == d))
            .collect();
        matching.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        Ok(page(matching, query))
    }

    async fn stats(&self) -> Result<MailStats, RepositoryError> {
        let state = self.available()?;
        let mut sent_by_status = BTreeMap::new();
        for message in &state.sent {
            *sent_by_status
                .entry(message.status.as_str().to_string())
                .or_insert(0) += 1;
        }
        Ok(MailStats {
            sent_total: state.sent.len() as u64,
            sent_by_status,
            received_total: state.received.len() as u64,
            received_pending_content: state
                .received
                .iter()
                .filter(|m| m.content_fetched_at.is_none())
                .count() as u64,
        })
    }
}
