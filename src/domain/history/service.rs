use async_trait::async_trait;
use std::sync::Arc;

use super::{
    models::{HistoryQuery, MailStats},
    ports::{HistoryRepository, HistoryService},
};
use crate::domain::{
    inbound::{models::message::InboundMessage, ports::InboundRepository},
    outbound::models::message::OutboundMessage,
};

/// Read-only view over stored messages. A failing store reads as empty.
#[derive(Debug, Clone)]
pub struct History<R>
where
    R: HistoryRepository + InboundRepository,
{
    pub repo: Arc<R>,
}

impl<R> History<R>
where
    R: HistoryRepository + InboundRepository,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl<R> HistoryService for History<R>
where
    R: HistoryRepository + InboundRepository,
{
    #[tracing::instrument(name = "List sent emails", skip(self))]
    async fn list_sent(&self, query: HistoryQuery) -> Vec<OutboundMessage> {
        self.repo.list_sent(&query).await.unwrap_or_else(|e| {
            tracing::warn!(error.cause_chain = ?e, "Failed to list sent emails");
            Vec::new()
        })
    }

    #[tracing::instrument(name = "List received emails", skip(self))]
    async fn list_received(&self, query: HistoryQuery) -> Vec<InboundMessage> {
        self.repo.list_received(&query).await.unwrap_or_else(|e| {
            tracing::warn!(error.cause_chain = ?e, "Failed to list received emails");
            Vec::new()
        })
    }

    #[tracing::instrument(name = "Get a received email", skip(self))]
    async fn get_received(&self, provider_message_id: &str) -> Option<InboundMessage> {
        self.repo
            .find_received(provider_message_id)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error.cause_chain = ?e, "Failed to read the received email");
                None
            })
    }

    #[tracing::instrument(name = "Compute mail stats", skip(self))]
    async fn stats(&self) -> MailStats {
        self.repo.stats().await.unwrap_or_else(|e| {
            tracing::warn!(error.cause_chain = ?e, "Failed to compute mail stats");
            MailStats::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::History;
    use crate::domain::history::{
        models::{HistoryParams, HistoryQuery},
        ports::HistoryService,
    };
    use crate::domain::inbound::models::{event::InboundArrival, message::InboundMessage};
    use crate::domain::inbound::ports::InboundRepository;
    use crate::domain::registry::DomainName;
    use crate::outbound::db::memory_db::MemoryDb;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    fn stub(id: &str, domain: &str, minutes_ago: i64) -> InboundMessage {
        InboundMessage::stub(
            InboundArrival {
                provider_message_id: id.into(),
                internal_message_id: None,
                from: "a@x.com".into(),
                to: vec![format!("b@{}", domain)],
                cc: vec![],
                subject: "Hi".into(),
                attachments: vec![],
                headers: serde_json::json!({}),
                received_at: Utc::now() - Duration::minutes(minutes_ago),
            },
            &DomainName::parse(domain).unwrap(),
        )
    }

    #[tokio::test]
    async fn received_listing_is_newest_first_and_filtered_by_domain() {
        let db = MemoryDb::new();
        for message in [stub("a", "foo.com", 3), stub("b", "bar.io", 2), stub("c", "foo.com", 1)] {
            db.insert_stub(&message).await.unwrap();
        }
        let history = History::new(Arc::new(db));

        let all = history.list_received(HistoryQuery::default()).await;
        let foo = history
            .list_received(HistoryQuery::from(HistoryParams {
                domain: Some("foo.com".into()),
                ..Default::default()
            }))
            .await;

        let ids: Vec<&str> = all.iter().map(|m| m.provider_message_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(foo.len(), 2);
    }

    #[tokio::test]
    async fn stats_count_pending_content() {
        let db = MemoryDb::new();
        db.insert_stub(&stub("a", "foo.com", 1)).await.unwrap();
        let history = History::new(Arc::new(db));

        let stats = history.stats().await;

        assert_eq!(stats.received_total, 1);
        assert_eq!(stats.received_pending_content, 1);
        assert_eq!(stats.sent_total, 0);
    }

    #[tokio::test]
    async fn unavailable_store_reads_as_empty() {
        let db = MemoryDb::new();
        db.insert_stub(&stub("a", "foo.com", 1)).await.unwrap();
        db.set_unavailable(true);
        let history = History::new(Arc::new(db));

        assert!(history.list_received(HistoryQuery::default()).await.is_empty());
        assert!(history.get_received("a").await.is_none());
        assert_eq!(history.stats().await.received_total, 0);
    }
}
