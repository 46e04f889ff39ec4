use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{
    cache::{CredentialCache, CredentialSnapshot},
    errors::CredentialError,
    models::{
        ApiKey, CredentialSource, CredentialSummary, CredentialUpdate, CredentialUpdateRequest,
        DomainCredentialStatus, NewCredential, NewCredentialRequest, StaticCredentials,
    },
    ports::{CredentialRepository, CredentialService},
};
use crate::domain::registry::{DomainName, DomainRegistry};

/// Resolves the provider key for a domain: cached store mapping, then the
/// configured per-domain table, then the global default.
#[derive(Debug, Clone)]
pub struct CredentialResolver<R>
where
    R: CredentialRepository,
{
    pub repo: Arc<R>,
    cache: Arc<CredentialCache>,
    fallback: Arc<StaticCredentials>,
    registry: Arc<DomainRegistry>,
}

impl<R> CredentialResolver<R>
where
    R: CredentialRepository,
{
    pub fn new(
        repo: Arc<R>,
        fallback: Arc<StaticCredentials>,
        registry: Arc<DomainRegistry>,
        ttl: Duration,
    ) -> Self {
        Self {
            repo,
            cache: Arc::new(CredentialCache::new(ttl)),
            fallback,
            registry,
        }
    }

    pub fn cache(&self) -> &CredentialCache {
        &self.cache
    }

    /// Reads the whole mapping from the store. A failed read keeps whatever
    /// was cached before.
    #[tracing::instrument(name = "Reload API keys from the store", skip(self))]
    async fn reload(&self) -> Option<Arc<CredentialSnapshot>> {
        let generation = self.cache.generation();
        match self.repo.load_active_keys().await {
            Ok(keys) => {
                let keys: HashMap<String, ApiKey> = keys
                    .into_iter()
                    .map(|(domain, key)| (String::from(domain), key))
                    .collect();
                Some(self.cache.replace(generation, keys))
            }
            Err(e) => {
                tracing::warn!(
                    error.cause_chain = ?e,
                    "Failed to load API keys from the store, falling back to cached and configured keys"
                );
                self.cache.snapshot()
            }
        }
    }

    async fn current_snapshot(&self) -> Option<Arc<CredentialSnapshot>> {
        match self.cache.fresh_snapshot() {
            Some(snapshot) => Some(snapshot),
            None => self.reload().await,
        }
    }

    fn parse_domain(domain: &str) -> Result<DomainName, CredentialError> {
        DomainName::parse(domain).map_err(CredentialError::ValidationError)
    }
}

#[async_trait]
impl<R> CredentialService for CredentialResolver<R>
where
    R: CredentialRepository,
{
    async fn resolve(&self, domain: Option<&str>) -> Option<ApiKey> {
        let domain = match domain.map(str::trim).filter(|d| !d.is_empty()) {
            Some(domain) => domain.to_lowercase(),
            None => return self.fallback.default_key().cloned(),
        };

        if let Some(key) = self
            .cache
            .fresh_snapshot()
            .and_then(|snapshot| snapshot.get(&domain).cloned())
        {
            return Some(key);
        }

        self.reload()
            .await
            .and_then(|snapshot| snapshot.get(&domain).cloned())
            .or_else(|| self.fallback.for_domain(&domain).cloned())
            .or_else(|| self.fallback.default_key().cloned())
    }

    #[tracing::instrument(name = "List stored API keys", skip(self))]
    async fn list(&self) -> Result<Vec<CredentialSummary>, CredentialError> {
        let records = self
            .repo
            .list_credentials()
            .await
            .map_err(|e| CredentialError::from_repository(e, ""))?;
        Ok(records.iter().map(CredentialSummary::from).collect())
    }

    #[tracing::instrument(
        name = "Store an API key",
        skip(self, request),
        fields(domain = %request.domain)
    )]
    async fn create(
        &self,
        request: NewCredentialRequest,
    ) -> Result<CredentialSummary, CredentialError> {
        let credential = NewCredential::try_from(request)?;
        let result = self.repo.upsert_credential(&credential).await;
        self.cache.invalidate();
        let record =
            result.map_err(|e| CredentialError::from_repository(e, credential.domain.as_str()))?;
        Ok(CredentialSummary::from(&record))
    }

    #[tracing::instrument(name = "Update an API key", skip(self, request))]
    async fn update(
        &self,
        domain: &str,
        request: CredentialUpdateRequest,
    ) -> Result<CredentialSummary, CredentialError> {
        let domain = Self::parse_domain(domain)?;
        let update = CredentialUpdate::try_from(request)?;
        let result = self.repo.update_credential(&domain, &update).await;
        self.cache.invalidate();
        let record = result.map_err(|e| CredentialError::from_repository(e, domain.as_str()))?;
        Ok(CredentialSummary::from(&record))
    }

    #[tracing::instrument(name = "Deactivate an API key", skip(self))]
    async fn deactivate(&self, domain: &str) -> Result<CredentialSummary, CredentialError> {
        let domain = Self::parse_domain(domain)?;
        let result = self
            .repo
            .update_credential(&domain, &CredentialUpdate::deactivate())
            .await;
        self.cache.invalidate();
        let record = result.map_err(|e| CredentialError::from_repository(e, domain.as_str()))?;
        Ok(CredentialSummary::from(&record))
    }

    #[tracing::instrument(name = "Delete an API key", skip(self))]
    async fn delete(&self, domain: &str) -> Result<(), CredentialError> {
        let domain = Self::parse_domain(domain)?;
        let result = self.repo.delete_credential(&domain).await;
        self.cache.invalidate();
        result.map_err(|e| CredentialError::from_repository(e, domain.as_str()))
    }

    fn invalidate(&self) {
        tracing::info!("API key cache invalidated");
        self.cache.invalidate();
    }

    async fn configured_domains(&self) -> Vec<DomainCredentialStatus> {
        let snapshot = self.current_snapshot().await;
        self.registry
            .domains()
            .iter()
            .map(|domain| {
                let source = if snapshot
                    .as_deref()
                    .map_or(false, |s| s.contains(domain.as_str()))
                {
                    CredentialSource::Database
                } else if self.fallback.for_domain(domain.as_str()).is_some() {
                    CredentialSource::Configuration
                } else if self.fallback.default_key().is_some() {
                    CredentialSource::Default
                } else {
                    CredentialSource::None
                };
                DomainCredentialStatus {
                    domain: domain.to_string(),
                    default_sender: self.registry.default_sender_for(domain.as_str()),
                    source,
                }
            })
            .collect()
    }
}
