use async_trait::async_trait;

use super::{
    errors::CredentialError,
    models::{
        ApiKey, CredentialRecord, CredentialSummary, CredentialUpdate, CredentialUpdateRequest,
        DomainCredentialStatus, NewCredential, NewCredentialRequest,
    },
};
use crate::domain::{registry::DomainName, repository::RepositoryError};

#[async_trait]
/// Persistent domain -> API key records
pub trait CredentialRepository: Clone + Send + Sync + 'static {
    /// Every active key, read in a single query
    async fn load_active_keys(&self) -> Result<Vec<(DomainName, ApiKey)>, RepositoryError>;

    async fn list_credentials(&self) -> Result<Vec<CredentialRecord>, RepositoryError>;

    /// Creates the record for a domain or replaces its key, reactivating it
    async fn upsert_credential(
        &self,
        credential: &NewCredential,
    ) -> Result<CredentialRecord, RepositoryError>;

    async fn update_credential(
        &self,
        domain: &DomainName,
        update: &CredentialUpdate,
    ) -> Result<CredentialRecord, RepositoryError>;

    async fn delete_credential(&self, domain: &DomainName) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CredentialService: Clone + Send + Sync + 'static {
    /// The key to authenticate with for `domain`. `None` means no layer has one.
    async fn resolve(&self, domain: Option<&str>) -> Option<ApiKey>;

    async fn list(&self) -> Result<Vec<CredentialSummary>, CredentialError>;

    async fn create(
        &self,
        request: NewCredentialRequest,
    ) -> Result<CredentialSummary, CredentialError>;

    async fn update(
        &self,
        domain: &str,
        request: CredentialUpdateRequest,
    ) -> Result<CredentialSummary, CredentialError>;

    async fn deactivate(&self, domain: &str) -> Result<CredentialSummary, CredentialError>;

    async fn delete(&self, domain: &str) -> Result<(), CredentialError>;

    /// Drops the cached mapping so the next resolution reads the store.
    fn invalidate(&self);

    async fn configured_domains(&self) -> Vec<DomainCredentialStatus>;
}
