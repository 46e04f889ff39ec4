use crate::domain::repository::RepositoryError;

#[derive(thiserror::Error, Debug)]
pub enum CredentialError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("API key not found: {0}")]
    NotFound(String),
    #[error("Credential store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl CredentialError {
    pub fn from_repository(error: RepositoryError, domain: &str) -> Self {
        match error {
            RepositoryError::NotFound => CredentialError::NotFound(domain.to_string()),
            RepositoryError::Disabled => {
                CredentialError::Unavailable("persistence is disabled".to_string())
            }
            RepositoryError::InvalidRecord(e) => CredentialError::Unexpected(anyhow::anyhow!(e)),
            RepositoryError::Unexpected(e) => CredentialError::Unexpected(e),
        }
    }
}
