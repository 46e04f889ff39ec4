use crate::domain::provider::ProviderError;
use crate::domain::repository::RepositoryError;

#[derive(thiserror::Error, Debug)]
pub enum InboundError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("{message}")]
    Upstream { status: u16, message: String },
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl From<ProviderError> for InboundError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::Rejected { status, message } => {
                InboundError::Upstream { status, message }
            }
            ProviderError::Unexpected(e) => InboundError::Unexpected(e),
        }
    }
}

impl From<RepositoryError> for InboundError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound => InboundError::NotFound("received email".to_string()),
            other => InboundError::Unexpected(anyhow::Error::new(other)),
        }
    }
}
