use crate::domain::provider::ProviderError;

#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("{message}")]
    Upstream { status: u16, message: String },
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl From<ProviderError> for DispatchError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::Rejected { status, message } => {
                DispatchError::Upstream { status, message }
            }
            ProviderError::Unexpected(e) => DispatchError::Unexpected(e),
        }
    }
}

impl DispatchError {
    /// HTTP status the failure is reported with.
    pub fn status_code(&self) -> u16 {
        match self {
            DispatchError::ValidationError(_) => 400,
            DispatchError::ConfigurationError(_) => 500,
            DispatchError::Upstream { status, .. } => *status,
            DispatchError::Unexpected(_) => 500,
        }
    }
}
