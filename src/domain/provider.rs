/// Failures talking to the upstream email provider.
#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("Provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl ProviderError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Rejected { status, .. } => Some(*status),
            ProviderError::Unexpected(_) => None,
        }
    }
}
