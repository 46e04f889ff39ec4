use crate::domain::credentials::errors::CredentialError;
use crate::domain::inbound::errors::InboundError;
use crate::domain::outbound::errors::DispatchError;

use actix_web::http::header::{self, HeaderValue};
use actix_web::HttpResponse;
use actix_web::{http::StatusCode, ResponseError};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    AuthError(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    ConfigurationError(String),
    #[error("{message}")]
    Upstream { status: u16, message: String },
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl From<DispatchError> for AppError {
    fn from(error: DispatchError) -> Self {
        match error {
            DispatchError::ValidationError(s) => AppError::ValidationError(s),
            DispatchError::ConfigurationError(s) => AppError::ConfigurationError(s),
            DispatchError::Upstream { status, message } => AppError::Upstream { status, message },
            DispatchError::Unexpected(e) => AppError::Unexpected(e),
        }
    }
}

impl From<CredentialError> for AppError {
    fn from(error: CredentialError) -> Self {
        match error {
            CredentialError::ValidationError(s) => AppError::ValidationError(s),
            CredentialError::NotFound(s) => AppError::NotFound(format!("API key for {}", s)),
            CredentialError::Unavailable(s) => AppError::Unavailable(s),
            CredentialError::Unexpected(e) => AppError::Unexpected(e),
        }
    }
}

impl From<InboundError> for AppError {
    fn from(error: InboundError) -> Self {
        match error {
            InboundError::ValidationError(s) => AppError::ValidationError(s),
            InboundError::NotFound(s) => AppError::NotFound(s),
            InboundError::ConfigurationError(s) => AppError::ConfigurationError(s),
            InboundError::Upstream { status, message } => AppError::Upstream { status, message },
            InboundError::Unexpected(e) => AppError::Unexpected(e),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        let message = match self {
            AppError::Unexpected(e) => {
                tracing::error!(error.cause_chain = ?e, "Request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let mut response =
            HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": message }));
        if let AppError::AuthError(_) = self {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(r#"Basic realm="admin""#),
            );
        }
        response
    }
}
