use crate::configuration::EmailClientSettings;
use crate::domain::provider::ProviderError;
use anyhow::Context;
use reqwest::{Client, Response};

mod receiving;
mod sender;

/// Client for a Resend-compatible HTTP API. The key is chosen per request,
/// one per sending domain.
#[derive(Debug, Clone)]
pub struct ResendClient {
    http_client: Client,
    base_url: String,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    status_code: Option<u16>,
    message: Option<String>,
    name: Option<String>,
}

impl ResendClient {
    pub fn new(configuration: &EmailClientSettings) -> Result<Self, anyhow::Error> {
        let http_client = Client::builder()
            .timeout(configuration.timeout())
            .build()
            .context("Failed to build the provider HTTP client")?;
        Ok(Self {
            http_client,
            base_url: configuration.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Passes successful responses through and turns failures into
    /// `ProviderError::Rejected` carrying the provider's status and message.
    async fn check(response: Response) -> Result<Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .context("Failed to read the provider error response")?;
        let parsed = serde_json::from_str::<ErrorBody>(&body).ok();
        let status = parsed
            .as_ref()
            .and_then(|b| b.status_code)
            .unwrap_or(status.as_u16());
        let message = match parsed {
            Some(ErrorBody {
                message: Some(message),
                ..
            }) => message,
            Some(ErrorBody {
                name: Some(name), ..
            }) => name,
            _ if !body.trim().is_empty() => body,
            _ => String::from("Provider request failed"),
        };
        Err(ProviderError::Rejected { status, message })
    }
}
