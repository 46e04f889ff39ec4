use actix_web::http::header::HeaderMap;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;

use crate::configuration::WebhookSettings;
use crate::inbound::http::errors::AppError;

type HmacSha256 = Hmac<Sha256>;

const ID_HEADER: &str = "svix-id";
const TIMESTAMP_HEADER: &str = "svix-timestamp";
const SIGNATURE_HEADER: &str = "svix-signature";
const SECRET_PREFIX: &str = "whsec_";
const TOLERANCE_SECONDS: i64 = 5 * 60;

/// Checks provider webhook signatures. A verifier built without a secret
/// accepts every request.
pub struct WebhookVerifier {
    key: Option<Secret<Vec<u8>>>,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl WebhookVerifier {
    pub fn new(secret: Option<&str>) -> Self {
        let key = secret.filter(|s| !s.is_empty()).map(|secret| {
            let encoded = secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret);
            let bytes = base64::decode(encoded).unwrap_or_else(|_| {
                tracing::warn!("Webhook signing secret is not base64, using its raw bytes");
                encoded.as_bytes().to_vec()
            });
            Secret::new(bytes)
        });
        Self { key }
    }

    pub fn from_settings(settings: &WebhookSettings) -> Self {
        Self::new(
            settings
                .signing_secret
                .as_ref()
                .map(|s| s.expose_secret().as_str()),
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    fn mac(&self, id: &str, timestamp: &str, body: &[u8]) -> Option<HmacSha256> {
        let key = self.key.as_ref()?;
        let mut mac = HmacSha256::new_from_slice(key.expose_secret()).ok()?;
        mac.update(id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        Some(mac)
    }

    /// `v1,<base64>` signature over `{id}.{timestamp}.{body}`.
    pub fn sign(&self, id: &str, timestamp: &str, body: &[u8]) -> Option<String> {
        let mac = self.mac(id, timestamp, body)?;
        Some(format!("v1,{}", base64::encode(mac.finalize().into_bytes())))
    }

    #[tracing::instrument(name = "Verify webhook signature", skip(self, headers, body))]
    pub fn verify(&self, headers: &HeaderMap, body: &[u8], now_secs: i64) -> Result<(), AppError> {
        if !self.is_enabled() {
            return Ok(());
        }
        let id = header(headers, ID_HEADER)?;
        let timestamp = header(headers, TIMESTAMP_HEADER)?;
        let signatures = header(headers, SIGNATURE_HEADER)?;

        let sent_at: i64 = timestamp
            .parse()
            .map_err(|_| AppError::AuthError("Invalid webhook timestamp".to_string()))?;
        if (now_secs - sent_at).abs() > TOLERANCE_SECONDS {
            return Err(AppError::AuthError(
                "Webhook timestamp is outside the tolerance window".to_string(),
            ));
        }

        let mac = self
            .mac(id, timestamp, body)
            .ok_or_else(|| AppError::AuthError("Invalid webhook signing key".to_string()))?;
        let matched = signatures
            .split_whitespace()
            .filter_map(|entry| entry.strip_prefix("v1,"))
            .filter_map(|encoded| base64::decode(encoded).ok())
            .any(|candidate| mac.clone().verify_slice(&candidate).is_ok());

        if matched {
            Ok(())
        } else {
            Err(AppError::AuthError("Invalid webhook signature".to_string()))
        }
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, AppError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::AuthError(format!("Missing {} header", name)))
}
