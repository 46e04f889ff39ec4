use crate::configuration::EmailClientSettings;
use crate::domain::credentials::errors::CredentialError;
use crate::domain::registry::DomainName;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bearer secret for the upstream provider.
#[derive(Clone, Debug)]
pub struct ApiKey(Secret<String>);

impl ApiKey {
    const PREVIEW_LENGTH: usize = 6;

    pub fn new(key: String) -> Self {
        Self(Secret::new(key))
    }

    pub fn parse(key: String) -> Result<Self, CredentialError> {
        let key = key.trim().to_string();
        if key.is_empty() {
            return Err(CredentialError::ValidationError(
                "API key cannot be empty".to_string(),
            ));
        }
        Ok(Self::new(key))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Enough of the key to tell two keys apart in an admin listing.
    pub fn masked(&self) -> String {
        let prefix: String = self.expose().chars().take(Self::PREVIEW_LENGTH).collect();
        format!("{}…", prefix)
    }
}

impl PartialEq for ApiKey {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl From<Secret<String>> for ApiKey {
    fn from(secret: Secret<String>) -> Self {
        Self(secret)
    }
}

#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub id: uuid::Uuid,
    pub domain: DomainName,
    pub api_key: ApiKey,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug)]
pub struct NewCredentialRequest {
    pub domain: String,
    pub api_key: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCredential {
    pub domain: DomainName,
    pub api_key: ApiKey,
    pub description: Option<String>,
}

impl TryFrom<NewCredentialRequest> for NewCredential {
    type Error = CredentialError;

    fn try_from(request: NewCredentialRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            domain: DomainName::parse(&request.domain).map_err(CredentialError::ValidationError)?,
            api_key: ApiKey::parse(request.api_key)?,
            description: request.description.filter(|d| !d.trim().is_empty()),
        })
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct CredentialUpdateRequest {
    pub api_key: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct CredentialUpdate {
    pub api_key: Option<ApiKey>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

impl CredentialUpdate {
    pub fn deactivate() -> Self {
        Self {
            active: Some(false),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.api_key.is_none() && self.description.is_none() && self.active.is_none()
    }
}

impl TryFrom<CredentialUpdateRequest> for CredentialUpdate {
    type Error = CredentialError;

    fn try_from(request: CredentialUpdateRequest) -> Result<Self, Self::Error> {
        let update = Self {
            api_key: request.api_key.map(ApiKey::parse).transpose()?,
            description: request.description,
            active: request.active,
        };
        if update.is_empty() {
            return Err(CredentialError::ValidationError(
                "Nothing to update".to_string(),
            ));
        }
        Ok(update)
    }
}

/// Admin view of a stored key. The key itself is masked.
#[derive(Serialize, Debug, Clone)]
pub struct CredentialSummary {
    pub domain: String,
    pub api_key_preview: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&CredentialRecord> for CredentialSummary {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            domain: record.domain.to_string(),
            api_key_preview: record.api_key.masked(),
            description: record.description.clone(),
            active: record.active,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Which resolution layer currently provides a domain's key.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CredentialSource {
    Database,
    Configuration,
    Default,
    None,
}

#[derive(Serialize, Debug, Clone)]
pub struct DomainCredentialStatus {
    pub domain: String,
    pub default_sender: String,
    pub source: CredentialSource,
}

/// Keys known from configuration at startup: a global default and a
/// per-domain table.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    default_key: Option<ApiKey>,
    domain_keys: HashMap<String, ApiKey>,
}

impl StaticCredentials {
    pub fn new(default_key: Option<ApiKey>, domain_keys: HashMap<String, ApiKey>) -> Self {
        Self {
            default_key,
            domain_keys,
        }
    }

    pub fn from_settings(settings: &EmailClientSettings) -> Self {
        let default_key = settings
            .default_api_key
            .clone()
            .filter(|k| !k.expose_secret().trim().is_empty())
            .map(ApiKey::from);
        let domain_keys = settings
            .domain_api_keys
            .as_deref()
            .map(Self::parse_table)
            .unwrap_or_default();
        Self::new(default_key, domain_keys)
    }

    /// Parses `domain:key,domain:key`. Malformed entries are skipped.
    pub fn parse_table(table: &str) -> HashMap<String, ApiKey> {
        let mut keys = HashMap::new();
        for entry in table.split(',').filter(|e| !e.trim().is_empty()) {
            let Some((domain, key)) = entry.split_once(':') else {
                tracing::warn!("Ignoring per-domain API key entry without a ':' separator");
                continue;
            };
            match (DomainName::parse(domain), ApiKey::parse(key.to_string())) {
                (Ok(domain), Ok(key)) => {
                    keys.entry(String::from(domain)).or_insert(key);
                }
                _ => tracing::warn!("Ignoring malformed per-domain API key entry"),
            }
        }
        keys
    }

    pub fn default_key(&self) -> Option<&ApiKey> {
        self.default_key.as_ref()
    }

    pub fn for_domain(&self, domain: &str) -> Option<&ApiKey> {
        self.domain_keys.get(domain)
    }

    pub fn is_empty(&self) -> bool {
        self.default_key.is_none() && self.domain_keys.is_empty()
    }
}
