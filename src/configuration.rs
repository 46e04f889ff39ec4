use crate::domain::credentials::cache::DEFAULT_CACHE_TTL;
use crate::domain::inbound::models::message::FetchPolicy;
use secrecy::{ExposeSecret, Secret};
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::str::FromStr;
use std::time::Duration;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub email_client: EmailClientSettings,
    #[serde(default)]
    pub domains: DomainSettings,
    #[serde(default)]
    pub credentials: CredentialSettings,
    #[serde(default)]
    pub inbound: InboundSettings,
    #[serde(default)]
    pub webhook: WebhookSettings,
    #[serde(default)]
    pub general: GeneralSettings,
}

impl Settings {
    pub fn log_level(&self) -> String {
        self.general.log_level.clone()
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    pub admin_password: Option<Secret<String>>,
}

fn default_admin_username() -> String {
    "admin".to_string()
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    /// Postgres connection string. Persistence is disabled without one.
    pub url: Option<Secret<String>>,
    #[serde(
        default = "default_max_connections",
        deserialize_with = "deserialize_number_from_string"
    )]
    pub max_connections: u32,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
    #[serde(default)]
    pub require_ssl: bool,
}

fn default_max_connections() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

impl DatabaseSettings {
    pub fn connect_options(&self) -> Result<Option<PgConnectOptions>, sqlx::Error> {
        let Some(url) = self
            .url
            .as_ref()
            .map(|u| u.expose_secret().trim())
            .filter(|u| !u.is_empty())
        else {
            return Ok(None);
        };
        let options = PgConnectOptions::from_str(url)?;
        let options = if self.require_ssl {
            options.ssl_mode(PgSslMode::Require)
        } else {
            options
        };
        Ok(Some(options))
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct EmailClientSettings {
    pub base_url: String,
    pub default_api_key: Option<Secret<String>>,
    /// `domain:key,domain:key`
    pub domain_api_keys: Option<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

impl EmailClientSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }
}

#[derive(serde::Deserialize, Clone, Debug, Default)]
pub struct DomainSettings {
    /// Comma separated domains served, the first one is the primary.
    pub list: Option<String>,
    /// Single domain, read when `list` is empty.
    pub domain: Option<String>,
    /// `domain:sender,domain:sender`
    pub senders: Option<String>,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct CredentialSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub cache_ttl_seconds: u64,
}

impl CredentialSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: DEFAULT_CACHE_TTL.as_secs(),
        }
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct InboundSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub fetch_attempts: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub fetch_backoff_milliseconds: u64,
}

impl InboundSettings {
    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy::new(
            self.fetch_attempts,
            Duration::from_millis(self.fetch_backoff_milliseconds),
        )
    }
}

impl Default for InboundSettings {
    fn default() -> Self {
        let policy = FetchPolicy::default();
        Self {
            fetch_attempts: policy.attempts,
            fetch_backoff_milliseconds: policy.step.as_millis() as u64,
        }
    }
}

#[derive(serde::Deserialize, Clone, Debug, Default)]
pub struct WebhookSettings {
    /// `whsec_`-prefixed secret. Signatures are not checked without one.
    pub signing_secret: Option<Secret<String>>,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct GeneralSettings {
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Environment names honored from older deployments, and the setting each
/// one overrides.
const LEGACY_VARIABLES: &[(&str, &str)] = &[
    ("RESEND_API_KEY", "email_client.default_api_key"),
    ("RESEND_DOMAIN_KEYS", "email_client.domain_api_keys"),
    ("DOMAINS", "domains.list"),
    ("DOMAIN", "domains.domain"),
    ("DOMAIN_SENDERS", "domains.senders"),
    ("DATABASE_URL", "database.url"),
    ("PORT", "application.port"),
    ("WEBHOOK_SECRET", "webhook.signing_secret"),
];

fn legacy_overrides<F>(lookup: F) -> Vec<(&'static str, String)>
where
    F: Fn(&str) -> Option<String>,
{
    LEGACY_VARIABLES
        .iter()
        .filter_map(|(variable, key)| lookup(variable).map(|value| (*key, value)))
        .collect()
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let mut settings = config::Config::default();
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("No current directory: {}", e)))?;
    let configuration_directory = base_path.join("configuration");

    settings.merge(config::File::from(configuration_directory.join("base")).required(true))?;

    let environment = Environment::try_from(
        std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "local".into()),
    )
    .map_err(config::ConfigError::Message)?;

    settings.merge(
        config::File::from(configuration_directory.join(environment.as_str())).required(true),
    )?;

    // E.g. `APP_APPLICATION__PORT=5001` sets `Settings.application.port`
    settings.merge(config::Environment::with_prefix("app").separator("__"))?;

    for (key, value) in legacy_overrides(|name| std::env::var(name).ok()) {
        settings.set(key, value)?;
    }

    settings.try_into()
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}
