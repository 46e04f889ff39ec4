use actix_web::HttpRequest;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;

use crate::configuration::ApplicationSettings;
use crate::inbound::http::errors::AppError;

type HmacSha256 = Hmac<Sha256>;

const PASSWORD_TAG_KEY: &[u8] = b"mailgate-admin-password";

pub struct Credentials {
    pub username: String,
    pub password: Secret<String>,
}

pub fn basic_authentication(request: &HttpRequest) -> Result<Credentials, AppError> {
    let header_value = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::AuthError("The 'Authorization' header is missing".to_string()))?
        .to_str()
        .map_err(|e| AppError::AuthError(e.to_string()))?;
    let base64encoded_segment = header_value.strip_prefix("Basic ").ok_or_else(|| {
        AppError::AuthError("The authorization scheme was not 'Basic'".to_string())
    })?;
    let decoded_bytes = base64::decode_config(base64encoded_segment, base64::STANDARD)
        .map_err(|_| AppError::AuthError("Failed to base64-decode 'Basic' credentials".to_string()))?;
    let decoded_credentials = String::from_utf8(decoded_bytes).map_err(|_| {
        AppError::AuthError("The decoded credential string is not valid UTF8.".to_string())
    })?;

    let (username, password) = decoded_credentials.split_once(':').ok_or_else(|| {
        AppError::AuthError("A password must be provided in 'Basic' auth.".to_string())
    })?;

    Ok(Credentials {
        username: username.to_string(),
        password: Secret::new(password.to_string()),
    })
}

/// Credentials guarding the admin routes. Without a password the routes are open.
#[derive(Clone, Debug)]
pub struct AdminCredentials {
    username: String,
    password: Option<Secret<String>>,
}

impl AdminCredentials {
    pub fn new(username: String, password: Option<Secret<String>>) -> Self {
        Self {
            username,
            password: password.filter(|p| !p.expose_secret().is_empty()),
        }
    }

    pub fn from_settings(settings: &ApplicationSettings) -> Self {
        Self::new(
            settings.admin_username.clone(),
            settings.admin_password.clone(),
        )
    }

    pub fn is_open(&self) -> bool {
        self.password.is_none()
    }

    #[tracing::instrument(name = "Authorize admin request", skip(self, request), fields(username = tracing::field::Empty))]
    pub fn authorize(&self, request: &HttpRequest) -> Result<(), AppError> {
        let Some(expected) = &self.password else {
            return Ok(());
        };
        let credentials = basic_authentication(request)?;
        tracing::Span::current().record("username", tracing::field::display(&credentials.username));

        let username_matches = credentials.username == self.username;
        let password_matches =
            constant_time_eq(credentials.password.expose_secret(), expected.expose_secret());
        if username_matches && password_matches {
            Ok(())
        } else {
            Err(AppError::AuthError("Invalid username or password".to_string()))
        }
    }
}

/// Compares HMAC tags of both values, so neither the contents nor the
/// length of the expected password affect timing.
fn constant_time_eq(supplied: &str, expected: &str) -> bool {
    let tag = |value: &str| {
        HmacSha256::new_from_slice(PASSWORD_TAG_KEY).map(|mut mac| {
            mac.update(value.as_bytes());
            mac
        })
    };
    match (tag(supplied), tag(expected)) {
        (Ok(supplied), Ok(expected)) => supplied
            .verify_slice(&expected.finalize().into_bytes())
            .is_ok(),
        _ => false,
    }
}
