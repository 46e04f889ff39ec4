use anyhow::Context;
use async_trait::async_trait;

use super::ResendClient;
use crate::domain::credentials::models::ApiKey;
use crate::domain::outbound::{
    models::email::{EmailAddress, OutboundEmail},
    ports::EmailSender,
};
use crate::domain::provider::ProviderError;

#[derive(serde::Serialize)]
struct SendEmailBody<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cc: Vec<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    bcc: Vec<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    reply_to: Vec<&'a str>,
    subject: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<AttachmentBody<'a>>,
}

#[derive(serde::Serialize)]
struct AttachmentBody<'a> {
    filename: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<&'a str>,
}

#[derive(serde::Deserialize)]
struct SendEmailResponse {
    id: String,
}

fn addresses(list: &[EmailAddress]) -> Vec<&str> {
    list.iter().map(AsRef::as_ref).collect()
}

impl<'a> SendEmailBody<'a> {
    fn new(from: &'a str, email: &'a OutboundEmail) -> Self {
        Self {
            from,
            to: addresses(&email.to),
            cc: addresses(&email.cc),
            bcc: addresses(&email.bcc),
            reply_to: addresses(&email.reply_to),
            subject: email.subject.as_ref(),
            html: email.body.html(),
            text: email.body.text(),
            attachments: email
                .attachments
                .iter()
                .map(|a| AttachmentBody {
                    filename: a.filename(),
                    content: a.content(),
                    content_type: a.content_type(),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl EmailSender for ResendClient {
    #[tracing::instrument(name = "Send email through the provider", skip(self, api_key, email))]
    async fn send_email(
        &self,
        api_key: &ApiKey,
        from: &str,
        email: &OutboundEmail,
    ) -> Result<String, ProviderError> {
        let response = self
            .http_client
            .post(self.url("/emails"))
            .bearer_auth(api_key.expose())
            .json(&SendEmailBody::new(from, email))
            .send()
            .await
            .context("Failed to reach the email provider")?;

        let accepted: SendEmailResponse = Self::check(response)
            .await?
            .json()
            .await
            .context("Provider accepted the email but returned an unexpected body")?;
        Ok(accepted.id)
    }
}
