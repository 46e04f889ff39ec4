use anyhow::Context;
use async_trait::async_trait;

use super::ResendClient;
use crate::domain::credentials::models::ApiKey;
use crate::domain::inbound::{
    models::message::{AttachmentDownload, AttachmentMeta, ProviderAttachment, ReceivedContent},
    ports::ReceivedEmailSource,
};
use crate::domain::provider::ProviderError;

#[derive(serde::Deserialize)]
struct ReceivedEmailResponse {
    html: Option<String>,
    text: Option<String>,
    #[serde(default)]
    headers: Option<serde_json::Value>,
    #[serde(default)]
    attachments: Vec<AttachmentMeta>,
}

#[derive(serde::Deserialize)]
struct AttachmentListResponse {
    #[serde(default)]
    data: Vec<AttachmentItem>,
}

#[derive(serde::Deserialize)]
struct AttachmentItem {
    id: String,
    filename: Option<String>,
    content_type: Option<String>,
    size: Option<u64>,
    download_url: String,
    expires_at: Option<String>,
}

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

#[async_trait]
impl ReceivedEmailSource for ResendClient {
    #[tracing::instrument(name = "Fetch received email from the provider", skip(self, api_key))]
    async fn fetch_received(
        &self,
        api_key: &ApiKey,
        provider_message_id: &str,
    ) -> Result<ReceivedContent, ProviderError> {
        let response = self
            .http_client
            .get(self.url(&format!("/emails/receiving/{}", provider_message_id)))
            .bearer_auth(api_key.expose())
            .send()
            .await
            .context("Failed to reach the email provider")?;

        let email: ReceivedEmailResponse = Self::check(response)
            .await?
            .json()
            .await
            .context("Unexpected received email body")?;
        Ok(ReceivedContent {
            html: email.html,
            text: email.text,
            headers: email
                .headers
                .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
            attachments: email.attachments,
        })
    }

    #[tracing::instrument(name = "List attachments from the provider", skip(self, api_key))]
    async fn list_attachments(
        &self,
        api_key: &ApiKey,
        provider_message_id: &str,
    ) -> Result<Vec<ProviderAttachment>, ProviderError> {
        let response = self
            .http_client
            .get(self.url(&format!(
                "/emails/receiving/{}/attachments",
                provider_message_id
            )))
            .bearer_auth(api_key.expose())
            .send()
            .await
            .context("Failed to reach the email provider")?;

        let list: AttachmentListResponse = Self::check(response)
            .await?
            .json()
            .await
            .context("Unexpected attachment list body")?;
        Ok(list
            .data
            .into_iter()
            .map(|item| ProviderAttachment {
                id: item.id,
                filename: item.filename,
                content_type: item.content_type,
                size: item.size,
                download_url: item.download_url,
                expires_at: item.expires_at,
            })
            .collect())
    }

    /// Download links are pre-signed, no credential is sent.
    #[tracing::instrument(name = "Download attachment", skip(self, attachment), fields(attachment_id = %attachment.id))]
    async fn download_attachment(
        &self,
        attachment: &ProviderAttachment,
    ) -> Result<AttachmentDownload, ProviderError> {
        let response = self
            .http_client
            .get(&attachment.download_url)
            .send()
            .await
            .context("Failed to download the attachment")?;
        let response = Self::check(response).await?;

        let content_type = attachment
            .content_type
            .clone()
            .or_else(|| {
                response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());
        let bytes = response
            .bytes()
            .await
            .context("Failed to read the attachment body")?;

        Ok(AttachmentDownload {
            filename: attachment.filename.clone(),
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}
