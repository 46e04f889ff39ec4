use crate::domain::outbound::errors::DispatchError;
use serde::Deserialize;
use unicode_segmentation::UnicodeSegmentation;
use validator::validate_email;

/// Ceiling for a single decoded attachment.
pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;
/// Ceiling for all decoded attachments of one message together.
pub const MAX_TOTAL_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct AttachmentRequest {
    pub filename: Option<String>,
    /// Base64 encoded bytes
    pub content: Option<String>,
    pub content_type: Option<String>,
}

/// Body of a send request as posted by clients.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct SendEmailRequest {
    pub to: Option<OneOrMany>,
    pub cc: Option<OneOrMany>,
    pub bcc: Option<OneOrMany>,
    pub reply_to: Option<OneOrMany>,
    pub from: Option<String>,
    pub domain: Option<String>,
    pub subject: Option<String>,
    pub html: Option<String>,
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRequest>,
}

/// A mailbox, optionally with a display name: `a@b.com` or `Name <a@b.com>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    raw: String,
    address_start: usize,
    address_end: usize,
}

impl EmailAddress {
    pub fn parse(value: String) -> Result<EmailAddress, String> {
        let raw = value.trim().to_string();
        let (address_start, address_end) = match (raw.rfind('<'), raw.ends_with('>')) {
            (Some(open), true) => (open + 1, raw.len() - 1),
            _ => (0, raw.len()),
        };
        let address = &raw[address_start..address_end];
        if !validate_email(address) {
            return Err(format!("{} is not a valid email", raw));
        }
        Ok(Self {
            raw,
            address_start,
            address_end,
        })
    }

    /// The bare `local@domain` part.
    pub fn address(&self) -> &str {
        &self.raw[self.address_start..self.address_end]
    }

    pub fn domain(&self) -> &str {
        self.address()
            .rsplit_once('@')
            .map(|(_, domain)| domain)
            .unwrap_or_default()
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.raw.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailSubject(String);

impl EmailSubject {
    const MAX_GRAPHEMES: usize = 998;

    pub fn parse(subject: String) -> Result<EmailSubject, String> {
        if subject.trim().is_empty() {
            return Err("Email subject cannot be empty".to_string());
        }
        if subject.graphemes(true).count() > Self::MAX_GRAPHEMES {
            return Err(format!(
                "Email subject cannot be longer than {} characters",
                Self::MAX_GRAPHEMES
            ));
        }
        if subject.chars().any(|c| c == '\r' || c == '\n') {
            return Err("Email subject cannot contain line breaks".to_string());
        }
        Ok(Self(subject))
    }
}

impl AsRef<str> for EmailSubject {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// HTML and text parts; at least one is present and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailBody {
    html: Option<String>,
    text: Option<String>,
}

impl EmailBody {
    pub fn parse(html: Option<String>, text: Option<String>) -> Result<EmailBody, String> {
        let html = html.filter(|h| !h.trim().is_empty());
        let text = text.filter(|t| !t.trim().is_empty());
        if html.is_none() && text.is_none() {
            return Err("Email must have an HTML or a text body".to_string());
        }
        Ok(Self { html, text })
    }

    pub fn html(&self) -> Option<&str> {
        self.html.as_deref()
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    filename: String,
    content: String,
    content_type: Option<String>,
    decoded_size: usize,
}

impl Attachment {
    pub fn parse(request: AttachmentRequest) -> Result<Attachment, String> {
        let filename = request
            .filename
            .filter(|f| !f.trim().is_empty())
            .ok_or_else(|| "Attachment filename is required".to_string())?;
        let content = request
            .content
            .ok_or_else(|| format!("Attachment {} has no content", filename))?;
        let decoded_size = base64::decode(&content)
            .map_err(|_| format!("Attachment {} is not valid base64", filename))?
            .len();
        if decoded_size > MAX_ATTACHMENT_BYTES {
            return Err(format!(
                "Attachment {} is {} bytes, the limit is {} bytes",
                filename, decoded_size, MAX_ATTACHMENT_BYTES
            ));
        }
        Ok(Self {
            filename,
            content,
            content_type: request.content_type,
            decoded_size,
        })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Base64 content, forwarded as received.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn decoded_size(&self) -> usize {
        self.decoded_size
    }
}

/// A send request that passed validation and is ready to dispatch.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
    pub bcc: Vec<EmailAddress>,
    pub reply_to: Vec<EmailAddress>,
    pub from: Option<EmailAddress>,
    pub domain: Option<String>,
    pub subject: EmailSubject,
    pub body: EmailBody,
    pub attachments: Vec<Attachment>,
}

fn parse_addresses(field: &str, values: Option<OneOrMany>) -> Result<Vec<EmailAddress>, String> {
    values
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .into_iter()
        .filter(|v| !v.trim().is_empty())
        .map(|v| EmailAddress::parse(v).map_err(|e| format!("Invalid `{}`: {}", field, e)))
        .collect()
}

impl TryFrom<SendEmailRequest> for OutboundEmail {
    type Error = DispatchError;

    fn try_from(request: SendEmailRequest) -> Result<Self, Self::Error> {
        let to = parse_addresses("to", request.to).map_err(DispatchError::ValidationError)?;
        if to.is_empty() {
            return Err(DispatchError::ValidationError(
                "At least one recipient is required".to_string(),
            ));
        }
        let cc = parse_addresses("cc", request.cc).map_err(DispatchError::ValidationError)?;
        let bcc = parse_addresses("bcc", request.bcc).map_err(DispatchError::ValidationError)?;
        let reply_to =
            parse_addresses("reply_to", request.reply_to).map_err(DispatchError::ValidationError)?;
        let from = request
            .from
            .filter(|f| !f.trim().is_empty())
            .map(EmailAddress::parse)
            .transpose()
            .map_err(DispatchError::ValidationError)?;
        let subject = EmailSubject::parse(request.subject.unwrap_or_default())
            .map_err(DispatchError::ValidationError)?;
        let body =
            EmailBody::parse(request.html, request.text).map_err(DispatchError::ValidationError)?;

        let attachments = request
            .attachments
            .into_iter()
            .map(Attachment::parse)
            .collect::<Result<Vec<_>, _>>()
            .map_err(DispatchError::ValidationError)?;
        let total: usize = attachments.iter().map(Attachment::decoded_size).sum();
        if total > MAX_TOTAL_ATTACHMENT_BYTES {
            return Err(DispatchError::ValidationError(format!(
                "Attachments total {} bytes, the limit is {} bytes",
                total, MAX_TOTAL_ATTACHMENT_BYTES
            )));
        }

        Ok(Self {
            to,
            cc,
            bcc,
            reply_to,
            from,
            domain: request.domain.filter(|d| !d.trim().is_empty()),
            subject,
            body,
            attachments,
        })
    }
}
