//! Construction of outbound messages for `messages.send` and `drafts.create`

use base64::{engine::general_purpose::URL_SAFE, Engine};
use mail_builder::headers::raw::Raw;
use mail_builder::MessageBuilder;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::ParsedMessage;

/// Placeholder quoted in a reply when the original had no body
const NO_BODY_PLACEHOLDER: &str = "[No message body]";

/// A plain-text message ready to be encoded for the Gmail API
#[derive(Debug, Clone, Default)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
    /// Gmail thread the message belongs to
    pub thread_id: Option<String>,
}

/// Transport form of a message: base64url RFC 5322 bytes plus thread id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodedMessage {
    pub raw: String,
    #[serde(rename = "threadId", skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl OutboundMessage {
    /// Create a new message
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    /// Add CC recipients
    pub fn with_cc(mut self, cc: &[String]) -> Self {
        self.cc = cc.to_vec();
        self
    }

    /// Add BCC recipients
    pub fn with_bcc(mut self, bcc: &[String]) -> Self {
        self.bcc = bcc.to_vec();
        self
    }

    /// Build a reply to `original`, quoting its body.
    ///
    /// `In-Reply-To` and `References` carry the Gmail message id rather
    /// than the RFC 5322 `Message-ID` header.
    pub fn reply_to(original: &ParsedMessage, reply_body: &str, cc: &[String]) -> Result<Self> {
        let to = original
            .from
            .as_deref()
            .filter(|from| !from.trim().is_empty())
            .ok_or_else(|| {
                Error::Validation("Could not determine original sender's address".to_string())
            })?;

        let original_id = original.id.clone().unwrap_or_default();

        Ok(Self {
            to: to.to_string(),
            subject: reply_subject(original.subject.as_deref().unwrap_or("")),
            body: quote_reply(original, reply_body),
            cc: cc.to_vec(),
            bcc: Vec::new(),
            in_reply_to: Some(original_id.clone()),
            references: Some(original_id),
            thread_id: original.thread_id.clone(),
        })
    }

    /// Serialize to RFC 5322 bytes
    pub fn to_mime_bytes(&self) -> Result<Vec<u8>> {
        if self.to.trim().is_empty() {
            return Err(Error::Validation("Recipient address is required".to_string()));
        }

        let mut builder = MessageBuilder::new()
            .header("To", Raw::new(header_value("To", &self.to)?))
            .subject(header_value("Subject", &self.subject)?);

        if !self.cc.is_empty() {
            let cc = self.cc.join(",");
            header_value("Cc", &cc)?;
            builder = builder.header("Cc", Raw::new(cc));
        }
        if !self.bcc.is_empty() {
            let bcc = self.bcc.join(",");
            header_value("Bcc", &bcc)?;
            builder = builder.header("Bcc", Raw::new(bcc));
        }
        if let Some(in_reply_to) = &self.in_reply_to {
            builder = builder.header(
                "In-Reply-To",
                Raw::new(header_value("In-Reply-To", in_reply_to)?),
            );
        }
        if let Some(references) = &self.references {
            builder = builder.header(
                "References",
                Raw::new(header_value("References", references)?),
            );
        }

        Ok(builder.text_body(self.body.as_str()).write_to_vec()?)
    }

    /// Encode for the Gmail API
    pub fn encode(&self) -> Result<EncodedMessage> {
        let bytes = self.to_mime_bytes()?;
        Ok(EncodedMessage {
            raw: URL_SAFE.encode(bytes),
            thread_id: self.thread_id.clone(),
        })
    }
}

/// Prefix "Re: " unless the subject already carries it
pub fn reply_subject(subject: &str) -> String {
    let already_reply = subject
        .get(..3)
        .map(|prefix| prefix.eq_ignore_ascii_case("re:"))
        .unwrap_or(false);
    if already_reply {
        subject.to_string()
    } else {
        format!("Re: {}", subject)
    }
}

/// Reply text followed by an attribution line and the quoted original
pub fn quote_reply(original: &ParsedMessage, reply_body: &str) -> String {
    let date = original.date.as_deref().unwrap_or("");
    let from = original.from.as_deref().unwrap_or("");
    let quoted = match original.body.as_deref() {
        Some(body) if !body.is_empty() => body.replace('\n', "\n> "),
        _ => NO_BODY_PLACEHOLDER.to_string(),
    };

    format!(
        "{}\n\nOn {}, {} wrote:\n> {}",
        reply_body, date, from, quoted
    )
}

/// Reject header values that would break out of their header line
fn header_value<'a>(name: &str, value: &'a str) -> Result<&'a str> {
    if value.contains(['\r', '\n']) {
        return Err(Error::Validation(format!(
            "{} header must not contain line breaks",
            name
        )));
    }
    Ok(value)
}
