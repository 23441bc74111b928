//! [`EmailSender`] over the Resend REST API.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use order_core::{EmailError, EmailSender, OutboundEmail};

use crate::config::MailerConfig;

const SEND_URL: &str = "https://api.resend.com/emails";

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<SendAttachment<'a>>,
}

#[derive(Serialize)]
struct SendAttachment<'a> {
    filename: &'a str,
    /// Base64-encoded file body.
    content: String,
    content_type: &'a str,
}

/// Resend-backed email sender.
#[derive(Clone)]
pub struct ResendClient {
    http: Client,
    config: MailerConfig,
}

impl ResendClient {
    /// Create a client from the given configuration.
    pub fn new(config: MailerConfig) -> Result<Self, EmailError> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| EmailError::Build(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }

    /// Create a client from environment variables.
    pub fn from_env() -> Result<Self, EmailError> {
        Self::new(MailerConfig::from_env()?)
    }
}

#[async_trait]
impl EmailSender for ResendClient {
    async fn send(&self, email: &OutboundEmail) -> Result<(), EmailError> {
        if email.to.is_empty() {
            return Err(EmailError::Build("no recipients".to_string()));
        }

        let attachments = email
            .attachments
            .iter()
            .map(|attachment| SendAttachment {
                filename: &attachment.filename,
                content: base64::engine::general_purpose::STANDARD.encode(&attachment.data),
                content_type: &attachment.content_type,
            })
            .collect();

        let request = SendRequest {
            from: &self.config.from,
            to: &email.to,
            reply_to: email
                .reply_to
                .as_deref()
                .or(self.config.reply_to.as_deref()),
            subject: &email.subject,
            html: &email.html,
            attachments,
        };

        debug!(to = ?email.to, subject = %email.subject, "sending email");

        let response = self
            .http
            .post(SEND_URL)
            .bearer_auth(self.config.api_key())
            .json(&request)
            .send()
            .await
            .map_err(|e| EmailError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let reason = body
                .pointer("/message")
                .and_then(Value::as_str)
                .map(|m| m.to_string())
                .unwrap_or_else(|| body.to_string());
            return Err(EmailError::Rejected(format!("{}: {}", status, reason)));
        }

        info!(to = ?email.to, subject = %email.subject, "email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use order_core::EmailAttachment;

    #[test]
    fn request_serializes_with_base64_attachment() {
        let email = OutboundEmail::new("ada@example.com", "Votre devis", "<p>Bonjour</p>")
            .attach(EmailAttachment::pdf("devis.pdf", vec![0x25, 0x50, 0x44, 0x46]));

        let request = SendRequest {
            from: "Voltra <noreply@voltra.example>",
            to: &email.to,
            reply_to: Some("office@voltra.example"),
            subject: &email.subject,
            html: &email.html,
            attachments: email
                .attachments
                .iter()
                .map(|a| SendAttachment {
                    filename: &a.filename,
                    content: base64::engine::general_purpose::STANDARD.encode(&a.data),
                    content_type: &a.content_type,
                })
                .collect(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["to"][0], "ada@example.com");
        assert_eq!(json["reply_to"], "office@voltra.example");
        assert_eq!(json["attachments"][0]["filename"], "devis.pdf");
        // "%PDF" in base64
        assert_eq!(json["attachments"][0]["content"], "JVBERg==");
    }
}
