use std::env;

use secrecy::{ExposeSecret, SecretString};

use order_core::EmailError;

/// Configuration for the Resend sender.
#[derive(Debug, Clone)]
pub struct MailerConfig {
    /// API key for api.resend.com
    api_key: SecretString,
    /// From header, e.g. `Voltra <noreply@voltra.example>`
    pub from: String,
    /// Optional Reply-To applied when the message itself sets none
    pub reply_to: Option<String>,
}

impl MailerConfig {
    /// Create a new configuration with explicit values.
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            from: from.into(),
            reply_to: None,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Required:
    /// - `RESEND_API_KEY` - API key
    /// - `MAIL_FROM` - From header
    ///
    /// Optional:
    /// - `MAIL_REPLY_TO` - Default Reply-To header
    pub fn from_env() -> Result<Self, EmailError> {
        let api_key = env::var("RESEND_API_KEY")
            .map_err(|_| EmailError::Build("RESEND_API_KEY not set".to_string()))?;
        let from = env::var("MAIL_FROM")
            .map_err(|_| EmailError::Build("MAIL_FROM not set".to_string()))?;

        let mut config = Self::new(api_key, from);
        config.reply_to = env::var("MAIL_REPLY_TO").ok();
        Ok(config)
    }

    /// Builder method to set the default Reply-To.
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Get the API key (exposes the secret).
    pub(crate) fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_to_defaults_to_none() {
        let config = MailerConfig::new("re_key", "Voltra <noreply@voltra.example>");
        assert!(config.reply_to.is_none());

        let config = config.with_reply_to("office@voltra.example");
        assert_eq!(config.reply_to.as_deref(), Some("office@voltra.example"));
    }
}
