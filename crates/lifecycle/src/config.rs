use std::env;
use std::time::Duration;

use order_core::RetryPolicy;

use crate::error::LifecycleError;

/// Signed quote links stay valid for a week.
const SIGNED_URL_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// A fixed document attached to every customer payment confirmation.
#[derive(Debug, Clone)]
pub struct LegalAttachment {
    /// Filename shown in the email.
    pub filename: String,
    /// Path of the document in blob storage.
    pub storage_path: String,
}

/// Tunables for the lifecycle orchestrator.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Internal address notified when an order is paid and invoiced.
    pub fulfillment_email: String,
    /// Fixed legal documents attached to the customer confirmation.
    pub legal_attachments: Vec<LegalAttachment>,
    /// Validity of signed quote links.
    pub signed_url_ttl: Duration,
    /// Budget for confirming the sale order reached its final state.
    pub order_confirm_retry: RetryPolicy,
    /// Budget for the posted invoice to turn up after confirmation.
    pub invoice_retry: RetryPolicy,
}

impl LifecycleConfig {
    /// Create a configuration with the production retry budgets.
    pub fn new(fulfillment_email: impl Into<String>) -> Self {
        Self {
            fulfillment_email: fulfillment_email.into(),
            legal_attachments: Vec::new(),
            signed_url_ttl: SIGNED_URL_TTL,
            order_confirm_retry: RetryPolicy::new(2, Duration::from_secs(5)),
            invoice_retry: RetryPolicy::new(5, Duration::from_secs(3)),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Required:
    /// - `FULFILLMENT_EMAIL` - internal notification address
    ///
    /// Optional:
    /// - `LEGAL_ATTACHMENT_PATHS` - comma-separated storage paths
    pub fn from_env() -> Result<Self, LifecycleError> {
        let fulfillment_email = env::var("FULFILLMENT_EMAIL")
            .map_err(|_| LifecycleError::Config("FULFILLMENT_EMAIL".to_string()))?;

        let mut config = Self::new(fulfillment_email);
        if let Ok(paths) = env::var("LEGAL_ATTACHMENT_PATHS") {
            config.legal_attachments = paths
                .split(',')
                .map(str::trim)
                .filter(|path| !path.is_empty())
                .map(|path| LegalAttachment {
                    filename: path.rsplit('/').next().unwrap_or(path).to_string(),
                    storage_path: path.to_string(),
                })
                .collect();
        }
        Ok(config)
    }

    /// Builder method to add a legal attachment.
    pub fn with_legal_attachment(
        mut self,
        filename: impl Into<String>,
        storage_path: impl Into<String>,
    ) -> Self {
        self.legal_attachments.push(LegalAttachment {
            filename: filename.into(),
            storage_path: storage_path.into(),
        });
        self
    }

    /// Builder method to override both retry budgets, for tests.
    pub fn with_retries(mut self, confirm: RetryPolicy, invoice: RetryPolicy) -> Self {
        self.order_confirm_retry = confirm;
        self.invoice_retry = invoice;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_retry_budgets() {
        let config = LifecycleConfig::new("office@voltra.example");
        assert_eq!(config.order_confirm_retry.max_attempts, 2);
        assert_eq!(config.order_confirm_retry.delay, Duration::from_secs(5));
        assert_eq!(config.invoice_retry.max_attempts, 5);
        assert_eq!(config.invoice_retry.delay, Duration::from_secs(3));
        assert_eq!(config.signed_url_ttl, Duration::from_secs(604800));
    }
}
