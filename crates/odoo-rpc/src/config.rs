use std::env;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use order_core::RecordError;

/// Configuration for connecting to the Odoo record store.
#[derive(Debug, Clone)]
pub struct OdooConfig {
    /// Base URL, e.g. `https://company.odoo.com` (no trailing slash)
    pub url: String,
    /// Database name
    pub db: String,
    /// Login (user email or API user)
    pub login: String,
    /// API password or key
    password: SecretString,
    /// Per-request timeout
    pub timeout: Duration,
}

impl OdooConfig {
    /// Create a new configuration with explicit values.
    pub fn new(
        url: impl Into<String>,
        db: impl Into<String>,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let mut url = url.into();
        while url.ends_with('/') {
            url.pop();
        }
        Self {
            url,
            db: db.into(),
            login: login.into(),
            password: SecretString::from(password.into()),
            timeout: Duration::from_secs(15),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Required:
    /// - `ODOO_URL` - Base URL of the Odoo instance
    /// - `ODOO_DB` - Database name
    /// - `ODOO_USER` - Login
    /// - `ODOO_PASSWORD` - API password or key
    ///
    /// Optional:
    /// - `ODOO_TIMEOUT_SECS` - Default: 15
    pub fn from_env() -> Result<Self, RecordError> {
        let url = env::var("ODOO_URL").map_err(|_| RecordError::Config("ODOO_URL".to_string()))?;
        let db = env::var("ODOO_DB").map_err(|_| RecordError::Config("ODOO_DB".to_string()))?;
        let login =
            env::var("ODOO_USER").map_err(|_| RecordError::Config("ODOO_USER".to_string()))?;
        let password = env::var("ODOO_PASSWORD")
            .map_err(|_| RecordError::Config("ODOO_PASSWORD".to_string()))?;

        let timeout = env::var("ODOO_TIMEOUT_SECS")
            .ok()
            .map(|raw| {
                raw.parse::<u64>()
                    .map_err(|e| RecordError::Config(format!("Invalid ODOO_TIMEOUT_SECS: {}", e)))
            })
            .transpose()?
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(15));

        let mut config = Self::new(url, db, login, password);
        config.timeout = timeout;
        Ok(config)
    }

    /// Builder method to set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the password (exposes the secret).
    pub(crate) fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let config = OdooConfig::new("https://erp.example.com/", "db", "bot", "secret");
        assert_eq!(config.url, "https://erp.example.com");
    }

    #[test]
    fn timeout_can_be_overridden() {
        let config = OdooConfig::new("https://erp.example.com", "db", "bot", "secret")
            .with_timeout(Duration::from_secs(3));
        assert_eq!(config.timeout, Duration::from_secs(3));
    }
}
