//! Order documents in Firestore and quote PDFs in Cloud Storage, both over
//! the Google REST APIs with service-account OAuth.
//!
//! [`Firebase::new`] parses the service-account key once and hands out the
//! two adapters, which share one HTTP pool and one token cache:
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use order_store::{Firebase, FirebaseConfig};
//!
//! let firebase = Firebase::new(FirebaseConfig::from_env()?)?;
//! let orders = firebase.firestore();
//! let blobs = firebase.storage()?;
//! # Ok(())
//! # }
//! ```

mod auth;
mod config;
mod firestore;
mod storage;
mod value;

use std::sync::Arc;

use reqwest::Client;

pub use config::FirebaseConfig;
pub use firestore::FirestoreStore;
pub use storage::CloudStorage;

use auth::TokenProvider;
use order_core::{BlobError, StoreError};

/// Entry point tying the two Google adapters to one credential.
pub struct Firebase {
    http: Client,
    tokens: Arc<TokenProvider>,
    config: FirebaseConfig,
}

impl Firebase {
    /// Build the shared HTTP client and token provider.
    pub fn new(config: FirebaseConfig) -> Result<Self, StoreError> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::Config(format!("Failed to create HTTP client: {}", e)))?;
        let tokens = Arc::new(TokenProvider::new(http.clone(), &config)?);
        Ok(Self {
            http,
            tokens,
            config,
        })
    }

    /// Create the client from environment variables.
    pub fn from_env() -> Result<Self, StoreError> {
        Self::new(FirebaseConfig::from_env()?)
    }

    /// The Firestore-backed order store.
    pub fn firestore(&self) -> FirestoreStore {
        FirestoreStore::new(
            self.http.clone(),
            self.tokens.clone(),
            self.config.project_id.clone(),
        )
    }

    /// The Cloud Storage blob store.
    pub fn storage(&self) -> Result<CloudStorage, BlobError> {
        CloudStorage::new(self.http.clone(), self.tokens.clone(), &self.config)
    }
}
