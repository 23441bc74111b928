use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use order_core::{BlobError, BlobStore};

/// In-memory blob store; signed URLs are deterministic fakes.
#[derive(Clone, Default)]
pub struct MockBlobStore {
    objects: Arc<Mutex<BTreeMap<String, (Vec<u8>, String)>>>,
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored object bytes, for assertions.
    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .map(|(bytes, _)| bytes.clone())
    }

    /// All stored paths in insertion-independent order.
    pub fn paths(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl BlobStore for MockBlobStore {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<(), BlobError> {
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), (bytes.to_vec(), content_type.to_string()));
        Ok(())
    }

    async fn fetch(&self, path: &str) -> Result<Vec<u8>, BlobError> {
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| BlobError::NotFound(path.to_string()))
    }

    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String, BlobError> {
        Ok(format!(
            "https://signed.example/{}?expires={}",
            path,
            ttl.as_secs()
        ))
    }
}
