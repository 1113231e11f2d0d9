//! Metadata Storage
//!
//! Seam for pinning prize metadata documents. The mock is
//! content-addressed: the URI is derived from the document bytes, so
//! pinning the same document twice yields the same URI. Transient pin
//! failures are absorbed by a bounded retry helper.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::warn;

use crate::core::hash::sha256;

/// Retries after the first failed pin attempt.
pub const PIN_RETRIES: u32 = 2;

/// Storage-side failures.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The pin attempt failed.
    #[error("metadata pinning failed: {0}")]
    PinFailed(String),
}

/// Where prize metadata documents are pinned.
#[async_trait]
pub trait MetadataStorage: Send + Sync {
    /// Pin a metadata document, returning its URI.
    async fn pin_metadata(&self, document: &Value) -> Result<String, StorageError>;

    /// Fetch a previously pinned document by URI.
    async fn fetch_metadata(&self, uri: &str) -> Option<Value>;
}

/// In-memory content-addressed store with `ipfs://` URIs.
#[derive(Default)]
pub struct IpfsMockStorage {
    pinned: RwLock<BTreeMap<String, Value>>,
    failures_to_inject: AtomicU32,
}

impl IpfsMockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` pin attempts fail. Test hook for the retry path.
    pub fn inject_failures(&self, n: u32) {
        self.failures_to_inject.store(n, Ordering::SeqCst);
    }

    /// Content-addressed URI for a document.
    pub fn uri_for(document: &Value) -> Result<String, StorageError> {
        let bytes =
            serde_json::to_vec(document).map_err(|e| StorageError::PinFailed(e.to_string()))?;
        Ok(format!("ipfs://{}", hex::encode(sha256(&bytes))))
    }
}

#[async_trait]
impl MetadataStorage for IpfsMockStorage {
    async fn pin_metadata(&self, document: &Value) -> Result<String, StorageError> {
        let remaining = self.failures_to_inject.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_to_inject.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::PinFailed("injected failure".to_string()));
        }

        let uri = Self::uri_for(document)?;
        self.pinned
            .write()
            .await
            .insert(uri.clone(), document.clone());
        Ok(uri)
    }

    async fn fetch_metadata(&self, uri: &str) -> Option<Value> {
        self.pinned.read().await.get(uri).cloned()
    }
}

/// Pin a document, retrying up to [`PIN_RETRIES`] times on failure.
pub async fn pin_with_retry(
    storage: &dyn MetadataStorage,
    document: &Value,
) -> Result<String, StorageError> {
    let mut last_error = StorageError::PinFailed("no attempts made".to_string());
    for attempt in 0..=PIN_RETRIES {
        match storage.pin_metadata(document).await {
            Ok(uri) => return Ok(uri),
            Err(e) => {
                warn!(attempt, error = %e, "metadata pin attempt failed");
                last_error = e;
            }
        }
    }
    Err(last_error)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_pin_is_content_addressed() {
        let storage = IpfsMockStorage::new();
        let doc = json!({"name": "plush-bear", "difficulty": 5});

        let a = storage.pin_metadata(&doc).await.unwrap();
        let b = storage.pin_metadata(&doc).await.unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("ipfs://"));

        let other = storage
            .pin_metadata(&json!({"name": "plush-cat"}))
            .await
            .unwrap();
        assert_ne!(a, other);
    }

    #[tokio::test]
    async fn test_fetch_returns_pinned_document() {
        let storage = IpfsMockStorage::new();
        let doc = json!({"name": "plush-bear"});
        let uri = storage.pin_metadata(&doc).await.unwrap();

        assert_eq!(storage.fetch_metadata(&uri).await, Some(doc));
        assert_eq!(storage.fetch_metadata("ipfs://missing").await, None);
    }

    #[tokio::test]
    async fn test_retry_absorbs_transient_failures() {
        let storage = IpfsMockStorage::new();
        let doc = json!({"name": "plush-bear"});

        storage.inject_failures(2);
        let uri = pin_with_retry(&storage, &doc).await.unwrap();
        assert_eq!(storage.fetch_metadata(&uri).await, Some(doc));
    }

    #[tokio::test]
    async fn test_retry_gives_up_when_exhausted() {
        let storage = IpfsMockStorage::new();
        storage.inject_failures(3);
        let err = pin_with_retry(&storage, &serde_json::json!({})).await;
        assert!(err.is_err());
    }
}
