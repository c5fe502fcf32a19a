//! Evidence ("slip") attachment seam. The workflow validates the declared
//! content type and size, then hands the bytes to an external store that
//! returns a retrievable URL.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

pub const MAX_SLIP_BYTES: usize = 10 * 1024 * 1024;

pub const ALLOWED_SLIP_TYPES: [&str; 4] = [
    "application/pdf",
    "image/jpeg",
    "image/png",
    "image/webp",
];

#[derive(Debug, Clone)]
pub struct SlipUpload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl SlipUpload {
    /// Checks the declared content type against the allow-list and enforces
    /// the size ceiling. Runs before any store call.
    pub fn validate(&self) -> Result<(), String> {
        if !ALLOWED_SLIP_TYPES.contains(&self.content_type.as_str()) {
            return Err("Only images (jpg/png/webp) or PDF are allowed as slip".to_string());
        }
        if self.bytes.len() > MAX_SLIP_BYTES {
            return Err("Slip file exceeds the 10MB limit".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct EvidenceError(pub String);

#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Persists the upload and returns the reference stored as `slip_url`.
    async fn store(&self, upload: &SlipUpload) -> Result<String, EvidenceError>;
}

/// Store that keeps nothing and fabricates a URL. Used by tests and local
/// setups without a real evidence backend.
#[derive(Debug, Clone, Default)]
pub struct NoopEvidenceStore;

#[async_trait]
impl EvidenceStore for NoopEvidenceStore {
    async fn store(&self, upload: &SlipUpload) -> Result<String, EvidenceError> {
        Ok(format!("/uploads/{}-{}", Uuid::new_v4(), upload.filename))
    }
}
