//! Disk-backed evidence store. Files land in the upload directory under a
//! unique name and are served back under `/uploads/`.

use std::path::PathBuf;

use async_trait::async_trait;
use uuid::Uuid;

use reporttracker_core::evidence::{EvidenceError, EvidenceStore, SlipUpload};

#[derive(Debug, Clone)]
pub struct DiskEvidenceStore {
    dir: PathBuf,
}

impl DiskEvidenceStore {
    pub async fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }
}

#[async_trait]
impl EvidenceStore for DiskEvidenceStore {
    async fn store(&self, upload: &SlipUpload) -> Result<String, EvidenceError> {
        // Keep only the final path segment of the client-supplied name.
        let safe = upload
            .filename
            .rsplit(['/', '\\'])
            .next()
            .filter(|segment| !segment.is_empty())
            .unwrap_or("slip");
        let name = format!("{}-{}", Uuid::new_v4(), safe);
        let path = self.dir.join(&name);
        tokio::fs::write(&path, &upload.bytes)
            .await
            .map_err(|err| EvidenceError(err.to_string()))?;
        Ok(format!("/uploads/{name}"))
    }
}
