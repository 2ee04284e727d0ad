use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::application::ports::{StoredUpload, UploadStorePort};
use crate::domain::errors::{DomainError, DomainResult};

/// Writes uploads into a publicly served directory as `<hex>_<name>`.
/// Nothing is ever removed from it.
pub struct UploadDir {
    dir: PathBuf,
    public_prefix: String,
}

impl UploadDir {
    /// `public_prefix` is the URL path the directory is served under, e.g. `/static/uploads`.
    pub fn new(dir: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            public_prefix: public_prefix.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl UploadStorePort for UploadDir {
    async fn save(&self, original_name: &str, bytes: &[u8]) -> DomainResult<StoredUpload> {
        let file_name = format!("{}_{}", Uuid::new_v4().simple(), sanitize_file_name(original_name));

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| DomainError::Storage(format!("{}: {e}", self.dir.display())))?;
        let path = self.dir.join(&file_name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| DomainError::Storage(format!("{}: {e}", path.display())))?;

        info!(path = %path.display(), bytes = bytes.len(), "upload stored");
        Ok(StoredUpload {
            public_path: format!("{}/{}", self.public_prefix, file_name),
            file_name,
        })
    }
}

/// Keeps only the final path component and a conservative character set.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
