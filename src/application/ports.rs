use async_trait::async_trait;
use image::RgbImage;
use url::Url;

use crate::domain::{
    detection::RawDetection,
    errors::DomainResult,
    labels::LabelTable,
    model::DetectOptions,
};

/// The loaded detection model. Implementations must be callable from several
/// request tasks at once; `detect` is blocking and runs off the async runtime.
pub trait DetectorPort: Send + Sync {
    fn detect(&self, image: &RgbImage, options: &DetectOptions) -> DomainResult<Vec<RawDetection>>;
    fn labels(&self) -> &LabelTable;
}

#[async_trait]
pub trait ImageSourcePort: Send + Sync {
    async fn fetch(&self, url: &Url) -> DomainResult<Vec<u8>>;
}

/// Where the HTML front end keeps uploaded images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    pub file_name: String,
    /// Path under which the file is reachable over HTTP, e.g. `/static/uploads/ab12_cat.jpg`.
    pub public_path: String,
}

#[async_trait]
pub trait UploadStorePort: Send + Sync {
    async fn save(&self, original_name: &str, bytes: &[u8]) -> DomainResult<StoredUpload>;
}
