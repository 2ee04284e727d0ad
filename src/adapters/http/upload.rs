use axum::extract::Multipart;

use crate::domain::errors::{DomainError, DomainResult};

pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// The multipart fields both front ends understand.
#[derive(Default)]
pub struct UploadForm {
    /// `file`; an empty part (browser form submitted without a file) counts as absent.
    pub file: Option<UploadedFile>,
    /// `request`: JSON-encoded detection parameters.
    pub params: Option<String>,
}

pub async fn read_upload(mut multipart: Multipart) -> DomainResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DomainError::invalid("multipart", e.to_string()))?
    {
        match field.name() {
            Some("file") => {
                let name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| DomainError::invalid("file", e.to_string()))?;
                if !bytes.is_empty() {
                    form.file = Some(UploadedFile { name, bytes: bytes.to_vec() });
                }
            }
            Some("request") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| DomainError::invalid("request", e.to_string()))?;
                form.params = Some(text);
            }
            _ => {}
        }
    }

    Ok(form)
}
