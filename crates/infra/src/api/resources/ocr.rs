//! Image upload for text extraction

use std::path::Path;

use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::api::client::{AuthenticatedApiClient, RequestBody, RequestOptions, UploadPart};
use crate::api::errors::ApiError;

const DEFAULT_MIME: &str = "image/jpeg";

/// An image to upload. Missing names and MIME types are filled in at
/// send time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadFile {
    pub bytes: Vec<u8>,
    pub file_name: Option<String>,
    pub mime: Option<String>,
}

impl UploadFile {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, ..Self::default() }
    }

    /// Read an image from disk, guessing the MIME type from the extension.
    ///
    /// # Errors
    /// Returns `ApiError::Storage` if the file cannot be read.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::Storage(format!("failed to read {}: {e}", path.display())))?;
        Ok(Self {
            bytes,
            file_name: path.file_name().map(|name| name.to_string_lossy().into_owned()),
            mime: mime_for_path(path).map(str::to_string),
        })
    }

    fn into_part(self, index: usize) -> UploadPart {
        UploadPart {
            field: "files".to_string(),
            file_name: self.file_name.unwrap_or_else(|| format!("file_{index}.jpg")),
            mime: self.mime.unwrap_or_else(|| DEFAULT_MIME.to_string()),
            bytes: self.bytes,
        }
    }
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        "heic" => Some("image/heic"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OcrApi<'a> {
    client: &'a AuthenticatedApiClient,
}

impl<'a> OcrApi<'a> {
    pub fn new(client: &'a AuthenticatedApiClient) -> Self {
        Self { client }
    }

    /// `POST /ocr/get-text` with one `files` part per image. With a
    /// `collection_id` the created records are filed there.
    ///
    /// # Errors
    /// Returns `ApiError::Config` for an empty file list, otherwise the
    /// request's error.
    pub async fn extract_text(
        &self,
        files: Vec<UploadFile>,
        collection_id: Option<i64>,
    ) -> Result<Value, ApiError> {
        if files.is_empty() {
            return Err(ApiError::Config("no files to upload".to_string()));
        }

        let parts: Vec<UploadPart> =
            files.into_iter().enumerate().map(|(i, file)| file.into_part(i)).collect();
        debug!(files = parts.len(), ?collection_id, "Uploading images for OCR");

        let mut options = RequestOptions::default();
        if let Some(id) = collection_id {
            options = options.query("collection_id", id);
        }

        self.client
            .request(Method::POST, "/ocr/get-text", Some(RequestBody::Multipart(parts)), options)
            .await?
            .json()
    }
}
