//! Business endpoints
//!
//! Thin wrappers over [`AuthenticatedApiClient`]. Payloads are passed
//! through as `serde_json::Value` (or raw bytes for PDFs and QR images);
//! the server owns their shape.

pub mod collections;
pub mod ocr;
pub mod qr;
pub mod records;
pub mod users;

pub use collections::CollectionsApi;
pub use ocr::{OcrApi, UploadFile};
pub use qr::QrApi;
pub use records::{search_records, unorganized_records, RecordsApi};
pub use users::UsersApi;

use super::client::AuthenticatedApiClient;

impl AuthenticatedApiClient {
    pub fn collections(&self) -> CollectionsApi<'_> {
        CollectionsApi::new(self)
    }

    pub fn records(&self) -> RecordsApi<'_> {
        RecordsApi::new(self)
    }

    pub fn ocr(&self) -> OcrApi<'_> {
        OcrApi::new(self)
    }

    pub fn qr(&self) -> QrApi<'_> {
        QrApi::new(self)
    }

    pub fn users(&self) -> UsersApi<'_> {
        UsersApi::new(self)
    }
}
