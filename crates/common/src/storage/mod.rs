//! Local persistence
//!
//! A small file-backed key/value store used as the plain tier for session
//! data. All writes replace the whole file through a temporary file and an
//! atomic rename, so readers observe either the old or the new contents.

pub mod error;
pub mod kv;

pub use error::{StorageError, StorageResult};
pub use kv::FileKeyValueStore;
