//! Application constants
//!
//! Storage identifiers and API defaults shared by the client crates.

// API defaults
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const PRODUCTION_API_BASE_URL: &str = "https://healthscan-e868bea9b278.herokuapp.com";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

// Keychain service names
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "com.projectsunga.tokens";

// Session file written when the keychain is unavailable or disabled
pub const FALLBACK_STORE_FILE: &str = "session.json";

// Uploads
pub const OCR_UPLOAD_FIELD: &str = "files";
pub const DEFAULT_UPLOAD_MIME: &str = "image/jpeg";
