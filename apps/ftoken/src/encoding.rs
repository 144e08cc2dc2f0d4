//! Hashing and URL-safe encoding helpers.
//!
//! All functions are pure. Only [`request_identifier`] takes part in the
//! renewal flow; the base64url variants are exposed for other consumers
//! (the issuing server signs tokens with the same encoding).

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};

/// Lower-case hex SHA-256 digest of a string
pub fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

/// SHA-256 digest of a string, base64url encoded without padding
pub fn sbase64url_sha256(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// UTF-8 bytes of a string, base64url encoded without padding
pub fn sbase64url_encode(value: &str) -> String {
    URL_SAFE_NO_PAD.encode(value.as_bytes())
}

/// Request identifier for a key value: hex digest of the trimmed value
pub fn request_identifier(key_value: &str) -> String {
    sha256_hex(key_value.trim())
}
