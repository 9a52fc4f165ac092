//! # Cursor Utilities
//!
//! Opaque pagination cursors over backend-native record ids. A cursor is
//! the base64 encoding of the id it continues from and carries no other
//! meaning; it is not an offset.

use base64::Engine;
use thiserror::Error;

/// Errors produced while decoding a caller-supplied cursor.
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("cursor cannot be empty")]
    Empty,
    #[error("cursor is not valid base64")]
    InvalidEncoding,
    #[error("cursor contains invalid UTF-8 data")]
    InvalidUtf8,
}

/// Encode a backend-native record id as an opaque cursor.
pub fn encode_cursor(native_id: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(native_id.as_bytes())
}

/// Decode an opaque cursor back to the backend-native record id.
///
/// Malformed cursors are rejected instead of degrading to an empty id
/// that the backend query would silently fail to match.
pub fn decode_cursor(cursor: &str) -> Result<String, CursorError> {
    if cursor.is_empty() {
        return Err(CursorError::Empty);
    }

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(cursor)
        .map_err(|_| CursorError::InvalidEncoding)?;

    if decoded.is_empty() {
        return Err(CursorError::Empty);
    }

    String::from_utf8(decoded).map_err(|_| CursorError::InvalidUtf8)
}
