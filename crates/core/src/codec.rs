//! Base64 transport codec for artifacts and uploaded input images.
//!
//! Job payloads carry binary data as standard (padded) base64 text.

use base64::{engine::general_purpose, Engine as _};

use crate::error::CoreError;

/// Encode raw bytes as standard base64.
pub fn encode(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// Decode standard base64 text.
///
/// Surrounding whitespace is ignored; anything else that is not valid
/// base64 is a [`CoreError::Validation`].
pub fn decode(text: &str) -> Result<Vec<u8>, CoreError> {
    general_purpose::STANDARD
        .decode(text.trim())
        .map_err(|e| CoreError::Validation(format!("invalid base64 payload: {e}")))
}
