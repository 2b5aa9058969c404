//! Transport encoding of report payloads.
//!
//! Exported documents travel inside HTTP response bodies, so the final
//! bytes are wrapped in standard Base64. Encoding is deterministic and
//! loss-free: `decode(encode(b)) == b` for all `b`.

use base64::engine::general_purpose::STANDARD;
use base64::{DecodeError, Engine as _};

/// Encode document bytes for embedding in a text response body.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a payload produced by [`encode`].
pub fn decode(text: &str) -> Result<Vec<u8>, DecodeError> {
    STANDARD.decode(text)
}
