use crate::traits::error::{Result, SpeechError};
use uuid::Uuid;

/// Fresh random id, 32 lowercase hex digits without separators
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Normalise a caller supplied request id to 32 lowercase hex digits
///
/// Accepts any textual UUID form the `uuid` crate understands (hyphenated,
/// simple, braced, urn).
pub fn normalize_request_id(input: &str) -> Result<String> {
    Uuid::parse_str(input.trim())
        .map(|id| id.simple().to_string())
        .map_err(|e| SpeechError::InvalidRequestId(format!("{}: {}", input, e)))
}
