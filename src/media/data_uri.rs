//! `data:<mime>;base64,<payload>` encoding.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::MediaError;

/// MIME type used when the caller gives none.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// A decoded data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Encode `bytes` as a base64 data URI. MIME parameters are kept, with the
/// whitespace around them removed.
pub fn encode(mime_type: &str, bytes: &[u8]) -> String {
    let parts: Vec<&str> = mime_type
        .split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    let mime_type = match parts.first() {
        Some(essence) if essence.contains('/') => parts.join(";"),
        _ => DEFAULT_MIME_TYPE.to_string(),
    };
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

/// Parse a base64 data URI. Percent-encoded (non-base64) URIs are rejected.
pub fn parse(uri: &str) -> Result<DataUri, MediaError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| MediaError::InvalidDataUri("missing data: scheme".into()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| MediaError::InvalidDataUri("missing payload separator".into()))?;
    let mime_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| MediaError::InvalidDataUri("payload is not base64".into()))?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| MediaError::InvalidDataUri(e.to_string()))?;

    Ok(DataUri {
        mime_type: if mime_type.is_empty() {
            DEFAULT_MIME_TYPE.to_string()
        } else {
            mime_type.to_string()
        },
        bytes,
    })
}
