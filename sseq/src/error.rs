use thiserror::Error;

/// Failures surfaced by document loading, storage, and settings.
///
/// Ordinary invalid edits never land here: they answer with a dummy
/// sentinel and a logged diagnostic instead.
#[derive(Debug, Error)]
pub enum SseqError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error("limit exceeded: {what} > {max}")]
    LimitExceeded { what: &'static str, max: usize },
    #[error("value out of bounds: {0}")]
    OutOfBounds(String),
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SseqError {
    /// Stable machine-readable code, used by the wasm bridge's error objects.
    pub fn code(&self) -> &'static str {
        match self {
            SseqError::Json(_) => "json_parse",
            SseqError::InvalidDocument(_) => "invalid_structure",
            SseqError::LimitExceeded { .. } => "caps_exceeded",
            SseqError::OutOfBounds(_) => "out_of_bounds",
            SseqError::NotFound(_) => "not_found",
            SseqError::Io(_) => "io",
        }
    }
}
