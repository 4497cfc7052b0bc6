#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("frame \"type\" field is not a string")]
    InvalidType,

    #[error("invalid {tag:?} payload: {reason}")]
    InvalidPayload { tag: String, reason: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
