use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("input truncated")]
    Truncated,

    #[error("invalid field: {0}")]
    InvalidField(&'static str),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
