use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Lexical ranking failed: {0}")]
    Lexical(String),

    #[error("Judge call failed: {0}")]
    Judge(String),

    #[error("No candidates survived thresholding for query {0}")]
    EmptyShortlist(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
