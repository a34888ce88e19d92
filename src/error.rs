use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Transport error: {0}")]
    Transport(String),
    /// A 200 response whose body does not have the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Session error: {0}")]
    Session(String),
    #[error("Host error: {0}")]
    Host(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn is_decode(&self) -> bool {
        matches!(self, AppError::Decode(_) | AppError::Json(_))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AppError::Decode(e.to_string())
        } else {
            AppError::Transport(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Failure to resolve a single slot value from a sample. Never fatal to a tick.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingError {
    #[error("field '{0}' missing from sample")]
    MissingField(String),
    #[error("field '{field}' is not {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },
    #[error("no label defined for status code {0}")]
    UnknownStatusCode(i64),
}
