/// Errors raised while wiring or driving a document
#[derive(Debug, thiserror::Error)]
pub enum FtokenError {
    #[error("Form not found: {0}")]
    UnknownForm(String),

    #[error("Token field not found: {0}")]
    UnknownTokenField(String),

    #[error("Key field not found: {0}")]
    UnknownKeyField(String),

    #[error("Invalid URL base for token field {field}: {reason}")]
    InvalidUrlBase { field: String, reason: String },

    #[error("Invalid document layout: {0}")]
    Layout(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Controller is no longer running")]
    ControllerClosed,
}

/// Errors reported by a token fetcher
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Issuing endpoint returned HTTP {0}")]
    Status(u16),

    #[error("Malformed token response: {0}")]
    Decode(String),
}

/// Result type alias for library operations
pub type FtokenResult<T> = Result<T, FtokenError>;
