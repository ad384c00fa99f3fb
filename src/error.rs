//! Error taxonomy for request handling.
//!
//! Every handler returns `Result<HttpResponse, DebuggerError>`.  The router
//! converts the error into a JSON response via [`DebuggerError::status`] and
//! records everything except [`DebuggerError::NotFound`] into the error log,
//! keyed by [`DebuggerError::kind`].

use serde_json::error::Category;

/// Errors surfaced by the store, the request parser and the handlers.
#[derive(Debug, thiserror::Error)]
pub enum DebuggerError {
    #[error("snapshot not found: {id}")]
    NotFound { id: String },

    #[error("malformed request: {reason}")]
    MalformedRequest { reason: String },

    #[error("{detail}")]
    MissingField { detail: String },

    #[error("{detail}")]
    InvalidType { detail: String },

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DebuggerError {
    pub fn not_found(id: impl Into<String>) -> Self {
        DebuggerError::NotFound { id: id.into() }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        DebuggerError::MalformedRequest {
            reason: reason.into(),
        }
    }

    /// Classify a body deserialization failure.
    ///
    /// Data errors mentioning a missing field become `MissingField`, other
    /// data errors `InvalidType`; syntax and EOF errors are `MalformedRequest`.
    pub fn from_body(err: serde_json::Error) -> Self {
        let detail = err.to_string();
        match err.classify() {
            Category::Data if detail.starts_with("missing field") => {
                DebuggerError::MissingField { detail }
            }
            Category::Data => DebuggerError::InvalidType { detail },
            Category::Syntax | Category::Eof | Category::Io => {
                DebuggerError::MalformedRequest { reason: detail }
            }
        }
    }

    /// Stable taxonomic name, used as `error_type` in the error log.
    pub fn kind(&self) -> &'static str {
        match self {
            DebuggerError::NotFound { .. } => "NotFound",
            DebuggerError::MalformedRequest { .. } => "MalformedRequest",
            DebuggerError::MissingField { .. } => "MissingField",
            DebuggerError::InvalidType { .. } => "InvalidType",
            DebuggerError::PayloadTooLarge { .. } => "PayloadTooLarge",
            DebuggerError::Io(_) => "Io",
            DebuggerError::Serialization(_) => "Serialization",
        }
    }

    /// HTTP status code for the error response.
    pub fn status(&self) -> u16 {
        match self {
            DebuggerError::NotFound { .. } => 404,
            DebuggerError::MalformedRequest { .. }
            | DebuggerError::MissingField { .. }
            | DebuggerError::InvalidType { .. } => 400,
            DebuggerError::PayloadTooLarge { .. } => 413,
            DebuggerError::Io(_) | DebuggerError::Serialization(_) => 500,
        }
    }

    /// Message placed in the `error` field of the JSON response body.
    ///
    /// Internal failures are not echoed back to the client; the full message
    /// is available through `/debug/errors`.
    pub fn public_message(&self) -> String {
        match self {
            DebuggerError::NotFound { .. } => "Snapshot not found".to_string(),
            DebuggerError::Io(_) | DebuggerError::Serialization(_) => {
                "Internal error".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Whether the router should record this error into the error log.
    pub fn is_recorded(&self) -> bool {
        !matches!(self, DebuggerError::NotFound { .. })
    }
}
