use thiserror::Error;

/// Error taxonomy propagated to HTTP callers (spec §7).
///
/// Each variant maps to exactly one HTTP status at the API edge; internal
/// crates construct these directly instead of routing everything through
/// `anyhow`, so the edge never has to guess a status code from a string.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("bad request: {message}")]
    BadRequest { message: String, hint: Option<String> },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into(), hint: None }
    }

    pub fn bad_request_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into(), hint: Some(hint.into()) }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::BadRequest { .. } => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::BadRequest { hint, .. } => hint.as_deref(),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for BridgeError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
