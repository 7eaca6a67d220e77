//! Error Types
//!
//! Startup-phase failures are `ServerError` and abort the process. Failures
//! inside a tool handler are `ToolError`; they are reported back to the caller
//! as an error tool result and never take the server down.

/// Result type for server startup and request plumbing.
pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// A required setting is missing or a value does not parse.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The secret store could not be reached or refused the request.
    #[error("failed to fetch secret '{secret_id}': {reason}")]
    CredentialFetch { secret_id: String, reason: String },

    /// The secret payload is not a well-formed credentials document.
    #[error("malformed credentials payload: {0}")]
    CredentialParse(String),

    /// A tool with the same name is already registered.
    #[error("tool '{0}' is already registered")]
    Registration(String),

    /// Missing, malformed or rejected bearer token.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The HTTP session table is unusable (a holder of its lock panicked).
    #[error("session store unavailable: {0}")]
    Session(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }
}

/// Errors raised by tool handlers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The tool needs a caller identity and none was authenticated.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Failed(String),
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidArguments(err.to_string())
    }
}
