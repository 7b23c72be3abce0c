use std::fmt;

/// Errors surfaced by the posture client.
///
/// Every variant maps onto one [`ErrorKind`] so callers can decide how to
/// react without matching on transport details. Sanitization never produces
/// an error; malformed markup is handled permissively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The server could not be reached or the exchange failed mid-flight.
    Transport(String),
    /// The server answered 401.
    Unauthorized,
    /// The server answered 403.
    Forbidden,
    /// The server answered with another non-success status.
    Status {
        /// HTTP status code
        status: u16,
        /// Short, non-sensitive description
        message: String,
    },
    /// The server sent a mode value that is neither `vuln` nor `secure`.
    InvalidMode(String),
    /// A response body could not be decoded.
    Decode(String),
    /// The credential store failed to read or write.
    Storage(String),
    /// A login or register call is already in flight.
    AuthenticationInProgress,
    /// Configuration could not be loaded.
    Config(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network or server failure; previous state is preserved.
    Transport,
    /// Unauthorized or forbidden response.
    Authentication,
    /// Malformed policy value from the server.
    Policy,
    /// Client-side credential storage failure.
    Storage,
    /// Operation rejected because another one is in flight.
    Busy,
    /// Invalid configuration.
    Config,
}

impl Error {
    /// Returns the taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(_) | Error::Status { .. } | Error::Decode(_) => ErrorKind::Transport,
            Error::Unauthorized | Error::Forbidden => ErrorKind::Authentication,
            Error::InvalidMode(_) => ErrorKind::Policy,
            Error::Storage(_) => ErrorKind::Storage,
            Error::AuthenticationInProgress => ErrorKind::Busy,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// Returns `true` for the 401 signal that triggers session recovery.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Unauthorized)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport(msg) => write!(f, "transport failure: {}", msg),
            Error::Unauthorized => write!(f, "unauthorized"),
            Error::Forbidden => write!(f, "forbidden"),
            Error::Status { status, message } => {
                write!(f, "server returned {}: {}", status, message)
            }
            Error::InvalidMode(value) => write!(f, "invalid security mode '{}'", value),
            Error::Decode(msg) => write!(f, "malformed response: {}", msg),
            Error::Storage(msg) => write!(f, "credential storage failure: {}", msg),
            Error::AuthenticationInProgress => write!(f, "authentication already in progress"),
            Error::Config(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transport => write!(f, "transport"),
            ErrorKind::Authentication => write!(f, "authentication"),
            ErrorKind::Policy => write!(f, "policy"),
            ErrorKind::Storage => write!(f, "storage"),
            ErrorKind::Busy => write!(f, "busy"),
            ErrorKind::Config => write!(f, "config"),
        }
    }
}
