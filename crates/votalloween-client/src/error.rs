use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure: DNS, connect, timeout, or a broken response body.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Server returned {status}: {message}")]
    Api { status: u16, message: String },

    /// A vote batch was sent but no answer came back. The votes may or may
    /// not have been recorded; check the device's status before resubmitting.
    #[error("Vote submission outcome unknown, check vote status before retrying: {0}")]
    AmbiguousSubmission(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot determine a data directory for this platform")]
    NoDataDir,
}

impl ClientError {
    /// Network-level failures and server-side (5xx) errors are worth another
    /// attempt; client errors (4xx) never are.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status of an API error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
