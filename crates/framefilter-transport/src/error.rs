//! Error types for the transport module.

use thiserror::Error;

/// Errors that can occur while talking to the processing service.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Invalid service URL.
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),

    /// Service answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection, DNS, TLS or timeout failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Successful response without an image.
    #[error("Empty response body")]
    EmptyResponse,

    /// Processed image exceeds the configured cap.
    #[error("Response exceeds {0} bytes")]
    ResponseTooLarge(usize),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// HTTP status code, if the service answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => {
                let body = response.into_string().unwrap_or_default();
                Self::Status {
                    status,
                    body: body.trim().to_string(),
                }
            }
            ureq::Error::Transport(transport) => Self::Network(transport.to_string()),
        }
    }
}
