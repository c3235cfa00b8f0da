//! Error types for DAP operations

use crate::protocol::Response;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Text of the failure synthesized for requests on a closed connection
pub const CLOSED_MESSAGE: &str = "debug session is closed";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The adapter answered with `success: false`
    #[error("{}", failure_text(.0))]
    Rejected(Box<Response>),

    /// No response arrived within the request timeout
    #[error("{}", failure_text(.0))]
    Timeout(Box<Response>),

    /// The connection closed before a response arrived, or was already closed
    #[error("{}", failure_text(.0))]
    Closed(Box<Response>),

    /// DAP framing violations
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON parsing and deserialization failures
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    /// Process I/O, socket and channel failures
    #[error("Adapter communication error: {0}")]
    Communication(String),

    /// Subscribing on a disposed connection (carries the session id)
    #[error("the debug session connection is disposed, id: {0}")]
    Disposed(String),
}

fn failure_text(response: &Response) -> String {
    match &response.message {
        Some(message) if !message.is_empty() => message.clone(),
        _ => format!("'{}' request failed", response.command),
    }
}

impl Error {
    /// The failure response for `Rejected`, `Timeout` and `Closed`.
    ///
    /// Timeouts and closures carry a synthesized response shaped like an
    /// adapter failure, so callers can treat all three alike.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Error::Rejected(response) | Error::Timeout(response) | Error::Closed(response) => {
                Some(response)
            }
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Closed(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidMessage(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Communication(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Error::Protocol(format!("Invalid UTF-8: {}", err))
    }
}

impl From<Error> for dapctl_core::Error {
    fn from(err: Error) -> Self {
        dapctl_core::Error::Adapter(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_displays_adapter_message() {
        let err = Error::Rejected(Box::new(Response::error(3, 2, "launch", "program not found")));
        assert_eq!(err.to_string(), "program not found");
        assert_eq!(err.response().map(|r| r.request_seq), Some(2));
    }

    #[test]
    fn test_failure_without_message_names_command() {
        let mut response = Response::error(3, 2, "evaluate", "");
        response.message = None;
        assert_eq!(Error::Rejected(Box::new(response)).to_string(), "'evaluate' request failed");
    }

    #[test]
    fn test_closed_is_distinguishable() {
        let err = Error::Closed(Box::new(Response::error(0, 7, "threads", CLOSED_MESSAGE)));
        assert!(err.is_closed());
        assert!(!err.is_timeout());
        assert_eq!(err.to_string(), CLOSED_MESSAGE);
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json");
        let err: Error = json_err.unwrap_err().into();
        assert!(matches!(err, Error::InvalidMessage(_)));
    }

    #[test]
    fn test_into_core_error() {
        let err: dapctl_core::Error = Error::Communication("broken pipe".into()).into();
        assert_eq!(err.code(), dapctl_core::ErrorCode::AdapterError);
    }
}
