//! HTTP transport trait abstraction.
//!
//! The transfer core only needs one thing from the network: issue a POST and
//! get back the response body as a stream of byte chunks. Keeping that behind
//! a trait lets the session code run against reqwest in production and a
//! scripted mock in tests.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;

/// HTTP headers represented as a key-value map.
pub type Headers = HashMap<String, String>;

/// A response body delivered incrementally.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, HttpError>> + Send>>;

/// HTTP client errors.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpError {
    /// Connection failed
    ConnectionFailed(String),
    /// Request timeout
    Timeout(String),
    /// Server returned an error status
    ServerError { status: u16, message: String },
    /// IO error while reading the body
    Io(String),
    /// Invalid URL
    InvalidUrl(String),
    /// Other error
    Other(String),
}

impl HttpError {
    /// Text suitable for showing to a user as the reason a transfer failed.
    ///
    /// Server rejections carry the remote side's own explanation, so the body
    /// text is preferred over the generic variant description.
    pub fn display_message(&self) -> String {
        match self {
            HttpError::ServerError { status, message } if message.trim().is_empty() => {
                format!("HTTP {}", status)
            }
            HttpError::ServerError { status, message } => {
                format!("HTTP {}: {}", status, message.trim())
            }
            other => other.to_string(),
        }
    }
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            HttpError::Timeout(msg) => write!(f, "Request timeout: {}", msg),
            HttpError::ServerError { status, message } => {
                write!(f, "Server error ({}): {}", status, message)
            }
            HttpError::Io(msg) => write!(f, "IO error: {}", msg),
            HttpError::InvalidUrl(msg) => write!(f, "Invalid URL: {}", msg),
            HttpError::Other(msg) => write!(f, "HTTP error: {}", msg),
        }
    }
}

impl std::error::Error for HttpError {}

/// Trait for the streaming transport used by transfer sessions.
///
/// # Example
///
/// ```ignore
/// use trackdeck::traits::{HttpClient, Headers};
/// use futures_util::StreamExt;
///
/// async fn dump<C: HttpClient>(client: &C) -> Result<(), HttpError> {
///     let mut body = client.post_stream("http://host/api", "{}", &Headers::new()).await?;
///     while let Some(chunk) = body.next().await {
///         println!("{} bytes", chunk?.len());
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform a POST request and return the body as a byte stream.
    ///
    /// A non-success status must be reported as [`HttpError::ServerError`]
    /// carrying the response body text, without yielding a stream. Dropping
    /// the returned stream releases the underlying connection.
    async fn post_stream(
        &self,
        url: &str,
        body: &str,
        headers: &Headers,
    ) -> Result<ByteStream, HttpError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display() {
        assert_eq!(
            HttpError::ConnectionFailed("refused".to_string()).to_string(),
            "Connection failed: refused"
        );
        assert_eq!(
            HttpError::Timeout("30s".to_string()).to_string(),
            "Request timeout: 30s"
        );
        assert_eq!(
            HttpError::ServerError {
                status: 500,
                message: "Internal Error".to_string()
            }
            .to_string(),
            "Server error (500): Internal Error"
        );
        assert_eq!(
            HttpError::Io("read failed".to_string()).to_string(),
            "IO error: read failed"
        );
    }

    #[test]
    fn test_display_message_prefers_server_text() {
        let err = HttpError::ServerError {
            status: 404,
            message: "peer offline\n".to_string(),
        };
        assert_eq!(err.display_message(), "HTTP 404: peer offline");
    }

    #[test]
    fn test_display_message_empty_body() {
        let err = HttpError::ServerError {
            status: 503,
            message: "  ".to_string(),
        };
        assert_eq!(err.display_message(), "HTTP 503");
    }

    #[test]
    fn test_display_message_other_variants() {
        let err = HttpError::Io("connection reset".to_string());
        assert_eq!(err.display_message(), "IO error: connection reset");
    }
}
