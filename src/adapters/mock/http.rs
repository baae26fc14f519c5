//! Mock HTTP client for testing.
//!
//! Serves scripted byte streams per URL and records every request, so tests
//! can check how many connections a session opened and what it sent.

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::traits::{ByteStream, Headers, HttpClient, HttpError};

/// A recorded HTTP request for verification in tests.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method
    pub method: String,
    /// Request URL
    pub url: String,
    /// Request headers
    pub headers: Headers,
    /// Request body
    pub body: Option<String>,
}

type LiveReceiver = mpsc::UnboundedReceiver<Result<Bytes, HttpError>>;

/// Configuration for a mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Serve these chunks, then end the body
    Stream(Vec<Bytes>),
    /// Serve these chunks, then fail the read
    StreamThenError(Vec<Bytes>, HttpError),
    /// Fail to open the request
    Error(HttpError),
    /// Serve whatever a [`LiveStream`] feeds, until it is dropped
    Live(Arc<Mutex<Option<LiveReceiver>>>),
    /// Never finish opening the request
    Pending,
}

/// Test-side handle feeding a [`MockResponse::Live`] body.
#[derive(Debug, Clone)]
pub struct LiveStream {
    tx: mpsc::UnboundedSender<Result<Bytes, HttpError>>,
}

impl LiveStream {
    /// Create a feeder and the response that serves it.
    pub fn new() -> (Self, MockResponse) {
        let (tx, rx) = mpsc::unbounded();
        (Self { tx }, MockResponse::Live(Arc::new(Mutex::new(Some(rx)))))
    }

    /// Send raw bytes. Returns `false` once the consumer has dropped the body.
    pub fn send_bytes(&self, bytes: impl Into<Bytes>) -> bool {
        self.tx.unbounded_send(Ok(bytes.into())).is_ok()
    }

    /// Send one newline-terminated line.
    pub fn send_line(&self, line: &str) -> bool {
        self.send_bytes(format!("{}\n", line))
    }

    /// Fail the consumer's next read.
    pub fn fail(&self, err: HttpError) -> bool {
        self.tx.unbounded_send(Err(err)).is_ok()
    }

    /// End the body cleanly.
    pub fn finish(&self) {
        self.tx.close_channel();
    }

    /// True once the consumer dropped the body, i.e. released the connection.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Mock HTTP client for testing.
///
/// # Example
///
/// ```ignore
/// use trackdeck::adapters::mock::{MockHttpClient, MockResponse};
///
/// let client = MockHttpClient::new();
/// client.set_response(
///     "http://test/api/transfers/download",
///     MockResponse::Stream(vec![Bytes::from("{\"type\":\"Completed\"}\n")]),
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockHttpClient {
    /// Configured responses by URL
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    /// Response when no URL matches
    default_response: Arc<Mutex<Option<MockResponse>>>,
    /// Recorded requests for verification
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockHttpClient {
    /// Create a new mock HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a response for a specific URL (exact or prefix match).
    pub fn set_response(&self, url: &str, response: MockResponse) {
        let mut responses = self.responses.lock().unwrap();
        responses.insert(url.to_string(), response);
    }

    /// Set a default response for URLs without specific matches.
    pub fn set_default_response(&self, response: MockResponse) {
        let mut default = self.default_response.lock().unwrap();
        *default = Some(response);
    }

    /// Get all recorded requests.
    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests made so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Clear all recorded requests.
    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }

    fn record_request(&self, method: &str, url: &str, headers: &Headers, body: Option<String>) {
        let mut requests = self.requests.lock().unwrap();
        requests.push(RecordedRequest {
            method: method.to_string(),
            url: url.to_string(),
            headers: headers.clone(),
            body,
        });
    }

    fn get_response(&self, url: &str) -> Option<MockResponse> {
        let responses = self.responses.lock().unwrap();

        if let Some(response) = responses.get(url) {
            return Some(response.clone());
        }

        for (pattern, response) in responses.iter() {
            if url.starts_with(pattern) {
                return Some(response.clone());
            }
        }

        let default = self.default_response.lock().unwrap();
        default.clone()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn post_stream(
        &self,
        url: &str,
        body: &str,
        headers: &Headers,
    ) -> Result<ByteStream, HttpError> {
        self.record_request("POST", url, headers, Some(body.to_string()));

        match self.get_response(url) {
            Some(MockResponse::Stream(chunks)) => {
                let stream = futures::stream::iter(chunks.into_iter().map(Ok));
                Ok(Box::pin(stream))
            }
            Some(MockResponse::StreamThenError(chunks, err)) => {
                let items = chunks
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(err)));
                Ok(Box::pin(futures::stream::iter(items)))
            }
            Some(MockResponse::Error(err)) => Err(err),
            Some(MockResponse::Live(receiver)) => match receiver.lock().unwrap().take() {
                Some(rx) => Ok(Box::pin(rx)),
                None => Err(HttpError::Other(
                    "Live stream already consumed".to_string(),
                )),
            },
            Some(MockResponse::Pending) => futures::future::pending().await,
            None => Err(HttpError::Other(format!("No mock response for URL: {}", url))),
        }
    }
}
