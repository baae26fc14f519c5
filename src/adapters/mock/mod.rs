//! Mock implementations for testing.
//!
//! Enables session tests without network access.
//!
//! # Available Mocks
//!
//! - [`MockHttpClient`] - Transport with scripted or live-fed byte streams

pub mod http;

pub use http::{LiveStream, MockHttpClient, MockResponse, RecordedRequest};
