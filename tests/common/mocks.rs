//! Mock wiring for test fixtures.
//!
//! Re-exports the mocks from `trackdeck::adapters::mock` and builds
//! registries around them.

pub use trackdeck::adapters::mock::{LiveStream, MockHttpClient, MockResponse};

use std::sync::Arc;

use bytes::Bytes;
use trackdeck::adapters::InMemoryCache;
use trackdeck::config::TransferConfig;
use trackdeck::transfer::SessionRegistry;

/// Base URL the mock registries are configured with.
#[allow(dead_code)]
pub const MOCK_BASE_URL: &str = "http://mock.test";

/// Download URL for [`MOCK_BASE_URL`].
#[allow(dead_code)]
pub fn mock_download_url() -> String {
    format!("{}/api/transfers/download", MOCK_BASE_URL)
}

/// Response serving `body` split into chunks of `chunk_size` bytes.
#[allow(dead_code)]
pub fn chunked(body: &str, chunk_size: usize) -> MockResponse {
    let chunks = body
        .as_bytes()
        .chunks(chunk_size.max(1))
        .map(Bytes::copy_from_slice)
        .collect();
    MockResponse::Stream(chunks)
}

/// A registry over `client` with a fresh cache, returned alongside it.
#[allow(dead_code)]
pub fn mock_registry(client: &MockHttpClient) -> (SessionRegistry, InMemoryCache) {
    let cache = InMemoryCache::new();
    let registry = SessionRegistry::new(
        Arc::new(client.clone()),
        Arc::new(cache.clone()),
        TransferConfig::new().with_base_url(MOCK_BASE_URL),
    );
    (registry, cache)
}
