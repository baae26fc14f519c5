//! Concrete implementations of trait abstractions.
//!
//! # Adapters
//!
//! - [`ReqwestHttpClient`] - HTTP transport using reqwest
//! - [`InMemoryCache`] - Published-state cache for the composition root
//!
//! # Mock Implementations
//!
//! The [`mock`] submodule provides test doubles:
//! - [`mock::MockHttpClient`] - Scripted and live-fed response bodies

pub mod memory_cache;
pub mod mock;
pub mod reqwest_http;

pub use memory_cache::InMemoryCache;
pub use mock::MockHttpClient;
pub use reqwest_http::ReqwestHttpClient;
