//! Trait abstractions for the collaborators the transfer core depends on.
//!
//! # Traits
//!
//! - [`HttpClient`] - Opens the transfer request and yields the body as bytes
//! - [`TransferCache`] - Keyed published-state cache with subscriptions

pub mod cache;
pub mod http;

pub use cache::{Observer, Subscription, TransferCache};
pub use http::{ByteStream, Headers, HttpClient, HttpError};
