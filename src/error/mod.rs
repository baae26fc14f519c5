//! Errors that end a transfer session.
//!
//! | Kind | Source | Published as |
//! |------|--------|--------------|
//! | Connect | Opening the request failed or was rejected | `Failed` |
//! | Stream | Reading the body failed mid-transfer | `Failed` |
//! | EndedEarly | Body ended without a terminal event | `Failed` |
//!
//! Malformed lines are not session errors: the parser skips them (see
//! [`EventParseError`](crate::transfer::EventParseError)). None of these are
//! retried automatically; retrying means starting a new session.

use thiserror::Error;

use crate::traits::HttpError;

/// Fatal session error, surfaced to observers as a `Failed` state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransferError {
    /// Could not open the transfer request
    #[error("Could not open transfer: {0}")]
    Connect(#[source] HttpError),

    /// The body read failed after the transfer started
    #[error("Transfer stream failed: {0}")]
    Stream(#[source] HttpError),

    /// The body ended cleanly without a Completed or Failed event
    #[error("Transfer stream ended before completion")]
    EndedEarly,
}

impl TransferError {
    /// Message published in the `Failed` state.
    ///
    /// Prefers the remote side's own wording, since it is the authority on
    /// why a transfer failed.
    pub fn user_message(&self) -> String {
        match self {
            TransferError::Connect(err) | TransferError::Stream(err) => err.display_message(),
            TransferError::EndedEarly => "transfer stream ended before completion".to_string(),
        }
    }
}
