//! trackdeck - follow streaming download progress
//!
//! A download endpoint answers with newline-delimited JSON events. This crate
//! turns that byte stream into a published [`TransferState`] per transfer,
//! shared by any number of observers.
//!
//! [`TransferState`]: transfer::TransferState

pub mod adapters;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod traits;
pub mod transfer;
