//! CLI module for trackdeck.
//!
//! Argument parsing and the progress line printed for each published state.
//! The binary wires these to a [`SessionRegistry`](crate::transfer::SessionRegistry).

pub mod args;
pub mod version;

pub use args::{parse_args, ArgsError, CliCommand, DownloadArgs, USAGE};
pub use version::{version_line, VERSION};

use crate::transfer::{TransferState, TransferStatus};

/// One line of progress output for `state`.
pub fn progress_line(state: &TransferState) -> String {
    match state.status {
        TransferStatus::Idle => "waiting for transfer to start".to_string(),
        TransferStatus::Downloading if state.total_bytes == 0 => {
            format!("downloading: {} bytes", state.bytes_transferred)
        }
        TransferStatus::Downloading => format!(
            "downloading: {:>3}% ({}/{} bytes)",
            state.percent, state.bytes_transferred, state.total_bytes
        ),
        TransferStatus::Completed => format!("completed ({} bytes)", state.bytes_transferred),
        TransferStatus::Failed => format!(
            "failed: {}",
            state.error.as_deref().unwrap_or("unknown error")
        ),
    }
}
