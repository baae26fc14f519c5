//! Transfer identity, request and published state types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one transfer: which peer, which file, under which token.
///
/// Used as the cache and subscription key. Two requests with the same tuple
/// refer to the same logical session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferIdentity {
    /// Remote peer (username) serving the file
    pub peer_id: String,
    /// Token the peer assigned to this transfer
    pub resource_token: String,
    /// Remote file name
    pub resource_name: String,
}

impl TransferIdentity {
    pub fn new(
        peer_id: impl Into<String>,
        resource_token: impl Into<String>,
        resource_name: impl Into<String>,
    ) -> Self {
        Self {
            peer_id: peer_id.into(),
            resource_token: resource_token.into(),
            resource_name: resource_name.into(),
        }
    }
}

impl fmt::Display for TransferIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} ({})",
            self.peer_id, self.resource_name, self.resource_token
        )
    }
}

/// A request to start streaming progress for one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub identity: TransferIdentity,
    /// Client-side size hint, replaced by the first authoritative total.
    pub expected_size: u64,
}

impl TransferRequest {
    pub fn new(identity: TransferIdentity, expected_size: u64) -> Self {
        Self {
            identity,
            expected_size,
        }
    }
}

/// Body of the POST that opens a transfer stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequestBody {
    pub username: String,
    pub filename: String,
    pub size: u64,
    pub token: String,
}

impl From<&TransferRequest> for DownloadRequestBody {
    fn from(request: &TransferRequest) -> Self {
        Self {
            username: request.identity.peer_id.clone(),
            filename: request.identity.resource_name.clone(),
            size: request.expected_size,
            token: request.identity.resource_token.clone(),
        }
    }
}

/// Lifecycle status of a transfer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Idle,
    Downloading,
    Completed,
    Failed,
}

impl TransferStatus {
    /// Completed and Failed absorb every further event for the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Idle => "Idle",
            TransferStatus::Downloading => "Downloading",
            TransferStatus::Completed => "Completed",
            TransferStatus::Failed => "Failed",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The externally observed progress of one transfer.
///
/// Only the reducer produces new values; observers read snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferState {
    pub status: TransferStatus,
    /// Integer percentage in `0..=100`
    pub percent: u8,
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    pub error: Option<String>,
}

impl TransferState {
    /// Initial state for a new session, scaled to the caller's size hint.
    pub fn seeded(expected_size: u64) -> Self {
        Self {
            status: TransferStatus::Idle,
            percent: 0,
            bytes_transferred: 0,
            total_bytes: expected_size,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl Default for TransferState {
    fn default() -> Self {
        Self::seeded(0)
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}% ({}/{} bytes)",
            self.status, self.percent, self.bytes_transferred, self.total_bytes
        )?;
        if let Some(ref error) = self.error {
            write!(f, ": {}", error)?;
        }
        Ok(())
    }
}

/// Integer percentage of `bytes` over `total`, rounded half up and capped at 100.
pub fn percent_of(bytes: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let rounded = (200 * bytes as u128 + total as u128) / (2 * total as u128);
    rounded.min(100) as u8
}
