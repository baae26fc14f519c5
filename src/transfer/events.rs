//! Transfer stream event types.
//!
//! The stream body is newline-delimited JSON, one object per line, tagged by
//! its `type` field:
//!
//! ```text
//! {"type":"Started"}
//! {"type":"Progress","bytes_downloaded":1048576,"total_bytes":10485760}
//! {"type":"Completed"}
//! {"type":"Failed","message":"connection reset"}
//! ```

use serde::{Deserialize, Serialize};

/// One event reported by the remote side for a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransferEvent {
    /// Transfer accepted by the remote side
    Started,
    /// Bytes received so far out of the authoritative total
    Progress {
        #[serde(rename = "bytes_downloaded")]
        bytes_transferred: u64,
        total_bytes: u64,
    },
    /// Terminal success
    Completed,
    /// Terminal failure with a displayable reason
    Failed { message: String },
}

impl TransferEvent {
    /// Wire name of the event, as found in the `type` field.
    pub fn event_type_name(&self) -> &'static str {
        match self {
            TransferEvent::Started => "Started",
            TransferEvent::Progress { .. } => "Progress",
            TransferEvent::Completed => "Completed",
            TransferEvent::Failed { .. } => "Failed",
        }
    }

    /// All wire names the parser understands.
    pub const KNOWN_TYPES: [&'static str; 4] = ["Started", "Progress", "Completed", "Failed"];
}

/// Errors from turning a framed line into a [`TransferEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventParseError {
    /// The line is not valid JSON
    InvalidJson(String),
    /// Valid JSON, but not an object with a string `type` field
    MissingType,
    /// The `type` field names no known event
    UnknownEventType(String),
    /// Known event type with a payload of the wrong shape
    InvalidPayload { event_type: String, source: String },
}

impl std::fmt::Display for EventParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventParseError::InvalidJson(source) => write!(f, "Invalid JSON: {}", source),
            EventParseError::MissingType => write!(f, "Missing event type"),
            EventParseError::UnknownEventType(t) => write!(f, "Unknown event type: {}", t),
            EventParseError::InvalidPayload { event_type, source } => {
                write!(f, "Invalid payload for event '{}': {}", event_type, source)
            }
        }
    }
}

impl std::error::Error for EventParseError {}
