//! Structured diagnostics for transfer sessions.
//!
//! Sessions report what they did (started, skipped a malformed line, changed
//! state, ended) as [`DiagnosticEvent`]s on a tokio broadcast channel. Any
//! number of consumers can subscribe; when nobody listens the events are
//! simply dropped. These complement the `tracing` log lines with values a
//! program can inspect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::transfer::{TransferIdentity, TransferStatus};

/// Type alias for the diagnostics sender.
pub type DiagnosticSender = broadcast::Sender<DiagnosticEvent>;

/// Create a new diagnostics channel with the specified capacity.
pub fn create_diagnostic_channel(
    capacity: usize,
) -> (DiagnosticSender, broadcast::Receiver<DiagnosticEvent>) {
    broadcast::channel(capacity)
}

/// A single diagnostic record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// Session that produced the event
    pub session_id: Option<String>,
    /// Transfer the session belongs to
    pub identity: Option<TransferIdentity>,
    pub kind: DiagnosticKind,
}

/// The specific kind of diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A pump was spawned and is opening the connection
    SessionStarted { expected_size: u64 },
    /// A framed line could not be parsed and was ignored
    LineSkipped { line: String, reason: String },
    /// A new state was published
    StateChanged { status: TransferStatus, percent: u8 },
    /// The pump stopped
    SessionEnded { reason: SessionEndReason },
}

/// Why a pump stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEndReason {
    Completed,
    Failed,
    Cancelled,
}

/// Emitter bound to one session, so call sites only supply the kind.
#[derive(Debug, Clone)]
pub struct DiagnosticScope {
    sender: Option<DiagnosticSender>,
    session_id: String,
    identity: TransferIdentity,
}

impl DiagnosticScope {
    pub fn new(
        sender: Option<DiagnosticSender>,
        session_id: impl Into<String>,
        identity: TransferIdentity,
    ) -> Self {
        Self {
            sender,
            session_id: session_id.into(),
            identity,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn identity(&self) -> &TransferIdentity {
        &self.identity
    }

    pub fn emit(&self, kind: DiagnosticKind) {
        let Some(ref sender) = self.sender else {
            return;
        };
        // No receivers is not an error worth reporting.
        let _ = sender.send(DiagnosticEvent {
            timestamp: Utc::now(),
            session_id: Some(self.session_id.clone()),
            identity: Some(self.identity.clone()),
            kind,
        });
    }
}

/// Truncate long lines before they are copied into a diagnostic.
pub(crate) fn preview(line: &str, max_chars: usize) -> String {
    if line.chars().count() <= max_chars {
        return line.to_string();
    }
    let mut cut: String = line.chars().take(max_chars).collect();
    cut.push('…');
    cut
}
