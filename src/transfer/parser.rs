//! Line-to-event parsing.
//!
//! A corrupt line must not abort an otherwise healthy transfer, so parse
//! failures are values: [`parse_event_line`] returns a `Result`, and the
//! stateful [`EventParser`] turns failures into a logged, counted skip.

use crate::diagnostics::{preview, DiagnosticKind, DiagnosticScope};
use crate::transfer::events::{EventParseError, TransferEvent};

/// Longest excerpt of a rejected line copied into logs and diagnostics.
const SKIPPED_LINE_PREVIEW_CHARS: usize = 200;

/// Parse one framed line into a typed event.
pub fn parse_event_line(line: &str) -> Result<TransferEvent, EventParseError> {
    let value: serde_json::Value = serde_json::from_str(line.trim())
        .map_err(|e| EventParseError::InvalidJson(e.to_string()))?;

    let event_type = value
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or(EventParseError::MissingType)?
        .to_string();

    if !TransferEvent::KNOWN_TYPES.contains(&event_type.as_str()) {
        return Err(EventParseError::UnknownEventType(event_type));
    }

    serde_json::from_value(value).map_err(|e| EventParseError::InvalidPayload {
        event_type,
        source: e.to_string(),
    })
}

/// Parser that skips malformed lines instead of failing.
#[derive(Debug, Default)]
pub struct EventParser {
    diagnostics: Option<DiagnosticScope>,
    skipped: u64,
}

impl EventParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report skipped lines on the given session's diagnostics channel.
    pub fn with_diagnostics(scope: DiagnosticScope) -> Self {
        Self {
            diagnostics: Some(scope),
            skipped: 0,
        }
    }

    /// Parse a line, returning `None` (after logging) when it is not an event.
    pub fn feed(&mut self, line: &str) -> Option<TransferEvent> {
        match parse_event_line(line) {
            Ok(event) => Some(event),
            Err(e) => {
                self.skipped += 1;
                let excerpt = preview(line, SKIPPED_LINE_PREVIEW_CHARS);
                tracing::warn!("Skipping malformed transfer event ({}): {}", e, excerpt);
                if let Some(ref scope) = self.diagnostics {
                    scope.emit(DiagnosticKind::LineSkipped {
                        line: excerpt,
                        reason: e.to_string(),
                    });
                }
                None
            }
        }
    }

    /// Number of lines skipped so far.
    pub fn skipped_lines(&self) -> u64 {
        self.skipped
    }
}
