//! Progress state machine.

use crate::transfer::events::TransferEvent;
use crate::transfer::types::{percent_of, TransferState, TransferStatus};

/// Fold one event into the current state.
///
/// Pure and total: every `(state, event)` pair yields a state. Terminal states
/// absorb everything; a well-formed server never sends past a terminal event.
pub fn reduce(state: &TransferState, event: &TransferEvent) -> TransferState {
    if state.is_terminal() {
        return state.clone();
    }

    match event {
        TransferEvent::Started => TransferState {
            status: TransferStatus::Downloading,
            ..state.clone()
        },
        TransferEvent::Progress {
            bytes_transferred,
            total_bytes,
        } => {
            // A stale or reordered report never moves the counter backwards.
            let bytes = (*bytes_transferred).max(state.bytes_transferred);
            TransferState {
                status: TransferStatus::Downloading,
                percent: percent_of(bytes, *total_bytes),
                bytes_transferred: bytes,
                total_bytes: *total_bytes,
                error: None,
            }
        }
        TransferEvent::Completed => TransferState {
            status: TransferStatus::Completed,
            percent: 100,
            ..state.clone()
        },
        TransferEvent::Failed { message } => TransferState {
            status: TransferStatus::Failed,
            error: Some(message.clone()),
            ..state.clone()
        },
    }
}

/// Fold a whole event sequence, starting from `initial`.
pub fn reduce_all<'a, I>(initial: TransferState, events: I) -> TransferState
where
    I: IntoIterator<Item = &'a TransferEvent>,
{
    events
        .into_iter()
        .fold(initial, |state, event| reduce(&state, event))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(bytes: u64, total: u64) -> TransferEvent {
        TransferEvent::Progress {
            bytes_transferred: bytes,
            total_bytes: total,
        }
    }

    fn failed(message: &str) -> TransferEvent {
        TransferEvent::Failed {
            message: message.to_string(),
        }
    }

    #[test]
    fn test_started_keeps_counters() {
        let state = reduce(&TransferState::seeded(1000), &TransferEvent::Started);
        assert_eq!(state.status, TransferStatus::Downloading);
        assert_eq!(state.percent, 0);
        assert_eq!(state.bytes_transferred, 0);
        assert_eq!(state.total_bytes, 1000);
    }

    #[test]
    fn test_progress_from_idle() {
        let state = reduce(&TransferState::seeded(0), &progress(250, 1000));
        assert_eq!(state.status, TransferStatus::Downloading);
        assert_eq!(state.percent, 25);
        assert_eq!(state.bytes_transferred, 250);
        assert_eq!(state.total_bytes, 1000);
    }

    #[test]
    fn test_progress_replaces_size_hint() {
        let state = reduce(&TransferState::seeded(1000), &progress(100, 4000));
        assert_eq!(state.total_bytes, 4000);
        assert_eq!(state.percent, 3); // 2.5 rounds up
    }

    #[test]
    fn test_progress_with_zero_total() {
        let state = reduce(&TransferState::seeded(0), &progress(10, 0));
        assert_eq!(state.percent, 0);
        assert_eq!(state.bytes_transferred, 10);
    }

    #[test]
    fn test_progress_never_decreases_bytes() {
        let state = reduce_all(
            TransferState::seeded(1000),
            &[progress(750, 1000), progress(250, 1000)],
        );
        assert_eq!(state.bytes_transferred, 750);
        assert_eq!(state.percent, 75);
    }

    #[test]
    fn test_progress_beyond_total_caps_percent() {
        let state = reduce(&TransferState::seeded(10), &progress(15, 10));
        assert_eq!(state.percent, 100);
    }

    #[test]
    fn test_completed_retains_last_bytes() {
        let state = reduce_all(
            TransferState::seeded(1000),
            &[TransferEvent::Started, progress(750, 1000), TransferEvent::Completed],
        );
        assert_eq!(state.status, TransferStatus::Completed);
        assert_eq!(state.percent, 100);
        assert_eq!(state.bytes_transferred, 750);
        assert_eq!(state.total_bytes, 1000);
        assert!(state.error.is_none());
    }

    #[test]
    fn test_completed_from_idle() {
        let state = reduce(&TransferState::seeded(1000), &TransferEvent::Completed);
        assert_eq!(state.status, TransferStatus::Completed);
        assert_eq!(state.percent, 100);
    }

    #[test]
    fn test_failed_sets_error() {
        let state = reduce_all(
            TransferState::seeded(1000),
            &[progress(500, 1000), failed("connection reset")],
        );
        assert_eq!(state.status, TransferStatus::Failed);
        assert_eq!(state.error.as_deref(), Some("connection reset"));
        assert_eq!(state.bytes_transferred, 500);
        assert_eq!(state.percent, 50);
    }

    #[test]
    fn test_terminal_states_absorb_events() {
        let completed = reduce(&TransferState::seeded(1000), &TransferEvent::Completed);
        for event in [
            TransferEvent::Started,
            progress(1, 2),
            TransferEvent::Completed,
            failed("late"),
        ] {
            assert_eq!(reduce(&completed, &event), completed);
        }

        let failed_state = reduce(&TransferState::seeded(1000), &failed("boom"));
        for event in [TransferEvent::Started, progress(1, 2), TransferEvent::Completed] {
            assert_eq!(reduce(&failed_state, &event), failed_state);
        }
    }

    #[test]
    fn test_repeated_terminal_event_is_idempotent() {
        let once = reduce_all(TransferState::seeded(1000), &[TransferEvent::Completed]);
        let twice = reduce_all(
            TransferState::seeded(1000),
            &[TransferEvent::Completed, TransferEvent::Completed],
        );
        assert_eq!(once, twice);
    }

    #[test]
    fn test_sequences_ending_in_completed() {
        let sequences: Vec<Vec<TransferEvent>> = vec![
            vec![TransferEvent::Completed],
            vec![TransferEvent::Started, TransferEvent::Completed],
            vec![progress(1, 3), progress(2, 3), TransferEvent::Completed],
            vec![progress(0, 0), TransferEvent::Started, TransferEvent::Completed],
            vec![progress(900, 100), progress(5, 100), TransferEvent::Completed],
        ];
        for events in sequences {
            let state = reduce_all(TransferState::seeded(7), &events);
            assert_eq!(state.status, TransferStatus::Completed, "{:?}", events);
            assert_eq!(state.percent, 100, "{:?}", events);
        }
    }

    #[test]
    fn test_invariants_hold_over_every_step() {
        let events = vec![
            TransferEvent::Started,
            progress(10, 100),
            progress(5, 100),
            progress(60, 50),
            progress(70, 0),
            TransferEvent::Started,
            progress(u64::MAX, u64::MAX),
            failed("late"),
            TransferEvent::Completed,
        ];
        let mut state = TransferState::seeded(100);
        for event in &events {
            let next = reduce(&state, event);
            assert!(next.percent <= 100);
            assert!(next.bytes_transferred >= state.bytes_transferred);
            state = next;
        }
        assert_eq!(state.status, TransferStatus::Failed);
    }
}
