//! Common test utilities for integration tests.
//!
//! Fixtures for transfer requests, NDJSON bodies and a recording observer.
//!
//! # Example
//!
//! ```ignore
//! use common::{ndjson, test_request, StateRecorder};
//!
//! let body = ndjson(&[r#"{"type":"Started"}"#, r#"{"type":"Completed"}"#]);
//! ```

pub mod mocks;

#[allow(unused_imports)]
pub use mocks::*;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use trackdeck::traits::Observer;
use trackdeck::transfer::{TransferIdentity, TransferRequest, TransferState};

/// Identity used by the end-to-end scenario.
pub fn test_identity() -> TransferIdentity {
    TransferIdentity::new("u1", "t1", "f.mp3")
}

/// Request for [`test_identity`] with a 1000 byte expected size.
pub fn test_request() -> TransferRequest {
    TransferRequest::new(test_identity(), 1000)
}

/// Join lines into a newline-terminated NDJSON body.
pub fn ndjson(lines: &[&str]) -> String {
    lines.iter().map(|line| format!("{}\n", line)).collect()
}

/// The body from the end-to-end scenario.
#[allow(dead_code)]
pub fn scenario_body() -> String {
    ndjson(&[
        r#"{"type":"Started"}"#,
        r#"{"type":"Progress","bytes_downloaded":250,"total_bytes":1000}"#,
        r#"{"type":"Progress","bytes_downloaded":750,"total_bytes":1000}"#,
        r#"{"type":"Completed"}"#,
    ])
}

/// Collects every state an observer is handed.
#[derive(Clone, Default)]
pub struct StateRecorder {
    states: Arc<Mutex<Vec<TransferState>>>,
}

#[allow(dead_code)]
impl StateRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observer(&self) -> Observer {
        let states = self.states.clone();
        Arc::new(move |state: &TransferState| {
            states.lock().unwrap().push(state.clone());
        })
    }

    pub fn states(&self) -> Vec<TransferState> {
        self.states.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.states.lock().unwrap().len()
    }
}

/// Poll `check` until it holds, failing the test after about a second.
#[allow(dead_code)]
pub async fn eventually(check: impl Fn() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
