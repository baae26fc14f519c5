//! Transfer session orchestration.
//!
//! A [`SessionRegistry`] runs at most one pump per [`TransferIdentity`]. The
//! pump opens the transfer request, frames the body into lines, parses lines
//! into events, folds events through the reducer and publishes each new state
//! into the shared [`TransferCache`]. Observers only ever read the cache.
//!
//! The pump suspends only while opening the request and while waiting for the
//! next chunk. Both waits race the session's [`CancellationToken`], so a
//! cancelled session stops promptly, drops the body (releasing the
//! connection) and publishes nothing further.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::StreamExt;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::TransferConfig;
use crate::diagnostics::{
    create_diagnostic_channel, DiagnosticEvent, DiagnosticKind, DiagnosticScope,
    DiagnosticSender, SessionEndReason,
};
use crate::error::TransferError;
use crate::traits::{Headers, HttpClient, HttpError, Observer, Subscription, TransferCache};
use crate::transfer::events::TransferEvent;
use crate::transfer::framer::{frame_lines, LineFramer};
use crate::transfer::parser::EventParser;
use crate::transfer::reducer::reduce;
use crate::transfer::types::{
    DownloadRequestBody, TransferIdentity, TransferRequest, TransferState, TransferStatus,
};

/// Bookkeeping for a pump that may still be running.
struct ActiveSession {
    session_id: String,
    cancel: CancellationToken,
    finished: watch::Receiver<bool>,
}

impl ActiveSession {
    /// Running and not asked to stop.
    fn is_live(&self) -> bool {
        !*self.finished.borrow() && !self.cancel.is_cancelled()
    }
}

type ActiveMap = Arc<Mutex<HashMap<TransferIdentity, ActiveSession>>>;

fn lock_active(
    active: &Mutex<HashMap<TransferIdentity, ActiveSession>>,
) -> MutexGuard<'_, HashMap<TransferIdentity, ActiveSession>> {
    active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owns the per-identity transfer sessions.
///
/// Created once by the composition root with its transport and cache.
/// [`begin`](Self::begin) spawns onto the current tokio runtime.
pub struct SessionRegistry {
    client: Arc<dyn HttpClient>,
    cache: Arc<dyn TransferCache>,
    config: TransferConfig,
    diagnostics: Option<DiagnosticSender>,
    active: ActiveMap,
}

impl SessionRegistry {
    pub fn new(
        client: Arc<dyn HttpClient>,
        cache: Arc<dyn TransferCache>,
        config: TransferConfig,
    ) -> Self {
        let diagnostics = (config.diagnostics_capacity > 0)
            .then(|| create_diagnostic_channel(config.diagnostics_capacity).0);
        Self {
            client,
            cache,
            config,
            diagnostics,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Subscribe to session diagnostics, if enabled in the config.
    pub fn diagnostics(&self) -> Option<broadcast::Receiver<DiagnosticEvent>> {
        self.diagnostics.as_ref().map(|tx| tx.subscribe())
    }

    /// Start (or join) the session for `request.identity`.
    ///
    /// - A live session for the identity is joined; no second request is made.
    /// - A terminal cached state is returned as-is; finished transfers are
    ///   not replayed. Call [`invalidate`](Self::invalidate) first to retry.
    /// - Otherwise the state is reset to `Idle` (sized by
    ///   `request.expected_size`) and a new pump is spawned.
    ///
    /// Must be called from within a tokio runtime.
    pub fn begin(&self, request: TransferRequest) -> TransferHandle {
        let identity = request.identity.clone();

        let (session_id, cancel, done_tx, finished) = {
            let mut active = lock_active(&self.active);

            if let Some(session) = active.get(&identity) {
                if session.is_live() {
                    tracing::debug!(
                        "Joining transfer session {} for {}",
                        session.session_id,
                        identity
                    );
                    return TransferHandle {
                        identity,
                        session_id: Some(session.session_id.clone()),
                        cache: self.cache.clone(),
                        cancel: session.cancel.clone(),
                        finished: session.finished.clone(),
                    };
                }
            }

            if let Some(state) = self.cache.get(&identity) {
                if state.is_terminal() {
                    tracing::debug!("Transfer {} already {}, not reopening", identity, state.status);
                    return TransferHandle::settled(identity, self.cache.clone());
                }
            }

            let session_id = Uuid::new_v4().to_string();
            let cancel = CancellationToken::new();
            let (done_tx, done_rx) = watch::channel(false);
            active.insert(
                identity.clone(),
                ActiveSession {
                    session_id: session_id.clone(),
                    cancel: cancel.clone(),
                    finished: done_rx.clone(),
                },
            );
            (session_id, cancel, done_tx, done_rx)
        };

        // Seed outside the registry lock: observers run synchronously and may
        // call back into the registry.
        let seed = TransferState::seeded(request.expected_size);
        if !cancel.is_cancelled() {
            self.cache.set(&identity, seed.clone());
        }

        let scope = DiagnosticScope::new(
            self.diagnostics.clone(),
            session_id.clone(),
            identity.clone(),
        );
        let pump = Pump {
            client: self.client.clone(),
            cache: self.cache.clone(),
            url: self.config.download_url(),
            body: DownloadRequestBody::from(&request),
            max_line_bytes: self.config.max_line_bytes,
            cancel: cancel.clone(),
            scope,
            state: seed,
        };
        let active = self.active.clone();
        let task_identity = identity.clone();
        let task_session_id = session_id.clone();

        tokio::spawn(async move {
            pump.run().await;

            {
                let mut active = lock_active(&active);
                let ours = active
                    .get(&task_identity)
                    .map(|s| s.session_id == task_session_id)
                    .unwrap_or(false);
                if ours {
                    active.remove(&task_identity);
                }
            }
            let _ = done_tx.send(true);
        });

        TransferHandle {
            identity,
            session_id: Some(session_id),
            cache: self.cache.clone(),
            cancel,
            finished,
        }
    }

    /// Cancel the live session for `identity`, if any.
    ///
    /// The published state is left as it was; nothing is marked `Failed`.
    /// Returns whether a session was cancelled.
    pub fn cancel(&self, identity: &TransferIdentity) -> bool {
        let active = lock_active(&self.active);
        match active.get(identity) {
            Some(session) if session.is_live() => {
                tracing::info!("Cancelling transfer session {} for {}", session.session_id, identity);
                session.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Cancel any live session and discard the cached state for `identity`,
    /// so the next [`begin`](Self::begin) starts fresh.
    pub fn invalidate(&self, identity: &TransferIdentity) {
        let removed = lock_active(&self.active).remove(identity);
        if let Some(session) = removed {
            session.cancel.cancel();
        }
        self.cache.remove(identity);
        tracing::debug!("Invalidated transfer {}", identity);
    }

    /// Cancel every live session, e.g. on shutdown. Returns how many were live.
    pub fn cancel_all(&self) -> usize {
        let active = lock_active(&self.active);
        let mut cancelled = 0;
        for session in active.values().filter(|s| s.is_live()) {
            session.cancel.cancel();
            cancelled += 1;
        }
        if cancelled > 0 {
            tracing::info!("Cancelling {} transfer session(s)", cancelled);
        }
        cancelled
    }

    /// Register an observer for `identity`, e.g. before calling `begin` so
    /// the seeded `Idle` state is seen too.
    pub fn subscribe(&self, identity: &TransferIdentity, observer: Observer) -> Subscription {
        self.cache.subscribe(identity, observer)
    }

    /// Current published state for `identity`.
    pub fn state(&self, identity: &TransferIdentity) -> Option<TransferState> {
        self.cache.get(identity)
    }

    /// Number of sessions currently pumping.
    pub fn active_count(&self) -> usize {
        lock_active(&self.active)
            .values()
            .filter(|s| s.is_live())
            .count()
    }

    pub fn is_active(&self, identity: &TransferIdentity) -> bool {
        lock_active(&self.active)
            .get(identity)
            .map(|s| s.is_live())
            .unwrap_or(false)
    }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("config", &self.config)
            .field("active", &self.active_count())
            .finish()
    }
}

/// Caller's view of one session.
///
/// Cloning is cheap; every clone observes the same session. Reading through a
/// handle never changes state.
#[derive(Clone)]
pub struct TransferHandle {
    identity: TransferIdentity,
    /// `None` when the handle wraps a cached terminal state
    session_id: Option<String>,
    cache: Arc<dyn TransferCache>,
    cancel: CancellationToken,
    finished: watch::Receiver<bool>,
}

impl TransferHandle {
    /// Handle over a cached terminal state with no pump behind it.
    fn settled(identity: TransferIdentity, cache: Arc<dyn TransferCache>) -> Self {
        let (_, finished) = watch::channel(true);
        Self {
            identity,
            session_id: None,
            cache,
            cancel: CancellationToken::new(),
            finished,
        }
    }

    pub fn identity(&self) -> &TransferIdentity {
        &self.identity
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Latest published state, `None` if the identity was invalidated.
    pub fn state(&self) -> Option<TransferState> {
        self.cache.get(&self.identity)
    }

    pub fn subscribe(&self, observer: Observer) -> Subscription {
        self.cache.subscribe(&self.identity, observer)
    }

    /// Stop the session. The published state stays as last written.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// True once the pump has stopped (or there never was one).
    pub fn is_finished(&self) -> bool {
        *self.finished.borrow()
    }

    /// Wait until the pump has stopped.
    pub async fn finished(&self) {
        let mut finished = self.finished.clone();
        // A dropped sender means the pump task is gone, which also counts.
        let _ = finished.wait_for(|done| *done).await;
    }
}

impl fmt::Debug for TransferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferHandle")
            .field("identity", &self.identity)
            .field("session_id", &self.session_id)
            .field("finished", &self.is_finished())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Everything one pump task owns.
struct Pump {
    client: Arc<dyn HttpClient>,
    cache: Arc<dyn TransferCache>,
    url: String,
    body: DownloadRequestBody,
    max_line_bytes: usize,
    cancel: CancellationToken,
    scope: DiagnosticScope,
    /// Last state this pump published
    state: TransferState,
}

impl Pump {
    async fn run(mut self) {
        tracing::info!(
            "Starting transfer session {} for {}",
            self.scope.session_id(),
            self.scope.identity()
        );
        self.scope.emit(DiagnosticKind::SessionStarted {
            expected_size: self.state.total_bytes,
        });

        let reason = self.pump().await;

        match reason {
            SessionEndReason::Completed => tracing::info!(
                "Transfer session {} completed",
                self.scope.session_id()
            ),
            SessionEndReason::Failed => tracing::warn!(
                "Transfer session {} failed: {}",
                self.scope.session_id(),
                self.state.error.as_deref().unwrap_or("unknown error")
            ),
            SessionEndReason::Cancelled => tracing::info!(
                "Transfer session {} cancelled",
                self.scope.session_id()
            ),
        }
        self.scope.emit(DiagnosticKind::SessionEnded { reason });
    }

    async fn pump(&mut self) -> SessionEndReason {
        let body = match serde_json::to_string(&self.body) {
            Ok(body) => body,
            Err(e) => return self.fail(TransferError::Connect(HttpError::Other(e.to_string()))),
        };
        let mut headers = Headers::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Accept".to_string(), "application/x-ndjson".to_string());

        let client = self.client.clone();
        let cancel = self.cancel.clone();
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return SessionEndReason::Cancelled,
            opened = client.post_stream(&self.url, &body, &headers) => opened,
        };
        let bytes = match opened {
            Ok(bytes) => bytes,
            Err(e) => return self.fail(TransferError::Connect(e)),
        };

        let lines = frame_lines(bytes, LineFramer::with_max_line_bytes(self.max_line_bytes));
        tokio::pin!(lines);
        let mut parser = EventParser::with_diagnostics(self.scope.clone());

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return SessionEndReason::Cancelled,
                next = lines.next() => next,
            };

            match next {
                Some(Ok(line)) => {
                    let Some(event) = parser.feed(&line) else {
                        continue;
                    };
                    if let Some(reason) = self.apply(&event) {
                        return reason;
                    }
                }
                Some(Err(e)) => return self.fail(TransferError::Stream(e)),
                None => return self.fail(TransferError::EndedEarly),
            }
        }
    }

    /// Reduce and publish one event. Returns the end reason once terminal.
    fn apply(&mut self, event: &TransferEvent) -> Option<SessionEndReason> {
        if self.cancel.is_cancelled() {
            return Some(SessionEndReason::Cancelled);
        }

        let next = reduce(&self.state, event);
        if next == self.state {
            tracing::trace!(
                "Transfer session {}: {} event left state unchanged",
                self.scope.session_id(),
                event.event_type_name()
            );
        } else {
            self.publish(next);
        }

        match self.state.status {
            TransferStatus::Completed => Some(SessionEndReason::Completed),
            TransferStatus::Failed => Some(SessionEndReason::Failed),
            TransferStatus::Idle | TransferStatus::Downloading => None,
        }
    }

    /// Publish a `Failed` state for a session-ending error, unless cancelled.
    fn fail(&mut self, err: TransferError) -> SessionEndReason {
        if self.cancel.is_cancelled() {
            return SessionEndReason::Cancelled;
        }
        tracing::debug!("Transfer session {}: {}", self.scope.session_id(), err);
        let failed = TransferEvent::Failed {
            message: err.user_message(),
        };
        self.apply(&failed).unwrap_or(SessionEndReason::Failed)
    }

    fn publish(&mut self, state: TransferState) {
        tracing::debug!(
            "Transfer session {}: {}",
            self.scope.session_id(),
            state
        );
        self.scope.emit(DiagnosticKind::StateChanged {
            status: state.status,
            percent: state.percent,
        });
        self.cache.set(self.scope.identity(), state.clone());
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{LiveStream, MockHttpClient, MockResponse};
    use crate::adapters::InMemoryCache;
    use bytes::Bytes;
    use std::time::Duration;

    const URL: &str = "http://test/api/transfers/download";

    fn config() -> TransferConfig {
        TransferConfig::new().with_base_url("http://test")
    }

    fn identity() -> TransferIdentity {
        TransferIdentity::new("u1", "t1", "f.mp3")
    }

    fn request() -> TransferRequest {
        TransferRequest::new(identity(), 1000)
    }

    fn registry(client: &MockHttpClient) -> (SessionRegistry, InMemoryCache) {
        let cache = InMemoryCache::new();
        let registry = SessionRegistry::new(
            Arc::new(client.clone()),
            Arc::new(cache.clone()),
            config(),
        );
        (registry, cache)
    }

    fn recorder() -> (Arc<Mutex<Vec<TransferState>>>, Observer) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observer: Observer = Arc::new(move |state: &TransferState| {
            sink.lock().unwrap().push(state.clone());
        });
        (seen, observer)
    }

    fn state(status: TransferStatus, percent: u8, bytes: u64, total: u64) -> TransferState {
        TransferState {
            status,
            percent,
            bytes_transferred: bytes,
            total_bytes: total,
            error: None,
        }
    }

    /// Poll until `check` passes; the pump runs on the same runtime.
    async fn eventually(check: impl Fn() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let client = MockHttpClient::new();
        client.set_response(
            URL,
            MockResponse::Stream(vec![
                Bytes::from("{\"type\":\"Started\"}\n{\"type\":\"Progress\",\"bytes_down"),
                Bytes::from("loaded\":250,\"total_bytes\":1000}\n"),
                Bytes::from("{\"type\":\"Progress\",\"bytes_downloaded\":750,\"total_bytes\":1000}\n"),
                Bytes::from("{\"type\":\"Completed\"}\n"),
            ]),
        );
        let (registry, _cache) = registry(&client);
        let (seen, observer) = recorder();
        let _sub = registry.subscribe(&identity(), observer);

        let handle = registry.begin(request());
        handle.finished().await;

        let seen = seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                state(TransferStatus::Idle, 0, 0, 1000),
                state(TransferStatus::Downloading, 0, 0, 1000),
                state(TransferStatus::Downloading, 25, 250, 1000),
                state(TransferStatus::Downloading, 75, 750, 1000),
                state(TransferStatus::Completed, 100, 750, 1000),
            ]
        );
        assert_eq!(handle.state(), seen.last().cloned());
        assert!(!registry.is_active(&identity()));
    }

    #[tokio::test]
    async fn test_request_body_and_headers() {
        let client = MockHttpClient::new();
        client.set_response(URL, MockResponse::Stream(vec![Bytes::from("{\"type\":\"Completed\"}\n")]));
        let (registry, _cache) = registry(&client);

        registry.begin(request()).finished().await;

        let requests = client.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].url, URL);
        let body: serde_json::Value =
            serde_json::from_str(requests[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"username": "u1", "filename": "f.mp3", "size": 1000, "token": "t1"})
        );
        assert_eq!(
            requests[0].headers.get("Accept").map(String::as_str),
            Some("application/x-ndjson")
        );
    }

    #[tokio::test]
    async fn test_malformed_line_is_skipped() {
        let client = MockHttpClient::new();
        client.set_response(
            URL,
            MockResponse::Stream(vec![Bytes::from(
                "{\"type\":\"Started\"}\n<garbage>\n{\"type\":\"Progress\",\"bytes_downloaded\":5,\"total_bytes\":10}\n{\"type\":\"Completed\"}\n",
            )]),
        );
        let (registry, _cache) = registry(&client);
        let (seen, observer) = recorder();
        let _sub = registry.subscribe(&identity(), observer);

        let handle = registry.begin(request());
        handle.finished().await;

        let seen = seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                state(TransferStatus::Idle, 0, 0, 1000),
                state(TransferStatus::Downloading, 0, 0, 1000),
                state(TransferStatus::Downloading, 50, 5, 10),
                state(TransferStatus::Completed, 100, 5, 10),
            ]
        );
    }

    #[tokio::test]
    async fn test_connection_rejected_publishes_failed() {
        let client = MockHttpClient::new();
        client.set_response(
            URL,
            MockResponse::Error(HttpError::ServerError {
                status: 404,
                message: "file not shared".to_string(),
            }),
        );
        let (registry, _cache) = registry(&client);

        let handle = registry.begin(request());
        handle.finished().await;

        let state = handle.state().unwrap();
        assert_eq!(state.status, TransferStatus::Failed);
        assert_eq!(state.error.as_deref(), Some("HTTP 404: file not shared"));
        assert_eq!(state.total_bytes, 1000);
    }

    #[tokio::test]
    async fn test_mid_stream_error_keeps_progress() {
        let client = MockHttpClient::new();
        client.set_response(
            URL,
            MockResponse::StreamThenError(
                vec![Bytes::from(
                    "{\"type\":\"Progress\",\"bytes_downloaded\":400,\"total_bytes\":1000}\n",
                )],
                HttpError::Io("connection reset".to_string()),
            ),
        );
        let (registry, _cache) = registry(&client);

        let handle = registry.begin(request());
        handle.finished().await;

        let state = handle.state().unwrap();
        assert_eq!(state.status, TransferStatus::Failed);
        assert_eq!(state.error.as_deref(), Some("IO error: connection reset"));
        assert_eq!(state.bytes_transferred, 400);
        assert_eq!(state.percent, 40);
    }

    #[tokio::test]
    async fn test_stream_ending_without_terminal_event_fails() {
        let client = MockHttpClient::new();
        client.set_response(URL, MockResponse::Stream(vec![Bytes::from("{\"type\":\"Started\"}\n")]));
        let (registry, _cache) = registry(&client);

        let handle = registry.begin(request());
        handle.finished().await;

        let state = handle.state().unwrap();
        assert_eq!(state.status, TransferStatus::Failed);
        assert_eq!(
            state.error.as_deref(),
            Some("transfer stream ended before completion")
        );
    }

    #[tokio::test]
    async fn test_second_begin_joins_live_session() {
        let client = MockHttpClient::new();
        let (feed, response) = LiveStream::new();
        client.set_response(URL, response);
        let (registry, _cache) = registry(&client);

        let first = registry.begin(request());
        let second = registry.begin(request());
        assert_eq!(first.session_id(), second.session_id());

        eventually(|| client.request_count() == 1).await;
        assert!(feed.send_line(r#"{"type":"Completed"}"#));
        second.finished().await;

        assert!(first.is_finished());
        assert_eq!(client.request_count(), 1);
        assert_eq!(first.state(), second.state());
    }

    #[tokio::test]
    async fn test_terminal_state_not_replayed() {
        let client = MockHttpClient::new();
        client.set_default_response(MockResponse::Stream(vec![Bytes::from(
            "{\"type\":\"Completed\"}\n",
        )]));
        let (registry, _cache) = registry(&client);

        registry.begin(request()).finished().await;
        let again = registry.begin(request());

        assert!(again.is_finished());
        assert!(again.session_id().is_none());
        assert_eq!(again.state().unwrap().status, TransferStatus::Completed);
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_allows_fresh_session() {
        let client = MockHttpClient::new();
        client.set_default_response(MockResponse::Stream(vec![Bytes::from(
            "{\"type\":\"Failed\",\"message\":\"peer went away\"}\n",
        )]));
        let (registry, cache) = registry(&client);

        registry.begin(request()).finished().await;
        assert_eq!(
            registry.state(&identity()).unwrap().status,
            TransferStatus::Failed
        );

        registry.invalidate(&identity());
        assert!(cache.get(&identity()).is_none());

        let (seen, observer) = recorder();
        let _sub = registry.subscribe(&identity(), observer);
        registry.begin(request()).finished().await;

        assert_eq!(client.request_count(), 2);
        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.first(), Some(&TransferState::seeded(1000)));
        assert_eq!(seen.last().unwrap().status, TransferStatus::Failed);
    }

    #[tokio::test]
    async fn test_cancel_stops_updates_and_releases_connection() {
        let client = MockHttpClient::new();
        let (feed, response) = LiveStream::new();
        client.set_response(URL, response);
        let (registry, _cache) = registry(&client);

        let handle = registry.begin(request());
        feed.send_line(r#"{"type":"Started"}"#);
        eventually(|| {
            handle.state().map(|s| s.status) == Some(TransferStatus::Downloading)
        })
        .await;

        handle.cancel();
        handle.finished().await;

        assert!(feed.is_closed());
        assert!(!feed.send_line(
            r#"{"type":"Progress","bytes_downloaded":5,"total_bytes":10}"#
        ));
        let state = handle.state().unwrap();
        assert_eq!(state.status, TransferStatus::Downloading);
        assert!(state.error.is_none());
        assert!(!registry.is_active(&identity()));
    }

    #[tokio::test]
    async fn test_cancel_while_opening() {
        let client = MockHttpClient::new();
        client.set_response(URL, MockResponse::Pending);
        let (registry, _cache) = registry(&client);

        let handle = registry.begin(request());
        eventually(|| client.request_count() == 1).await;
        assert!(registry.cancel(&identity()));
        handle.finished().await;

        assert_eq!(handle.state(), Some(TransferState::seeded(1000)));
        assert!(!registry.cancel(&identity()));
    }

    #[tokio::test]
    async fn test_cancel_all_stops_every_live_session() {
        let client = MockHttpClient::new();
        client.set_default_response(MockResponse::Pending);
        let (registry, _cache) = registry(&client);

        let first = registry.begin(request());
        let second = registry.begin(TransferRequest::new(
            TransferIdentity::new("u2", "t2", "g.flac"),
            10,
        ));
        assert_eq!(registry.active_count(), 2);

        assert_eq!(registry.cancel_all(), 2);
        first.finished().await;
        second.finished().await;

        assert_eq!(registry.active_count(), 0);
        assert_eq!(registry.cancel_all(), 0);
        assert_eq!(first.state(), Some(TransferState::seeded(1000)));
    }

    #[tokio::test]
    async fn test_begin_after_cancel_starts_new_session() {
        let client = MockHttpClient::new();
        client.set_response(URL, MockResponse::Pending);
        let (registry, _cache) = registry(&client);

        let first = registry.begin(request());
        first.cancel();
        let second = registry.begin(request());

        assert_ne!(first.session_id(), second.session_id());
        second.cancel();
        second.finished().await;
    }

    #[tokio::test]
    async fn test_diagnostics_report_session() {
        let client = MockHttpClient::new();
        client.set_response(
            URL,
            MockResponse::Stream(vec![Bytes::from("oops\n{\"type\":\"Completed\"}\n")]),
        );
        let (registry, _cache) = registry(&client);
        let mut rx = registry.diagnostics().unwrap();

        registry.begin(request()).finished().await;

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind);
        }
        assert_eq!(
            kinds.first(),
            Some(&DiagnosticKind::SessionStarted {
                expected_size: 1000
            })
        );
        assert!(kinds
            .iter()
            .any(|k| matches!(k, DiagnosticKind::LineSkipped { line, .. } if line == "oops")));
        assert_eq!(
            kinds.last(),
            Some(&DiagnosticKind::SessionEnded {
                reason: SessionEndReason::Completed
            })
        );
    }

    #[tokio::test]
    async fn test_diagnostics_disabled() {
        let client = MockHttpClient::new();
        let registry = SessionRegistry::new(
            Arc::new(client),
            Arc::new(InMemoryCache::new()),
            config().with_diagnostics_capacity(0),
        );
        assert!(registry.diagnostics().is_none());
    }
}
