//! Per-document engagement recording
//!
//! One [`EngagementSession`] per open document viewer. A repeating timer
//! accrues viewing seconds on a fixed cadence and emits a heartbeat per
//! tick; closing joins the ticker first, then flushes a single zero-delta
//! closing marker carrying the true total, so the collector never loses
//! time to a missed tick boundary and never double-counts.

use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::events::HeartbeatEvent;
use super::TelemetrySink;

/// Lifecycle of one engagement session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No session exists for the document yet
    Idle,
    /// Ticker running, heartbeats flowing
    Active,
    /// Ticker stopped, final flush in progress
    Flushing,
    /// Fully torn down; no further events will be emitted
    Closed,
}

/// Mint the stable id for one viewing session
pub fn mint_session_id(email: Option<&str>, document_id: &str, opened_at_millis: i64) -> String {
    let seed = format!(
        "{}:{}:{}",
        email.unwrap_or("anon"),
        document_id,
        opened_at_millis
    );
    hex::encode(Sha256::digest(seed.as_bytes()))
}

struct SessionInner {
    session_id: String,
    email: String,
    document_id: String,
    document_name: String,
    interval_secs: u64,
    accumulated: AtomicU64,
    sink: Arc<dyn TelemetrySink>,
}

/// One live engagement session for an open document
pub struct EngagementSession {
    inner: Arc<SessionInner>,
    shutdown: watch::Sender<bool>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    phase: Mutex<SessionPhase>,
}

impl EngagementSession {
    /// Open a session and start its heartbeat ticker.
    ///
    /// The first heartbeat fires one full interval after opening; a viewer
    /// closed before that accrues nothing and flushes nothing.
    pub fn start(
        sink: Arc<dyn TelemetrySink>,
        email: Option<&str>,
        document_id: &str,
        document_name: &str,
        interval: Duration,
    ) -> Self {
        let opened_at_millis = chrono::Utc::now().timestamp_millis();
        let inner = Arc::new(SessionInner {
            session_id: mint_session_id(email, document_id, opened_at_millis),
            email: email.unwrap_or("anon").to_string(),
            document_id: document_id.to_string(),
            document_name: document_name.to_string(),
            interval_secs: interval.as_secs(),
            accumulated: AtomicU64::new(0),
            sink,
        });

        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let tick_state = Arc::clone(&inner);
        let ticker = tokio::spawn(async move {
            // First tick after one full interval, not immediately.
            let mut ticks =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);

            loop {
                tokio::select! {
                    _ = ticks.tick() => {
                        // The delta builds on the previous accumulated
                        // total; the single ticker task keeps heartbeats
                        // strictly ordered within the session.
                        let prev = tick_state
                            .accumulated
                            .fetch_add(tick_state.interval_secs, Ordering::SeqCst);
                        let total = prev + tick_state.interval_secs;

                        let event = HeartbeatEvent::tick(
                            &tick_state.email,
                            &tick_state.document_id,
                            &tick_state.document_name,
                            &tick_state.session_id,
                            tick_state.interval_secs,
                            total,
                        );

                        // Fire-and-forget: a failed emit never blocks the
                        // viewing experience and is not retried.
                        if let Err(e) = tick_state.sink.record(event).await {
                            warn!(
                                session_id = %tick_state.session_id,
                                error = %e,
                                "heartbeat emit failed, dropping"
                            );
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });

        debug!(
            session_id = %inner.session_id,
            document_id = %inner.document_id,
            interval_secs = inner.interval_secs,
            "engagement session opened"
        );

        Self {
            inner,
            shutdown,
            ticker: Mutex::new(Some(ticker)),
            phase: Mutex::new(SessionPhase::Active),
        }
    }

    /// The minted session id
    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    /// The document this session tracks
    pub fn document_id(&self) -> &str {
        &self.inner.document_id
    }

    /// Seconds accrued so far
    pub fn accumulated_seconds(&self) -> u64 {
        self.inner.accumulated.load(Ordering::SeqCst)
    }

    /// Current lifecycle phase
    pub async fn phase(&self) -> SessionPhase {
        *self.phase.lock().await
    }

    /// Tear the session down.
    ///
    /// Stops and joins the ticker before flushing, so the closing marker is
    /// ordered after the last heartbeat. Emits the marker only if any time
    /// accrued. Closing an already-closed session is a no-op.
    pub async fn close(&self) {
        {
            let mut phase = self.phase.lock().await;
            match *phase {
                SessionPhase::Active => *phase = SessionPhase::Flushing,
                _ => return,
            }
        }

        let _ = self.shutdown.send(true);
        if let Some(handle) = self.ticker.lock().await.take() {
            let _ = handle.await;
        }

        let total = self.inner.accumulated.load(Ordering::SeqCst);
        if total > 0 {
            let event = HeartbeatEvent::closing(
                &self.inner.email,
                &self.inner.document_id,
                &self.inner.document_name,
                &self.inner.session_id,
                total,
            );
            if let Err(e) = self.inner.sink.record(event).await {
                warn!(
                    session_id = %self.inner.session_id,
                    error = %e,
                    "closing flush failed, total may be undercounted"
                );
            }
        }

        *self.phase.lock().await = SessionPhase::Closed;
        debug!(
            session_id = %self.inner.session_id,
            total_seconds = total,
            "engagement session closed"
        );
    }
}
