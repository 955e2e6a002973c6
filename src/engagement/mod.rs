//! Engagement telemetry - how long each visitor actually views each document
//!
//! Once the gate releases the document list, opening a viewer starts an
//! [`EngagementSession`] that heartbeats accrued seconds to the collector
//! and flushes the true total on teardown. Telemetry is strictly one-way:
//! failures are logged and swallowed, never user-visible.

pub mod events;
pub mod recorder;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use crate::types::{GateError, Result};

pub use events::{HeartbeatEvent, HEARTBEAT_EVENT};
pub use recorder::{mint_session_id, EngagementSession, SessionPhase};

// ============================================================================
// Sink
// ============================================================================

/// One-way collector for heartbeat events (allows mocking in tests).
///
/// No reply payload is depended on; transport-level acknowledgement is all
/// the recorder observes.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn record(&self, event: HeartbeatEvent) -> Result<()>;
}

/// HTTP sink posting events to the collector's track endpoint
pub struct HttpTelemetrySink {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTelemetrySink {
    /// Create a sink sharing an existing HTTP client
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl TelemetrySink for HttpTelemetrySink {
    async fn record(&self, event: HeartbeatEvent) -> Result<()> {
        let url = format!("{}/track", self.base_url);
        let response = self.client.post(&url).json(&event).send().await?;

        if !response.status().is_success() {
            return Err(GateError::Transport(format!(
                "track endpoint returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Tracker
// ============================================================================

/// Serializes engagement sessions for one visitor: at most one document is
/// tracked at a time, and switching documents fully tears down the previous
/// session (its closing event is flushed) before the new one starts.
pub struct EngagementTracker {
    sink: Arc<dyn TelemetrySink>,
    interval: Duration,
    active: Mutex<Option<Arc<EngagementSession>>>,
}

impl EngagementTracker {
    /// Create a tracker emitting to the given sink at the given cadence
    pub fn new(sink: Arc<dyn TelemetrySink>, interval: Duration) -> Self {
        Self {
            sink,
            interval,
            active: Mutex::new(None),
        }
    }

    /// Open a viewing session for a document, closing any previous one first
    pub async fn open(
        &self,
        email: Option<&str>,
        document_id: &str,
        document_name: &str,
    ) -> Arc<EngagementSession> {
        let mut active = self.active.lock().await;

        if let Some(previous) = active.take() {
            debug!(
                previous = %previous.document_id(),
                next = document_id,
                "switching documents, closing previous session"
            );
            previous.close().await;
        }

        let session = Arc::new(EngagementSession::start(
            Arc::clone(&self.sink),
            email,
            document_id,
            document_name,
            self.interval,
        ));
        *active = Some(Arc::clone(&session));
        session
    }

    /// Close the active session, if any. Called on viewer teardown.
    pub async fn close_active(&self) {
        let mut active = self.active.lock().await;
        if let Some(session) = active.take() {
            session.close().await;
        }
    }

    /// Id of the currently tracked session, if one is open
    pub async fn active_session_id(&self) -> Option<String> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|s| s.session_id().to_string())
    }
}
