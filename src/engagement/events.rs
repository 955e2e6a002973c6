//! Heartbeat event payloads for the telemetry collector
//!
//! One event shape covers both cadence ticks and the closing marker: a tick
//! carries `seconds_on_page` equal to the heartbeat interval, the closing
//! marker carries zero so the collector can end the session without adding
//! time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event name the collector expects
pub const HEARTBEAT_EVENT: &str = "page_heartbeat";

/// One telemetry event for an engagement session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatEvent {
    /// When the event was minted
    pub timestamp: DateTime<Utc>,
    /// Visitor email, or "anon" when the gate captured none
    pub email: String,
    /// Always [`HEARTBEAT_EVENT`]
    pub event: String,
    pub document_id: String,
    pub document_name: String,
    pub session_id: String,
    /// Seconds accrued since the previous event; zero marks session close
    pub seconds_on_page: u64,
    /// Running total for the session
    pub total_seconds: u64,
}

impl HeartbeatEvent {
    /// A cadence tick carrying one interval's worth of viewing time
    pub fn tick(
        email: &str,
        document_id: &str,
        document_name: &str,
        session_id: &str,
        interval_seconds: u64,
        total_seconds: u64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            email: email.to_string(),
            event: HEARTBEAT_EVENT.to_string(),
            document_id: document_id.to_string(),
            document_name: document_name.to_string(),
            session_id: session_id.to_string(),
            seconds_on_page: interval_seconds,
            total_seconds,
        }
    }

    /// The zero-delta closing marker carrying the final total
    pub fn closing(
        email: &str,
        document_id: &str,
        document_name: &str,
        session_id: &str,
        total_seconds: u64,
    ) -> Self {
        Self {
            seconds_on_page: 0,
            ..Self::tick(email, document_id, document_name, session_id, 0, total_seconds)
        }
    }

    /// Whether this is the closing marker rather than a cadence tick
    pub fn is_closing(&self) -> bool {
        self.seconds_on_page == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape_is_camel_case() {
        let event = HeartbeatEvent::tick("a@b.com", "doc-1", "Deck.pdf", "sess", 10, 30);
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["event"], "page_heartbeat");
        assert_eq!(value["documentId"], "doc-1");
        assert_eq!(value["documentName"], "Deck.pdf");
        assert_eq!(value["sessionId"], "sess");
        assert_eq!(value["secondsOnPage"], 10);
        assert_eq!(value["totalSeconds"], 30);
    }

    #[test]
    fn test_closing_marker_is_zero_delta() {
        let event = HeartbeatEvent::closing("a@b.com", "doc-1", "Deck.pdf", "sess", 40);
        assert!(event.is_closing());
        assert_eq!(event.seconds_on_page, 0);
        assert_eq!(event.total_seconds, 40);

        let tick = HeartbeatEvent::tick("a@b.com", "doc-1", "Deck.pdf", "sess", 10, 40);
        assert!(!tick.is_closing());
    }
}
