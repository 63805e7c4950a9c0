//! Typed events pushed to observers.

use serde::{Deserialize, Serialize};

use crate::{stats::StatsRecord, traits::SessionStatus};

/// Event envelope delivered over the push channel.
///
/// Serialized as `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Event {
    /// A session finished starting.
    SessionStarted { platform: String },
    /// The running session was stopped.
    SessionStopped {},
    /// Current session status.
    StateSnapshot(SessionStatus),
    /// Full statistics record after a change.
    StatsUpdated(StatsRecord),
    /// The game reported a change to the farm's lands.
    LandsChanged { count: usize },
    /// The game reported pending friend applications.
    FriendApplication { count: usize },
}

impl Event {
    /// Wire name of the event type.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "sessionStarted",
            Self::SessionStopped {} => "sessionStopped",
            Self::StateSnapshot(_) => "stateSnapshot",
            Self::StatsUpdated(_) => "statsUpdated",
            Self::LandsChanged { .. } => "landsChanged",
            Self::FriendApplication { .. } => "friendApplication",
        }
    }
}

/// A single unit written to an observer channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Structured event.
    Event(Event),
    /// Content-free keep-alive.
    Heartbeat,
}

impl Frame {
    /// Convert to an SSE event (requires `sse` feature).
    ///
    /// Heartbeats become SSE comments so event parsers skip them.
    #[cfg(feature = "sse")]
    #[must_use]
    pub fn to_sse_event(&self) -> axum::response::sse::Event {
        use axum::response::sse::Event as SseEvent;

        match self {
            Self::Heartbeat => SseEvent::default().comment("heartbeat"),
            Self::Event(event) => match serde_json::to_string(event) {
                Ok(json) => SseEvent::default().data(json),
                Err(e) => {
                    tracing::error!(event = event.event_type(), "Failed to serialize event: {e}");
                    SseEvent::default().comment("dropped")
                }
            },
        }
    }
}

impl From<Event> for Frame {
    fn from(event: Event) -> Self {
        Self::Event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let json = serde_json::to_value(Event::LandsChanged { count: 4 }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "landsChanged", "data": {"count": 4}}));

        let json = serde_json::to_value(Event::SessionStopped {}).unwrap();
        assert_eq!(json["type"], "sessionStopped");
        assert_eq!(json["data"], serde_json::json!({}));
    }

    #[test]
    fn test_event_type_matches_serde_tag() {
        let events = [
            Event::SessionStarted { platform: "qq".into() },
            Event::SessionStopped {},
            Event::StateSnapshot(SessionStatus::default()),
            Event::StatsUpdated(StatsRecord::default()),
            Event::LandsChanged { count: 1 },
            Event::FriendApplication { count: 2 },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.event_type());
        }
    }

    #[test]
    fn test_stats_payload_parses_back() {
        let json = r#"{"type":"statsUpdated","data":{"harvestCount":3,"sellGold":450}}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        let Event::StatsUpdated(record) = event else {
            panic!("Wrong event type");
        };
        assert_eq!(record.harvest_count, 3);
        assert_eq!(record.sell_gold, 450);
        assert_eq!(record.plant_count, 0);
    }
}
