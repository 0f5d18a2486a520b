/// file: src/broadcast.rs
/// description: platform-wide operator announcements, newest first
use crate::{
    config::BroadcastConfig,
    error::{Result, SkillSwapError},
    events::{ChannelEvent, EventName},
    monitoring::BROADCASTS_COUNTER,
    surface::BroadcastSink,
    types::{PlatformBroadcast, PlatformMessagePayload},
};
use std::collections::VecDeque;
use tracing::{debug, info};

impl PlatformBroadcast {
    pub fn from_event(event: &ChannelEvent) -> Result<Self> {
        let payload: PlatformMessagePayload = serde_json::from_value(event.payload.clone())
            .map_err(|e| SkillSwapError::MalformedPayload {
                event: EventName::PlatformBroadcast.to_string(),
                reason: e.to_string(),
            })?;
        Ok(payload.into())
    }
}

pub struct PlatformBroadcastHandler {
    capacity: usize,
    messages: VecDeque<PlatformBroadcast>,
    sink: Option<Box<dyn BroadcastSink>>,
}

impl PlatformBroadcastHandler {
    pub fn new(config: &BroadcastConfig, sink: Option<Box<dyn BroadcastSink>>) -> Self {
        Self {
            capacity: config.capacity,
            messages: VecDeque::new(),
            sink,
        }
    }

    /// Put `broadcast` at the front of the region. Earlier broadcasts stay in
    /// place unless retention capacity forces the oldest one out.
    pub fn insert(&mut self, broadcast: PlatformBroadcast) {
        info!(
            "Platform message [{}]: {}",
            broadcast.severity, broadcast.title
        );
        BROADCASTS_COUNTER.increment(1);

        if let Some(sink) = self.sink.as_mut()
            && let Err(e) = sink.prepend(&broadcast)
        {
            debug!("Platform message not rendered: {}", e);
        }
        self.messages.push_front(broadcast);

        if self.capacity == 0 || self.messages.len() <= self.capacity {
            return;
        }
        if let Some(evicted) = self.messages.pop_back()
            && let Some(sink) = self.sink.as_mut()
            && let Err(e) = sink.evict(&evicted)
        {
            debug!("Evicted platform message not removed: {}", e);
        }
    }

    /// Newest first.
    pub fn messages(&self) -> impl Iterator<Item = &PlatformBroadcast> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{surface::BroadcastBoard, types::Severity};
    use serde_json::json;

    fn event(payload: serde_json::Value) -> ChannelEvent {
        ChannelEvent::new(EventName::PlatformBroadcast, payload)
    }

    fn broadcast(title: &str) -> PlatformBroadcast {
        PlatformBroadcast::from_event(&event(json!({
            "title": title,
            "message": "body",
            "type": "warning",
            "timestamp": "2024-05-01T10:00:00",
        })))
        .unwrap()
    }

    #[test]
    fn later_broadcasts_are_prepended() {
        let board = BroadcastBoard::new();
        let mut handler =
            PlatformBroadcastHandler::new(&BroadcastConfig { capacity: 0 }, Some(board.sink()));

        handler.insert(broadcast("A"));
        handler.insert(broadcast("B"));
        handler.insert(broadcast("C"));

        assert_eq!(board.titles(), vec!["C", "B", "A"]);
        let titles: Vec<_> = handler.messages().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["C", "B", "A"]);
    }

    #[test]
    fn identical_broadcasts_are_kept() {
        let mut handler = PlatformBroadcastHandler::new(&BroadcastConfig { capacity: 0 }, None);
        handler.insert(broadcast("Same"));
        handler.insert(broadcast("Same"));
        assert_eq!(handler.len(), 2);
    }

    #[test]
    fn retention_drops_the_oldest() {
        let board = BroadcastBoard::new();
        let mut handler =
            PlatformBroadcastHandler::new(&BroadcastConfig { capacity: 2 }, Some(board.sink()));

        for title in ["A", "B", "C"] {
            handler.insert(broadcast(title));
        }

        assert_eq!(board.titles(), vec!["C", "B"]);
        assert_eq!(handler.len(), 2);
    }

    #[test]
    fn payload_parsing() {
        let parsed = broadcast("Maintenance");
        assert_eq!(parsed.severity, Severity::Warning);
        assert_eq!(parsed.timestamp.to_rfc3339(), "2024-05-01T10:00:00+00:00");

        let unknown_type = PlatformBroadcast::from_event(&event(json!({
            "title": "Hello",
            "message": "World",
            "type": "shout",
        })))
        .unwrap();
        assert_eq!(unknown_type.severity, Severity::Info);

        let err = PlatformBroadcast::from_event(&event(json!({ "message": "no title" })))
            .unwrap_err();
        assert!(matches!(err, SkillSwapError::MalformedPayload { .. }));
    }
}
