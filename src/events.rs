/// file: src/events.rs
/// description: channel event names and the signal stream between transports and the event loop
use crate::{
    error::{Result, SkillSwapError},
    types::WireFrame,
};
use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc;

/// Which subscription stream an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Connection,
    User,
    Platform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    ConnectionEstablished,
    ConnectionLost,
    NewRequest,
    RequestAccepted,
    RequestRejected,
    SwapCompleted,
    PlatformBroadcast,
}

impl EventName {
    pub const ALL: [EventName; 7] = [
        EventName::ConnectionEstablished,
        EventName::ConnectionLost,
        EventName::NewRequest,
        EventName::RequestAccepted,
        EventName::RequestRejected,
        EventName::SwapCompleted,
        EventName::PlatformBroadcast,
    ];

    /// Name used on the wire. Connection events are synthesized locally and
    /// never appear in frames.
    pub fn wire_name(&self) -> &'static str {
        match self {
            EventName::ConnectionEstablished => "connect",
            EventName::ConnectionLost => "disconnect",
            EventName::NewRequest => "new_swap_request",
            EventName::RequestAccepted => "swap_accepted",
            EventName::RequestRejected => "swap_rejected",
            EventName::SwapCompleted => "swap_completed",
            EventName::PlatformBroadcast => "platform_message",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "new_swap_request" => Some(EventName::NewRequest),
            "swap_accepted" => Some(EventName::RequestAccepted),
            "swap_rejected" => Some(EventName::RequestRejected),
            "swap_completed" => Some(EventName::SwapCompleted),
            "platform_message" => Some(EventName::PlatformBroadcast),
            _ => None,
        }
    }

    pub fn namespace(&self) -> Namespace {
        match self {
            EventName::ConnectionEstablished | EventName::ConnectionLost => Namespace::Connection,
            EventName::PlatformBroadcast => Namespace::Platform,
            _ => Namespace::User,
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// A named event plus its untrusted payload. Lives only for one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent {
    pub name: EventName,
    pub payload: Value,
}

impl ChannelEvent {
    pub fn new(name: EventName, payload: Value) -> Self {
        Self { name, payload }
    }

    pub fn connection_established(connection_id: &str) -> Self {
        Self::new(
            EventName::ConnectionEstablished,
            serde_json::json!({ "connection_id": connection_id }),
        )
    }

    pub fn connection_lost(reason: &str) -> Self {
        Self::new(
            EventName::ConnectionLost,
            serde_json::json!({ "reason": reason }),
        )
    }

    /// Decode a text frame. `Ok(None)` means a well-formed frame for an event
    /// this client does not subscribe to.
    pub fn decode(text: &str) -> Result<Option<Self>> {
        let frame: WireFrame = serde_json::from_str(text).map_err(|e| {
            SkillSwapError::InvalidMessage(format!(
                "{}: {}",
                e,
                text.chars().take(100).collect::<String>()
            ))
        })?;

        Ok(EventName::from_wire(&frame.event).map(|name| Self::new(name, frame.data)))
    }
}

/// What a transport reports to its channel adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportSignal {
    Opened { connection_id: String },
    Frame(String),
    Closed { reason: String },
}

// Bounded so a flooding server applies backpressure to the transport task
// instead of growing memory.
const SIGNAL_CHANNEL_CAPACITY: usize = 1_024;

pub type SignalSender = mpsc::Sender<TransportSignal>;
pub type SignalReceiver = mpsc::Receiver<TransportSignal>;

pub fn create_signal_channel() -> (SignalSender, SignalReceiver) {
    mpsc::channel(SIGNAL_CHANNEL_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_events() {
        let event = ChannelEvent::decode(
            r#"{"event":"swap_accepted","data":{"requester_id":4,"receiver_name":"Ada","message":"ok"}}"#,
        )
        .unwrap()
        .expect("known event");
        assert_eq!(event.name, EventName::RequestAccepted);
        assert_eq!(event.payload["receiver_name"], "Ada");
    }

    #[test]
    fn unknown_events_are_skipped_not_errors() {
        let event = ChannelEvent::decode(r#"{"event":"typing","data":{}}"#).unwrap();
        assert!(event.is_none());
    }

    #[test]
    fn garbage_frames_are_invalid_messages() {
        let err = ChannelEvent::decode("not json").unwrap_err();
        assert!(matches!(err, SkillSwapError::InvalidMessage(_)));
    }

    #[test]
    fn wire_names_round_trip_for_pushed_events() {
        for name in EventName::ALL {
            if name.namespace() == Namespace::Connection {
                assert_eq!(EventName::from_wire(name.wire_name()), None);
            } else {
                assert_eq!(EventName::from_wire(name.wire_name()), Some(name));
            }
        }
    }
}
