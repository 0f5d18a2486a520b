/// file: src/client_state.rs
/// description: connection bookkeeping kept apart from transport logic
use std::sync::{
    Arc,
    atomic::{AtomicU32, AtomicU64, Ordering},
};
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
pub struct ConnectionState {
    pub connection_id: String,
    pub reconnect_count: AtomicU32,
    pub is_connected: bool,
    pub last_frame_time: Option<Instant>,
    pub total_frames_received: AtomicU64,
    pub total_connections: AtomicU64,
    pub last_disconnection_time: Option<Instant>,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            connection_id: uuid::Uuid::new_v4().to_string(),
            reconnect_count: AtomicU32::new(0),
            is_connected: false,
            last_frame_time: None,
            total_frames_received: AtomicU64::new(0),
            total_connections: AtomicU64::new(0),
            last_disconnection_time: None,
        }
    }
}

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called after a successful handshake. Starts a fresh connection id and
    /// clears the consecutive-failure count.
    pub fn mark_connected(&mut self) -> String {
        self.connection_id = uuid::Uuid::new_v4().to_string();
        self.last_frame_time = Some(Instant::now());
        self.is_connected = true;
        self.reconnect_count.store(0, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.connection_id.clone()
    }

    /// Returns the number of consecutive failed attempts so far.
    pub fn increment_reconnect(&mut self) -> u32 {
        self.is_connected = false;
        self.last_disconnection_time = Some(Instant::now());
        self.reconnect_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn record_frame(&mut self) {
        self.last_frame_time = Some(Instant::now());
        self.total_frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn disconnect(&mut self) {
        self.is_connected = false;
        self.last_disconnection_time = Some(Instant::now());
    }
}

pub type SharedConnectionState = Arc<Mutex<ConnectionState>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_connect_resets_consecutive_failures() {
        let mut state = ConnectionState::new();
        assert_eq!(state.increment_reconnect(), 1);
        assert_eq!(state.increment_reconnect(), 2);

        let first = state.mark_connected();
        assert!(state.is_connected);
        assert_eq!(state.reconnect_count.load(Ordering::Relaxed), 0);

        state.disconnect();
        let second = state.mark_connected();
        assert_ne!(first, second);
        assert_eq!(state.total_connections.load(Ordering::Relaxed), 2);
    }
}
