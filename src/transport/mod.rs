/// file: src/transport/mod.rs
/// description: event channel transports; each owns its physical connection and reconnection policy
use crate::{error::Result, events::SignalSender};
use async_trait::async_trait;
use tokio::sync::watch;

pub mod memory;
pub mod websocket;

pub use memory::{MemoryHub, MemoryTransport};
pub use websocket::WebSocketTransport;

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Short label used in logs.
    fn label(&self) -> &str;

    /// Drive the connection until `shutdown` flips to `true`, the peer goes
    /// away for good, or reconnection gives up. Every successful open must be
    /// followed by exactly one `Closed` signal.
    async fn run(&self, signals: SignalSender, shutdown: watch::Receiver<bool>) -> Result<()>;
}

/// Resolves once shutdown has been requested or the requesting side is gone.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
