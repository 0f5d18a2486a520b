/// file: src/transport/memory.rs
/// description: in-process event server for tests and embedding applications
use crate::{
    error::{Result, SkillSwapError},
    events::{EventName, SignalSender, TransportSignal},
    transport::{Transport, shutdown_requested},
    types::WireFrame,
};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

const HUB_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
enum Push {
    Frame(String),
    Drop,
}

/// Server side of the in-memory channel. Every connected
/// [`MemoryTransport`] receives every pushed frame.
#[derive(Debug, Clone)]
pub struct MemoryHub {
    tx: broadcast::Sender<Push>,
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHub {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(HUB_CAPACITY);
        Self { tx }
    }

    pub fn transport(&self, label: impl Into<String>) -> MemoryTransport {
        MemoryTransport {
            label: label.into(),
            hub: self.tx.clone(),
        }
    }

    /// Push an event to every open connection. Returns how many received it.
    pub fn emit(&self, name: EventName, data: Value) -> usize {
        let frame = WireFrame::new(name.wire_name(), data);
        match serde_json::to_string(&frame) {
            Ok(text) => self.emit_raw(text),
            Err(e) => {
                warn!("Failed to encode {} frame: {}", name, e);
                0
            }
        }
    }

    pub fn emit_raw(&self, text: impl Into<String>) -> usize {
        self.tx.send(Push::Frame(text.into())).unwrap_or(0)
    }

    /// Sever every open connection; transports reopen immediately.
    pub fn drop_connections(&self) -> usize {
        self.tx.send(Push::Drop).unwrap_or(0)
    }

    pub fn connections(&self) -> usize {
        self.tx.receiver_count()
    }
}

pub struct MemoryTransport {
    label: String,
    hub: broadcast::Sender<Push>,
}

async fn signal(signals: &SignalSender, signal: TransportSignal) -> Result<()> {
    signals
        .send(signal)
        .await
        .map_err(|_| SkillSwapError::LoopClosed)
}

fn opened() -> TransportSignal {
    TransportSignal::Opened {
        connection_id: uuid::Uuid::new_v4().to_string(),
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn label(&self) -> &str {
        &self.label
    }

    async fn run(&self, signals: SignalSender, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        if *shutdown.borrow() {
            return Ok(());
        }

        let mut rx = self.hub.subscribe();
        signal(&signals, opened()).await?;

        loop {
            tokio::select! {
                _ = shutdown_requested(&mut shutdown) => {
                    signal(&signals, TransportSignal::Closed { reason: "client disconnect".into() }).await?;
                    return Ok(());
                }
                push = rx.recv() => match push {
                    Ok(Push::Frame(text)) => signal(&signals, TransportSignal::Frame(text)).await?,
                    Ok(Push::Drop) => {
                        debug!("[{}] connection dropped by hub, reopening", self.label);
                        signal(&signals, TransportSignal::Closed { reason: "dropped by server".into() }).await?;
                        rx = self.hub.subscribe();
                        signal(&signals, opened()).await?;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("[{}] lagged behind hub, {} frames skipped", self.label, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        signal(&signals, TransportSignal::Closed { reason: "hub closed".into() }).await?;
                        return Ok(());
                    }
                }
            }
        }
    }
}
