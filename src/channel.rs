/// file: src/channel.rs
/// description: event channel adapter: connect/disconnect lifecycle and a named-event handler registry that survives reconnects
use crate::{
    error::Result,
    events::{ChannelEvent, EventName, SignalReceiver, SignalSender, TransportSignal, create_signal_channel},
    monitoring::{CONNECTED_GAUGE, EVENTS_DISPATCHED_COUNTER, HANDLER_FAILURES_COUNTER},
    transport::Transport,
};
use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle, time::timeout};
use tracing::{debug, error, info, warn};

const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

type Handler = Box<dyn FnMut(&ChannelEvent) -> Result<()> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Registration {
    id: SubscriptionId,
    name: EventName,
    handler: Handler,
}

pub struct EventChannel {
    label: String,
    transport: Arc<dyn Transport>,
    registrations: Vec<Registration>,
    next_id: u64,
    signals_tx: SignalSender,
    signals_rx: SignalReceiver,
    task: Option<JoinHandle<()>>,
    shutdown: Option<watch::Sender<bool>>,
    connected: bool,
}

impl EventChannel {
    pub fn new(label: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        let (signals_tx, signals_rx) = create_signal_channel();
        Self {
            label: label.into(),
            transport,
            registrations: Vec::new(),
            next_id: 0,
            signals_tx,
            signals_rx,
            task: None,
            shutdown: None,
            connected: false,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Register `handler` for every event named `name`. Handlers for the same
    /// name run in registration order.
    pub fn on<F>(&mut self, name: EventName, handler: F) -> SubscriptionId
    where
        F: FnMut(&ChannelEvent) -> Result<()> + Send + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.registrations.push(Registration {
            id,
            name,
            handler: Box::new(handler),
        });
        debug!("[{}] Subscribed to {} ({:?})", self.label, name, id);
        id
    }

    pub fn off(&mut self, id: SubscriptionId) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.id != id);
        before != self.registrations.len()
    }

    pub fn clear_handlers(&mut self) {
        self.registrations.clear();
    }

    pub fn handler_count(&self, name: EventName) -> usize {
        self.registrations.iter().filter(|r| r.name == name).count()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Start the transport. Returns `false` if it is already running.
    pub fn connect(&mut self) -> bool {
        if self.is_running() {
            debug!("[{}] Event channel already connected", self.label);
            return false;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let transport = self.transport.clone();
        let signals = self.signals_tx.clone();
        let label = self.label.clone();

        info!(
            "[{}] Connecting event channel via {}",
            self.label,
            transport.label()
        );
        self.task = Some(tokio::spawn(async move {
            if let Err(e) = transport.run(signals, stop_rx).await {
                error!("[{}] Event channel transport stopped: {}", label, e);
            }
        }));
        self.shutdown = Some(stop_tx);
        true
    }

    /// Stop the transport, deliver whatever it reported before stopping, and
    /// make sure interested handlers saw exactly one `ConnectionLost`.
    pub async fn disconnect(&mut self) {
        if let Some(stop) = self.shutdown.take() {
            let _ = stop.send(true);
        }
        if let Some(mut task) = self.task.take()
            && timeout(DISCONNECT_GRACE, &mut task).await.is_err()
        {
            warn!("[{}] Transport did not stop in time, aborting", self.label);
            task.abort();
        }

        while let Ok(signal) = self.signals_rx.try_recv() {
            self.dispatch(signal);
        }

        if self.connected {
            self.connected = false;
            CONNECTED_GAUGE.decrement(1.0);
            info!("[{}] Event channel disconnected", self.label);
            self.emit(&ChannelEvent::connection_lost("client disconnect"));
        }
    }

    /// Next signal from the transport. Cancel safe.
    pub async fn recv(&mut self) -> Option<TransportSignal> {
        self.signals_rx.recv().await
    }

    /// Turn a transport signal into a channel event and run its handlers.
    /// Returns the number of handlers invoked.
    pub fn dispatch(&mut self, signal: TransportSignal) -> usize {
        match signal {
            TransportSignal::Opened { connection_id } => {
                info!("[{}] Connected to server ({})", self.label, connection_id);
                if !self.connected {
                    CONNECTED_GAUGE.increment(1.0);
                }
                self.connected = true;
                self.emit(&ChannelEvent::connection_established(&connection_id))
            }
            TransportSignal::Closed { reason } => {
                if !self.connected {
                    debug!("[{}] Close reported while not connected: {}", self.label, reason);
                    return 0;
                }
                warn!("[{}] Disconnected from server: {}", self.label, reason);
                self.connected = false;
                CONNECTED_GAUGE.decrement(1.0);
                self.emit(&ChannelEvent::connection_lost(&reason))
            }
            TransportSignal::Frame(text) => match ChannelEvent::decode(&text) {
                Ok(Some(event)) => self.emit(&event),
                Ok(None) => {
                    debug!("[{}] Ignoring unsubscribed frame", self.label);
                    0
                }
                Err(e) => {
                    warn!("[{}] Dropping undecodable frame: {}", self.label, e);
                    0
                }
            },
        }
    }

    /// Run every handler registered for `event.name`. A failing handler is
    /// logged and does not stop the others.
    pub fn emit(&mut self, event: &ChannelEvent) -> usize {
        EVENTS_DISPATCHED_COUNTER.increment(1);
        let mut invoked = 0;
        for registration in self
            .registrations
            .iter_mut()
            .filter(|r| r.name == event.name)
        {
            invoked += 1;
            if let Err(e) = (registration.handler)(event) {
                HANDLER_FAILURES_COUNTER.increment(1);
                warn!(
                    "[{}] Handler {:?} for {} failed: {}",
                    self.label, registration.id, event.name, e
                );
            }
        }
        invoked
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        if let Some(stop) = self.shutdown.take() {
            let _ = stop.send(true);
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
