/// file: src/realtime.rs
/// description: realtime client owning every component and servicing them from one cooperative select loop
use crate::{
    broadcast::PlatformBroadcastHandler,
    channel::EventChannel,
    config::Config,
    counters::{CountSource, CounterSynchronizer},
    error::{Result, SkillSwapError},
    events::{ChannelEvent, EventName, Namespace, TransportSignal},
    notifications::{NotificationId, NotificationIds, NotificationPresenter},
    surface::{BroadcastSink, CounterDisplay, NotificationSink},
    transport::Transport,
    types::{CounterKind, PlatformBroadcast, Severity, SwapDecisionPayload, SwapRequestPayload},
};
use std::{future::pending, sync::Arc};
use tokio::{
    sync::mpsc,
    time::{Instant, Interval, MissedTickBehavior, interval, sleep_until},
};
use tracing::{debug, info};

const EVENT_NOTIFICATIONS: [(EventName, &str, Severity); 4] = [
    (
        EventName::NewRequest,
        "New swap request received!",
        Severity::Info,
    ),
    (
        EventName::RequestAccepted,
        "Your swap request has been accepted!",
        Severity::Success,
    ),
    (
        EventName::RequestRejected,
        "Your swap request has been rejected.",
        Severity::Warning,
    ),
    (
        EventName::SwapCompleted,
        "Swap marked as completed!",
        Severity::Success,
    ),
];

/// Mount points handed to the client at construction. Anything left `None`
/// is simply not rendered; an unbound counter is also never fetched.
#[derive(Default)]
pub struct Surfaces {
    pub notifications: Option<Box<dyn NotificationSink>>,
    pub pending: Option<Box<dyn CounterDisplay>>,
    pub active: Option<Box<dyn CounterDisplay>>,
    pub broadcasts: Option<Box<dyn BroadcastSink>>,
}

#[derive(Debug)]
enum Command {
    Notify {
        id: NotificationId,
        message: String,
        severity: Severity,
    },
    Dismiss(NotificationId),
    Refresh(CounterKind),
    Broadcast(PlatformBroadcast),
    Shutdown,
}

/// Fire-and-forget entry point for surfacing a notification.
#[derive(Clone)]
pub struct Notifier {
    commands: mpsc::UnboundedSender<Command>,
    ids: NotificationIds,
}

impl Notifier {
    /// Queue a notification. The returned id is the one its record will
    /// carry; empty messages never get a record.
    pub fn notify(&self, message: impl Into<String>, severity: Severity) -> NotificationId {
        let id = self.ids.next();
        let command = Command::Notify {
            id,
            message: message.into(),
            severity,
        };
        if self.commands.send(command).is_err() {
            debug!("Notification {} dropped, client is not running", id);
        }
        id
    }

    /// Severity given as text; missing or unknown values fall back to info.
    pub fn notify_lenient(
        &self,
        message: impl Into<String>,
        severity: Option<&str>,
    ) -> NotificationId {
        self.notify(message, Severity::lenient(severity))
    }

    /// Explicit user dismissal ahead of expiry.
    pub fn dismiss(&self, id: NotificationId) {
        if self.commands.send(Command::Dismiss(id)).is_err() {
            debug!("Dismissal of {} dropped, client is not running", id);
        }
    }
}

/// Cloneable context handle given to the rest of the application. Usable
/// from any thread, inside the runtime or not.
#[derive(Clone)]
pub struct RealtimeHandle {
    notifier: Notifier,
}

impl RealtimeHandle {
    pub fn notifier(&self) -> Notifier {
        self.notifier.clone()
    }

    pub fn notify(&self, message: impl Into<String>, severity: Severity) -> NotificationId {
        self.notifier.notify(message, severity)
    }

    pub fn notify_lenient(
        &self,
        message: impl Into<String>,
        severity: Option<&str>,
    ) -> NotificationId {
        self.notifier.notify_lenient(message, severity)
    }

    pub fn dismiss(&self, id: NotificationId) {
        self.notifier.dismiss(id);
    }

    /// Refresh the pending request badge now. A no-op if it is not bound.
    pub fn refresh_pending_count(&self) -> Result<()> {
        self.send(Command::Refresh(CounterKind::Pending))
    }

    /// Refresh the active swap count now. A no-op if it is not bound.
    pub fn refresh_active_count(&self) -> Result<()> {
        self.send(Command::Refresh(CounterKind::Active))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.notifier
            .commands
            .send(command)
            .map_err(|_| SkillSwapError::LoopClosed)
    }
}

pub struct RealtimeClient {
    channel: EventChannel,
    platform_channel: Option<EventChannel>,
    presenter: NotificationPresenter,
    counters: CounterSynchronizer,
    broadcasts: PlatformBroadcastHandler,
    commands_tx: mpsc::UnboundedSender<Command>,
    commands_rx: mpsc::UnboundedReceiver<Command>,
}

impl RealtimeClient {
    /// `platform_transport` gives platform messages their own connection;
    /// without it they are multiplexed on `transport`.
    pub fn new(
        config: &Config,
        transport: Arc<dyn Transport>,
        platform_transport: Option<Arc<dyn Transport>>,
        source: Arc<dyn CountSource>,
        surfaces: Surfaces,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let mut client = Self {
            channel: EventChannel::new("user", transport),
            platform_channel: platform_transport.map(|t| EventChannel::new("platform", t)),
            presenter: NotificationPresenter::new(&config.notifications, surfaces.notifications),
            counters: CounterSynchronizer::new(
                &config.counters,
                source,
                surfaces.pending,
                surfaces.active,
            ),
            broadcasts: PlatformBroadcastHandler::new(&config.broadcasts, surfaces.broadcasts),
            commands_tx,
            commands_rx,
        };
        client.register_handlers();
        client
    }

    fn register_handlers(&mut self) {
        let notifier = self.notifier();
        for (name, message, severity) in EVENT_NOTIFICATIONS {
            let notifier = notifier.clone();
            self.channel_for(name).on(name, move |event| {
                log_swap_detail(event);
                notifier.notify(message, severity);
                Ok(())
            });
        }

        for (name, kind) in self.counters.reactive_bindings() {
            let trigger = self.counters.trigger();
            self.channel_for(name).on(name, move |_| {
                trigger.refresh(kind);
                Ok(())
            });
        }

        let commands = self.commands_tx.clone();
        let name = EventName::PlatformBroadcast;
        self.channel_for(name).on(name, move |event| {
            let broadcast = PlatformBroadcast::from_event(event)?;
            commands
                .send(Command::Broadcast(broadcast))
                .map_err(|_| SkillSwapError::LoopClosed)
        });
    }

    /// Platform events go to the dedicated channel when there is one.
    fn channel_for(&mut self, name: EventName) -> &mut EventChannel {
        match (name.namespace(), self.platform_channel.as_mut()) {
            (Namespace::Platform, Some(platform)) => platform,
            _ => &mut self.channel,
        }
    }

    pub fn notifier(&self) -> Notifier {
        Notifier {
            commands: self.commands_tx.clone(),
            ids: self.presenter.ids(),
        }
    }

    pub fn handle(&self) -> RealtimeHandle {
        RealtimeHandle {
            notifier: self.notifier(),
        }
    }

    pub fn channel(&self) -> &EventChannel {
        &self.channel
    }

    pub fn platform_channel(&self) -> Option<&EventChannel> {
        self.platform_channel.as_ref()
    }

    /// For registering application handlers next to the built-in ones.
    pub fn channel_mut(&mut self) -> &mut EventChannel {
        &mut self.channel
    }

    fn poller(&self, kind: CounterKind) -> Option<Interval> {
        self.counters.interval(kind).map(|period| {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        })
    }

    /// Connect and service events until [`RealtimeHandle::shutdown`], then
    /// tear everything down.
    pub async fn run(mut self) -> Result<()> {
        self.channel.connect();
        if let Some(platform) = self.platform_channel.as_mut() {
            platform.connect();
        }

        let mut pending_poll = self.poller(CounterKind::Pending);
        let mut active_poll = self.poller(CounterKind::Active);
        info!("Realtime client started");

        loop {
            let deadline = self.presenter.next_deadline();
            tokio::select! {
                Some(signal) = self.channel.recv() => {
                    self.channel.dispatch(signal);
                }
                Some(signal) = recv_platform(&mut self.platform_channel) => {
                    if let Some(platform) = self.platform_channel.as_mut() {
                        platform.dispatch(signal);
                    }
                }
                Some(command) = self.commands_rx.recv() => {
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Some(outcome) = self.counters.next_outcome() => {
                    self.counters.apply(outcome);
                }
                _ = tick(&mut pending_poll) => {
                    self.counters.refresh(CounterKind::Pending);
                }
                _ = tick(&mut active_poll) => {
                    self.counters.refresh(CounterKind::Active);
                }
                _ = expiry(deadline) => {
                    self.presenter.expire_due(Instant::now());
                }
            }
        }

        self.teardown().await;
        Ok(())
    }

    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Notify {
                id,
                message,
                severity,
            } => {
                self.presenter
                    .notify_with_id(id, &message, severity, Instant::now());
            }
            Command::Dismiss(id) => {
                if !self.presenter.dismiss(id) {
                    debug!("Notification {} already gone", id);
                }
            }
            Command::Refresh(kind) => {
                self.counters.refresh(kind);
            }
            Command::Broadcast(broadcast) => self.broadcasts.insert(broadcast),
            Command::Shutdown => return false,
        }
        true
    }

    async fn teardown(&mut self) {
        info!("Shutting down realtime client");
        self.channel.disconnect().await;
        self.channel.clear_handlers();
        if let Some(platform) = self.platform_channel.as_mut() {
            platform.disconnect().await;
            platform.clear_handlers();
        }
        self.presenter.clear();
    }
}

fn log_swap_detail(event: &ChannelEvent) {
    match event.name {
        EventName::NewRequest => {
            if let Ok(request) = serde_json::from_value::<SwapRequestPayload>(event.payload.clone()) {
                debug!("Swap request from {}: {}", request.requester_name, request.message);
            }
        }
        EventName::RequestAccepted | EventName::RequestRejected => {
            if let Ok(decision) =
                serde_json::from_value::<SwapDecisionPayload>(event.payload.clone())
            {
                debug!("{} by {}: {}", event.name, decision.receiver_name, decision.message);
            }
        }
        _ => {}
    }
}

async fn recv_platform(channel: &mut Option<EventChannel>) -> Option<TransportSignal> {
    match channel {
        Some(channel) => channel.recv().await,
        None => pending().await,
    }
}

async fn tick(poll: &mut Option<Interval>) {
    match poll {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending().await,
    }
}

async fn expiry(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}
