/// file: src/counters.rs
/// description: server-backed counters refreshed on events and on a timer; values only ever come from applied fetches
use crate::{
    config::CounterConfig,
    error::Result,
    events::EventName,
    monitoring::{REFRESH_FAILURES_COUNTER, REFRESHES_COUNTER, counter_gauge},
    surface::CounterDisplay,
    types::CounterKind,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// How overlapping refreshes of one counter are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// The most recently completed response is shown.
    #[default]
    LastResponseWins,
    /// Responses issued before the one currently shown are discarded.
    Sequenced,
}

/// Read side of the platform's count endpoints.
#[async_trait]
pub trait CountSource: Send + Sync + 'static {
    async fn fetch_count(&self, kind: CounterKind) -> Result<u64>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterState {
    pub kind: CounterKind,
    pub value: u64,
    pub last_refreshed: Option<DateTime<Utc>>,
}

/// Pending requests are a badge hidden when empty; active swaps are a
/// metric that is always shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroPolicy {
    Hide,
    Show,
}

pub fn zero_policy(kind: CounterKind) -> ZeroPolicy {
    match kind {
        CounterKind::Pending => ZeroPolicy::Hide,
        CounterKind::Active => ZeroPolicy::Show,
    }
}

#[derive(Debug)]
pub struct RefreshOutcome {
    pub kind: CounterKind,
    pub seq: u64,
    pub result: Result<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Rendered(u64),
    Stale,
    Failed,
    Unbound,
}

/// Cloneable handle that issues refreshes. Safe to call from event handlers.
#[derive(Clone)]
pub struct RefreshTrigger {
    source: Arc<dyn CountSource>,
    outcomes: mpsc::UnboundedSender<RefreshOutcome>,
    issued: Arc<[AtomicU64; 2]>,
    bound: [bool; 2],
}

impl RefreshTrigger {
    /// Start one fetch for `kind`. Returns its sequence number, or `None`
    /// when no display is bound for that counter.
    pub fn refresh(&self, kind: CounterKind) -> Option<u64> {
        if !self.bound[kind.index()] {
            trace!("No {} counter bound, skipping refresh", kind);
            return None;
        }

        let seq = self.issued[kind.index()].fetch_add(1, Ordering::Relaxed) + 1;
        REFRESHES_COUNTER.increment(1);
        debug!("Refreshing {} count (#{})", kind, seq);

        let source = self.source.clone();
        let outcomes = self.outcomes.clone();
        tokio::spawn(async move {
            let result = source.fetch_count(kind).await;
            let _ = outcomes.send(RefreshOutcome { kind, seq, result });
        });
        Some(seq)
    }
}

struct Pipeline {
    state: CounterState,
    display: Box<dyn CounterDisplay>,
    triggers: Vec<EventName>,
    interval: Duration,
    applied_seq: u64,
}

pub struct CounterSynchronizer {
    policy: RefreshPolicy,
    pipelines: [Option<Pipeline>; 2],
    trigger: RefreshTrigger,
    outcomes: mpsc::UnboundedReceiver<RefreshOutcome>,
}

impl CounterSynchronizer {
    pub fn new(
        config: &CounterConfig,
        source: Arc<dyn CountSource>,
        pending: Option<Box<dyn CounterDisplay>>,
        active: Option<Box<dyn CounterDisplay>>,
    ) -> Self {
        let pipeline = |kind: CounterKind, display: Option<Box<dyn CounterDisplay>>| {
            display.map(|display| Pipeline {
                state: CounterState {
                    kind,
                    value: 0,
                    last_refreshed: None,
                },
                display,
                triggers: config.triggers(kind).to_vec(),
                interval: config.interval(kind),
                applied_seq: 0,
            })
        };
        let pipelines = [
            pipeline(CounterKind::Pending, pending),
            pipeline(CounterKind::Active, active),
        ];

        let (tx, rx) = mpsc::unbounded_channel();
        let trigger = RefreshTrigger {
            source,
            outcomes: tx,
            issued: Arc::new([AtomicU64::new(0), AtomicU64::new(0)]),
            bound: [pipelines[0].is_some(), pipelines[1].is_some()],
        };

        Self {
            policy: config.policy,
            pipelines,
            trigger,
            outcomes: rx,
        }
    }

    pub fn trigger(&self) -> RefreshTrigger {
        self.trigger.clone()
    }

    pub fn refresh(&self, kind: CounterKind) -> Option<u64> {
        self.trigger.refresh(kind)
    }

    pub fn is_bound(&self, kind: CounterKind) -> bool {
        self.pipelines[kind.index()].is_some()
    }

    /// Polling period for a bound counter.
    pub fn interval(&self, kind: CounterKind) -> Option<Duration> {
        self.pipelines[kind.index()].as_ref().map(|p| p.interval)
    }

    /// `(event, counter)` pairs whose event should refresh that counter.
    pub fn reactive_bindings(&self) -> Vec<(EventName, CounterKind)> {
        self.pipelines
            .iter()
            .flatten()
            .flat_map(|p| p.triggers.iter().map(move |name| (*name, p.state.kind)))
            .collect()
    }

    pub fn state(&self, kind: CounterKind) -> Option<&CounterState> {
        self.pipelines[kind.index()].as_ref().map(|p| &p.state)
    }

    /// Next completed fetch. Cancel safe.
    pub async fn next_outcome(&mut self) -> Option<RefreshOutcome> {
        self.outcomes.recv().await
    }

    pub fn apply(&mut self, outcome: RefreshOutcome) -> Applied {
        let RefreshOutcome { kind, seq, result } = outcome;
        let Some(pipeline) = self.pipelines[kind.index()].as_mut() else {
            return Applied::Unbound;
        };

        let value = match result {
            Ok(value) => value,
            Err(e) => {
                REFRESH_FAILURES_COUNTER.increment(1);
                warn!("Error updating {} count: {}", kind, e);
                return Applied::Failed;
            }
        };

        if self.policy == RefreshPolicy::Sequenced && seq < pipeline.applied_seq {
            debug!(
                "Discarding {} count #{} (showing #{})",
                kind, seq, pipeline.applied_seq
            );
            return Applied::Stale;
        }

        pipeline.applied_seq = pipeline.applied_seq.max(seq);
        pipeline.state.value = value;
        pipeline.state.last_refreshed = Some(Utc::now());
        counter_gauge(kind).set(value as f64);

        let rendered = match zero_policy(kind) {
            ZeroPolicy::Hide if value == 0 => pipeline.display.hide(),
            _ => pipeline.display.show(&value.to_string()),
        };
        if let Err(e) = rendered {
            debug!("{} counter not rendered: {}", kind, e);
        }
        Applied::Rendered(value)
    }
}
