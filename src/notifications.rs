/// file: src/notifications.rs
/// description: transient notifications that expire after their display duration or on dismissal
use crate::{
    config::NotificationConfig, monitoring::NOTIFICATIONS_COUNTER, surface::NotificationSink,
    types::Severity,
};
use chrono::{DateTime, Utc};
use std::{
    collections::VecDeque,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotificationId(pub u64);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared id allocator, so a caller outside the loop learns the id of a
/// notification before its record exists.
#[derive(Debug, Clone, Default)]
pub struct NotificationIds(Arc<AtomicU64>);

impl NotificationIds {
    pub fn next(&self) -> NotificationId {
        NotificationId(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub message: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

struct Visible {
    record: NotificationRecord,
    expires_at: Instant,
}

pub struct NotificationPresenter {
    ttl: Duration,
    capacity: usize,
    visible: VecDeque<Visible>,
    sink: Option<Box<dyn NotificationSink>>,
    ids: NotificationIds,
}

impl NotificationPresenter {
    pub fn new(config: &NotificationConfig, sink: Option<Box<dyn NotificationSink>>) -> Self {
        Self {
            ttl: config.ttl,
            capacity: config.capacity,
            visible: VecDeque::new(),
            sink,
            ids: NotificationIds::default(),
        }
    }

    /// Allocator shared with notifiers that queue work for this presenter.
    pub fn ids(&self) -> NotificationIds {
        self.ids.clone()
    }

    pub fn notify(&mut self, message: &str, severity: Severity) -> Option<NotificationId> {
        self.notify_at(message, severity, Instant::now())
    }

    /// Like [`notify`](Self::notify) with an explicit clock reading.
    /// Empty messages are ignored.
    pub fn notify_at(
        &mut self,
        message: &str,
        severity: Severity,
        now: Instant,
    ) -> Option<NotificationId> {
        let id = self.ids.next();
        self.notify_with_id(id, message, severity, now)
    }

    /// Show a record under an id taken earlier from [`ids`](Self::ids).
    pub fn notify_with_id(
        &mut self,
        id: NotificationId,
        message: &str,
        severity: Severity,
        now: Instant,
    ) -> Option<NotificationId> {
        if message.trim().is_empty() {
            debug!("Ignoring empty notification {}", id);
            return None;
        }

        let record = NotificationRecord {
            id,
            message: message.to_string(),
            severity,
            created_at: Utc::now(),
        };

        if self.capacity > 0 && self.visible.len() >= self.capacity {
            let oldest = self.oldest();
            if let Some(oldest) = oldest {
                debug!("Notification capacity reached, evicting {}", oldest);
                self.remove(oldest);
            }
        }

        if let Some(sink) = self.sink.as_mut()
            && let Err(e) = sink.mount(&record)
        {
            debug!("Notification {} not rendered: {}", id, e);
        }
        NOTIFICATIONS_COUNTER.increment(1);

        self.visible.push_back(Visible {
            record,
            expires_at: now + self.ttl,
        });
        Some(id)
    }

    /// Explicit user dismissal. Returns `false` if it was already gone.
    pub fn dismiss(&mut self, id: NotificationId) -> bool {
        self.remove(id)
    }

    /// Remove every record whose display duration has elapsed at `now`.
    pub fn expire_due(&mut self, now: Instant) -> usize {
        let due: Vec<NotificationId> = self
            .visible
            .iter()
            .filter(|v| v.expires_at <= now)
            .map(|v| v.record.id)
            .collect();
        for id in &due {
            self.remove(*id);
        }
        due.len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.visible.iter().map(|v| v.expires_at).min()
    }

    /// Visible records, oldest first.
    pub fn visible(&self) -> impl Iterator<Item = &NotificationRecord> {
        self.visible.iter().map(|v| &v.record)
    }

    pub fn len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    /// Unmount everything (teardown).
    pub fn clear(&mut self) {
        while let Some(oldest) = self.oldest() {
            self.remove(oldest);
        }
    }

    fn oldest(&self) -> Option<NotificationId> {
        self.visible.front().map(|v| v.record.id)
    }

    fn remove(&mut self, id: NotificationId) -> bool {
        let Some(pos) = self.visible.iter().position(|v| v.record.id == id) else {
            return false;
        };
        self.visible.remove(pos);
        if let Some(sink) = self.sink.as_mut()
            && let Err(e) = sink.unmount(id)
        {
            debug!("Notification {} not unmounted: {}", id, e);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::SkillSwapError, surface::NotificationBoard};

    fn config(capacity: usize) -> NotificationConfig {
        NotificationConfig {
            ttl: Duration::from_secs(5),
            capacity,
        }
    }

    #[test]
    fn visible_count_tracks_calls_within_display_duration() {
        let board = NotificationBoard::new();
        let mut presenter = NotificationPresenter::new(&config(0), Some(board.sink()));
        let start = Instant::now();
        let severities = [Severity::Info, Severity::Danger, Severity::Success];

        // one call per second for 12 seconds
        for second in 0..12u64 {
            let now = start + Duration::from_secs(second);
            presenter.expire_due(now);
            presenter.notify_at("tick", severities[second as usize % 3], now);

            let expected = (second + 1).min(5) as usize;
            assert_eq!(presenter.len(), expected, "at second {}", second);
            assert_eq!(board.len(), expected);
        }

        presenter.expire_due(start + Duration::from_secs(30));
        assert!(presenter.is_empty());
        assert!(board.is_empty());
    }

    #[test]
    fn identical_notifications_are_not_merged() {
        let mut presenter = NotificationPresenter::new(&config(0), None);
        let a = presenter.notify("Swap marked as completed!", Severity::Success);
        let b = presenter.notify("Swap marked as completed!", Severity::Success);
        assert_ne!(a, b);
        assert_eq!(presenter.len(), 2);
    }

    #[test]
    fn dismissal_and_expiry_do_not_double_remove() {
        let board = NotificationBoard::new();
        let mut presenter = NotificationPresenter::new(&config(0), Some(board.sink()));
        let now = Instant::now();
        let first = presenter.notify_at("one", Severity::Info, now).unwrap();
        presenter.notify_at("two", Severity::Warning, now + Duration::from_secs(1));

        assert!(presenter.dismiss(first));
        assert!(!presenter.dismiss(first));
        assert_eq!(presenter.next_deadline(), Some(now + Duration::from_secs(6)));

        assert_eq!(presenter.expire_due(now + Duration::from_secs(5)), 0);
        assert_eq!(presenter.expire_due(now + Duration::from_secs(6)), 1);
        assert!(board.is_empty());
        assert_eq!(presenter.next_deadline(), None);
    }

    #[test]
    fn ids_taken_ahead_are_honored() {
        let mut presenter = NotificationPresenter::new(&config(0), None);
        let ids = presenter.ids();
        let reserved = ids.next();
        let direct = presenter.notify("direct", Severity::Info).unwrap();
        assert_ne!(direct, reserved);

        let now = Instant::now();
        assert_eq!(
            presenter.notify_with_id(reserved, "queued", Severity::Info, now),
            Some(reserved)
        );
        assert!(presenter.dismiss(reserved));
        assert_eq!(presenter.len(), 1);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let board = NotificationBoard::new();
        let mut presenter = NotificationPresenter::new(&config(2), Some(board.sink()));
        presenter.notify("a", Severity::Info);
        presenter.notify("b", Severity::Info);
        presenter.notify("c", Severity::Info);

        assert_eq!(board.messages(), vec!["b", "c"]);
        let kept: Vec<_> = presenter.visible().map(|r| r.message.as_str()).collect();
        assert_eq!(kept, vec!["b", "c"]);
    }

    #[test]
    fn missing_or_failing_sink_is_a_no_op() {
        struct Broken;
        impl NotificationSink for Broken {
            fn mount(&mut self, _: &NotificationRecord) -> crate::error::Result<()> {
                Err(SkillSwapError::InvalidConfig("no mount point".into()))
            }
            fn unmount(&mut self, _: NotificationId) -> crate::error::Result<()> {
                Err(SkillSwapError::InvalidConfig("no mount point".into()))
            }
        }

        let mut headless = NotificationPresenter::new(&config(0), None);
        assert!(headless.notify("hello", Severity::Info).is_some());

        let mut broken = NotificationPresenter::new(&config(0), Some(Box::new(Broken)));
        let id = broken.notify("hello", Severity::Info).unwrap();
        assert!(broken.dismiss(id));
        assert!(broken.notify("   ", Severity::Info).is_none());
    }
}
