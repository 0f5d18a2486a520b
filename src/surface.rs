/// file: src/surface.rs
/// description: mount points the core renders into, plus headless implementations readable by embedders and tests
use crate::{
    error::Result,
    notifications::{NotificationId, NotificationRecord},
    types::PlatformBroadcast,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub trait NotificationSink: Send {
    fn mount(&mut self, record: &NotificationRecord) -> Result<()>;
    fn unmount(&mut self, id: NotificationId) -> Result<()>;
}

pub trait CounterDisplay: Send {
    fn show(&mut self, text: &str) -> Result<()>;
    fn hide(&mut self) -> Result<()>;
}

pub trait BroadcastSink: Send {
    fn prepend(&mut self, broadcast: &PlatformBroadcast) -> Result<()>;
    fn evict(&mut self, broadcast: &PlatformBroadcast) -> Result<()>;
}

fn lock<T>(cell: &Mutex<T>) -> MutexGuard<'_, T> {
    cell.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What a counter element currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CounterView {
    #[default]
    Unrendered,
    Hidden,
    Shown(String),
}

#[derive(Debug, Default)]
struct CounterCellState {
    view: CounterView,
    renders: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CounterCell {
    inner: Arc<Mutex<CounterCellState>>,
}

impl CounterCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> CounterView {
        lock(&self.inner).view.clone()
    }

    pub fn renders(&self) -> usize {
        lock(&self.inner).renders
    }

    pub fn display(&self) -> Box<dyn CounterDisplay> {
        Box::new(self.clone())
    }
}

impl CounterDisplay for CounterCell {
    fn show(&mut self, text: &str) -> Result<()> {
        let mut state = lock(&self.inner);
        state.view = CounterView::Shown(text.to_string());
        state.renders += 1;
        Ok(())
    }

    fn hide(&mut self) -> Result<()> {
        let mut state = lock(&self.inner);
        state.view = CounterView::Hidden;
        state.renders += 1;
        Ok(())
    }
}

/// Mounted notifications, oldest first.
#[derive(Debug, Clone, Default)]
pub struct NotificationBoard {
    inner: Arc<Mutex<Vec<NotificationRecord>>>,
}

impl NotificationBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<NotificationRecord> {
        lock(&self.inner).clone()
    }

    pub fn messages(&self) -> Vec<String> {
        lock(&self.inner).iter().map(|r| r.message.clone()).collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sink(&self) -> Box<dyn NotificationSink> {
        Box::new(self.clone())
    }
}

impl NotificationSink for NotificationBoard {
    fn mount(&mut self, record: &NotificationRecord) -> Result<()> {
        lock(&self.inner).push(record.clone());
        Ok(())
    }

    fn unmount(&mut self, id: NotificationId) -> Result<()> {
        lock(&self.inner).retain(|r| r.id != id);
        Ok(())
    }
}

/// Platform message region, newest first.
#[derive(Debug, Clone, Default)]
pub struct BroadcastBoard {
    inner: Arc<Mutex<Vec<PlatformBroadcast>>>,
}

impl BroadcastBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn titles(&self) -> Vec<String> {
        lock(&self.inner).iter().map(|b| b.title.clone()).collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sink(&self) -> Box<dyn BroadcastSink> {
        Box::new(self.clone())
    }
}

impl BroadcastSink for BroadcastBoard {
    fn prepend(&mut self, broadcast: &PlatformBroadcast) -> Result<()> {
        lock(&self.inner).insert(0, broadcast.clone());
        Ok(())
    }

    fn evict(&mut self, broadcast: &PlatformBroadcast) -> Result<()> {
        let mut region = lock(&self.inner);
        if let Some(pos) = region.iter().rposition(|b| b == broadcast) {
            region.remove(pos);
        }
        Ok(())
    }
}
