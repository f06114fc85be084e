//! Lifecycle state cell.
//!
//! One writer (the lifecycle manager), many readers. Reads are a single atomic
//! load; transitions are also published on a watch channel for waiters.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum LifecycleState {
    Starting = 0,
    Running = 1,
    Draining = 2,
    Stopped = 3,
}

impl LifecycleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LifecycleState::Starting,
            1 => LifecycleState::Running,
            2 => LifecycleState::Draining,
            _ => LifecycleState::Stopped,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Draining => "draining",
            LifecycleState::Stopped => "stopped",
        })
    }
}

#[derive(Debug)]
pub struct StateCell {
    current: AtomicU8,
    changes: watch::Sender<LifecycleState>,
}

impl StateCell {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(LifecycleState::Starting);
        Self {
            current: AtomicU8::new(LifecycleState::Starting as u8),
            changes,
        }
    }

    pub fn get(&self) -> LifecycleState {
        LifecycleState::from_u8(self.current.load(Ordering::Acquire))
    }

    /// Move forward to `next`. Backward or repeated transitions are ignored
    /// and return false.
    pub(crate) fn advance(&self, next: LifecycleState) -> bool {
        let advanced = self
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                (LifecycleState::from_u8(raw) < next).then_some(next as u8)
            })
            .is_ok();
        if advanced {
            self.changes.send_replace(next);
            tracing::info!(state = %next, "Lifecycle state changed");
        }
        advanced
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.changes.subscribe()
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_only_move_forward() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), LifecycleState::Starting);
        assert!(cell.advance(LifecycleState::Running));
        assert!(cell.advance(LifecycleState::Draining));
        assert!(!cell.advance(LifecycleState::Running));
        assert!(!cell.advance(LifecycleState::Draining));
        assert_eq!(cell.get(), LifecycleState::Draining);
        assert!(cell.advance(LifecycleState::Stopped));
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let cell = StateCell::new();
        let mut rx = cell.subscribe();
        cell.advance(LifecycleState::Running);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), LifecycleState::Running);
    }
}
