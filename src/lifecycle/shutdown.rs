//! Shutdown coordination for the proxy.

use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable handle counting termination requests.
///
/// The first trigger starts draining; a second one while draining escalates
/// to an immediate forced close.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<u32>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_modify(|count| *count += 1);
    }

    /// Number of triggers so far.
    pub fn requested(&self) -> u32 {
        *self.tx.borrow()
    }

    /// Resolves once at least `count` triggers have happened.
    pub async fn triggered(&self, count: u32) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|n| *n >= count).await;
    }

    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.tx.subscribe()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn counts_triggers() {
        let shutdown = Shutdown::new();
        let waiter = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.triggered(2).await })
        };
        shutdown.trigger();
        assert_eq!(shutdown.requested(), 1);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
