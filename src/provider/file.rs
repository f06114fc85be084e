//! File provider: one TOML document holding a dynamic configuration.

use std::future::pending;
use std::path::PathBuf;

use tokio::sync::{broadcast, mpsc};

use crate::config::loader::load_dynamic;
use crate::config::watcher::ConfigWatcher;
use crate::config::DynamicConfig;
use crate::lifecycle::Shutdown;
use crate::provider::{push, FragmentSender, ProviderError};

pub const NAME: &str = "file";

#[derive(Debug, Clone)]
pub struct FileProvider {
    path: PathBuf,
    watch: bool,
}

impl FileProvider {
    pub fn new(path: PathBuf, watch: bool) -> Self {
        Self { path, watch }
    }

    pub async fn run(
        self,
        updates: FragmentSender,
        mut reload: broadcast::Receiver<()>,
        shutdown: Shutdown,
    ) -> Result<(), ProviderError> {
        self.load_and_push(&updates)?;

        // The watcher stops when dropped, so it lives as long as this loop.
        let (_watcher, mut changes) = if self.watch {
            let (watcher, changes) = ConfigWatcher::new(&self.path);
            (Some(watcher.run()?), Some(changes))
        } else {
            (None, None)
        };

        let mut reload_open = true;
        loop {
            tokio::select! {
                _ = shutdown.triggered(1) => return Ok(()),
                Some(config) = next_change(&mut changes) => push(&updates, NAME, config)?,
                signal = reload.recv(), if reload_open => match signal {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        tracing::info!(path = ?self.path, "Reloading dynamic configuration");
                        self.load_and_push(&updates)?;
                    }
                    Err(broadcast::error::RecvError::Closed) => reload_open = false,
                },
            }
        }
    }

    /// Parse failures are logged and leave the previous fragment in force.
    fn load_and_push(&self, updates: &FragmentSender) -> Result<(), ProviderError> {
        match load_dynamic(&self.path) {
            Ok(config) => push(updates, NAME, config),
            Err(e) => {
                tracing::error!(
                    path = ?self.path,
                    error = %e,
                    "Failed to load dynamic configuration. Keeping current configuration."
                );
                Ok(())
            }
        }
    }
}

async fn next_change(changes: &mut Option<mpsc::UnboundedReceiver<DynamicConfig>>) -> Option<DynamicConfig> {
    match changes {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}
