//! Configuration providers.
//!
//! # Data Flow
//! ```text
//! file.rs   (TOML file, notify watch, SIGHUP re-read) ─┐
//! inline.rs ([providers.inline] in the static file)  ─┼→ ConfigUpdate channel
//! embedders / tests (RunningProxy::apply)             ─┘      → LifecycleManager
//!                                                               → aggregator
//! ```
//!
//! # Design Decisions
//! - A closed set of providers; each one normalises its source into a
//!   [`DynamicConfig`] and pushes it, the core never polls
//! - A provider always pushes its complete view; an empty fragment clears it

pub mod file;
pub mod inline;

use tokio::sync::{broadcast, mpsc, oneshot};

use crate::aggregator::ConfigurationFragment;
use crate::config::schema::ProvidersConfig;
use crate::config::DynamicConfig;
use crate::lifecycle::Shutdown;

pub use file::FileProvider;
pub use inline::InlineProvider;

/// A fragment on its way to the aggregator, optionally acknowledged with
/// the table version live after it was applied.
#[derive(Debug)]
pub struct ConfigUpdate {
    pub fragment: ConfigurationFragment,
    pub(crate) applied: Option<oneshot::Sender<u64>>,
}

impl From<ConfigurationFragment> for ConfigUpdate {
    fn from(fragment: ConfigurationFragment) -> Self {
        Self {
            fragment,
            applied: None,
        }
    }
}

pub type FragmentSender = mpsc::UnboundedSender<ConfigUpdate>;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("failed to watch configuration: {0}")]
    Watch(#[from] notify::Error),

    #[error("configuration channel closed")]
    ChannelClosed,
}

/// Every configuration source this router knows.
#[derive(Debug, Clone)]
pub enum Provider {
    File(FileProvider),
    Inline(InlineProvider),
}

impl Provider {
    /// Providers enabled in the static configuration.
    pub fn from_config(config: &ProvidersConfig) -> Vec<Provider> {
        let mut providers = Vec::new();
        if let Some(file) = &config.file {
            providers.push(Provider::File(FileProvider::new(file.path.clone(), file.watch)));
        }
        if let Some(inline) = &config.inline {
            providers.push(Provider::Inline(InlineProvider::new(inline.clone())));
        }
        providers
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::File(_) => file::NAME,
            Provider::Inline(_) => inline::NAME,
        }
    }

    /// Push fragments until shutdown. Returns early if the channel closes.
    pub async fn run(
        self,
        updates: FragmentSender,
        reload: broadcast::Receiver<()>,
        shutdown: Shutdown,
    ) -> Result<(), ProviderError> {
        match self {
            Provider::File(provider) => provider.run(updates, reload, shutdown).await,
            Provider::Inline(provider) => provider.run(updates),
        }
    }
}

fn push(updates: &FragmentSender, provider: &str, config: DynamicConfig) -> Result<(), ProviderError> {
    updates
        .send(ConfigurationFragment::new(provider, config).into())
        .map_err(|_| ProviderError::ChannelClosed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::FileProviderConfig;

    #[test]
    fn builds_enabled_providers() {
        let config = ProvidersConfig {
            file: Some(FileProviderConfig {
                path: "dynamic.toml".into(),
                watch: false,
            }),
            inline: Some(DynamicConfig::default()),
        };
        let names: Vec<_> = Provider::from_config(&config).iter().map(Provider::name).collect();
        assert_eq!(names, vec!["file", "inline"]);
        assert!(Provider::from_config(&ProvidersConfig::default()).is_empty());
    }
}
