//! Dynamic configuration embedded in the static file.

use crate::config::DynamicConfig;
use crate::provider::{push, FragmentSender, ProviderError};

pub const NAME: &str = "inline";

#[derive(Debug, Clone)]
pub struct InlineProvider {
    config: DynamicConfig,
}

impl InlineProvider {
    pub fn new(config: DynamicConfig) -> Self {
        Self { config }
    }

    /// The configuration never changes, so it is pushed once.
    pub fn run(self, updates: FragmentSender) -> Result<(), ProviderError> {
        push(&updates, NAME, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn pushes_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        InlineProvider::new(DynamicConfig::default()).run(tx).unwrap();
        let update = rx.try_recv().unwrap();
        assert_eq!(update.fragment.provider, "inline");
        assert!(rx.try_recv().is_err());
    }
}
