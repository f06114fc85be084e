//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate the static configuration
//! - Bind every entry point before any of them serves traffic
//!
//! # Design Decisions
//! - Fail fast: any bind error is fatal, no retries, no partial startup

use crate::config::validation::{validate_config, ValidationError};
use crate::config::StaticConfig;
use crate::net::{Listener, ListenerError};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid configuration: {}", format_errors(.0))]
    InvalidConfig(Vec<ValidationError>),

    #[error("entry point `{entry_point}`: {source}")]
    Bind {
        entry_point: String,
        source: ListenerError,
    },
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Bind all entry points, in name order. Listeners already bound are
/// dropped (closed) if a later one fails.
pub async fn bind_entry_points(config: &StaticConfig) -> Result<Vec<(String, Listener)>, StartupError> {
    validate_config(config).map_err(StartupError::InvalidConfig)?;

    let mut bound = Vec::with_capacity(config.entry_points.len());
    for (name, entry_point) in &config.entry_points {
        match Listener::bind(entry_point).await {
            Ok(listener) => {
                tracing::info!(
                    entry_point = %name,
                    address = %listener.local_addr(),
                    max_connections = listener.max_connections(),
                    "Entry point bound"
                );
                bound.push((name.clone(), listener));
            }
            Err(source) => {
                tracing::error!(entry_point = %name, error = %source, "Failed to bind entry point");
                return Err(StartupError::Bind {
                    entry_point: name.clone(),
                    source,
                });
            }
        }
    }
    Ok(bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EntryPointConfig;

    #[tokio::test]
    async fn binds_every_entry_point() {
        let mut config = StaticConfig::default();
        config.entry_points.clear();
        config.entry_points.insert("a".into(), EntryPointConfig::new("127.0.0.1:0"));
        config.entry_points.insert("b".into(), EntryPointConfig::new("127.0.0.1:0"));
        let bound = bind_entry_points(&config).await.unwrap();
        let names: Vec<_> = bound.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn one_bind_failure_fails_startup() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = StaticConfig::default();
        config.entry_points.clear();
        config.entry_points.insert("free".into(), EntryPointConfig::new("127.0.0.1:0"));
        config.entry_points.insert(
            "taken".into(),
            EntryPointConfig::new(taken.local_addr().unwrap().to_string()),
        );
        match bind_entry_points(&config).await {
            Err(StartupError::Bind { entry_point, .. }) => assert_eq!(entry_point, "taken"),
            other => panic!("expected bind failure, got {other:?}"),
        }
    }
}
