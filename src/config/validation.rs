//! Static configuration validation.
//!
//! Serde handles syntax; this module checks semantics and returns every
//! violation rather than stopping at the first. Dynamic configuration is
//! validated per entry by the aggregator instead.

use std::net::SocketAddr;

use crate::config::schema::StaticConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("at least one entry point is required")]
    NoEntryPoints,

    #[error("entry point `{name}` has invalid address `{address}`")]
    InvalidAddress { name: String, address: String },

    #[error("entry point `{name}` must allow at least one connection")]
    ZeroConnections { name: String },

    #[error("{section} refers to unknown entry point `{entry_point}`")]
    UnknownEntryPoint {
        section: &'static str,
        entry_point: String,
    },

    #[error("file provider path must not be empty")]
    EmptyProviderPath,
}

/// Validate a parsed static configuration.
pub fn validate_config(config: &StaticConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.entry_points.is_empty() {
        errors.push(ValidationError::NoEntryPoints);
    }

    for (name, entry_point) in &config.entry_points {
        if entry_point.address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                name: name.clone(),
                address: entry_point.address.clone(),
            });
        }
        if entry_point.max_connections == 0 {
            errors.push(ValidationError::ZeroConnections { name: name.clone() });
        }
    }

    if let Some(ping) = &config.ping {
        if !config.entry_points.contains_key(&ping.entry_point) {
            errors.push(ValidationError::UnknownEntryPoint {
                section: "ping",
                entry_point: ping.entry_point.clone(),
            });
        }
    }

    if let Some(api) = &config.api {
        if !config.entry_points.contains_key(&api.entry_point) {
            errors.push(ValidationError::UnknownEntryPoint {
                section: "api",
                entry_point: api.entry_point.clone(),
            });
        }
    }

    if let Some(file) = &config.providers.file {
        if file.path.as_os_str().is_empty() {
            errors.push(ValidationError::EmptyProviderPath);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
