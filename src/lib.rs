//! Edge router library.
//!
//! Aggregates routing configuration from several providers into an
//! atomically swapped router table, applies per-router middleware chains
//! (client IP allow lists, path rewriting, headers) and coordinates a
//! graceful shutdown with a health probe that flips before draining.

pub mod admin;
pub mod aggregator;
pub mod config;
pub mod dispatch;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod provider;
pub mod routing;
pub mod security;

pub use aggregator::{ConfigurationAggregator, ConfigurationFragment, Snapshot};
pub use config::StaticConfig;
pub use lifecycle::{LifecycleManager, LifecycleState, RunningProxy, Shutdown};
pub use routing::RouterTable;
