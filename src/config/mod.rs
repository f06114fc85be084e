//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! static config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, all errors reported)
//!     → StaticConfig (immutable for the process lifetime)
//!
//! dynamic config (per provider)
//!     → dynamic.rs (normalized fragment shape)
//!     → watcher.rs (file provider reloads)
//!     → aggregator (namespacing, per-entry validation)
//! ```
//!
//! # Design Decisions
//! - Static config is immutable once loaded; only dynamic config reloads
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod dynamic;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use dynamic::{DynamicConfig, MiddlewareSpec, RouterSpec, ServiceSpec};
pub use loader::{load_config, ConfigError};
pub use schema::{
    ApiConfig, EntryPointConfig, FileProviderConfig, LifecycleConfig, PingConfig, StaticConfig,
    TrailingSlashPolicy,
};
