//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Bind every entry point → Running
//!
//! Running (manager.rs):
//!     Provider fragment → aggregator → compile → RouterTable swap
//!
//! Shutdown (shutdown.rs, manager.rs):
//!     Trigger → Draining (health 503) → Stop accepting → Drain → Stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown trigger
//!     SIGHUP → Provider reload
//! ```
//!
//! # Design Decisions
//! - The manager is the only writer of [`LifecycleState`]
//! - Health flips before any connection is refused
//! - Shutdown has a deadline: forced close once the grace period elapses

pub mod manager;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

pub use manager::{LifecycleManager, RunningProxy};
pub use shutdown::Shutdown;
pub use startup::StartupError;
pub use state::LifecycleState;
