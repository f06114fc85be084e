//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Snapshot
//!     → table.rs (compile: matchers + handler chains, sorted by priority)
//!     → RouterTable::swap (atomic publish)
//!
//! Incoming Request (host, path, method)
//!     → RouterTable::current
//!     → matcher.rs (evaluate match conditions)
//!     → Matched router, trailing-slash redirect, or NotFound
//! ```
//!
//! # Design Decisions
//! - Tables are immutable; a reload compiles a new one and swaps it in
//! - No regex in hot path (exact and prefix matching only)
//! - Deterministic: same snapshot always matches the same router
//! - First match wins (ordered by priority, then name)

pub mod matcher;
pub mod table;

pub use table::{CompiledRouter, CompiledTable, RouteOutcome, RouterTable};
