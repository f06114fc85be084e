//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper-util accept loop, per-entry-point Axum app)
//!     → request.rs (request ID)
//!     → routing table lookup
//!     → middleware/ (per-router chain)
//!     → service dispatch
//!     → response.rs (responses the router produces itself)
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, RequestIdExt, X_REQUEST_ID};
pub use server::{build_app, EntryPoint, EntryPointServices, ServePhase};
