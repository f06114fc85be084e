//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (ip_allow_list middleware):
//!     → client_ip.rs (pick the client out of X-Forwarded-For + remote addr)
//!     → allow-list check in http/middleware/access_control.rs
//! ```
//!
//! # Design Decisions
//! - Fail closed: an unresolvable client address is rejected
//! - No trust in client input unless a strategy says how far to trust it

pub mod client_ip;
