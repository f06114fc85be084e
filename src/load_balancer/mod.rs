//! Server selection within one service.
//!
//! # Data Flow
//! ```text
//! Router matched → service target identified
//!     → LoadBalancer::next_server (pick one of the service's servers)
//!     → dispatch forwards the request to that server
//! ```
//!
//! # Design Decisions
//! - Selection state lives with the compiled service and is rebuilt on reload
//! - Only round robin is provided; smarter strategies belong to the dispatcher

pub mod round_robin;

use url::Url;

pub use round_robin::RoundRobin;

/// One upstream server of a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub url: Url,
}

/// Strategy choosing the next server for a request.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    fn next_server<'a>(&self, servers: &'a [Server]) -> Option<&'a Server>;
}
