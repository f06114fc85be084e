//! Service dispatch boundary.
//!
//! A compiled router ends in a [`ServiceTarget`]; what happens to the request
//! after that is the business of a [`Dispatch`] implementation. The default
//! [`HttpForwarder`] proxies to one of the service's servers; tests and
//! embedders can plug in their own.

pub mod forwarder;

use std::fmt;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use url::Url;

use crate::config::ServiceSpec;
use crate::load_balancer::{LoadBalancer, RoundRobin, Server};

pub use forwarder::HttpForwarder;

/// Terminal handler of every router chain.
pub trait Dispatch: Send + Sync + 'static {
    fn dispatch(&self, target: Arc<ServiceTarget>, req: Request<Body>) -> BoxFuture<'static, Response>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("service has no servers")]
    NoServers,

    #[error("server url `{url}` is invalid: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// A service resolved from a snapshot, shared by every router referencing it.
#[derive(Debug)]
pub struct ServiceTarget {
    name: String,
    servers: Vec<Server>,
    pass_host_header: bool,
    balancer: RoundRobin,
}

impl ServiceTarget {
    /// Build a target from its spec. Only plain `http` servers are accepted.
    pub fn from_spec(name: impl Into<String>, spec: &ServiceSpec) -> Result<Self, ServiceError> {
        let lb = &spec.load_balancer;
        if lb.servers.is_empty() {
            return Err(ServiceError::NoServers);
        }
        let servers = lb
            .servers
            .iter()
            .map(|server| parse_server_url(&server.url).map(|url| Server { url }))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: name.into(),
            servers,
            pass_host_header: lb.pass_host_header,
            balancer: RoundRobin::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pass_host_header(&self) -> bool {
        self.pass_host_header
    }

    pub fn next_server(&self) -> Option<&Server> {
        self.balancer.next_server(&self.servers)
    }
}

fn parse_server_url(raw: &str) -> Result<Url, ServiceError> {
    let invalid = |reason: String| ServiceError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "http" {
        return Err(invalid(format!("unsupported scheme `{}`", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

impl fmt::Display for ServiceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
