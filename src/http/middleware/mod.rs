//! Per-router middleware chains.
//!
//! # Data Flow
//! ```text
//! request → middleware[0] → middleware[1] → … → Terminal (service dispatch)
//! ```
//!
//! Each middleware decides whether to call [`Next::run`]. Chains are built once
//! per compiled table and never mutated; a reload builds new chains.

pub mod access_control;
pub mod headers;
pub mod path;

use std::fmt;
use std::net::AddrParseError;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures_util::future::BoxFuture;

use crate::config::MiddlewareSpec;
use crate::dispatch::{Dispatch, ServiceTarget};

pub use access_control::{ClientIp, IpAllowList};
pub use headers::Headers;
pub use path::{AddPrefix, StripPrefix};

/// A request-processing step in a router chain.
pub trait Middleware: Send + Sync + fmt::Debug {
    fn handle<'a>(&'a self, req: Request<Body>, next: Next<'a>) -> BoxFuture<'a, Response>;
}

/// The remainder of a chain, handed to each middleware.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    rest: &'a [Arc<dyn Middleware>],
    terminal: &'a Terminal,
}

impl<'a> Next<'a> {
    pub fn run(self, req: Request<Body>) -> BoxFuture<'a, Response> {
        match self.rest.split_first() {
            Some((middleware, rest)) => middleware.handle(
                req,
                Next {
                    rest,
                    terminal: self.terminal,
                },
            ),
            None => self.terminal.call(req),
        }
    }
}

/// Service dispatch at the end of a chain.
pub struct Terminal {
    service: Arc<ServiceTarget>,
    dispatch: Arc<dyn Dispatch>,
}

impl Terminal {
    fn call(&self, req: Request<Body>) -> BoxFuture<'static, Response> {
        self.dispatch.dispatch(Arc::clone(&self.service), req)
    }
}

/// Ordered middlewares wrapped around a service dispatch.
pub struct HandlerChain {
    middlewares: Vec<Arc<dyn Middleware>>,
    terminal: Terminal,
}

impl HandlerChain {
    /// `middlewares[0]` is the outermost layer.
    pub fn new(
        middlewares: Vec<Arc<dyn Middleware>>,
        service: Arc<ServiceTarget>,
        dispatch: Arc<dyn Dispatch>,
    ) -> Self {
        Self {
            middlewares,
            terminal: Terminal { service, dispatch },
        }
    }

    pub fn handle(&self, req: Request<Body>) -> BoxFuture<'_, Response> {
        Next {
            rest: &self.middlewares,
            terminal: &self.terminal,
        }
        .run(req)
    }

    pub fn service(&self) -> &ServiceTarget {
        &self.terminal.service
    }
}

impl fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerChain")
            .field("middlewares", &self.middlewares)
            .field("service", &self.terminal.service.name())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MiddlewareError {
    #[error("source_range must not be empty")]
    EmptySourceRange,

    #[error("invalid address or CIDR `{entry}`: {source}")]
    InvalidRange {
        entry: String,
        source: AddrParseError,
    },

    #[error("ip_strategy cannot set both depth and excluded_ips")]
    ConflictingStrategy,

    #[error("prefix `{0}` must start with '/'")]
    InvalidPrefix(String),

    #[error("prefixes must not be empty")]
    NoPrefixes,

    #[error("invalid header `{0}`")]
    InvalidHeader(String),
}

/// Instantiate a middleware from its spec.
pub fn build(spec: &MiddlewareSpec) -> Result<Arc<dyn Middleware>, MiddlewareError> {
    Ok(match spec {
        MiddlewareSpec::IpAllowList(spec) => Arc::new(IpAllowList::from_spec(spec)?),
        MiddlewareSpec::StripPrefix(spec) => Arc::new(StripPrefix::from_spec(spec)?),
        MiddlewareSpec::AddPrefix(spec) => Arc::new(AddPrefix::from_spec(spec)?),
        MiddlewareSpec::Headers(spec) => Arc::new(Headers::from_spec(spec)?),
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::config::dynamic::{AddPrefixSpec, StripPrefixSpec};

    #[tokio::test]
    async fn empty_chain_dispatches_directly() {
        let chain = chain(vec![]);
        let req = Request::builder().uri("/hello").body(Body::empty()).unwrap();
        assert_eq!(body_text(chain.handle(req).await).await, "svc /hello");
    }

    #[tokio::test]
    async fn middlewares_apply_in_declared_order() {
        // strip runs first, then add: /api/x → /x → /v2/x
        let strip = build(&MiddlewareSpec::StripPrefix(StripPrefixSpec {
            prefixes: vec!["/api".into()],
        }))
        .unwrap();
        let add = build(&MiddlewareSpec::AddPrefix(AddPrefixSpec {
            prefix: "/v2".into(),
        }))
        .unwrap();
        let chain = chain(vec![strip.clone(), add.clone()]);
        let req = Request::builder().uri("/api/x").body(Body::empty()).unwrap();
        assert_eq!(body_text(chain.handle(req).await).await, "svc /v2/x");

        // add runs first, then strip finds no /api prefix: /api/x → /v2/api/x
        let chain = super::test_support::chain(vec![add, strip]);
        let req = Request::builder().uri("/api/x").body(Body::empty()).unwrap();
        assert_eq!(body_text(chain.handle(req).await).await, "svc /v2/api/x");
    }
}
