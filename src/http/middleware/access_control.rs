//! Access Control Middleware.
//! Admits requests whose resolved client address is in the allow-list.

use std::net::{IpAddr, SocketAddr};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::response::Response;
use futures_util::future::BoxFuture;

use crate::config::dynamic::IpAllowListSpec;
use crate::http::middleware::{Middleware, MiddlewareError, Next};
use crate::http::response;
use crate::security::client_ip::{self, IpStrategy, TrustPolicy};

/// Client address resolved by the allow-list, attached to admitted requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

#[derive(Debug)]
pub struct IpAllowList {
    policy: TrustPolicy,
}

impl IpAllowList {
    pub fn new(policy: TrustPolicy) -> Self {
        Self { policy }
    }

    pub fn from_spec(spec: &IpAllowListSpec) -> Result<Self, MiddlewareError> {
        if spec.source_range.is_empty() {
            return Err(MiddlewareError::EmptySourceRange);
        }
        let source_range = parse_nets(&spec.source_range)?;

        let strategy = match &spec.ip_strategy {
            None => IpStrategy::Default,
            Some(s) => match (s.depth, s.excluded_ips.is_empty()) {
                (Some(_), false) => return Err(MiddlewareError::ConflictingStrategy),
                (Some(depth), true) => IpStrategy::Depth(depth),
                (None, false) => IpStrategy::ExcludedIps(parse_nets(&s.excluded_ips)?),
                (None, true) => IpStrategy::Default,
            },
        };

        Ok(Self::new(TrustPolicy {
            strategy,
            source_range,
        }))
    }
}

fn parse_nets(entries: &[String]) -> Result<Vec<ipnet::IpNet>, MiddlewareError> {
    entries
        .iter()
        .map(|entry| {
            client_ip::parse_net(entry).map_err(|source| MiddlewareError::InvalidRange {
                entry: entry.clone(),
                source,
            })
        })
        .collect()
}

impl Middleware for IpAllowList {
    fn handle<'a>(&'a self, mut req: Request<Body>, next: Next<'a>) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let remote = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.to_string())
                .unwrap_or_default();
            let chain = client_ip::forwarded_chain(req.headers());

            match client_ip::resolve(&remote, &chain, &self.policy.strategy) {
                Some(ip) if self.policy.allows(ip) => {
                    req.extensions_mut().insert(ClientIp(ip));
                    next.run(req).await
                }
                resolved => {
                    tracing::debug!(
                        remote = %remote,
                        forwarded = ?chain,
                        client_ip = ?resolved,
                        "Rejected by IP allow list"
                    );
                    response::forbidden()
                }
            }
        })
    }
}
