//! Client IP resolution from a forwarded-address chain.
//!
//! The hop chain is `X-Forwarded-For` (left to right, as received) followed by
//! the TCP peer address as the rightmost, nearest-to-server entry.
//!
//! # Strategies
//! - `Depth(n)`: trust `n` proxies; the client is `chain[len - 1 - n]`.
//!   Fails when `n >= len`.
//! - `ExcludedIps(set)`: walk the chain right to left skipping known proxies;
//!   the first address outside the set is the client. Fails when every hop is
//!   excluded.
//! - `Default`: the peer address when no `X-Forwarded-For` header was sent,
//!   otherwise the leftmost forwarded entry. Once the header exists the peer
//!   address is never used as a fallback; an unparsable leftmost entry fails.
//!
//! Unparsable hops are never guessed at: selecting one fails resolution.

use std::net::{AddrParseError, IpAddr, SocketAddr};

use axum::http::HeaderMap;
use ipnet::IpNet;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// How the client address is picked out of the hop chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IpStrategy {
    #[default]
    Default,
    Depth(usize),
    ExcludedIps(Vec<IpNet>),
}

/// Trust strategy plus the allow-list evaluated against the resolved address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustPolicy {
    pub strategy: IpStrategy,
    pub source_range: Vec<IpNet>,
}

impl TrustPolicy {
    /// Returns true if `ip` falls inside one of the allowed ranges.
    pub fn allows(&self, ip: IpAddr) -> bool {
        self.source_range.iter().any(|net| net.contains(&ip))
    }
}

/// Resolve the trusted client address.
///
/// `remote_addr` may carry a port (`"10.0.0.1:5432"`, `"[::1]:80"`).
pub fn resolve<S: AsRef<str>>(
    remote_addr: &str,
    forwarded_chain: &[S],
    strategy: &IpStrategy,
) -> Option<IpAddr> {
    let len = forwarded_chain.len() + 1;
    let hop = |index: usize| hop_at(remote_addr, forwarded_chain, index);

    match strategy {
        IpStrategy::Depth(depth) => {
            if *depth >= len {
                return None;
            }
            parse_hop(hop(len - 1 - depth))
        }
        IpStrategy::ExcludedIps(excluded) => {
            for index in (0..len).rev() {
                let ip = parse_hop(hop(index))?;
                if !excluded.iter().any(|net| net.contains(&ip)) {
                    return Some(ip);
                }
            }
            None
        }
        IpStrategy::Default => {
            if forwarded_chain.is_empty() {
                parse_hop(remote_addr)
            } else {
                parse_hop(hop(0))
            }
        }
    }
}

fn hop_at<'a, S: AsRef<str>>(remote_addr: &'a str, chain: &'a [S], index: usize) -> &'a str {
    match chain.get(index) {
        Some(entry) => entry.as_ref(),
        None => remote_addr,
    }
}

/// Collect `X-Forwarded-For` entries across all header occurrences, in order.
///
/// Empty entries are kept so that a malformed header cannot silently shift the
/// chain.
pub fn forwarded_chain(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .flat_map(|value| {
            value
                .to_str()
                .unwrap_or_default()
                .split(',')
                .map(|entry| entry.trim().to_string())
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Parse one hop: a bare address, `ip:port`, or `[v6]:port`.
pub fn parse_hop(raw: &str) -> Option<IpAddr> {
    let raw = raw.trim();
    let ip = raw
        .parse::<IpAddr>()
        .ok()
        .or_else(|| raw.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
        .or_else(|| {
            raw.strip_prefix('[')
                .and_then(|s| s.strip_suffix(']'))
                .and_then(|s| s.parse::<IpAddr>().ok())
        })?;
    Some(ip.to_canonical())
}

/// Parse an allow-list or exclusion entry: a CIDR or a single address.
pub fn parse_net(raw: &str) -> Result<IpNet, AddrParseError> {
    let raw = raw.trim();
    raw.parse::<IpNet>()
        .or_else(|_| raw.parse::<IpAddr>().map(IpNet::from))
}
