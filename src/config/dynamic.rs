//! Dynamic configuration schema.
//!
//! This is the normalized shape every provider produces. Names are local to the
//! provider that emitted them; the aggregator qualifies them as `<provider>@<name>`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Routers, middlewares and services as emitted by one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DynamicConfig {
    pub routers: BTreeMap<String, RouterSpec>,
    pub middlewares: BTreeMap<String, MiddlewareSpec>,
    pub services: BTreeMap<String, ServiceSpec>,
}

impl DynamicConfig {
    pub fn is_empty(&self) -> bool {
        self.routers.is_empty() && self.middlewares.is_empty() && self.services.is_empty()
    }
}

/// Request matching rule plus the chain it leads to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterSpec {
    /// Entry points this router attaches to. Empty means all of them.
    pub entry_points: Vec<String>,

    /// Host header to match (case-insensitive, port ignored).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Exact path to match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Path prefix to match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,

    /// Allowed methods. Empty means any.
    pub methods: Vec<String>,

    /// Middleware references, outermost first.
    pub middlewares: Vec<String>,

    /// Service reference.
    pub service: String,

    /// Explicit priority (higher is tried first). Derived from the rule when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
}

impl RouterSpec {
    /// Human-readable rule, also used to derive the default priority.
    pub fn rule(&self) -> String {
        let mut parts = Vec::new();
        if let Some(host) = &self.host {
            parts.push(format!("Host(`{host}`)"));
        }
        if let Some(path) = &self.path {
            parts.push(format!("Path(`{path}`)"));
        }
        if let Some(prefix) = &self.path_prefix {
            parts.push(format!("PathPrefix(`{prefix}`)"));
        }
        if !self.methods.is_empty() {
            parts.push(format!("Method(`{}`)", self.methods.join("`,`")));
        }
        parts.join(" && ")
    }
}

/// A middleware definition. Exactly one kind per entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MiddlewareSpec {
    IpAllowList(IpAllowListSpec),
    StripPrefix(StripPrefixSpec),
    AddPrefix(AddPrefixSpec),
    Headers(HeadersSpec),
}

impl MiddlewareSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            MiddlewareSpec::IpAllowList(_) => "ip_allow_list",
            MiddlewareSpec::StripPrefix(_) => "strip_prefix",
            MiddlewareSpec::AddPrefix(_) => "add_prefix",
            MiddlewareSpec::Headers(_) => "headers",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct IpAllowListSpec {
    /// Allowed client addresses or CIDRs.
    pub source_range: Vec<String>,

    /// How to pick the client address out of `X-Forwarded-For`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_strategy: Option<IpStrategySpec>,
}

/// `depth` and `excluded_ips` are alternatives; setting both is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct IpStrategySpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub excluded_ips: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StripPrefixSpec {
    pub prefixes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AddPrefixSpec {
    pub prefix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HeadersSpec {
    pub custom_request_headers: BTreeMap<String, String>,
    pub custom_response_headers: BTreeMap<String, String>,
}

/// An upstream service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceSpec {
    pub load_balancer: LoadBalancerSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadBalancerSpec {
    pub servers: Vec<ServerSpec>,

    /// Forward the client's Host header instead of the server's authority.
    pub pass_host_header: bool,
}

impl Default for LoadBalancerSpec {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            pass_host_header: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerSpec {
    pub url: String,
}
