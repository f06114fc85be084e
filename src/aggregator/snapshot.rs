//! Immutable merged view of every provider's configuration.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::config::{MiddlewareSpec, ServiceSpec};

/// Which kind of entry a warning is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Provider,
    Router,
    Middleware,
    Service,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntryKind::Provider => "provider",
            EntryKind::Router => "router",
            EntryKind::Middleware => "middleware",
            EntryKind::Service => "service",
        })
    }
}

/// A dropped or rejected configuration entry. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationWarning {
    pub kind: EntryKind,
    pub name: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(kind: EntryKind, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}`: {}", self.kind, self.name, self.message)
    }
}

/// A router whose references have been qualified and checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouterEntry {
    pub provider: String,
    pub entry_points: Vec<String>,
    pub rule: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,
    pub methods: Vec<String>,
    /// Qualified middleware names, outermost first.
    pub middlewares: Vec<String>,
    /// Qualified service name.
    pub service: String,
    pub priority: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MiddlewareEntry {
    pub provider: String,
    #[serde(rename = "config")]
    pub spec: MiddlewareSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceEntry {
    pub provider: String,
    #[serde(rename = "config")]
    pub spec: ServiceSpec,
}

/// Output of a merge. Every name is `<provider>@<name>` and every router
/// reference resolves within the same snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    version: u64,
    routers: BTreeMap<String, RouterEntry>,
    middlewares: BTreeMap<String, MiddlewareEntry>,
    services: BTreeMap<String, ServiceEntry>,
    warnings: Vec<ValidationWarning>,
}

impl Snapshot {
    pub(crate) fn new(
        version: u64,
        routers: BTreeMap<String, RouterEntry>,
        middlewares: BTreeMap<String, MiddlewareEntry>,
        services: BTreeMap<String, ServiceEntry>,
        warnings: Vec<ValidationWarning>,
    ) -> Self {
        Self {
            version,
            routers,
            middlewares,
            services,
            warnings,
        }
    }

    /// Version 0: nothing received from any provider yet.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn routers(&self) -> &BTreeMap<String, RouterEntry> {
        &self.routers
    }

    pub fn middlewares(&self) -> &BTreeMap<String, MiddlewareEntry> {
        &self.middlewares
    }

    pub fn services(&self) -> &BTreeMap<String, ServiceEntry> {
        &self.services
    }

    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.warnings
    }

    /// Number of usable routers contributed by `provider`.
    pub fn router_count(&self, provider: &str) -> usize {
        self.routers
            .values()
            .filter(|router| router.provider == provider)
            .count()
    }

    /// Providers contributing at least one entry.
    pub fn providers(&self) -> BTreeSet<&str> {
        self.routers
            .values()
            .map(|r| r.provider.as_str())
            .chain(self.middlewares.values().map(|m| m.provider.as_str()))
            .chain(self.services.values().map(|s| s.provider.as_str()))
            .collect()
    }

    /// Equal entries, ignoring the version.
    pub fn same_content(&self, other: &Snapshot) -> bool {
        self.routers == other.routers
            && self.middlewares == other.middlewares
            && self.services == other.services
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::dynamic::{LoadBalancerSpec, ServerSpec};

    fn service(provider: &str) -> ServiceEntry {
        ServiceEntry {
            provider: provider.into(),
            spec: ServiceSpec {
                load_balancer: LoadBalancerSpec {
                    servers: vec![ServerSpec {
                        url: "http://127.0.0.1:9000".into(),
                    }],
                    pass_host_header: true,
                },
            },
        }
    }

    #[test]
    fn content_comparison_ignores_version() {
        let services = BTreeMap::from([("file@a".to_string(), service("file"))]);
        let one = Snapshot::new(1, BTreeMap::new(), BTreeMap::new(), services.clone(), vec![]);
        let two = Snapshot::new(2, BTreeMap::new(), BTreeMap::new(), services, vec![]);
        assert!(one.same_content(&two));
        assert!(!one.same_content(&Snapshot::empty()));
        assert_eq!(one.providers(), BTreeSet::from(["file"]));
    }

    #[test]
    fn warning_display() {
        let warning = ValidationWarning::new(EntryKind::Router, "file@r", "unknown service `file@s`");
        assert_eq!(warning.to_string(), "router `file@r`: unknown service `file@s`");
    }
}
