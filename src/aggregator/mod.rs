//! Configuration aggregation.
//!
//! # Data Flow
//! ```text
//! Provider fragments (latest per provider)
//!     → merge() (namespacing, per-entry validation, reference resolution)
//!     → Snapshot (immutable, versioned)
//!     → RouterTable compile + swap
//! ```
//!
//! # Design Decisions
//! - Partial failure: an invalid entry is dropped with a warning, never the whole merge
//! - Names are qualified as `<provider>@<name>`; a reference containing `@` is
//!   already qualified and may point into another provider
//! - Snapshots are never mutated; every accepted update produces a new one

pub mod snapshot;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::Method;

use crate::config::{DynamicConfig, RouterSpec};
use crate::dispatch::ServiceTarget;
use crate::http::middleware;
use crate::observability::metrics;

pub use snapshot::{EntryKind, MiddlewareEntry, RouterEntry, ServiceEntry, Snapshot, ValidationWarning};

/// Separator between provider and local name.
pub const PROVIDER_SEPARATOR: char = '@';

/// One provider's complete view of the dynamic configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationFragment {
    pub provider: String,
    pub config: DynamicConfig,
}

impl ConfigurationFragment {
    pub fn new(provider: impl Into<String>, config: DynamicConfig) -> Self {
        Self {
            provider: provider.into(),
            config,
        }
    }

    /// An empty fragment clears every entry of `provider`.
    pub fn clear(provider: impl Into<String>) -> Self {
        Self::new(provider, DynamicConfig::default())
    }
}

/// `<provider>@<name>`, unless `reference` is already qualified.
pub fn qualify(provider: &str, reference: &str) -> String {
    if reference.contains(PROVIDER_SEPARATOR) {
        reference.to_string()
    } else {
        format!("{provider}{PROVIDER_SEPARATOR}{reference}")
    }
}

fn check_local_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        Err("name must not be empty".to_string())
    } else if name.contains(PROVIDER_SEPARATOR) {
        Err(format!("name must not contain `{PROVIDER_SEPARATOR}`"))
    } else {
        Ok(())
    }
}

/// Merge fragments into a snapshot. Always succeeds; invalid entries are
/// dropped and reported.
pub fn merge(fragments: &[ConfigurationFragment], version: u64) -> (Snapshot, Vec<ValidationWarning>) {
    let mut warnings = Vec::new();
    let mut middlewares = BTreeMap::new();
    let mut services = BTreeMap::new();

    for fragment in fragments {
        let provider = fragment.provider.as_str();
        if let Err(message) = check_local_name(provider) {
            warnings.push(ValidationWarning::new(
                EntryKind::Provider,
                provider,
                format!("invalid provider identifier: {message}"),
            ));
            continue;
        }

        for (name, spec) in &fragment.config.middlewares {
            let qualified = qualify(provider, name);
            let checked = check_local_name(name)
                .and_then(|_| middleware::build(spec).map(|_| ()).map_err(|e| e.to_string()));
            match checked {
                Err(message) => {
                    warnings.push(ValidationWarning::new(EntryKind::Middleware, qualified, message))
                }
                Ok(()) if middlewares.contains_key(&qualified) => warnings.push(
                    ValidationWarning::new(EntryKind::Middleware, qualified, "duplicate definition"),
                ),
                Ok(()) => {
                    middlewares.insert(
                        qualified,
                        MiddlewareEntry {
                            provider: provider.to_string(),
                            spec: spec.clone(),
                        },
                    );
                }
            }
        }

        for (name, spec) in &fragment.config.services {
            let qualified = qualify(provider, name);
            let checked = check_local_name(name).and_then(|_| {
                ServiceTarget::from_spec(qualified.clone(), spec)
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            });
            match checked {
                Err(message) => {
                    warnings.push(ValidationWarning::new(EntryKind::Service, qualified, message))
                }
                Ok(()) if services.contains_key(&qualified) => warnings.push(
                    ValidationWarning::new(EntryKind::Service, qualified, "duplicate definition"),
                ),
                Ok(()) => {
                    services.insert(
                        qualified,
                        ServiceEntry {
                            provider: provider.to_string(),
                            spec: spec.clone(),
                        },
                    );
                }
            }
        }
    }

    // Routers last: references may point into any provider.
    let mut routers = BTreeMap::new();
    for fragment in fragments {
        let provider = fragment.provider.as_str();
        if check_local_name(provider).is_err() {
            continue;
        }
        for (name, spec) in &fragment.config.routers {
            let qualified = qualify(provider, name);
            if routers.contains_key(&qualified) {
                warnings.push(ValidationWarning::new(EntryKind::Router, qualified, "duplicate definition"));
                continue;
            }
            match resolve_router(provider, name, spec, &middlewares, &services) {
                Ok(entry) => {
                    routers.insert(qualified, entry);
                }
                Err(message) => {
                    warnings.push(ValidationWarning::new(EntryKind::Router, qualified, message))
                }
            }
        }
    }

    let snapshot = Snapshot::new(version, routers, middlewares, services, warnings.clone());
    (snapshot, warnings)
}

fn resolve_router(
    provider: &str,
    name: &str,
    spec: &RouterSpec,
    middlewares: &BTreeMap<String, MiddlewareEntry>,
    services: &BTreeMap<String, ServiceEntry>,
) -> Result<RouterEntry, String> {
    check_local_name(name)?;

    if spec.host.is_none() && spec.path.is_none() && spec.path_prefix.is_none() {
        return Err("rule needs at least one of host, path or path_prefix".to_string());
    }
    if matches!(&spec.host, Some(host) if host.trim().is_empty()) {
        return Err("host must not be empty".to_string());
    }
    for path in spec.path.iter().chain(spec.path_prefix.iter()) {
        if !path.starts_with('/') {
            return Err(format!("path `{path}` must start with '/'"));
        }
    }
    let methods = spec
        .methods
        .iter()
        .map(|method| {
            let upper = method.to_ascii_uppercase();
            Method::from_bytes(upper.as_bytes())
                .map(|_| upper)
                .map_err(|_| format!("invalid method `{method}`"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let resolved_middlewares = spec
        .middlewares
        .iter()
        .map(|reference| {
            let qualified = qualify(provider, reference);
            if middlewares.contains_key(&qualified) {
                Ok(qualified)
            } else {
                Err(format!("unknown middleware `{qualified}`"))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    if spec.service.is_empty() {
        return Err("service must not be empty".to_string());
    }
    let service = qualify(provider, &spec.service);
    if !services.contains_key(&service) {
        return Err(format!("unknown service `{service}`"));
    }

    let rule = spec.rule();
    let priority = spec.priority.unwrap_or(rule.len() as i64);

    Ok(RouterEntry {
        provider: provider.to_string(),
        entry_points: spec.entry_points.clone(),
        rule,
        host: spec.host.clone(),
        path: spec.path.clone(),
        path_prefix: spec.path_prefix.clone(),
        methods,
        middlewares: resolved_middlewares,
        service,
        priority,
    })
}

/// Result of pushing one fragment into the aggregator.
#[derive(Debug)]
pub enum ApplyOutcome {
    /// A new snapshot was produced.
    Published(Arc<Snapshot>),
    /// The merged content equals the current snapshot.
    Unchanged,
    /// The fragment was refused; the provider's previous fragment stays in force.
    Rejected(Vec<ValidationWarning>),
}

/// Keeps the latest fragment per provider and produces snapshots from them.
#[derive(Debug, Default)]
pub struct ConfigurationAggregator {
    fragments: BTreeMap<String, ConfigurationFragment>,
    current: Option<Arc<Snapshot>>,
    last_version: u64,
}

impl ConfigurationAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last published snapshot, if any.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.clone()
    }

    pub fn apply(&mut self, fragment: ConfigurationFragment) -> ApplyOutcome {
        let provider = fragment.provider.clone();
        let non_empty = !fragment.config.is_empty();

        let mut candidate = self.fragments.clone();
        candidate.insert(provider.clone(), fragment);
        let ordered: Vec<ConfigurationFragment> = candidate.values().cloned().collect();
        let (snapshot, warnings) = merge(&ordered, self.last_version + 1);

        for warning in &warnings {
            tracing::warn!(provider = %provider, "{warning}");
        }

        let previous_usable = self
            .current
            .as_ref()
            .map(|current| current.router_count(&provider))
            .unwrap_or(0);
        if non_empty && snapshot.router_count(&provider) == 0 && previous_usable > 0 {
            tracing::warn!(
                provider = %provider,
                previous_routers = previous_usable,
                "Configuration yields no usable routers, keeping previous configuration"
            );
            metrics::record_config_reload("rejected");
            return ApplyOutcome::Rejected(warnings);
        }

        self.fragments = candidate;

        if let Some(current) = &self.current {
            if current.same_content(&snapshot) {
                tracing::debug!(provider = %provider, version = current.version(), "Skipping identical configuration");
                metrics::record_config_reload("unchanged");
                return ApplyOutcome::Unchanged;
            }
        }

        self.last_version = snapshot.version();
        let snapshot = Arc::new(snapshot);
        tracing::info!(
            provider = %provider,
            version = snapshot.version(),
            routers = snapshot.routers().len(),
            warnings = snapshot.warnings().len(),
            "Configuration snapshot published"
        );
        metrics::record_config_reload("published");
        self.current = Some(Arc::clone(&snapshot));
        ApplyOutcome::Published(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::dynamic::{
        IpAllowListSpec, LoadBalancerSpec, ServerSpec, StripPrefixSpec,
    };
    use crate::config::{MiddlewareSpec, ServiceSpec};

    fn service() -> ServiceSpec {
        ServiceSpec {
            load_balancer: LoadBalancerSpec {
                servers: vec![ServerSpec {
                    url: "http://127.0.0.1:9000".into(),
                }],
                pass_host_header: true,
            },
        }
    }

    fn router(prefix: &str, service: &str, middlewares: &[&str]) -> RouterSpec {
        RouterSpec {
            path_prefix: Some(prefix.into()),
            service: service.into(),
            middlewares: middlewares.iter().map(|m| m.to_string()).collect(),
            ..RouterSpec::default()
        }
    }

    fn fragment(provider: &str, routers: &[(&str, RouterSpec)]) -> ConfigurationFragment {
        let mut config = DynamicConfig::default();
        config.services.insert("whoami".into(), service());
        config.middlewares.insert(
            "strip".into(),
            MiddlewareSpec::StripPrefix(StripPrefixSpec {
                prefixes: vec!["/api".into()],
            }),
        );
        for (name, spec) in routers {
            config.routers.insert(name.to_string(), spec.clone());
        }
        ConfigurationFragment::new(provider, config)
    }

    #[test]
    fn namespaces_names_per_provider() {
        let (snapshot, warnings) = merge(
            &[
                fragment("file", &[("app", router("/a", "whoami", &["strip"]))]),
                fragment("inline", &[("app", router("/b", "whoami", &[]))]),
            ],
            1,
        );
        assert!(warnings.is_empty(), "{warnings:?}");
        let names: Vec<_> = snapshot.routers().keys().cloned().collect();
        assert_eq!(names, vec!["file@app", "inline@app"]);
        assert_eq!(snapshot.routers()["file@app"].middlewares, vec!["file@strip"]);
        assert_eq!(snapshot.routers()["inline@app"].service, "inline@whoami");
        assert!(snapshot.services().contains_key("file@whoami"));
    }

    #[test]
    fn cross_provider_references_resolve() {
        let (snapshot, warnings) = merge(
            &[
                fragment("file", &[]),
                fragment("inline", &[("app", router("/b", "file@whoami", &["file@strip"]))]),
            ],
            1,
        );
        assert!(warnings.is_empty());
        let app = &snapshot.routers()["inline@app"];
        assert_eq!(app.service, "file@whoami");
        assert_eq!(app.middlewares, vec!["file@strip"]);
    }

    #[test]
    fn dangling_reference_drops_only_that_router() {
        let (snapshot, warnings) = merge(
            &[fragment(
                "file",
                &[
                    ("good", router("/good", "whoami", &["strip"])),
                    ("bad", router("/bad", "whoami", &["missing"])),
                ],
            )],
            1,
        );
        assert!(snapshot.routers().contains_key("file@good"));
        assert!(!snapshot.routers().contains_key("file@bad"));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, EntryKind::Router);
        assert!(warnings[0].message.contains("file@missing"));
    }

    #[test]
    fn invalid_entries_are_dropped_with_warnings() {
        let mut fragment = fragment("file", &[("no_rule", router("/x", "whoami", &[]))]);
        fragment.config.routers.get_mut("no_rule").unwrap().path_prefix = None;
        fragment.config.routers.insert(
            "relative".into(),
            RouterSpec {
                path: Some("test".into()),
                service: "whoami".into(),
                ..RouterSpec::default()
            },
        );
        fragment.config.routers.insert(
            "bad_method".into(),
            RouterSpec {
                path: Some("/m".into()),
                methods: vec!["GE T".into()],
                service: "whoami".into(),
                ..RouterSpec::default()
            },
        );
        fragment.config.middlewares.insert(
            "bad_allow".into(),
            MiddlewareSpec::IpAllowList(IpAllowListSpec {
                source_range: vec!["not-an-ip".into()],
                ip_strategy: None,
            }),
        );
        fragment.config.services.insert("empty".into(), ServiceSpec::default());

        let (snapshot, warnings) = merge(&[fragment], 1);
        assert!(snapshot.routers().is_empty());
        assert!(!snapshot.middlewares().contains_key("file@bad_allow"));
        assert!(!snapshot.services().contains_key("file@empty"));
        assert_eq!(warnings.len(), 5, "{warnings:?}");
    }

    #[test]
    fn priority_defaults_to_rule_length() {
        let mut explicit = router("/a", "whoami", &[]);
        explicit.priority = Some(1);
        let (snapshot, _) = merge(
            &[fragment(
                "file",
                &[("short", router("/a", "whoami", &[])), ("explicit", explicit)],
            )],
            1,
        );
        let short = &snapshot.routers()["file@short"];
        assert_eq!(short.priority, short.rule.len() as i64);
        assert_eq!(snapshot.routers()["file@explicit"].priority, 1);
    }

    #[test]
    fn methods_are_normalised() {
        let mut spec = router("/a", "whoami", &[]);
        spec.methods = vec!["get".into(), "Post".into()];
        let (snapshot, _) = merge(&[fragment("file", &[("r", spec)])], 1);
        assert_eq!(snapshot.routers()["file@r"].methods, vec!["GET", "POST"]);
    }

    #[test]
    fn identical_fragments_are_not_republished() {
        let mut aggregator = ConfigurationAggregator::new();
        let first = fragment("file", &[("app", router("/a", "whoami", &[]))]);
        let published = match aggregator.apply(first.clone()) {
            ApplyOutcome::Published(snapshot) => snapshot,
            other => panic!("expected publish, got {other:?}"),
        };
        assert_eq!(published.version(), 1);
        assert!(matches!(aggregator.apply(first), ApplyOutcome::Unchanged));

        let changed = fragment("file", &[("app", router("/b", "whoami", &[]))]);
        match aggregator.apply(changed) {
            ApplyOutcome::Published(snapshot) => assert_eq!(snapshot.version(), 2),
            other => panic!("expected publish, got {other:?}"),
        }
    }

    #[test]
    fn merge_is_deterministic() {
        let fragments = [
            fragment("file", &[("app", router("/a", "whoami", &["strip"]))]),
            fragment("inline", &[("app", router("/b", "whoami", &[]))]),
        ];
        let (one, _) = merge(&fragments, 1);
        let (two, _) = merge(&fragments, 7);
        assert!(one.same_content(&two));
        assert_ne!(one.version(), two.version());
    }

    #[test]
    fn keeps_previous_fragment_when_update_has_no_usable_routers() {
        let mut aggregator = ConfigurationAggregator::new();
        aggregator.apply(fragment("file", &[("app", router("/a", "whoami", &[]))]));
        aggregator.apply(fragment("inline", &[("other", router("/o", "whoami", &[]))]));

        let broken = fragment("file", &[("app", router("/a", "whoami", &["missing"]))]);
        match aggregator.apply(broken) {
            ApplyOutcome::Rejected(warnings) => assert_eq!(warnings.len(), 1),
            other => panic!("expected rejection, got {other:?}"),
        }
        let current = aggregator.current().unwrap();
        assert!(current.routers().contains_key("file@app"));
        assert!(current.routers().contains_key("inline@other"));
    }

    #[test]
    fn empty_fragment_clears_provider() {
        let mut aggregator = ConfigurationAggregator::new();
        aggregator.apply(fragment("file", &[("app", router("/a", "whoami", &[]))]));
        match aggregator.apply(ConfigurationFragment::clear("file")) {
            ApplyOutcome::Published(snapshot) => {
                assert!(snapshot.routers().is_empty());
                assert!(snapshot.services().is_empty());
            }
            other => panic!("expected publish, got {other:?}"),
        }
    }

    #[test]
    fn qualifies_only_local_references() {
        assert_eq!(qualify("file", "auth"), "file@auth");
        assert_eq!(qualify("file", "inline@auth"), "inline@auth");
    }
}
