//! Compiled routing table and its atomically swappable holder.
//!
//! # Design Decisions
//! - A [`CompiledTable`] is built once per snapshot and never mutated
//! - Readers take an `Arc` to the whole table for the duration of a request,
//!   so matchers and handler chains always come from the same snapshot
//! - Routers are ordered by priority (descending), then by name

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures_util::future::BoxFuture;

use crate::aggregator::{EntryKind, RouterEntry, Snapshot, ValidationWarning};
use crate::config::TrailingSlashPolicy;
use crate::dispatch::{Dispatch, ServiceTarget};
use crate::http::middleware::{self, HandlerChain, Middleware};
use crate::routing::matcher::{AndMatcher, Matcher, RouteRequest};

/// One router ready to serve: matcher plus wrapped handler chain.
#[derive(Debug)]
pub struct CompiledRouter {
    name: String,
    /// `None` attaches the router to every entry point.
    entry_points: Option<BTreeSet<String>>,
    matcher: AndMatcher,
    chain: HandlerChain,
    priority: i64,
}

impl CompiledRouter {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn handle(&self, req: Request<Body>) -> BoxFuture<'_, Response> {
        self.chain.handle(req)
    }

    fn attached_to(&self, entry_point: &str) -> bool {
        self.entry_points
            .as_ref()
            .map_or(true, |names| names.contains(entry_point))
    }
}

/// Result of routing one request.
#[derive(Debug)]
pub enum RouteOutcome<'a> {
    Matched(&'a CompiledRouter),
    /// 301 to this location (canonical path plus original query).
    Redirect(String),
    NotFound,
}

/// The executable form of one snapshot.
#[derive(Debug)]
pub struct CompiledTable {
    snapshot: Arc<Snapshot>,
    routers: Vec<CompiledRouter>,
    trailing_slash: TrailingSlashPolicy,
    warnings: Vec<ValidationWarning>,
}

impl CompiledTable {
    /// Build matchers and handler chains for every router of `snapshot`.
    /// Routers that cannot be compiled are left out and reported.
    pub fn compile(
        snapshot: Arc<Snapshot>,
        entry_points: &BTreeSet<String>,
        dispatch: &Arc<dyn Dispatch>,
        trailing_slash: TrailingSlashPolicy,
    ) -> Self {
        let mut warnings = Vec::new();

        let mut middlewares: BTreeMap<String, Arc<dyn Middleware>> = BTreeMap::new();
        for (name, entry) in snapshot.middlewares() {
            match middleware::build(&entry.spec) {
                Ok(built) => {
                    middlewares.insert(name.clone(), built);
                }
                Err(e) => warnings.push(ValidationWarning::new(EntryKind::Middleware, name, e.to_string())),
            }
        }

        let mut services: BTreeMap<String, Arc<ServiceTarget>> = BTreeMap::new();
        for (name, entry) in snapshot.services() {
            match ServiceTarget::from_spec(name.as_str(), &entry.spec) {
                Ok(target) => {
                    services.insert(name.clone(), Arc::new(target));
                }
                Err(e) => warnings.push(ValidationWarning::new(EntryKind::Service, name, e.to_string())),
            }
        }

        let mut routers = Vec::with_capacity(snapshot.routers().len());
        for (name, entry) in snapshot.routers() {
            match compile_router(name, entry, entry_points, &middlewares, &services, dispatch, &mut warnings) {
                Ok(router) => routers.push(router),
                Err(message) => warnings.push(ValidationWarning::new(EntryKind::Router, name, message)),
            }
        }
        routers.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));

        for warning in &warnings {
            tracing::warn!(version = snapshot.version(), "{warning}");
        }

        Self {
            snapshot,
            routers,
            trailing_slash,
            warnings,
        }
    }

    /// A table with no routers: every request is a 404.
    pub fn empty(dispatch: &Arc<dyn Dispatch>, trailing_slash: TrailingSlashPolicy) -> Self {
        Self::compile(Arc::new(Snapshot::empty()), &BTreeSet::new(), dispatch, trailing_slash)
    }

    pub fn version(&self) -> u64 {
        self.snapshot.version()
    }

    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }

    /// Routers in match order.
    pub fn routers(&self) -> &[CompiledRouter] {
        &self.routers
    }

    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.warnings
    }

    pub fn route<B>(&self, entry_point: &str, req: &Request<B>) -> RouteOutcome<'_> {
        let view = RouteRequest::from_request(req);
        if let Some(router) = self.find(entry_point, &view) {
            return RouteOutcome::Matched(router);
        }

        if self.trailing_slash == TrailingSlashPolicy::Redirect
            && view.path.len() > 1
            && view.path.ends_with('/')
        {
            let canonical = match view.path.trim_end_matches('/') {
                "" => "/",
                trimmed => trimmed,
            };
            if self.find(entry_point, &view.with_path(canonical)).is_some() {
                let location = match req.uri().query() {
                    Some(query) => format!("{canonical}?{query}"),
                    None => canonical.to_string(),
                };
                return RouteOutcome::Redirect(location);
            }
        }

        RouteOutcome::NotFound
    }

    fn find(&self, entry_point: &str, view: &RouteRequest<'_>) -> Option<&CompiledRouter> {
        self.routers
            .iter()
            .find(|router| router.attached_to(entry_point) && router.matcher.matches(view))
    }
}

fn compile_router(
    name: &str,
    entry: &RouterEntry,
    known_entry_points: &BTreeSet<String>,
    middlewares: &BTreeMap<String, Arc<dyn Middleware>>,
    services: &BTreeMap<String, Arc<ServiceTarget>>,
    dispatch: &Arc<dyn Dispatch>,
    warnings: &mut Vec<ValidationWarning>,
) -> Result<CompiledRouter, String> {
    let chain_middlewares = entry
        .middlewares
        .iter()
        .map(|reference| {
            middlewares
                .get(reference.as_str())
                .cloned()
                .ok_or_else(|| format!("middleware `{reference}` is unavailable"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let service = services
        .get(entry.service.as_str())
        .cloned()
        .ok_or_else(|| format!("service `{}` is unavailable", entry.service))?;

    let entry_points = if entry.entry_points.is_empty() {
        None
    } else {
        for unknown in entry.entry_points.iter().filter(|ep| !known_entry_points.contains(*ep)) {
            warnings.push(ValidationWarning::new(
                EntryKind::Router,
                name,
                format!("unknown entry point `{unknown}`"),
            ));
        }
        Some(
            entry
                .entry_points
                .iter()
                .filter(|ep| known_entry_points.contains(*ep))
                .cloned()
                .collect(),
        )
    };

    Ok(CompiledRouter {
        name: name.to_string(),
        entry_points,
        matcher: AndMatcher::for_router(entry),
        chain: HandlerChain::new(chain_middlewares, service, Arc::clone(dispatch)),
        priority: entry.priority,
    })
}

/// Holds the live [`CompiledTable`]. Reads never block; a swap publishes a
/// fully built table in one atomic store.
#[derive(Debug)]
pub struct RouterTable {
    current: ArcSwap<CompiledTable>,
}

impl RouterTable {
    pub fn new(table: CompiledTable) -> Self {
        Self {
            current: ArcSwap::from_pointee(table),
        }
    }

    pub fn current(&self) -> Arc<CompiledTable> {
        self.current.load_full()
    }

    /// Install `table`, returning the one it replaced.
    pub fn swap(&self, table: CompiledTable) -> Arc<CompiledTable> {
        self.current.swap(Arc::new(table))
    }
}
