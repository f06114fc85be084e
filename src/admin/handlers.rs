use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::admin::AdminState;
use crate::aggregator::{MiddlewareEntry, RouterEntry, ServiceEntry, ValidationWarning};
use crate::lifecycle::LifecycleState;

#[derive(Serialize)]
pub struct VersionInfo {
    pub name: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct Overview {
    pub version: u64,
    pub state: LifecycleState,
    pub routers: usize,
    pub middlewares: usize,
    pub services: usize,
    pub warnings: usize,
    pub providers: Vec<String>,
}

#[derive(Serialize)]
pub struct RouterView {
    pub name: String,
    #[serde(flatten)]
    pub entry: RouterEntry,
}

#[derive(Serialize)]
pub struct MiddlewareView {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(flatten)]
    pub entry: MiddlewareEntry,
    pub used_by: Vec<String>,
}

#[derive(Serialize)]
pub struct ServiceView {
    pub name: String,
    #[serde(flatten)]
    pub entry: ServiceEntry,
    pub used_by: Vec<String>,
}

#[derive(Serialize)]
pub struct ProviderView {
    pub name: String,
    pub routers: usize,
    pub middlewares: usize,
    pub services: usize,
}

pub async fn get_version() -> Json<VersionInfo> {
    Json(VersionInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn get_overview(State(state): State<AdminState>) -> Json<Overview> {
    let table = state.table.current();
    let snapshot = table.snapshot();
    Json(Overview {
        version: snapshot.version(),
        state: state.health.state(),
        routers: table.routers().len(),
        middlewares: snapshot.middlewares().len(),
        services: snapshot.services().len(),
        warnings: snapshot.warnings().len() + table.warnings().len(),
        providers: snapshot.providers().into_iter().map(String::from).collect(),
    })
}

/// Full snapshot plus every warning raised while merging and compiling it.
pub async fn get_rawdata(State(state): State<AdminState>) -> Json<Value> {
    let table = state.table.current();
    let warnings: Vec<&ValidationWarning> = table
        .snapshot()
        .warnings()
        .iter()
        .chain(table.warnings())
        .collect();
    Json(json!({
        "version": table.version(),
        "routers": table.snapshot().routers(),
        "middlewares": table.snapshot().middlewares(),
        "services": table.snapshot().services(),
        "warnings": warnings,
    }))
}

pub async fn get_routers(State(state): State<AdminState>) -> Json<Vec<RouterView>> {
    Json(router_views(&state, None))
}

pub async fn get_router(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<RouterView>, (StatusCode, Json<Value>)> {
    let table = state.table.current();
    match table.snapshot().routers().get(&name) {
        Some(entry) => Ok(Json(RouterView {
            name,
            entry: entry.clone(),
        })),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "message": format!("router not found: {name}") })),
        )),
    }
}

pub async fn get_middlewares(State(state): State<AdminState>) -> Json<Vec<MiddlewareView>> {
    let table = state.table.current();
    let snapshot = table.snapshot();
    let views = snapshot
        .middlewares()
        .iter()
        .map(|(name, entry)| MiddlewareView {
            name: name.clone(),
            kind: entry.spec.kind(),
            entry: entry.clone(),
            used_by: snapshot
                .routers()
                .iter()
                .filter(|(_, router)| router.middlewares.contains(name))
                .map(|(router, _)| router.clone())
                .collect(),
        })
        .collect();
    Json(views)
}

pub async fn get_services(State(state): State<AdminState>) -> Json<Vec<ServiceView>> {
    let table = state.table.current();
    let snapshot = table.snapshot();
    let views = snapshot
        .services()
        .iter()
        .map(|(name, entry)| ServiceView {
            name: name.clone(),
            entry: entry.clone(),
            used_by: snapshot
                .routers()
                .iter()
                .filter(|(_, router)| &router.service == name)
                .map(|(router, _)| router.clone())
                .collect(),
        })
        .collect();
    Json(views)
}

pub async fn get_providers(State(state): State<AdminState>) -> Json<Vec<ProviderView>> {
    let table = state.table.current();
    let snapshot = table.snapshot();
    let views = snapshot
        .providers()
        .into_iter()
        .map(|provider| ProviderView {
            name: provider.to_string(),
            routers: snapshot.router_count(provider),
            middlewares: snapshot
                .middlewares()
                .values()
                .filter(|m| m.provider == provider)
                .count(),
            services: snapshot
                .services()
                .values()
                .filter(|s| s.provider == provider)
                .count(),
        })
        .collect();
    Json(views)
}

pub async fn get_provider_routers(
    State(state): State<AdminState>,
    Path(provider): Path<String>,
) -> Json<Vec<RouterView>> {
    Json(router_views(&state, Some(&provider)))
}

fn router_views(state: &AdminState, provider: Option<&str>) -> Vec<RouterView> {
    let table = state.table.current();
    table
        .snapshot()
        .routers()
        .iter()
        .filter(|(_, entry)| provider.map_or(true, |p| entry.provider == p))
        .map(|(name, entry)| RouterView {
            name: name.clone(),
            entry: entry.clone(),
        })
        .collect()
}
