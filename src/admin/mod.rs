//! Administrative read API.
//!
//! Read-only JSON views of the live snapshot, mounted under `/api` on the
//! configured entry point.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use crate::health::HealthProbe;
use crate::routing::RouterTable;

use self::auth::require_api_key;
use self::handlers::*;

#[derive(Clone)]
pub struct AdminState {
    pub table: Arc<RouterTable>,
    pub health: HealthProbe,
    pub api_key: Option<Arc<str>>,
}

/// Routes relative to `/api`.
pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/version", get(get_version))
        .route("/overview", get(get_overview))
        .route("/rawdata", get(get_rawdata))
        .route("/http/routers", get(get_routers))
        .route("/http/routers/{name}", get(get_router))
        .route("/http/middlewares", get(get_middlewares))
        .route("/http/services", get(get_services))
        .route("/providers", get(get_providers))
        .route("/providers/{provider}/routers", get(get_provider_routers))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .with_state(state)
}
