//! Entry point serving.
//!
//! # Responsibilities
//! - Build the per-entry-point Axum app (ping, admin API, routed fallback)
//! - Wire up middleware (request ID, tracing, metrics)
//! - Run the accept loop over a bounded [`Listener`]
//! - Drive every connection through draining and forced close
//!
//! # Serve phases
//! ```text
//! Serving ──► Draining ──► Closed
//!   accept     stop accepting,    drop every
//!   + serve    graceful shutdown  remaining connection
//!              per connection
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use tokio::sync::watch;
use tower::ServiceExt;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::admin::{self, AdminState};
use crate::health::{self, HealthProbe};
use crate::http::request::{MakeRequestUuid, RequestIdExt, X_REQUEST_ID};
use crate::http::response;
use crate::net::{ConnectionTracker, Listener};
use crate::observability::metrics;
use crate::routing::{RouteOutcome, RouterTable};

/// Pause after an accept error (e.g. file descriptor exhaustion).
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServePhase {
    Serving,
    Draining,
    Closed,
}

/// What an entry point exposes besides routed traffic.
#[derive(Clone)]
pub struct EntryPointServices {
    pub table: Arc<RouterTable>,
    pub health: HealthProbe,
    pub ping: bool,
    pub api: Option<AdminState>,
}

#[derive(Clone)]
struct RouteState {
    entry_point: Arc<str>,
    table: Arc<RouterTable>,
}

/// Build the Axum app for the entry point `name`.
pub fn build_app(name: &str, services: EntryPointServices) -> Router {
    let entry_point: Arc<str> = Arc::from(name);

    let mut app = Router::new().fallback(route_request).with_state(RouteState {
        entry_point: Arc::clone(&entry_point),
        table: Arc::clone(&services.table),
    });
    if services.ping {
        app = app.merge(
            Router::new()
                .route("/ping", get(health::ping))
                .with_state(services.health.clone()),
        );
    }
    if let Some(api) = services.api {
        app = app.nest("/api", admin::router(api));
    }

    app.layer(middleware::from_fn_with_state(entry_point, record_metrics))
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request| {
                tracing::info_span!(
                    "request",
                    method = %req.method(),
                    uri = %req.uri(),
                    request_id = req.request_id().unwrap_or("-"),
                )
            }),
        )
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
}

/// Fallback handler: everything not claimed by ping or the API goes through
/// the live router table.
async fn route_request(State(state): State<RouteState>, req: Request) -> Response {
    let table = state.table.current();
    match table.route(&state.entry_point, &req) {
        RouteOutcome::Matched(router) => {
            tracing::debug!(
                entry_point = %state.entry_point,
                router = router.name(),
                version = table.version(),
                "Request matched"
            );
            router.handle(req).await
        }
        RouteOutcome::Redirect(location) => response::moved_permanently(&location),
        RouteOutcome::NotFound => {
            tracing::debug!(entry_point = %state.entry_point, path = %req.uri().path(), "No router matched");
            response::not_found()
        }
    }
}

async fn record_metrics(State(entry_point): State<Arc<str>>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let response = next.run(req).await;
    metrics::record_request(&entry_point, response.status().as_u16(), start);
    response
}

/// A bound listener plus the app it serves.
pub struct EntryPoint {
    name: String,
    listener: Listener,
    app: Router,
    tracker: ConnectionTracker,
}

impl EntryPoint {
    pub fn new(name: impl Into<String>, listener: Listener, app: Router) -> Self {
        Self {
            name: name.into(),
            listener,
            app,
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Shares the open-connection count with the serving task.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Accept until the phase leaves `Serving`, then close the listening
    /// socket. Connection tasks keep running on their own and follow the
    /// phase through draining and forced close.
    pub async fn serve(self, phase: watch::Receiver<ServePhase>) {
        let EntryPoint {
            name,
            listener,
            app,
            tracker,
        } = self;
        let name: Arc<str> = Arc::from(name);
        let mut stop = phase.clone();

        loop {
            tokio::select! {
                // The borrowed phase must not outlive the arm: `watch::Ref` is !Send.
                _ = async { let _ = stop.wait_for(|p| *p != ServePhase::Serving).await; } => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let guard = tracker.track();
                        metrics::record_open_connections(&name, tracker.open_count());
                        let app = app.clone();
                        let phase = phase.clone();
                        let name = Arc::clone(&name);
                        let tracker = tracker.clone();
                        tokio::spawn(async move {
                            serve_connection(stream, peer, app, phase).await;
                            drop(permit);
                            drop(guard);
                            metrics::record_open_connections(&name, tracker.open_count());
                        });
                    }
                    Err(e) => {
                        tracing::error!(entry_point = %name, error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                }
            }
        }

        drop(listener);
        tracing::info!(
            entry_point = %name,
            open_connections = tracker.open_count(),
            "Stopped accepting connections"
        );
    }
}

async fn serve_connection(
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
    app: Router,
    phase: watch::Receiver<ServePhase>,
) {
    let service = hyper::service::service_fn(move |mut req: hyper::Request<Incoming>| {
        req.extensions_mut().insert(ConnectInfo(peer));
        app.clone().oneshot(req.map(Body::new))
    });

    let mut builder = auto::Builder::new(TokioExecutor::new());
    builder.http1().timer(TokioTimer::new());
    builder.http2().timer(TokioTimer::new());
    let conn = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let mut drain = phase.clone();
    let mut close = phase;
    let mut draining = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(peer = %peer, error = %e, "Connection ended with error");
                }
                return;
            }
            _ = drain.wait_for(|p| *p != ServePhase::Serving), if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
            _ = close.wait_for(|p| *p == ServePhase::Closed) => {
                tracing::debug!(peer = %peer, "Force closing connection");
                return;
            }
        }
    }
}
