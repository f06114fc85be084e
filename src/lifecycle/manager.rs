//! The lifecycle state machine.
//!
//! # Responsibilities
//! - Bind every entry point, then move Starting → Running
//! - Apply provider fragments: aggregate, compile, swap the router table
//! - On shutdown, flip health first, then drain entry points under the grace
//!   deadline, force closing whatever is left
//!
//! # Draining sequence
//! ```text
//! trigger #1 ─► Draining (ping 503)
//!            ─► accept grace (optional, still serving new connections)
//!            ─► stop accepting, graceful shutdown per connection
//!            ─► all idle ─────────────┐
//!               grace deadline ───────┼─► Stopped
//!               trigger #2 ──► Closed ┘
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::admin::AdminState;
use crate::aggregator::{ApplyOutcome, ConfigurationAggregator, ConfigurationFragment};
use crate::config::{LifecycleConfig, StaticConfig, TrailingSlashPolicy};
use crate::dispatch::{Dispatch, HttpForwarder};
use crate::health::HealthProbe;
use crate::http::{build_app, EntryPoint, EntryPointServices, ServePhase};
use crate::lifecycle::startup::{bind_entry_points, StartupError};
use crate::lifecycle::state::{LifecycleState, StateCell};
use crate::lifecycle::{signals, Shutdown};
use crate::net::ConnectionTracker;
use crate::provider::{ConfigUpdate, FragmentSender, Provider};
use crate::routing::{CompiledTable, RouterTable};

/// How long force-closed connection tasks get to unwind.
const FORCE_CLOSE_WAIT: Duration = Duration::from_millis(500);

pub struct LifecycleManager {
    config: StaticConfig,
    dispatch: Arc<dyn Dispatch>,
}

impl LifecycleManager {
    /// A manager forwarding routed traffic with [`HttpForwarder`].
    pub fn new(config: StaticConfig) -> Self {
        let dispatch = Arc::new(HttpForwarder::new(config.forwarding.response_timeout()));
        Self { config, dispatch }
    }

    /// Replace the terminal dispatcher of every router.
    pub fn with_dispatch(mut self, dispatch: Arc<dyn Dispatch>) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Bind, serve and start providers. Any bind failure is fatal and no
    /// entry point serves.
    pub async fn start(self) -> Result<RunningProxy, StartupError> {
        let LifecycleManager { config, dispatch } = self;
        let listeners = bind_entry_points(&config).await?;

        let state = Arc::new(StateCell::new());
        let health = HealthProbe::new(Arc::clone(&state));
        let trailing_slash = config.routing.trailing_slash;
        let table = Arc::new(RouterTable::new(CompiledTable::empty(&dispatch, trailing_slash)));

        let ping_entry_point = config.ping.as_ref().map(|ping| ping.entry_point.as_str());
        let api = config.api.as_ref().map(|api| {
            let state = AdminState {
                table: Arc::clone(&table),
                health: health.clone(),
                api_key: api.api_key.as_deref().map(Arc::from),
            };
            (api.entry_point.as_str(), state)
        });

        let (phase_tx, phase_rx) = watch::channel(ServePhase::Serving);
        let mut addresses = BTreeMap::new();
        let mut trackers = Vec::new();
        let mut serving = Vec::new();
        for (name, listener) in listeners {
            let services = EntryPointServices {
                table: Arc::clone(&table),
                health: health.clone(),
                ping: ping_entry_point == Some(name.as_str()),
                api: api
                    .as_ref()
                    .filter(|(entry_point, _)| *entry_point == name)
                    .map(|(_, state)| state.clone()),
            };
            let app = build_app(&name, services);
            let entry_point = EntryPoint::new(name.clone(), listener, app);
            addresses.insert(name, entry_point.local_addr());
            trackers.push(entry_point.tracker());
            serving.push(tokio::spawn(entry_point.serve(phase_rx.clone())));
        }

        state.advance(LifecycleState::Running);

        let shutdown = Shutdown::new();
        let (reload_tx, _) = broadcast::channel(4);
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        for provider in Provider::from_config(&config.providers) {
            let name = provider.name();
            let run = provider.run(updates_tx.clone(), reload_tx.subscribe(), shutdown.clone());
            tokio::spawn(async move {
                if let Err(e) = run.await {
                    tracing::error!(provider = name, error = %e, "Provider stopped");
                }
            });
        }

        let coordinator = Coordinator {
            aggregator: ConfigurationAggregator::new(),
            table: Arc::clone(&table),
            entry_points: addresses.keys().cloned().collect(),
            dispatch,
            trailing_slash,
        };
        let drain = Drain {
            state: Arc::clone(&state),
            lifecycle: config.lifecycle.clone(),
            shutdown: shutdown.clone(),
            phase: phase_tx,
            trackers,
            serving,
        };
        let task = tokio::spawn(run(coordinator, drain, updates_rx));

        tracing::info!(entry_points = addresses.len(), "Edge router running");
        Ok(RunningProxy {
            addresses,
            state,
            health,
            shutdown,
            table,
            updates: updates_tx,
            reload: reload_tx,
            task,
            signals: None,
        })
    }
}

/// Handle to a started proxy.
pub struct RunningProxy {
    addresses: BTreeMap<String, SocketAddr>,
    state: Arc<StateCell>,
    health: HealthProbe,
    shutdown: Shutdown,
    table: Arc<RouterTable>,
    updates: FragmentSender,
    reload: broadcast::Sender<()>,
    task: JoinHandle<()>,
    signals: Option<JoinHandle<()>>,
}

impl RunningProxy {
    /// Bound address of an entry point (useful with port 0).
    pub fn local_addr(&self, entry_point: &str) -> Option<SocketAddr> {
        self.addresses.get(entry_point).copied()
    }

    pub fn health(&self) -> HealthProbe {
        self.health.clone()
    }

    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn router_table(&self) -> Arc<RouterTable> {
        Arc::clone(&self.table)
    }

    /// Push fragments from outside the configured providers.
    pub fn fragment_sender(&self) -> FragmentSender {
        self.updates.clone()
    }

    /// Apply a fragment and wait until it has been processed. Returns the
    /// table version live afterwards, or `None` once the proxy has stopped
    /// taking configuration.
    pub async fn apply(&self, fragment: ConfigurationFragment) -> Option<u64> {
        let (tx, rx) = oneshot::channel();
        self.updates
            .send(ConfigUpdate {
                fragment,
                applied: Some(tx),
            })
            .ok()?;
        rx.await.ok()
    }

    /// Ask providers to re-read their sources.
    pub fn reload(&self) {
        let _ = self.reload.send(());
    }

    /// Translate OS signals into shutdown triggers and reloads.
    pub fn listen_for_signals(&mut self) {
        if self.signals.is_none() {
            self.signals = Some(signals::spawn(self.shutdown.clone(), self.reload.clone()));
        }
    }

    /// Resolves once the proxy reached Stopped.
    pub async fn stopped(self) {
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Lifecycle task failed");
        }
        if let Some(signals) = self.signals {
            signals.abort();
        }
    }
}

/// Turns fragments into live tables.
struct Coordinator {
    aggregator: ConfigurationAggregator,
    table: Arc<RouterTable>,
    entry_points: BTreeSet<String>,
    dispatch: Arc<dyn Dispatch>,
    trailing_slash: TrailingSlashPolicy,
}

impl Coordinator {
    fn apply(&mut self, update: ConfigUpdate) {
        let version = match self.aggregator.apply(update.fragment) {
            ApplyOutcome::Published(snapshot) => {
                let version = snapshot.version();
                let table = CompiledTable::compile(snapshot, &self.entry_points, &self.dispatch, self.trailing_slash);
                let routers = table.routers().len();
                self.table.swap(table);
                tracing::info!(version, routers, "Router table swapped");
                version
            }
            ApplyOutcome::Unchanged | ApplyOutcome::Rejected(_) => self.table.current().version(),
        };
        if let Some(applied) = update.applied {
            let _ = applied.send(version);
        }
    }
}

struct Drain {
    state: Arc<StateCell>,
    lifecycle: LifecycleConfig,
    shutdown: Shutdown,
    phase: watch::Sender<ServePhase>,
    trackers: Vec<ConnectionTracker>,
    serving: Vec<JoinHandle<()>>,
}

impl Drain {
    fn open_connections(&self) -> usize {
        self.trackers.iter().map(ConnectionTracker::open_count).sum()
    }

    async fn all_idle(&self) {
        join_all(self.trackers.iter().map(|tracker| tracker.wait_idle())).await;
    }

    async fn run(mut self) {
        self.state.advance(LifecycleState::Draining);

        let accept_grace = self.lifecycle.request_accept_grace_timeout();
        if !accept_grace.is_zero() {
            tracing::info!(
                request_accept_grace_timeout_ms = accept_grace.as_millis() as u64,
                "Still accepting connections"
            );
            tokio::select! {
                _ = tokio::time::sleep(accept_grace) => {}
                _ = self.shutdown.triggered(2) => {}
            }
        }

        self.phase.send_replace(ServePhase::Draining);
        for handle in self.serving.drain(..) {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Entry point task failed");
            }
        }

        let grace = self.lifecycle.grace_timeout();
        tracing::info!(
            grace_timeout_ms = grace.as_millis() as u64,
            open_connections = self.open_connections(),
            "Draining connections"
        );
        let drained = tokio::select! {
            _ = self.all_idle() => true,
            _ = tokio::time::sleep(grace) => {
                tracing::warn!(
                    grace_timeout_ms = grace.as_millis() as u64,
                    open_connections = self.open_connections(),
                    "Grace period exceeded, force closing connections"
                );
                false
            }
            _ = self.shutdown.triggered(2) => {
                tracing::warn!(
                    open_connections = self.open_connections(),
                    "Repeated termination request, force closing connections"
                );
                false
            }
        };

        if !drained {
            self.phase.send_replace(ServePhase::Closed);
            if tokio::time::timeout(FORCE_CLOSE_WAIT, self.all_idle()).await.is_err() {
                tracing::warn!(open_connections = self.open_connections(), "Connections still closing");
            }
        }

        self.state.advance(LifecycleState::Stopped);
    }
}

async fn run(mut coordinator: Coordinator, drain: Drain, mut updates: mpsc::UnboundedReceiver<ConfigUpdate>) {
    let shutdown = drain.shutdown.clone();
    loop {
        tokio::select! {
            biased;
            _ = shutdown.triggered(1) => break,
            Some(update) = updates.recv() => coordinator.apply(update),
        }
    }
    drop(updates);
    drain.run().await;
}
