//! Readiness probe and the `/ping` handler.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::lifecycle::state::{LifecycleState, StateCell};

/// Read-only view of the lifecycle state.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    state: Arc<StateCell>,
}

impl HealthProbe {
    pub fn new(state: Arc<StateCell>) -> Self {
        Self { state }
    }

    /// True while Running.
    pub fn status(&self) -> bool {
        self.state.get() == LifecycleState::Running
    }

    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }
}

pub async fn ping(State(probe): State<HealthProbe>) -> Response {
    if probe.status() {
        (StatusCode::OK, "OK").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reflects_lifecycle_state() {
        let cell = Arc::new(StateCell::new());
        let probe = HealthProbe::new(Arc::clone(&cell));
        assert!(!probe.status());
        assert_eq!(ping(State(probe.clone())).await.status(), StatusCode::SERVICE_UNAVAILABLE);

        cell.advance(LifecycleState::Running);
        assert!(probe.status());
        assert_eq!(ping(State(probe.clone())).await.status(), StatusCode::OK);

        cell.advance(LifecycleState::Draining);
        assert!(!probe.status());
        assert_eq!(ping(State(probe.clone())).await.status(), StatusCode::SERVICE_UNAVAILABLE);

        cell.advance(LifecycleState::Stopped);
        assert!(!probe.status());
    }
}
