//! Health report of the running backend.

use axum::Json;
use axum::extract::State;
use flare_fetch::FetchStats;
use serde::{Deserialize, Serialize};

use crate::service::ServiceState;

/// Snapshot of the service's queues and observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub healthy: bool,
    /// Fetch queue occupancy, absent when on-demand images are disabled.
    pub fetch: Option<FetchStats>,
    /// Tasks waiting or running across all domain queues.
    pub pending_tasks: usize,
    /// Connected control channel clients.
    pub observers: usize,
}

pub(super) async fn check(State(state): State<ServiceState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        healthy: true,
        fetch: state.fetch.as_ref().map(|fetch| fetch.stats()),
        pending_tasks: state.queues.pending(),
        observers: state.notifier.observer_count(),
    })
}
