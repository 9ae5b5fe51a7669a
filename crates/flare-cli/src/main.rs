#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod server;

use std::process;

use anyhow::Context;
use axum::Router;
use flare_server::middleware::{RecoveryConfig, RouterObservabilityExt, RouterRecoveryExt};
use flare_server::service::ServiceState;
use flare_server::{control, handler};

use crate::config::Cli;

// Tracing target constants
pub const TRACING_TARGET_SERVER_STARTUP: &str = "flare_cli::server::startup";
pub const TRACING_TARGET_SERVER_SHUTDOWN: &str = "flare_cli::server::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "flare_cli::config";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            "Application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            error = %error,
            "Application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    Cli::init_tracing();
    cli.log();
    cli.validate()?;

    let state = ServiceState::new(cli.service.clone()).context("failed to create service state")?;
    let assets = create_asset_router(state.clone(), &cli.recovery);
    let control = create_control_router(state, &cli.recovery);

    if let Err(err) = server::serve(control, assets, &cli.server).await {
        if let Some(suggestion) = err.suggestion() {
            tracing::info!(
                target: TRACING_TARGET_SERVER_STARTUP,
                code = err.error_code(),
                suggestion,
                "Recovery suggestion"
            );
        }
        return Err(err.into());
    }

    Ok(())
}

/// Creates the asset router with all middleware layers applied.
///
/// Middleware is applied in reverse order (last added = outermost):
/// 1. Recovery (outermost) - catches panics and enforces timeouts
/// 2. Observability - request IDs and tracing spans
/// 3. Metrics - request timing
/// 4. Routes (innermost) - asset handlers
fn create_asset_router(state: ServiceState, recovery: &RecoveryConfig) -> Router {
    handler::routes()
        .with_state(state)
        .with_metrics()
        .with_observability()
        .with_recovery(recovery)
}

/// Creates the control router.
///
/// The request timeout ends once the event stream upgrade is answered.
fn create_control_router(state: ServiceState, recovery: &RecoveryConfig) -> Router {
    control::routes()
        .with_state(state)
        .with_observability()
        .with_recovery(recovery)
}
