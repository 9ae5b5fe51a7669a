//! Binding and serving the control and asset listeners.
//!
//! Each listener takes the first free port of its own range. The bound ports
//! are announced on stdout as one JSON line, then both routers are served
//! until a shutdown signal arrives.

/// Tracing target for server startup events.
pub const TRACING_TARGET_STARTUP: &str = "flare_cli::server::startup";

/// Tracing target for server shutdown events.
pub const TRACING_TARGET_SHUTDOWN: &str = "flare_cli::server::shutdown";

mod error;
mod port_binder;
mod shutdown;

use std::io::{self, Write};
use std::time::Instant;

use axum::Router;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use self::error::{ServerError, ServerResult};
pub use self::port_binder::{PortRange, bind_in_range};
use self::shutdown::{drain_deadline, shutdown_signal};
use crate::config::ServerConfig;

/// Ports announced to the supervising process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundPorts {
    pub control_port: u16,
    pub asset_port: u16,
}

impl BoundPorts {
    /// Writes the ports to stdout as a single JSON line.
    fn announce(&self) -> ServerResult<()> {
        let line = serde_json::to_string(self).map_err(|err| ServerError::Runtime(err.into()))?;
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{line}")
            .and_then(|()| stdout.flush())
            .map_err(ServerError::Runtime)
    }
}

fn local_port(listener: &TcpListener) -> ServerResult<u16> {
    listener
        .local_addr()
        .map(|addr| addr.port())
        .map_err(ServerError::Runtime)
}

/// Binds both listeners and serves until shutdown.
///
/// # Errors
///
/// Returns an error if a port range is invalid or exhausted, if binding
/// fails for a reason other than a taken port, or if a server fails.
pub async fn serve(control: Router, assets: Router, config: &ServerConfig) -> ServerResult<()> {
    let started = Instant::now();
    let host = config.bind_host();

    let control_listener = bind_in_range(host, config.control_ports()?).await?;
    let asset_listener = bind_in_range(host, config.asset_ports()?).await?;

    let ports = BoundPorts {
        control_port: local_port(&control_listener)?,
        asset_port: local_port(&asset_listener)?,
    };
    ports.announce()?;

    tracing::info!(
        target: TRACING_TARGET_STARTUP,
        %host,
        control_port = ports.control_port,
        asset_port = ports.asset_port,
        "Server is ready and listening for connections"
    );

    if config.accept_remote {
        tracing::warn!(
            target: TRACING_TARGET_STARTUP,
            "Server is bound to all interfaces. Ensure firewall rules are properly configured."
        );
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let control_server = axum::serve(control_listener, control)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .into_future();
    let asset_server = axum::serve(asset_listener, assets)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .into_future();

    let serving = async { tokio::join!(control_server, asset_server) };

    tokio::select! {
        (control_result, asset_result) = serving => {
            control_result.and(asset_result).map_err(|err| {
                tracing::error!(
                    target: TRACING_TARGET_SHUTDOWN,
                    error = %err,
                    "Server encountered an error"
                );
                ServerError::Runtime(err)
            })?;
        }
        () = drain_deadline(shutdown.clone(), config.shutdown_timeout()) => {
            tracing::warn!(
                target: TRACING_TARGET_SHUTDOWN,
                "Shutdown timeout elapsed, closing remaining connections"
            );
        }
    }

    tracing::info!(
        target: TRACING_TARGET_SHUTDOWN,
        uptime_secs = started.elapsed().as_secs(),
        "Server shut down gracefully"
    );

    Ok(())
}
