//! Listener configuration.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use anyhow::{Result as AnyhowResult, anyhow};
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET_CONFIG;
use crate::server::{PortRange, ServerResult};

/// Listener configuration.
///
/// The control and asset listeners each bind to the first free port of
/// their own range.
///
/// # Environment Variables
///
/// - `BIND_HOST` - Address to bind when remote access is off (default: 127.0.0.1)
/// - `ACCEPT_REMOTE` - Bind all interfaces instead of `HOST`
/// - `CONTROL_PORT_MIN`, `CONTROL_PORT_MAX` - Control listener range (default: 12001-12100)
/// - `ASSET_PORT_MIN`, `ASSET_PORT_MAX` - Asset listener range (default: 12101-12200)
/// - `SHUTDOWN_TIMEOUT` - Graceful shutdown timeout in seconds (default: 30, max: 300)
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
#[must_use = "config does nothing unless you use it"]
pub struct ServerConfig {
    /// Host address to bind when remote access is disabled.
    #[arg(long, env = "BIND_HOST", default_value = "127.0.0.1")]
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Bind every interface so other machines can reach the backend.
    #[arg(long, env = "ACCEPT_REMOTE")]
    #[serde(default)]
    pub accept_remote: bool,

    /// First port tried for the control listener.
    #[arg(long, env = "CONTROL_PORT_MIN", default_value_t = 12001)]
    pub control_port_min: u16,

    /// Last port tried for the control listener.
    #[arg(long, env = "CONTROL_PORT_MAX", default_value_t = 12100)]
    pub control_port_max: u16,

    /// First port tried for the asset listener.
    #[arg(long, env = "ASSET_PORT_MIN", default_value_t = 12101)]
    pub asset_port_min: u16,

    /// Last port tried for the asset listener.
    #[arg(long, env = "ASSET_PORT_MAX", default_value_t = 12200)]
    pub asset_port_max: u16,

    /// Maximum time in seconds open connections may delay shutdown.
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 30)]
    pub shutdown_timeout: u64,
}

/// Default host address.
fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

impl ServerConfig {
    /// Validates all configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if a port range is empty or starts at 0, or if the
    /// shutdown timeout is outside 1-300 seconds.
    pub fn validate(&self) -> AnyhowResult<()> {
        self.control_ports()
            .map_err(|err| anyhow!("invalid control port range: {err}"))?;
        self.asset_ports()
            .map_err(|err| anyhow!("invalid asset port range: {err}"))?;

        if self.shutdown_timeout == 0 || self.shutdown_timeout > 300 {
            return Err(anyhow!(
                "Shutdown timeout {} seconds is invalid. Must be between 1 and 300 seconds.",
                self.shutdown_timeout
            ));
        }

        Ok(())
    }

    /// Returns the address listeners bind to.
    #[must_use]
    pub const fn bind_host(&self) -> IpAddr {
        if self.accept_remote {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        } else {
            self.host
        }
    }

    /// Returns the control listener's port range.
    pub fn control_ports(&self) -> ServerResult<PortRange> {
        PortRange::new(self.control_port_min, self.control_port_max)
    }

    /// Returns the asset listener's port range.
    pub fn asset_ports(&self) -> ServerResult<PortRange> {
        PortRange::new(self.asset_port_min, self.asset_port_max)
    }

    /// Returns the graceful shutdown timeout as a `Duration`.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }

    /// Logs the listener configuration.
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            host = %self.bind_host(),
            control_ports = ?(self.control_port_min..=self.control_port_max),
            asset_ports = ?(self.asset_port_min..=self.asset_port_max),
            shutdown_timeout_secs = self.shutdown_timeout,
            "Server configuration"
        );
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            accept_remote: false,
            control_port_min: 12001,
            control_port_max: 12100,
            asset_port_min: 12101,
            asset_port_max: 12200,
            shutdown_timeout: 30,
        }
    }
}
