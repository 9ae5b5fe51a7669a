//! Binding a listener to the first free port of a range.

use std::io;
use std::net::{IpAddr, SocketAddr};

use tokio::net::TcpListener;

use super::TRACING_TARGET_STARTUP;
use crate::server::{ServerError, ServerResult};

/// Inclusive range of ports a listener may bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    min: u16,
    max: u16,
}

impl PortRange {
    /// Creates a range, rejecting `min > max` and port 0.
    pub fn new(min: u16, max: u16) -> ServerResult<Self> {
        if min == 0 {
            return Err(ServerError::InvalidConfig(
                "port ranges must start above 0".to_owned(),
            ));
        }

        if min > max {
            return Err(ServerError::InvalidConfig(format!(
                "port range {min}-{max} is empty"
            )));
        }

        Ok(Self { min, max })
    }

    /// Returns the first port tried.
    #[must_use]
    pub const fn min(self) -> u16 {
        self.min
    }

    /// Returns the last port tried.
    #[must_use]
    pub const fn max(self) -> u16 {
        self.max
    }
}

/// Binds a listener on `host` to the lowest free port in `range`.
///
/// A port that is already in use moves the search to the next port. Any
/// other bind failure ends the search immediately.
pub async fn bind_in_range(host: IpAddr, range: PortRange) -> ServerResult<TcpListener> {
    for port in range.min()..=range.max() {
        let addr = SocketAddr::new(host, port);

        match TcpListener::bind(addr).await {
            Ok(listener) => {
                tracing::debug!(target: TRACING_TARGET_STARTUP, %addr, "Bound listener");
                return Ok(listener);
            }
            Err(err) if err.kind() == io::ErrorKind::AddrInUse => {
                tracing::debug!(target: TRACING_TARGET_STARTUP, %addr, "Port in use, trying next");
            }
            Err(err) => {
                tracing::error!(
                    target: TRACING_TARGET_STARTUP,
                    %addr,
                    error = %err,
                    "Failed to bind listener"
                );
                return Err(ServerError::bind_error(addr.to_string(), err));
            }
        }
    }

    Err(ServerError::PortRangeExhausted {
        min: range.min(),
        max: range.max(),
    })
}
