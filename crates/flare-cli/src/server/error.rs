//! Server error types with context and recovery suggestions.

use std::io;

use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = std::result::Result<T, ServerError>;

/// Error type for listener binding and serving.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Server configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Binding failed for a reason other than the port being taken.
    #[error("Failed to bind to {address}: {source}")]
    BindError {
        address: String,
        #[source]
        source: io::Error,
    },

    /// Every port in the configured range is taken.
    #[error("No free port between {min} and {max}")]
    PortRangeExhausted { min: u16, max: u16 },

    /// Runtime server error.
    #[error("Runtime error: {0}")]
    Runtime(#[source] io::Error),
}

impl ServerError {
    /// Creates a bind error with address context.
    pub fn bind_error(address: impl Into<String>, source: io::Error) -> Self {
        Self::BindError {
            address: address.into(),
            source,
        }
    }

    /// Returns a unique error code for this error type.
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "E001",
            Self::BindError { .. } => "E002",
            Self::PortRangeExhausted { .. } => "E003",
            Self::Runtime(_) => "E004",
        }
    }

    /// Provides a human-readable suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::InvalidConfig(_) => {
                Some("Check the command-line arguments and environment variables")
            }
            Self::BindError { source, .. } => match source.kind() {
                io::ErrorKind::PermissionDenied => {
                    Some("Use ports above 1024 or run with appropriate privileges")
                }
                io::ErrorKind::AddrNotAvailable => {
                    Some("The address is not available. Check the configured host")
                }
                _ => Some("Check network configuration and firewall settings"),
            },
            Self::PortRangeExhausted { .. } => {
                Some("Widen the port range or stop the processes holding these ports")
            }
            Self::Runtime(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_unique() {
        let errors = [
            ServerError::InvalidConfig("test".to_owned()),
            ServerError::bind_error("127.0.0.1:80", io::Error::other("test")),
            ServerError::PortRangeExhausted { min: 1, max: 2 },
            ServerError::Runtime(io::Error::other("test")),
        ];

        let codes: Vec<_> = errors.iter().map(ServerError::error_code).collect();
        for (i, code) in codes.iter().enumerate() {
            assert!(!codes[i + 1..].contains(code), "duplicate code {code}");
        }
    }

    #[test]
    fn bind_errors_suggest_by_kind() {
        let denied = ServerError::bind_error(
            "127.0.0.1:80",
            io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
        );
        assert!(denied.suggestion().is_some_and(|s| s.contains("1024")));

        let exhausted = ServerError::PortRangeExhausted {
            min: 12001,
            max: 12100,
        };
        assert!(exhausted.to_string().contains("12001"));
        assert!(exhausted.suggestion().is_some());
    }
}
