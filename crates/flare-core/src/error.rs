//! Core error types and utilities.
//!
//! This module provides error handling for the asset cache and path
//! validation layers with:
//!
//! - Strongly-typed error kinds for the failure categories the file server
//!   has to tell apart (client mistakes versus local I/O failures)
//! - Builder pattern for ergonomic error construction
//! - Type-safe error source tracking with boxed trait objects

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

/// Type alias for boxed errors that are Send + Sync.
pub type BoxedError = Box<dyn StdError + Send + Sync>;

/// Result type alias for core operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error kind enumeration for categorizing core errors.
///
/// Separated from [`Error`] to allow pattern matching on the category
/// without accessing the full error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A requested path resolves outside of its root directory.
    PathTraversal,
    /// A path does not have the required shape.
    InvalidPath,
    /// File system operation errors.
    FileSystem,
    /// Internal logic errors.
    Internal,
}

impl ErrorKind {
    /// Returns the error kind as a string for categorization.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PathTraversal => "path_traversal",
            Self::InvalidPath => "invalid_path",
            Self::FileSystem => "file_system",
            Self::Internal => "internal",
        }
    }

    /// Returns whether errors of this kind are caused by the caller's input.
    #[must_use]
    pub const fn is_client_error(self) -> bool {
        matches!(self, Self::PathTraversal | Self::InvalidPath)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core error with structured information.
#[derive(Debug, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: Cow<'static, str>,
    #[source]
    source: Option<BoxedError>,
}

impl Error {
    /// Creates a new [`Error`].
    #[inline]
    fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches a source error to this error.
    #[inline]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error kind.
    #[must_use]
    #[inline]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message.
    #[must_use]
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Creates a new path traversal error.
    #[inline]
    pub fn path_traversal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::PathTraversal, message)
    }

    /// Creates a new invalid path error.
    #[inline]
    pub fn invalid_path(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::InvalidPath, message)
    }

    /// Creates a new file system error.
    #[inline]
    pub fn file_system(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::FileSystem, message)
    }

    /// Creates a new internal error.
    #[inline]
    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_creation() {
        let error = Error::invalid_path("missing file name");
        assert_eq!(error.kind(), ErrorKind::InvalidPath);
        assert_eq!(error.message(), "missing file name");
        assert!(error.to_string().contains("invalid_path"));
    }

    #[test]
    fn error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = Error::file_system("cannot write asset").with_source(source);

        assert!(StdError::source(&error).is_some());
        assert_eq!(error.kind(), ErrorKind::FileSystem);
    }

    #[test]
    fn client_error_classification() {
        assert!(ErrorKind::PathTraversal.is_client_error());
        assert!(ErrorKind::InvalidPath.is_client_error());
        assert!(!ErrorKind::FileSystem.is_client_error());
        assert!(!ErrorKind::Internal.is_client_error());
    }
}
