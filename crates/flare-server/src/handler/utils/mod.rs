//! Helpers shared by resource handlers.

mod serve;
mod single_segment;

use flare_core::ErrorKind as CoreErrorKind;

pub(crate) use self::serve::{serve_asset, serve_lookup, serve_stream};
pub(crate) use self::single_segment::single_segment;
use crate::handler::{Error, ErrorKind};
use crate::utility::tracing_targets;

/// Converts a lookup error, logging requests that try to leave their root.
///
/// Escapes are answered with `escape_kind`; other errors convert as usual.
pub(crate) fn reject_illegal(
    resource: &'static str,
    path: &str,
    escape_kind: ErrorKind,
    error: flare_core::Error,
) -> Error<'static> {
    if error.kind() != CoreErrorKind::PathTraversal {
        return error.into();
    }

    tracing::warn!(
        target: tracing_targets::FILES,
        resource,
        path,
        error = %error,
        "Illegal file request"
    );

    escape_kind
        .with_resource(resource)
        .with_context(path.to_owned())
}
