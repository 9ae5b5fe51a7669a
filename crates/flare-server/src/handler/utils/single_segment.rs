use flare_core::cache::normalize_relative;

use crate::handler::utils::reject_illegal;
use crate::handler::{ErrorKind, Result};

/// Validates that `segment` names exactly one path component.
///
/// Used for identifiers that become folder names, such as curation folders.
/// Errors carry `resource`; segments that climb out are logged.
pub(crate) fn single_segment<'s>(resource: &'static str, segment: &'s str) -> Result<&'s str> {
    let normalized = normalize_relative(segment)
        .map_err(|err| reject_illegal(resource, segment, ErrorKind::BadRequest, err))?;

    if normalized.components().count() != 1 || normalized.as_os_str() != segment {
        return Err(ErrorKind::BadRequest
            .with_message("Expected a single path segment")
            .with_resource(resource)
            .with_context(segment.to_owned()));
    }

    Ok(segment)
}
