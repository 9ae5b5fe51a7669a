//! Conversions from [`flare_core`] errors.

use flare_core::ErrorKind as CoreErrorKind;
use flare_core::queue::TaskError;

use super::{Error, ErrorKind};

/// Tracing target for error conversions.
const TRACING_TARGET: &str = "flare_server::handler::error";

impl From<flare_core::Error> for Error<'static> {
    fn from(error: flare_core::Error) -> Self {
        match error.kind() {
            CoreErrorKind::PathTraversal | CoreErrorKind::InvalidPath => {
                tracing::debug!(target: TRACING_TARGET, error = %error, "Rejected request path");
                ErrorKind::BadRequest.with_message(error.message().to_owned())
            }
            CoreErrorKind::FileSystem | CoreErrorKind::Internal => {
                tracing::error!(target: TRACING_TARGET, error = %error, "Asset operation failed");
                ErrorKind::InternalServerError.into_error()
            }
        }
    }
}

impl From<TaskError<flare_core::Error>> for Error<'static> {
    fn from(error: TaskError<flare_core::Error>) -> Self {
        match error {
            TaskError::Failed(error) => error.into(),
            TaskError::Panicked(message) => {
                tracing::error!(target: TRACING_TARGET, message = %message, "Queued task panicked");
                ErrorKind::InternalServerError.into_error()
            }
            TaskError::Closed => ErrorKind::ServiceUnavailable
                .with_message("The task queue has stopped")
                .into_static(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_bad_request() {
        let error: Error = flare_core::Error::path_traversal("escapes root").into();
        assert_eq!(error.kind(), ErrorKind::BadRequest);
        assert_eq!(error.message(), Some("escapes root"));

        let error: Error = flare_core::Error::invalid_path("bad shape").into();
        assert_eq!(error.kind(), ErrorKind::BadRequest);
    }

    #[test]
    fn local_failures_map_to_internal_error() {
        let error: Error = flare_core::Error::file_system("disk full").into();
        assert_eq!(error.kind(), ErrorKind::InternalServerError);
        assert_eq!(error.message(), None);
    }

    #[test]
    fn task_errors_map_by_variant() {
        let error: Error = TaskError::<flare_core::Error>::Closed.into();
        assert_eq!(error.kind(), ErrorKind::ServiceUnavailable);

        let error: Error = TaskError::<flare_core::Error>::Panicked("boom".into()).into();
        assert_eq!(error.kind(), ErrorKind::InternalServerError);
    }
}
