//! Control channel: change events and health.
//!
//! Served on its own listener, separate from the asset routes.

mod events;
mod health;

use axum::Router;
use axum::response::{IntoResponse, Response};
use axum::routing::get;

pub use self::events::ControlMessage;
pub use self::health::HealthStatus;
use crate::handler::ErrorKind;
use crate::service::ServiceState;

async fn fallback() -> Response {
    ErrorKind::NotFound.into_response()
}

/// Returns a [`Router`] with all control routes.
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .route("/events", get(events::subscribe))
        .route("/health", get(health::check))
        .fallback(fallback)
}
