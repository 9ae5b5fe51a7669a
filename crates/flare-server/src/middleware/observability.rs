//! Observability middleware: request ids, HTTP tracing and request timing.

use std::time::Instant;

use axum::Router;
use axum::extract::Request;
use axum::http::{HeaderName, Uri, header};
use axum::middleware::{Next, from_fn};
use axum::response::Response;
use flare_core::ResourceClass;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::utility::tracing_targets;

/// Header carrying the request id.
const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Request classification for timing logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestCategory {
    /// A request for a served resource class.
    Asset(ResourceClass),
    /// A request to the control channel.
    Control,
    /// Anything else.
    Unknown,
}

impl RequestCategory {
    /// Categorizes a request based on its URI path.
    pub fn from_uri(uri: &Uri) -> Self {
        let path = uri.path().trim_start_matches('/');

        if let Some((class, _)) = ResourceClass::from_path(path) {
            return Self::Asset(class);
        }

        match path.split('/').next() {
            Some("events" | "health") => Self::Control,
            _ => Self::Unknown,
        }
    }

    /// Returns the string representation for logging.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asset(class) => class.prefix(),
            Self::Control => "control",
            Self::Unknown => "unknown",
        }
    }

    /// Returns the duration in milliseconds above which a request is logged
    /// as slow.
    ///
    /// Image requests may wait on the fetch queue and get a larger budget.
    pub fn warn_threshold_ms(self) -> u128 {
        match self {
            Self::Asset(ResourceClass::Images) => 10_000,
            Self::Asset(ResourceClass::Curations) => 5_000,
            Self::Asset(_) => 1_000,
            Self::Control => 500,
            Self::Unknown => 1_000,
        }
    }
}

/// Logs the method, category, status and duration of every request.
pub async fn track_request_timing(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let category = RequestCategory::from_uri(&uri);

    let response = next.run(request).await;

    let duration_ms = started.elapsed().as_millis();
    let status = response.status();
    let response_size = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());

    if duration_ms >= category.warn_threshold_ms() {
        tracing::warn!(
            target: tracing_targets::METRICS,
            method = %method,
            uri = %uri,
            category = category.as_str(),
            status = %status,
            duration_ms,
            threshold_ms = category.warn_threshold_ms(),
            "Request exceeded warning threshold"
        );
    } else {
        tracing::debug!(
            target: tracing_targets::METRICS,
            method = %method,
            uri = %uri,
            category = category.as_str(),
            status = %status,
            duration_ms,
            response_size,
            "Request completed"
        );
    }

    response
}

/// Extension trait for `axum::`[`Router`] to apply observability middleware.
pub trait RouterObservabilityExt<S> {
    /// Layers [`SetRequestId`], [`Trace`] and [`PropagateRequestId`] middlewares.
    ///
    /// [`SetRequestId`]: tower_http::request_id::SetRequestIdLayer
    /// [`Trace`]: tower_http::trace::TraceLayer
    /// [`PropagateRequestId`]: tower_http::request_id::PropagateRequestIdLayer
    fn with_observability(self) -> Self;

    /// Layers request timing middleware.
    fn with_metrics(self) -> Self;
}

impl<S> RouterObservabilityExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_observability(self) -> Self {
        // Applied in reverse order, the last layer wraps first.
        self.layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
    }

    fn with_metrics(self) -> Self {
        self.layer(from_fn(track_request_timing))
    }
}
