//! Middleware for `axum::Router` and HTTP request processing.
//!
//! - Recovery: panics, timeouts and service errors become JSON error
//!   responses.
//! - Observability: request ids, HTTP tracing and per-category request
//!   timing.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use axum::Router;
//! use flare_server::middleware::{
//!     RecoveryConfig, RouterObservabilityExt, RouterRecoveryExt,
//! };
//!
//! let app: Router = Router::new()
//!     .with_recovery(&RecoveryConfig::default())
//!     .with_observability()
//!     .with_metrics();
//! ```

mod observability;
mod recovery;

pub use observability::{RequestCategory, RouterObservabilityExt, track_request_timing};
pub use recovery::{RecoveryConfig, RouterRecoveryExt};
