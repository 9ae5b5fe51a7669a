//! Asset routes, one nested `axum::`[`Router`] per resource class.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use flare_server::handler::routes;
//! use flare_server::service::{ServiceConfig, ServiceState};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let state = ServiceState::new(ServiceConfig::new("/opt/flashpoint"))?;
//! let app: axum::Router = routes().with_state(state);
//! # Ok(())
//! # }
//! ```
//!
//! [`Router`]: axum::routing::Router

mod credits;
mod curations;
mod error;
mod extensions;
mod images;
mod logos;
mod response;
mod themes;
mod utils;

use axum::Router;
use axum::response::{IntoResponse, Response};
use flare_core::ResourceClass;
use strum::IntoEnumIterator;

pub use crate::handler::error::{Error, ErrorKind, Result};
pub(crate) use crate::handler::response::ErrorResponse;
use crate::service::ServiceState;

#[inline]
async fn fallback() -> Response {
    ErrorKind::NotFound.into_response()
}

/// Returns the [`Router`] serving one resource class.
fn class_routes(class: ResourceClass) -> Router<ServiceState> {
    match class {
        ResourceClass::Images => images::routes(),
        ResourceClass::Logos => logos::routes(),
        ResourceClass::Themes => themes::routes(),
        ResourceClass::ExtIcons => extensions::icon_routes(),
        ResourceClass::ExtData => extensions::data_routes(),
        ResourceClass::Curations => curations::routes(),
        ResourceClass::Credits => credits::routes(),
    }
}

/// Returns a [`Router`] with every resource class nested under its prefix.
///
/// Requests outside every prefix answer 404.
pub fn routes() -> Router<ServiceState> {
    ResourceClass::iter()
        .fold(Router::new(), |router, class| {
            router.nest(&format!("/{}", class.prefix()), class_routes(class))
        })
        .fallback(fallback)
}

#[cfg(test)]
pub(crate) mod test {
    use std::path::Path;

    use axum::Router;
    use axum_test::TestServer;
    use flare_fetch::{AdmissionOrder, FetchConfig};
    use wiremock::MockServer;

    use crate::handler::routes;
    use crate::service::{ServiceConfig, ServiceState};

    /// Returns a config with on-demand images pointed at `upstream`.
    pub fn on_demand_config(root: &Path, upstream: &MockServer) -> ServiceConfig {
        let fetch = FetchConfig::builder()
            .with_base_url(format!("{}/images/", upstream.uri()))
            .with_max_concurrent(2_usize)
            .with_timeout_secs(5_u64)
            .with_admission(AdmissionOrder::Fifo)
            .build()
            .expect("valid fetch config");

        ServiceConfig::new(root)
            .with_on_demand_images(true)
            .with_fetch(fetch)
    }

    /// Returns a new [`TestServer`] with the given router and fresh state.
    pub async fn create_test_server_with_router(
        config: ServiceConfig,
        router: Router<ServiceState>,
    ) -> anyhow::Result<(TestServer, ServiceState)> {
        let state = ServiceState::new(config)?;
        let server = TestServer::new(router.with_state(state.clone()))?;
        Ok((server, state))
    }

    /// Returns a new [`TestServer`] with the asset routes.
    pub async fn create_test_server(
        config: ServiceConfig,
    ) -> anyhow::Result<(TestServer, ServiceState)> {
        create_test_server_with_router(config, routes()).await
    }

    #[tokio::test]
    async fn handlers() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (server, _) = create_test_server(ServiceConfig::new(dir.path())).await?;
        assert!(server.is_running());
        Ok(())
    }

    #[tokio::test]
    async fn unknown_prefix_is_not_found() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (server, _) = create_test_server(ServiceConfig::new(dir.path())).await?;

        let response = server.get("/unknown/file.png").await;
        response.assert_status_not_found();
        assert!(response.text().contains("not_found"));

        server.get("/").await.assert_status_not_found();

        Ok(())
    }

    #[tokio::test]
    async fn unsupported_method_is_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (server, _) = create_test_server(ServiceConfig::new(dir.path())).await?;

        server
            .post("/logos/Flash.png")
            .await
            .assert_status(axum::http::StatusCode::METHOD_NOT_ALLOWED);

        Ok(())
    }
}
