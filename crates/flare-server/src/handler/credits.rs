//! Credits file handler.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::Method;
use axum::response::Response;
use axum::routing::get;
use flare_core::ResourceClass;
use flare_core::cache::AssetCache;

use crate::handler::Result;
use crate::handler::utils::serve_lookup;
use crate::service::{ServiceConfig, ServiceState};

async fn get_credits(
    State(config): State<Arc<ServiceConfig>>,
    method: Method,
) -> Result<Response> {
    let lookup = AssetCache::new(config.json_root())
        .resolve(ResourceClass::Credits.prefix())
        .await?;
    serve_lookup(&method, lookup).await
}

/// Returns a [`Router`] serving the credits file at its root.
pub fn routes() -> Router<ServiceState> {
    Router::new().route("/", get(get_credits))
}

#[cfg(test)]
mod tests {
    use crate::handler::test::create_test_server;
    use crate::service::ServiceConfig;

    #[tokio::test]
    async fn serves_credits_json() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = ServiceConfig::new(dir.path());
        let (server, _) = create_test_server(config.clone()).await?;

        server.get("/credits.json").await.assert_status_not_found();

        std::fs::create_dir_all(config.json_root())?;
        std::fs::write(config.json_root().join("credits.json"), br#"{"profiles":[]}"#)?;

        let response = server.get("/credits.json").await;
        response.assert_status_ok();
        response.assert_header("content-type", "application/json");
        assert_eq!(response.as_bytes().as_ref(), br#"{"profiles":[]}"#);

        Ok(())
    }
}
