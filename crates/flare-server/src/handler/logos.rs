//! Platform logo handlers.
//!
//! Logos come from the selected logo set when it provides the file, and from
//! the default logo folder otherwise. Missing logos fall back to a bundled
//! replacement, then to a generic placeholder.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::Method;
use axum::response::Response;
use axum::routing::get;
use flare_core::cache::{AssetCache, Lookup};

use crate::handler::Result;
use crate::handler::utils::{serve_asset, serve_lookup};
use crate::service::{FALLBACK_LOGO, LogoSetRegistry, ServiceConfig, ServiceState};
use crate::utility::tracing_targets::LOGOS as TRACING_TARGET;

async fn get_logo(
    State(config): State<Arc<ServiceConfig>>,
    State(logo_sets): State<LogoSetRegistry>,
    method: Method,
    Path(path): Path<String>,
) -> Result<Response> {
    let root = match logo_sets.current().await {
        Some(set) if set.contains(&path) => set.full_path,
        _ => config.logo_root(),
    };

    if let Lookup::Hit(asset) = AssetCache::new(root).resolve(&path).await? {
        return serve_asset(&method, asset).await;
    }

    let fallback = AssetCache::new(&config.logo_fallback_folder);
    if let Lookup::Hit(asset) = fallback.resolve(&path).await? {
        tracing::debug!(target: TRACING_TARGET, path, "Serving bundled logo");
        return serve_asset(&method, asset).await;
    }

    tracing::debug!(target: TRACING_TARGET, path, "Logo missing, serving placeholder");
    serve_lookup(&method, fallback.resolve(FALLBACK_LOGO).await?).await
}

/// Returns a [`Router`] with all logo routes.
pub fn routes() -> Router<ServiceState> {
    Router::new().route("/{*path}", get(get_logo))
}
