//! Theme file handlers.

use axum::Router;
use axum::extract::{Path, State};
use axum::http::Method;
use axum::response::Response;
use axum::routing::get;
use flare_core::ResourceClass;
use flare_core::cache::AssetCache;

use crate::handler::utils::{reject_illegal, serve_lookup};
use crate::handler::{ErrorKind, Result};
use crate::service::{ServiceState, ThemeRegistry};

/// Serves a file from a registered theme's folder.
async fn get_theme_file(
    State(themes): State<ThemeRegistry>,
    method: Method,
    Path((theme_id, path)): Path<(String, String)>,
) -> Result<Response> {
    let Some(theme) = themes.get(&theme_id).await else {
        return Err(ErrorKind::NotFound
            .with_resource(ResourceClass::Themes.prefix())
            .with_context(theme_id));
    };

    let lookup = AssetCache::new(theme.root())
        .resolve(&path)
        .await
        .map_err(|err| {
            reject_illegal(ResourceClass::Themes.prefix(), &path, ErrorKind::BadRequest, err)
        })?;

    serve_lookup(&method, lookup).await
}

/// Returns a [`Router`] with all theme routes.
pub fn routes() -> Router<ServiceState> {
    Router::new().route("/{theme_id}/{*path}", get(get_theme_file))
}
