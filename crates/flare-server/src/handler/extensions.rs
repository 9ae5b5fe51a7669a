//! Extension icon and static data handlers.
//!
//! - `GET /exticons/{ext_id}` serves the icon named in the extension manifest.
//! - `GET /extdata/{ext_id}/{path}` serves files from the extension's
//!   `static` folder.

use axum::Router;
use axum::extract::{Path, State};
use axum::http::Method;
use axum::response::Response;
use axum::routing::get;
use flare_core::ResourceClass;
use flare_core::cache::AssetCache;

use crate::handler::utils::{reject_illegal, serve_lookup};
use crate::handler::{ErrorKind, Result};
use crate::service::{Extension, ExtensionRegistry, ServiceState};
use crate::utility::tracing_targets::EXTENSIONS as TRACING_TARGET;

/// Folder inside an extension that holds publicly served files.
const STATIC_FOLDER: &str = "static";

async fn find_extension(
    registry: &ExtensionRegistry,
    class: ResourceClass,
    ext_id: String,
) -> Result<Extension> {
    registry.get(&ext_id).await.ok_or_else(|| {
        ErrorKind::NotFound
            .with_resource(class.prefix())
            .with_context(ext_id)
    })
}

async fn get_icon(
    State(registry): State<ExtensionRegistry>,
    method: Method,
    Path(ext_id): Path<String>,
) -> Result<Response> {
    let extension = find_extension(&registry, ResourceClass::ExtIcons, ext_id).await?;
    let Some(icon) = extension.icon.as_deref() else {
        tracing::debug!(target: TRACING_TARGET, id = %extension.id, "Extension has no icon");
        return Err(ErrorKind::NotFound.into_error());
    };

    // The icon path comes from the manifest, not the client.
    let lookup = AssetCache::new(&extension.extension_path)
        .resolve(icon)
        .await
        .map_err(|err| {
            reject_illegal(ResourceClass::ExtIcons.prefix(), icon, ErrorKind::NotFound, err)
        })?;

    serve_lookup(&method, lookup).await
}

async fn get_data(
    State(registry): State<ExtensionRegistry>,
    method: Method,
    Path((ext_id, path)): Path<(String, String)>,
) -> Result<Response> {
    let extension = find_extension(&registry, ResourceClass::ExtData, ext_id).await?;

    let lookup = AssetCache::new(extension.extension_path.join(STATIC_FOLDER))
        .resolve(&path)
        .await
        .map_err(|err| {
            reject_illegal(ResourceClass::ExtData.prefix(), &path, ErrorKind::BadRequest, err)
        })?;

    serve_lookup(&method, lookup).await
}

/// Returns a [`Router`] with the extension icon route.
pub fn icon_routes() -> Router<ServiceState> {
    Router::new().route("/{ext_id}", get(get_icon))
}

/// Returns a [`Router`] with the extension data route.
pub fn data_routes() -> Router<ServiceState> {
    Router::new().route("/{ext_id}/{*path}", get(get_data))
}
