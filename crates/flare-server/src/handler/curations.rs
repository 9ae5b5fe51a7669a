//! Working curation file handlers.
//!
//! Reads are served directly. Writes and deletions run on the curation
//! queue so they never interleave with other curation mutations. Changes to
//! a curation's preview images are broadcast.

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{Method, StatusCode};
use axum::response::Response;
use axum::routing::get;
use flare_core::ResourceClass;
use flare_core::cache::AssetCache;
use flare_core::notify::{AssetEvent, ChangeNotifier};
use flare_core::queue::{DomainQueues, QueueDomain};

use crate::handler::utils::{reject_illegal, serve_lookup, single_segment};
use crate::handler::{Error, ErrorKind, Result};
use crate::service::{ServiceConfig, ServiceState};
use crate::utility::tracing_targets::CURATIONS as TRACING_TARGET;

/// Maximum accepted curation file size: 256 MiB.
const MAX_FILE_SIZE: usize = 256 * 1024 * 1024;

/// Curation files shown by the launcher, whose changes are broadcast.
const PREVIEW_IMAGES: [&str; 2] = ["logo.png", "ss.png"];

/// Returns whether `path` names one of the curation's preview images.
fn is_preview_image(path: &str) -> bool {
    PREVIEW_IMAGES.contains(&path)
}

/// Returns the cache rooted at one curation folder.
fn curation_folder(config: &ServiceConfig, folder: &str) -> Result<AssetCache> {
    let folder = single_segment(ResourceClass::Curations.prefix(), folder)?;
    Ok(AssetCache::new(config.curations_root().join(folder)))
}

fn reject(path: &str, error: flare_core::Error) -> Error<'static> {
    reject_illegal(ResourceClass::Curations.prefix(), path, ErrorKind::BadRequest, error)
}

async fn get_file(
    State(config): State<Arc<ServiceConfig>>,
    method: Method,
    Path((folder, path)): Path<(String, String)>,
) -> Result<Response> {
    let lookup = curation_folder(&config, &folder)?
        .resolve(&path)
        .await
        .map_err(|err| reject(&path, err))?;
    serve_lookup(&method, lookup).await
}

async fn write_file(
    State(config): State<Arc<ServiceConfig>>,
    State(queues): State<DomainQueues>,
    State(notifier): State<ChangeNotifier>,
    Path((folder, path)): Path<(String, String)>,
    body: Bytes,
) -> Result<StatusCode> {
    let cache = curation_folder(&config, &folder)?;
    cache.canonical_path(&path).map_err(|err| reject(&path, err))?;
    let relative = path.clone();
    let size = body.len();

    queues
        .get(QueueDomain::Curation)
        .push(move || async move { cache.store(&relative, &body).await })
        .await?;

    if is_preview_image(&path) {
        notifier.notify(AssetEvent::updated(
            ResourceClass::Curations,
            format!("{folder}/{path}"),
        ));
    }
    tracing::info!(target: TRACING_TARGET, folder, path, size, "Curation file written");

    Ok(StatusCode::OK)
}

async fn remove_file(
    State(config): State<Arc<ServiceConfig>>,
    State(queues): State<DomainQueues>,
    State(notifier): State<ChangeNotifier>,
    Path((folder, path)): Path<(String, String)>,
) -> Result<StatusCode> {
    let cache = curation_folder(&config, &folder)?;
    cache.canonical_path(&path).map_err(|err| reject(&path, err))?;
    let relative = path.clone();

    let removed = queues
        .get(QueueDomain::Curation)
        .push(move || async move { cache.remove(&relative).await })
        .await?;

    if !removed {
        return Err(ErrorKind::NotFound
            .with_resource(ResourceClass::Curations.prefix())
            .with_context(format!("{folder}/{path}")));
    }

    if is_preview_image(&path) {
        notifier.notify(AssetEvent::removed(
            ResourceClass::Curations,
            format!("{folder}/{path}"),
        ));
    }
    tracing::info!(target: TRACING_TARGET, folder, path, "Curation file removed");

    Ok(StatusCode::OK)
}

/// Returns a [`Router`] with all curation routes.
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .route(
            "/{folder}/{*path}",
            get(get_file).post(write_file).delete(remove_file),
        )
        .layer(DefaultBodyLimit::max(MAX_FILE_SIZE))
}
