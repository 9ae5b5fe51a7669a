//! Game image handlers.
//!
//! - `GET|HEAD /images/{path}` serves a cached image. On a miss with
//!   on-demand images enabled the request waits on the fetch queue and the
//!   upstream body is streamed as it arrives.
//! - `POST /images/{path}` stores an uploaded image. The path must have the
//!   `<ab>/<cd>/<uuid>.png` shape, optionally under a category folder.
//! - `DELETE /images/{path}` removes a cached image, validated the same way.

use axum::Router;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{Method, StatusCode};
use axum::response::Response;
use axum::routing::get;
use flare_core::ResourceClass;
use flare_core::cache::{AssetCache, Lookup, UploadPath};
use flare_core::notify::AssetEvent;
use flare_fetch::{FetchOutcome, FetchQueue};

use crate::handler::utils::{reject_illegal, serve_asset, serve_lookup, serve_stream};
use crate::handler::{Error, ErrorKind, Result};
use crate::service::ServiceState;
use crate::utility::tracing_targets::IMAGES as TRACING_TARGET;

/// Maximum accepted upload size: 64 MiB.
const MAX_UPLOAD_SIZE: usize = 64 * 1024 * 1024;

fn reject(path: &str, error: flare_core::Error) -> Error<'static> {
    reject_illegal(ResourceClass::Images.prefix(), path, ErrorKind::BadRequest, error)
}

/// Serves an image from disk or from the fetch queue.
async fn get_image(
    State(state): State<ServiceState>,
    method: Method,
    Path(path): Path<String>,
) -> Result<Response> {
    let lookup = state.images.resolve(&path).await.map_err(|err| reject(&path, err))?;
    match lookup {
        Lookup::Hit(asset) => serve_asset(&method, asset).await,
        Lookup::Miss => match &state.fetch {
            Some(fetch) => fetch_image(&method, fetch, &state.images, &path).await,
            None => Err(ErrorKind::NotFound.into_error()),
        },
    }
}

async fn fetch_image(
    method: &Method,
    fetch: &FetchQueue,
    images: &AssetCache,
    path: &str,
) -> Result<Response> {
    tracing::debug!(target: TRACING_TARGET, path, "Image missing, fetching on demand");

    match fetch.enqueue(path).resolve().await {
        FetchOutcome::Streaming(stream) => serve_stream(method, path, stream),
        FetchOutcome::Cached(_) => {
            let lookup = images.resolve(path).await.map_err(|err| reject(path, err))?;
            serve_lookup(method, lookup).await
        }
        FetchOutcome::NotFound(reason) => {
            tracing::debug!(target: TRACING_TARGET, path, reason = ?reason, "Image unavailable");
            Err(ErrorKind::NotFound.into_error())
        }
    }
}

/// Stores an uploaded image and broadcasts the change.
async fn upload_image(
    State(state): State<ServiceState>,
    Path(path): Path<String>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<StatusCode> {
    let upload = UploadPath::parse(&path).map_err(|err| reject(&path, err))?;

    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ErrorKind::PayloadTooLarge.into_error()
        } else {
            tracing::error!(
                target: TRACING_TARGET,
                path = %upload,
                error = %rejection,
                "Failed to read image upload"
            );
            ErrorKind::InternalServerError.into_error()
        }
    })?;

    state.images.store(upload.relative_path(), &body).await?;
    state
        .notifier
        .notify(AssetEvent::updated(ResourceClass::Images, upload.relative_path()));

    tracing::info!(
        target: TRACING_TARGET,
        path = %upload,
        id = %upload.id(),
        size = body.len(),
        "Image uploaded"
    );

    Ok(StatusCode::OK)
}

/// Removes a cached image and broadcasts the change.
async fn delete_image(
    State(state): State<ServiceState>,
    Path(path): Path<String>,
) -> Result<StatusCode> {
    let target = UploadPath::parse(&path).map_err(|err| reject(&path, err))?;

    if !state.images.remove(target.relative_path()).await? {
        return Err(ErrorKind::NotFound.into_error());
    }

    state
        .notifier
        .notify(AssetEvent::removed(ResourceClass::Images, target.relative_path()));
    tracing::info!(target: TRACING_TARGET, path = %target, "Image deleted");

    Ok(StatusCode::OK)
}

/// Returns a [`Router`] with all image routes.
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .route(
            "/{*path}",
            get(get_image).post(upload_image).delete(delete_image),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use flare_core::notify::AssetChange;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::handler::test::{create_test_server, on_demand_config};
    use crate::service::ServiceConfig;

    const ID: &str = "abcd1234-5678-4abc-9def-0123456789ab";

    fn image_path() -> String {
        format!("ab/cd/{ID}.png")
    }

    #[tokio::test]
    async fn serves_cached_image() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (server, state) = create_test_server(ServiceConfig::new(dir.path())).await?;
        state.images.store(&image_path(), b"cached").await?;

        let response = server.get(&format!("/images/{}", image_path())).await;
        response.assert_status_ok();
        response.assert_header("content-type", "image/png");
        response.assert_header("content-length", "6");
        assert_eq!(response.as_bytes().as_ref(), b"cached");

        Ok(())
    }

    #[tokio::test]
    async fn head_returns_headers_only() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (server, state) = create_test_server(ServiceConfig::new(dir.path())).await?;
        state.images.store(&image_path(), b"cached").await?;

        let response = server
            .method(axum::http::Method::HEAD, &format!("/images/{}", image_path()))
            .await;
        response.assert_status_ok();
        response.assert_header("content-length", "6");
        assert!(response.as_bytes().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn miss_without_on_demand_is_not_found() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (server, _) = create_test_server(ServiceConfig::new(dir.path())).await?;

        server
            .get(&format!("/images/{}", image_path()))
            .await
            .assert_status_not_found();

        Ok(())
    }

    #[tokio::test]
    async fn traversal_is_bad_request() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (server, _) = create_test_server(ServiceConfig::new(dir.path())).await?;

        let response = server.get("/images/..%2F..%2F..%2Fsecret.png").await;
        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert_eq!(body["resource"], "images");
        assert_eq!(body["context"], "../../../secret.png");

        Ok(())
    }

    #[tokio::test]
    async fn on_demand_fetch_streams_then_serves_from_disk() -> anyhow::Result<()> {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/images/{}", image_path())))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"remote image".to_vec()))
            .expect(1)
            .mount(&upstream)
            .await;

        let dir = tempfile::tempdir()?;
        let config = on_demand_config(dir.path(), &upstream);
        let (server, state) = create_test_server(config).await?;
        let mut events = state.notifier.subscribe();

        let first = server.get(&format!("/images/{}", image_path())).await;
        first.assert_status_ok();
        first.assert_header("content-type", "image/png");
        assert_eq!(first.as_bytes().as_ref(), b"remote image");

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv()).await??;
        assert_eq!(event.key, image_path());
        assert_eq!(event.change, AssetChange::Updated);

        let second = server.get(&format!("/images/{}", image_path())).await;
        second.assert_status_ok();
        assert_eq!(second.as_bytes().as_ref(), b"remote image");

        assert_eq!(
            std::fs::read(state.images.root().join(image_path()))?,
            b"remote image"
        );
        upstream.verify().await;

        Ok(())
    }

    #[tokio::test]
    async fn upstream_miss_is_not_found_and_writes_nothing() -> anyhow::Result<()> {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&upstream)
            .await;

        let dir = tempfile::tempdir()?;
        let config = on_demand_config(dir.path(), &upstream);
        let (server, state) = create_test_server(config).await?;

        server
            .get(&format!("/images/{}", image_path()))
            .await
            .assert_status_not_found();
        assert!(!state.images.root().join(image_path()).exists());

        Ok(())
    }

    #[tokio::test]
    async fn upload_stores_and_notifies() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (server, state) = create_test_server(ServiceConfig::new(dir.path())).await?;
        let mut events = state.notifier.subscribe();

        let response = server
            .post(&format!("/images/Logos/{}", image_path()))
            .bytes(b"uploaded".as_slice().into())
            .await;
        response.assert_status_ok();
        assert!(response.as_bytes().is_empty());

        let stored = state.images.root().join("Logos").join(image_path());
        assert_eq!(std::fs::read(stored)?, b"uploaded");

        let event = events.recv().await?;
        assert_eq!(event.key, format!("Logos/{}", image_path()));
        assert_eq!(event.change, AssetChange::Updated);

        Ok(())
    }

    #[tokio::test]
    async fn malformed_upload_is_rejected_without_write() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (server, state) = create_test_server(ServiceConfig::new(dir.path())).await?;

        for bad in [
            format!("/images/cd/ab/{ID}.png"),
            format!("/images/ab/cd/{ID}.jpg"),
            "/images/ab/cd/not-a-uuid.png".to_owned(),
            format!("/images/{ID}.png"),
        ] {
            server
                .post(&bad)
                .bytes(b"data".as_slice().into())
                .await
                .assert_status_bad_request();
        }

        assert!(!state.images.root().exists());
        Ok(())
    }

    #[tokio::test]
    async fn delete_removes_and_notifies() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (server, state) = create_test_server(ServiceConfig::new(dir.path())).await?;
        state.images.store(&image_path(), b"cached").await?;
        let mut events = state.notifier.subscribe();

        server
            .delete(&format!("/images/{}", image_path()))
            .await
            .assert_status_ok();
        assert!(!state.images.root().join(image_path()).exists());
        assert_eq!(events.recv().await?.change, AssetChange::Removed);

        server
            .delete(&format!("/images/{}", image_path()))
            .await
            .assert_status_not_found();

        Ok(())
    }
}
