//! Building file responses.

use axum::body::Body;
use axum::http::{Method, StatusCode, header};
use axum::response::Response;
use flare_core::cache::{CachedAsset, Lookup, content_type};
use flare_fetch::FetchStream;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::handler::{ErrorKind, Result};
use crate::utility::tracing_targets;

/// Responds with a cached file, or only its headers for `HEAD`.
///
/// `Content-Type` is omitted when the extension is unknown.
pub(crate) async fn serve_asset(method: &Method, asset: CachedAsset) -> Result<Response> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_LENGTH, asset.size);

    if !asset.content_type.is_empty() {
        builder = builder.header(header::CONTENT_TYPE, asset.content_type.as_str());
    }

    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        let file = File::open(&asset.path).await.map_err(|err| {
            tracing::warn!(
                target: tracing_targets::FILES,
                path = %asset.path.display(),
                error = %err,
                "Failed to open asset for streaming"
            );
            ErrorKind::NotFound.into_error()
        })?;
        Body::from_stream(ReaderStream::new(file))
    };

    builder.body(body).map_err(|err| {
        tracing::error!(target: tracing_targets::FILES, error = %err, "Failed to build file response");
        ErrorKind::InternalServerError.into_error()
    })
}

/// Responds with the file of a hit, or 404 for a miss.
pub(crate) async fn serve_lookup(method: &Method, lookup: Lookup) -> Result<Response> {
    match lookup {
        Lookup::Hit(asset) => serve_asset(method, asset).await,
        Lookup::Miss => Err(ErrorKind::NotFound.into_error()),
    }
}

/// Responds with a body arriving from upstream.
///
/// The content type follows the extension of `key`, as it would once the
/// file is cached.
pub(crate) fn serve_stream(method: &Method, key: &str, stream: FetchStream) -> Result<Response> {
    let mut builder = Response::builder().status(StatusCode::OK);

    if let Some(length) = stream.content_length() {
        builder = builder.header(header::CONTENT_LENGTH, length);
    }

    let content_type = content_type(key);
    if !content_type.is_empty() {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }

    // Dropping the stream for HEAD cancels the client side only.
    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        Body::from_stream(stream)
    };

    builder.body(body).map_err(|err| {
        tracing::error!(target: tracing_targets::FILES, error = %err, "Failed to build stream response");
        ErrorKind::InternalServerError.into_error()
    })
}
