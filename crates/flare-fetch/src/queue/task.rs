//! Retrieval of a single admitted request.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use flare_core::ResourceClass;
use flare_core::cache::{AssetCache, Lookup, partial_path};
use flare_core::notify::{AssetEvent, ChangeNotifier};
use reqwest::{Client, StatusCode};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use super::TRACING_TARGET;
use super::request::{FetchOutcome, FetchRequest, FetchStream, NotFoundReason};
use crate::{FetchConfig, FetchError, Result};

/// Shared, read-only context of every fetch task.
pub(crate) struct FetchContext {
    pub client: Client,
    pub config: FetchConfig,
    pub cache: AssetCache,
    pub notifier: ChangeNotifier,
}

/// Instruction for the disk writer.
enum DiskCommand {
    Chunk(Bytes),
    Commit,
}

/// Runs one in-flight request to completion.
pub(crate) async fn run_fetch(context: &FetchContext, request: FetchRequest) {
    let key = request.key.clone();

    let path = match context.cache.resolve(&key).await {
        Ok(Lookup::Hit(asset)) => {
            tracing::debug!(target: TRACING_TARGET, key = %key, "Asset already cached");
            request.respond(FetchOutcome::Cached(asset.path));
            return;
        }
        Ok(Lookup::Miss) => match context.cache.canonical_path(&key) {
            Ok(path) => path,
            Err(err) => return reject(request, &err),
        },
        Err(err) => return reject(request, &err),
    };

    let url = match context.config.upstream_url(&key) {
        Ok(url) => url,
        Err(err) => return reject(request, &err),
    };

    let mut response = match context.client.get(url).send().await {
        Ok(response) => response,
        Err(err) => {
            log_transport_error(&key, &err);
            request.respond(FetchOutcome::NotFound(NotFoundReason::Failed));
            return;
        }
    };

    let status = response.status();
    if status != StatusCode::OK {
        tracing::debug!(
            target: TRACING_TARGET,
            key = %key,
            status = status.as_u16(),
            "Upstream has no copy"
        );
        request.respond(FetchOutcome::NotFound(NotFoundReason::UpstreamMiss(
            status.as_u16(),
        )));
        return;
    }

    let (disk_tx, disk_rx) = mpsc::channel(context.config.chunk_buffer);
    let writer = tokio::spawn(write_to_disk(path, disk_rx));

    // A slow client never holds back the upstream read or the cache write.
    let (client_tx, client_rx) = mpsc::unbounded_channel();
    let stream = FetchStream::new(client_rx, response.content_length());
    let token = request.token.clone();
    let mut client_tx = match request.responder.send(FetchOutcome::Streaming(stream)) {
        Ok(()) => Some(client_tx),
        Err(_) => None,
    };
    let mut disk_tx = Some(disk_tx);

    let transfer: Result<()> = loop {
        if client_tx.is_some() && token.is_cancelled() {
            tracing::debug!(target: TRACING_TARGET, key = %key, "Client disconnected, caching only");
            client_tx = None;
        }

        if client_tx.is_none() && disk_tx.is_none() {
            break Err(FetchError::Aborted);
        }

        match response.chunk().await {
            Ok(Some(chunk)) => {
                let disk_gone = match &disk_tx {
                    Some(sender) => sender.send(DiskCommand::Chunk(chunk.clone())).await.is_err(),
                    None => false,
                };
                if disk_gone {
                    disk_tx = None;
                }

                let client_gone = match &client_tx {
                    Some(sender) => sender.send(Ok(chunk)).is_err(),
                    None => false,
                };
                if client_gone {
                    client_tx = None;
                }
            }
            Ok(None) => break Ok(()),
            Err(err) => {
                log_transport_error(&key, &err);
                if let Some(sender) = client_tx.take() {
                    let _ = sender.send(Err(FetchError::Transport(err)));
                }
                break Err(FetchError::Aborted);
            }
        }
    };

    // Dropping the disk sender without a commit discards the partial file.
    let committed = match transfer {
        Ok(()) => match disk_tx.take() {
            Some(sender) => sender.send(DiskCommand::Commit).await.is_ok(),
            None => false,
        },
        Err(_) => {
            drop(disk_tx.take());
            false
        }
    };

    match writer.await {
        Ok(Ok(path)) if committed => {
            tracing::debug!(
                target: TRACING_TARGET,
                key = %key,
                path = %path.display(),
                "Asset fetched and cached"
            );
            context
                .notifier
                .notify(AssetEvent::updated(ResourceClass::Images, key.as_str()));
        }
        Ok(Ok(_)) => {}
        Ok(Err(FetchError::Aborted)) => {}
        Ok(Err(err)) => {
            tracing::error!(
                target: TRACING_TARGET,
                key = %key,
                error = %err,
                "Failed to cache fetched asset"
            );
        }
        Err(err) => {
            tracing::error!(
                target: TRACING_TARGET,
                key = %key,
                error = %err,
                "Cache writer task failed"
            );
        }
    }

    // The client stream ends here, after the cache file is settled.
    drop(client_tx);
}

fn reject(request: FetchRequest, err: &dyn std::error::Error) {
    tracing::warn!(
        target: TRACING_TARGET,
        key = %request.key,
        error = %err,
        "Rejected fetch request"
    );
    request.respond(FetchOutcome::NotFound(NotFoundReason::Failed));
}

fn log_transport_error(key: &str, err: &reqwest::Error) {
    if crate::error::is_host_not_found(err) {
        tracing::debug!(target: TRACING_TARGET, key = %key, error = %err, "Upstream host not found");
    } else {
        tracing::error!(target: TRACING_TARGET, key = %key, error = %err, "Upstream request failed");
    }
}

/// Writes chunks to a temporary sibling of `path` and renames it on commit.
///
/// The partial file is removed when the channel closes without a commit or
/// a write fails.
async fn write_to_disk(path: PathBuf, mut commands: mpsc::Receiver<DiskCommand>) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let partial = partial_path(&path);
    let result = write_partial(&partial, &mut commands).await;

    match result {
        Ok(()) => match fs::rename(&partial, &path).await {
            Ok(()) => Ok(path),
            Err(err) => {
                discard(&partial).await;
                Err(err.into())
            }
        },
        Err(err) => {
            discard(&partial).await;
            Err(err)
        }
    }
}

async fn write_partial(partial: &Path, commands: &mut mpsc::Receiver<DiskCommand>) -> Result<()> {
    let mut file = fs::File::create(partial).await?;

    while let Some(command) = commands.recv().await {
        match command {
            DiskCommand::Chunk(chunk) => file.write_all(&chunk).await?,
            DiskCommand::Commit => {
                file.flush().await?;
                file.sync_all().await?;
                return Ok(());
            }
        }
    }

    Err(FetchError::Aborted)
}

async fn discard(partial: &Path) {
    if let Err(err) = fs::remove_file(partial).await
        && err.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(
            target: TRACING_TARGET,
            path = %partial.display(),
            error = %err,
            "Failed to remove partial cache file"
        );
    }
}
