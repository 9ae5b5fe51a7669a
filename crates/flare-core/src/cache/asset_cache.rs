//! Asset lookup, storage and removal under a single root directory.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;

use super::{TRACING_TARGET, content_type, normalize_relative, partial_path};
use crate::{Error, Result};

/// A cached file ready to be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedAsset {
    /// Absolute path of the file on disk.
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// Content type derived from the extension, empty when unknown.
    pub content_type: String,
}

/// Result of resolving a relative path against the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The file exists and is a regular file.
    Hit(CachedAsset),
    /// The file is absent or could not be inspected.
    Miss,
}

impl Lookup {
    /// Returns whether the lookup found a file.
    #[must_use]
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }
}

/// Resolves, stores and removes asset files under a root directory.
///
/// Cloning is cheap; clones share the same root.
#[derive(Debug, Clone)]
pub struct AssetCache {
    root: Arc<PathBuf>,
}

impl AssetCache {
    /// Creates a cache rooted at `root`. The directory does not need to exist.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
        }
    }

    /// Returns the asset root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins `relative` onto the root after lexical validation.
    pub fn canonical_path(&self, relative: &str) -> Result<PathBuf> {
        Ok(self.root.join(normalize_relative(relative)?))
    }

    /// Looks up `relative` on disk.
    ///
    /// Traversal outside the root is an error. A missing file is a miss;
    /// any other file system failure is logged and also reported as a miss.
    pub async fn resolve(&self, relative: &str) -> Result<Lookup> {
        let path = self.canonical_path(relative)?;

        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Lookup::Miss),
            Err(err) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    path = %path.display(),
                    error = %err,
                    "Failed to inspect cached asset"
                );
                return Ok(Lookup::Miss);
            }
        };

        if !metadata.is_file() {
            tracing::error!(
                target: TRACING_TARGET,
                path = %path.display(),
                "Cached asset is not a regular file"
            );
            return Ok(Lookup::Miss);
        }

        self.ensure_contained(&path).await?;

        let content_type = content_type(&path);

        Ok(Lookup::Hit(CachedAsset {
            path,
            size: metadata.len(),
            content_type,
        }))
    }

    /// Writes `bytes` to `relative`, replacing any existing file atomically.
    ///
    /// Parent directories are created as needed. Returns the final path.
    pub async fn store(&self, relative: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.canonical_path(relative)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|err| {
                Error::file_system(format!("cannot create '{}'", parent.display()))
                    .with_source(err)
            })?;
        }

        let partial = partial_path(&path);
        if let Err(err) = fs::write(&partial, bytes).await {
            remove_quietly(&partial).await;
            return Err(
                Error::file_system(format!("cannot write '{}'", partial.display()))
                    .with_source(err),
            );
        }

        if let Err(err) = fs::rename(&partial, &path).await {
            remove_quietly(&partial).await;
            return Err(
                Error::file_system(format!("cannot commit '{}'", path.display()))
                    .with_source(err),
            );
        }

        tracing::debug!(
            target: TRACING_TARGET,
            path = %path.display(),
            size = bytes.len(),
            "Asset stored"
        );

        Ok(path)
    }

    /// Deletes the file at `relative`. Returns `false` when it did not exist.
    pub async fn remove(&self, relative: &str) -> Result<bool> {
        let path = self.canonical_path(relative)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(target: TRACING_TARGET, path = %path.display(), "Asset removed");
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(
                Error::file_system(format!("cannot remove '{}'", path.display())).with_source(err),
            ),
        }
    }

    /// Rejects existing paths whose real location is outside the root.
    async fn ensure_contained(&self, path: &Path) -> Result<()> {
        let (root, target) = match (
            fs::canonicalize(self.root.as_path()).await,
            fs::canonicalize(path).await,
        ) {
            (Ok(root), Ok(target)) => (root, target),
            (Err(err), _) | (_, Err(err)) => {
                return Err(Error::file_system("cannot canonicalize asset path").with_source(err));
            }
        };

        if target.starts_with(&root) {
            Ok(())
        } else {
            Err(Error::path_traversal(format!(
                "'{}' resolves outside the asset root",
                path.display()
            )))
        }
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(err) = fs::remove_file(path).await
        && err.kind() != io::ErrorKind::NotFound
    {
        tracing::warn!(
            target: TRACING_TARGET,
            path = %path.display(),
            error = %err,
            "Failed to remove partial file"
        );
    }
}
