//! Disk-backed asset cache.
//!
//! The file system is the cache: a file present at its canonical path under
//! the asset root is a hit. No index is kept in memory.

mod asset_cache;
mod path;
mod upload;

pub use asset_cache::{AssetCache, CachedAsset, Lookup};
pub use path::{content_type, normalize_relative, partial_path};
pub use upload::UploadPath;

/// Tracing target for cache operations.
pub const TRACING_TARGET: &str = "flare_core::cache";
