//! In-memory lookup tables filled by the theme, logo set and extension
//! loaders.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Something addressable by a string identifier.
pub trait RegistryEntry: Clone + Send + Sync + 'static {
    /// Returns the identifier used as the registry key.
    fn id(&self) -> &str;
}

/// A loaded theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub id: String,
    /// Folder the theme was loaded from.
    pub base_path: PathBuf,
    /// Entry folder of the theme, relative to `base_path`.
    pub theme_path: PathBuf,
}

impl Theme {
    /// Returns the folder theme files are served from.
    #[must_use]
    pub fn root(&self) -> PathBuf {
        self.base_path.join(&self.theme_path)
    }
}

impl RegistryEntry for Theme {
    fn id(&self) -> &str {
        &self.id
    }
}

/// A set of platform logos overriding the default logo folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoSet {
    pub id: String,
    pub full_path: PathBuf,
    /// File names present in the set.
    pub files: HashSet<String>,
}

impl LogoSet {
    /// Returns whether the set provides `file`.
    #[must_use]
    pub fn contains(&self, file: &str) -> bool {
        self.files.contains(file)
    }
}

impl RegistryEntry for LogoSet {
    fn id(&self) -> &str {
        &self.id
    }
}

/// A loaded extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extension {
    pub id: String,
    pub extension_path: PathBuf,
    /// Icon path from the manifest, relative to `extension_path`.
    pub icon: Option<String>,
}

impl RegistryEntry for Extension {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Shared map of entries keyed by id. Cloning shares the same map.
#[derive(Debug, Clone)]
pub struct Registry<T> {
    entries: Arc<RwLock<HashMap<String, T>>>,
}

impl<T: RegistryEntry> Registry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Adds or replaces an entry, returning the one it replaced.
    pub async fn register(&self, entry: T) -> Option<T> {
        let id = entry.id().to_owned();
        self.entries.write().await.insert(id, entry)
    }

    /// Removes an entry by id.
    pub async fn unregister(&self, id: &str) -> Option<T> {
        self.entries.write().await.remove(id)
    }

    /// Returns a copy of the entry registered under `id`.
    pub async fn get(&self, id: &str) -> Option<T> {
        self.entries.read().await.get(id).cloned()
    }

    /// Returns the number of registered entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns whether nothing is registered.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<T: RegistryEntry> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Registered themes.
pub type ThemeRegistry = Registry<Theme>;

/// Registered extensions.
pub type ExtensionRegistry = Registry<Extension>;

/// Registered logo sets and the one currently selected.
#[derive(Debug, Clone, Default)]
pub struct LogoSetRegistry {
    sets: Registry<LogoSet>,
    current: Arc<RwLock<Option<String>>>,
}

impl LogoSetRegistry {
    /// Creates an empty registry with no selected set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a logo set.
    pub async fn register(&self, set: LogoSet) -> Option<LogoSet> {
        self.sets.register(set).await
    }

    /// Removes a logo set.
    pub async fn unregister(&self, id: &str) -> Option<LogoSet> {
        self.sets.unregister(id).await
    }

    /// Selects the logo set used for lookups, or clears the selection.
    pub async fn select(&self, id: Option<String>) {
        *self.current.write().await = id;
    }

    /// Returns the selected logo set, if it is registered.
    pub async fn current(&self) -> Option<LogoSet> {
        let id = self.current.read().await.clone()?;
        self.sets.get(&id).await
    }
}
