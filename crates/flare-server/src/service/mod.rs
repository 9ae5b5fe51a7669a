//! Application state and dependency injection.

mod config;
mod registry;

use std::sync::Arc;

use flare_core::cache::AssetCache;
use flare_core::notify::ChangeNotifier;
use flare_core::queue::DomainQueues;
use flare_fetch::FetchQueue;

pub use crate::service::config::{FALLBACK_LOGO, ServiceConfig};
pub use crate::service::registry::{
    Extension, ExtensionRegistry, LogoSet, LogoSetRegistry, Registry, RegistryEntry, Theme,
    ThemeRegistry,
};
pub use crate::{Error, Result};

/// Tracing target for service state assembly.
const TRACING_TARGET: &str = "flare_server::service";

/// Application state.
///
/// Used for the [`State`] extraction (dependency injection). Every member is
/// cheap to clone and shared between clones.
///
/// [`State`]: axum::extract::State
#[must_use = "state does nothing unless you use it"]
#[derive(Debug, Clone)]
pub struct ServiceState {
    pub config: Arc<ServiceConfig>,

    // Asset serving:
    pub images: AssetCache,
    pub fetch: Option<FetchQueue>,
    pub notifier: ChangeNotifier,

    // Mutation domains:
    pub queues: DomainQueues,

    // Lookup tables filled by external loaders:
    pub themes: ThemeRegistry,
    pub logo_sets: LogoSetRegistry,
    pub extensions: ExtensionRegistry,
}

impl ServiceState {
    /// Initializes application state from configuration.
    ///
    /// Spawns the domain queues and, when on-demand images are enabled, the
    /// fetch queue. Must be called from within a tokio runtime.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        config.validate()?;

        let images = AssetCache::new(config.image_root());
        let notifier = ChangeNotifier::new(config.notify_capacity);

        let fetch = if config.on_demand_images {
            Some(FetchQueue::spawn(
                config.fetch.clone(),
                images.clone(),
                notifier.clone(),
            )?)
        } else {
            None
        };

        tracing::info!(
            target: TRACING_TARGET,
            image_root = %images.root().display(),
            on_demand_images = config.on_demand_images,
            "Service state initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            images,
            fetch,
            notifier,
            queues: DomainQueues::new(),
            themes: ThemeRegistry::new(),
            logo_sets: LogoSetRegistry::new(),
            extensions: ExtensionRegistry::new(),
        })
    }
}

macro_rules! impl_di {
    ($($f:ident: $t:ty),+) => {$(
        impl axum::extract::FromRef<ServiceState> for $t {
            fn from_ref(state: &ServiceState) -> Self {
                state.$f.clone()
            }
        }
    )+};
}

impl_di!(config: Arc<ServiceConfig>);
impl_di!(notifier: ChangeNotifier);
impl_di!(queues: DomainQueues);
impl_di!(themes: ThemeRegistry);
impl_di!(logo_sets: LogoSetRegistry);
impl_di!(extensions: ExtensionRegistry);
