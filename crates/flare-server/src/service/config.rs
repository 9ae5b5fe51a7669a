//! Service configuration.

use std::path::PathBuf;

#[cfg(feature = "config")]
use clap::Args;
use flare_fetch::FetchConfig;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default values for configuration options.
mod defaults {
    use std::path::PathBuf;

    pub const FLASHPOINT_PATH: &str = ".";
    pub const IMAGE_FOLDER: &str = "Data/Images";
    pub const LOGO_FOLDER: &str = "Data/Logos";
    pub const JSON_FOLDER: &str = "Data";
    pub const CURATIONS_FOLDER: &str = "Curations/Working";
    pub const LOGO_FALLBACK_FOLDER: &str = "build/window/images/Logos";
    pub const NOTIFY_CAPACITY: usize = 256;

    pub fn flashpoint_path() -> PathBuf {
        FLASHPOINT_PATH.into()
    }

    pub fn image_folder() -> PathBuf {
        IMAGE_FOLDER.into()
    }

    pub fn logo_folder() -> PathBuf {
        LOGO_FOLDER.into()
    }

    pub fn json_folder() -> PathBuf {
        JSON_FOLDER.into()
    }

    pub fn curations_folder() -> PathBuf {
        CURATIONS_FOLDER.into()
    }

    pub fn logo_fallback_folder() -> PathBuf {
        LOGO_FALLBACK_FOLDER.into()
    }

    pub fn notify_capacity() -> usize {
        NOTIFY_CAPACITY
    }
}

/// File name served when a logo and its bundled replacement are both missing.
pub const FALLBACK_LOGO: &str = "404.png";

/// Configuration of the [`ServiceState`](crate::service::ServiceState).
///
/// Relative folders are resolved against `flashpoint_path`, except the logo
/// fallback folder which points into the launcher's own resources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct ServiceConfig {
    /// Root of the Flashpoint installation.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "FLASHPOINT_PATH", default_value = defaults::FLASHPOINT_PATH)
    )]
    #[serde(default = "defaults::flashpoint_path")]
    pub flashpoint_path: PathBuf,

    /// Image folder, relative to the Flashpoint root.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "IMAGE_FOLDER", default_value = defaults::IMAGE_FOLDER)
    )]
    #[serde(default = "defaults::image_folder")]
    pub image_folder: PathBuf,

    /// Platform logo folder, relative to the Flashpoint root.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "LOGO_FOLDER", default_value = defaults::LOGO_FOLDER)
    )]
    #[serde(default = "defaults::logo_folder")]
    pub logo_folder: PathBuf,

    /// Folder holding `credits.json`, relative to the Flashpoint root.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "JSON_FOLDER", default_value = defaults::JSON_FOLDER)
    )]
    #[serde(default = "defaults::json_folder")]
    pub json_folder: PathBuf,

    /// Working folder of curations, relative to the Flashpoint root.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "CURATIONS_FOLDER", default_value = defaults::CURATIONS_FOLDER)
    )]
    #[serde(default = "defaults::curations_folder")]
    pub curations_folder: PathBuf,

    /// Folder of bundled replacement logos, including `404.png`.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "LOGO_FALLBACK_FOLDER", default_value = defaults::LOGO_FALLBACK_FOLDER)
    )]
    #[serde(default = "defaults::logo_fallback_folder")]
    pub logo_fallback_folder: PathBuf,

    /// Fetch missing images from the upstream origin.
    #[cfg_attr(feature = "config", arg(long, env = "ON_DEMAND_IMAGES"))]
    #[serde(default)]
    pub on_demand_images: bool,

    /// Events buffered per change observer before it starts skipping.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "NOTIFY_CAPACITY", default_value_t = defaults::NOTIFY_CAPACITY)
    )]
    #[serde(default = "defaults::notify_capacity")]
    pub notify_capacity: usize,

    /// On-demand fetch configuration.
    #[cfg_attr(feature = "config", command(flatten))]
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            flashpoint_path: defaults::flashpoint_path(),
            image_folder: defaults::image_folder(),
            logo_folder: defaults::logo_folder(),
            json_folder: defaults::json_folder(),
            curations_folder: defaults::curations_folder(),
            logo_fallback_folder: defaults::logo_fallback_folder(),
            on_demand_images: false,
            notify_capacity: defaults::NOTIFY_CAPACITY,
            fetch: FetchConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Creates a configuration rooted at `flashpoint_path` with default folders.
    pub fn new(flashpoint_path: impl Into<PathBuf>) -> Self {
        Self {
            flashpoint_path: flashpoint_path.into(),
            ..Self::default()
        }
    }

    /// Enables or disables on-demand image fetching.
    pub fn with_on_demand_images(mut self, enabled: bool) -> Self {
        self.on_demand_images = enabled;
        self
    }

    /// Replaces the fetch configuration.
    pub fn with_fetch(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    /// Replaces the logo fallback folder.
    pub fn with_logo_fallback_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.logo_fallback_folder = folder.into();
        self
    }

    /// Returns the absolute image root.
    #[must_use]
    pub fn image_root(&self) -> PathBuf {
        self.flashpoint_path.join(&self.image_folder)
    }

    /// Returns the absolute platform logo root.
    #[must_use]
    pub fn logo_root(&self) -> PathBuf {
        self.flashpoint_path.join(&self.logo_folder)
    }

    /// Returns the folder holding `credits.json`.
    #[must_use]
    pub fn json_root(&self) -> PathBuf {
        self.flashpoint_path.join(&self.json_folder)
    }

    /// Returns the absolute curations working folder.
    #[must_use]
    pub fn curations_root(&self) -> PathBuf {
        self.flashpoint_path.join(&self.curations_folder)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.notify_capacity == 0 {
            return Err(Error::config("notify capacity must be greater than 0"));
        }

        if self.on_demand_images {
            self.fetch.validate()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folders_resolve_against_flashpoint_path() {
        let config = ServiceConfig::new("/fp");

        assert_eq!(config.image_root(), PathBuf::from("/fp/Data/Images"));
        assert_eq!(config.logo_root(), PathBuf::from("/fp/Data/Logos"));
        assert_eq!(config.json_root(), PathBuf::from("/fp/Data"));
        assert_eq!(config.curations_root(), PathBuf::from("/fp/Curations/Working"));
    }

    #[test]
    fn validation_checks_fetch_only_when_enabled() {
        let broken_fetch = FetchConfig {
            max_concurrent: 0,
            ..FetchConfig::default()
        };

        let config = ServiceConfig::default().with_fetch(broken_fetch);
        assert!(config.validate().is_ok());
        assert!(config.with_on_demand_images(true).validate().is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{"flashpoint_path":"/fp","on_demand_images":true}"#).unwrap();

        assert!(config.on_demand_images);
        assert_eq!(config.image_folder, PathBuf::from("Data/Images"));
        assert_eq!(config.fetch.max_concurrent, 6);
    }
}
