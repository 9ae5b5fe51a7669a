//! Resource classes served by the asset file server.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// The first path segment of an asset request, selecting its handler.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
pub enum ResourceClass {
    /// Game logos and screenshots, fetched on demand when missing.
    #[strum(serialize = "images")]
    #[serde(rename = "images")]
    Images,
    /// Platform logos with logo-set overrides and fallbacks.
    #[strum(serialize = "logos")]
    #[serde(rename = "logos")]
    Logos,
    /// Files of registered themes.
    #[strum(serialize = "themes")]
    #[serde(rename = "themes")]
    Themes,
    /// Icons of registered extensions.
    #[strum(serialize = "exticons")]
    #[serde(rename = "exticons")]
    ExtIcons,
    /// Static data shipped with extensions.
    #[strum(serialize = "extdata")]
    #[serde(rename = "extdata")]
    ExtData,
    /// Files inside curation working folders.
    #[strum(serialize = "curations")]
    #[serde(rename = "curations")]
    Curations,
    /// The credits file.
    #[strum(serialize = "credits.json")]
    #[serde(rename = "credits.json")]
    Credits,
}

impl ResourceClass {
    /// Returns the path prefix this class is mounted under.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        self.into()
    }

    /// Splits a request path into its resource class and the remaining path.
    ///
    /// Returns `None` when the first segment names no known class.
    #[must_use]
    pub fn from_path(path: &str) -> Option<(Self, &str)> {
        let path = path.trim_start_matches('/');
        let (head, rest) = path.split_once('/').unwrap_or((path, ""));

        Self::iter()
            .find(|class| class.prefix() == head)
            .map(|class| (class, rest))
    }
}
