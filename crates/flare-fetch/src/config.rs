//! On-demand fetch configuration.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::{Args, ValueEnum};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use url::Url;

use crate::{FetchError, Result};

/// Default upstream location of game images.
pub const DEFAULT_BASE_URL: &str = "https://infinity.flashpointarchive.org/Flashpoint/Data/Images/";

/// Default number of fetches allowed in flight at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 6;

/// Default upstream request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of chunks buffered for the cache writer.
pub const DEFAULT_CHUNK_BUFFER: usize = 32;

/// Order in which queued requests are admitted when a slot frees.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, AsRefStr, Display, EnumString, Serialize, Deserialize,
)]
#[cfg_attr(feature = "config", derive(ValueEnum))]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AdmissionOrder {
    /// Newest request first.
    #[default]
    Lifo,
    /// Oldest request first.
    Fifo,
}

/// Configuration of the on-demand fetch queue.
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[cfg_attr(feature = "config", derive(Args))]
#[builder(
    name = "FetchConfigBuilder",
    pattern = "owned",
    setter(into, prefix = "with"),
    build_fn(validate = "Self::validate_config")
)]
pub struct FetchConfig {
    /// Base URL that request keys are appended to.
    #[cfg_attr(
        feature = "config",
        arg(long = "fetch-base-url", env = "FETCH_BASE_URL", default_value = DEFAULT_BASE_URL)
    )]
    #[builder(default = "DEFAULT_BASE_URL.to_owned()")]
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Maximum number of fetches in flight at once.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "fetch-max-concurrent",
            env = "FETCH_MAX_CONCURRENT",
            default_value_t = DEFAULT_MAX_CONCURRENT
        )
    )]
    #[builder(default = "DEFAULT_MAX_CONCURRENT")]
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Upstream request timeout in seconds.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "fetch-timeout-secs",
            env = "FETCH_TIMEOUT_SECS",
            default_value_t = DEFAULT_TIMEOUT_SECS
        )
    )]
    #[builder(default = "DEFAULT_TIMEOUT_SECS")]
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Which queued request is admitted next.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "fetch-admission",
            env = "FETCH_ADMISSION",
            value_enum,
            default_value_t = AdmissionOrder::Lifo
        )
    )]
    #[builder(default)]
    #[serde(default)]
    pub admission: AdmissionOrder,

    /// User-Agent header sent upstream.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "fetch-user-agent",
            env = "FETCH_USER_AGENT",
            default_value_t = default_user_agent()
        )
    )]
    #[builder(default = "default_user_agent()")]
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Chunks buffered for the cache writer before upstream reads wait.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "fetch-chunk-buffer",
            env = "FETCH_CHUNK_BUFFER",
            default_value_t = DEFAULT_CHUNK_BUFFER
        )
    )]
    #[builder(default = "DEFAULT_CHUNK_BUFFER")]
    #[serde(default = "default_chunk_buffer")]
    pub chunk_buffer: usize,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_owned()
}

fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_chunk_buffer() -> usize {
    DEFAULT_CHUNK_BUFFER
}

fn default_user_agent() -> String {
    format!("flare/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            admission: AdmissionOrder::default(),
            user_agent: default_user_agent(),
            chunk_buffer: DEFAULT_CHUNK_BUFFER,
        }
    }
}

impl FetchConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> FetchConfigBuilder {
        FetchConfigBuilder::default()
    }

    /// Returns the upstream request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        check(
            &self.base_url,
            self.max_concurrent,
            self.timeout_secs,
            self.chunk_buffer,
        )
        .map_err(FetchError::InvalidConfig)
    }

    /// Builds the upstream URL of `key` by appending each of its segments,
    /// percent-encoded, to the base URL path.
    pub fn upstream_url(&self, key: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|err| {
            FetchError::InvalidConfig(format!("invalid base url '{}': {err}", self.base_url))
        })?;

        url.path_segments_mut()
            .map_err(|()| {
                FetchError::InvalidConfig(format!("base url '{}' cannot be a base", self.base_url))
            })?
            .pop_if_empty()
            .extend(key.split('/').filter(|segment| !segment.is_empty()));

        Ok(url)
    }
}

impl FetchConfigBuilder {
    fn validate_config(builder: &FetchConfigBuilder) -> std::result::Result<(), String> {
        check(
            builder.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
            builder.max_concurrent.unwrap_or(DEFAULT_MAX_CONCURRENT),
            builder.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            builder.chunk_buffer.unwrap_or(DEFAULT_CHUNK_BUFFER),
        )
    }
}

fn check(
    base_url: &str,
    max_concurrent: usize,
    timeout_secs: u64,
    chunk_buffer: usize,
) -> std::result::Result<(), String> {
    let url = Url::parse(base_url).map_err(|err| format!("invalid base url '{base_url}': {err}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported base url scheme '{}'", url.scheme()));
    }

    if max_concurrent == 0 {
        return Err("max concurrent fetches must be greater than 0".to_owned());
    }

    if timeout_secs == 0 {
        return Err("fetch timeout must be greater than 0".to_owned());
    }

    if chunk_buffer == 0 {
        return Err("chunk buffer must be greater than 0".to_owned());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = FetchConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.max_concurrent, 6);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.admission, AdmissionOrder::Lifo);
    }

    #[test]
    fn builder_rejects_invalid_values() {
        assert!(FetchConfig::builder().with_max_concurrent(0usize).build().is_err());
        assert!(FetchConfig::builder().with_timeout_secs(0u64).build().is_err());
        assert!(FetchConfig::builder().with_base_url("ftp://host/").build().is_err());
        assert!(FetchConfig::builder().with_base_url("not a url").build().is_err());
    }

    #[test]
    fn builder_applies_overrides() {
        let config = FetchConfig::builder()
            .with_base_url("http://localhost:8080/images")
            .with_max_concurrent(2usize)
            .with_admission(AdmissionOrder::Fifo)
            .build()
            .unwrap();

        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.admission, AdmissionOrder::Fifo);
        assert_eq!(config.chunk_buffer, DEFAULT_CHUNK_BUFFER);
    }

    #[test]
    fn upstream_url_inserts_separator() {
        let mut config = FetchConfig {
            base_url: "http://localhost/images".to_owned(),
            ..FetchConfig::default()
        };
        assert_eq!(
            config.upstream_url("ab/cd/file.png").unwrap().as_str(),
            "http://localhost/images/ab/cd/file.png"
        );

        config.base_url = "http://localhost/images/".to_owned();
        assert_eq!(
            config.upstream_url("ab/cd/file.png").unwrap().as_str(),
            "http://localhost/images/ab/cd/file.png"
        );
    }

    #[test]
    fn upstream_url_encodes_key_segments() {
        let config = FetchConfig {
            base_url: "http://localhost/images/".to_owned(),
            ..FetchConfig::default()
        };

        let url = config.upstream_url("ab/cd/a#b?c d.png").unwrap();
        assert_eq!(url.as_str(), "http://localhost/images/ab/cd/a%23b%3Fc%20d.png");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);

        let url = config.upstream_url("/ab/cd/100%.png").unwrap();
        assert_eq!(url.as_str(), "http://localhost/images/ab/cd/100%25.png");
    }

    #[test]
    fn admission_order_parses() {
        assert_eq!("fifo".parse::<AdmissionOrder>().unwrap(), AdmissionOrder::Fifo);
        assert_eq!(AdmissionOrder::Lifo.to_string(), "lifo");
    }
}
