//! Configuration types for blog-migrate

use crate::error::{Error, Result};
use crate::sanitize::TitleEncoding;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Migration behavior configuration (output locations, legacy host, feed patching)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Root directory of the generated site (default: "./export")
    #[serde(default = "default_export_root")]
    pub export_root: PathBuf,

    /// Base URL the migrated posts are published under (e.g. "https://blog.example.com")
    #[serde(default)]
    pub production_base_url: String,

    /// Hosts of the legacy image servers (default: `["blogspot.*"]`)
    ///
    /// Subdomains of each entry match too. An entry ending in `.*` accepts any
    /// suffix, so `blogspot.*` covers `x.blogspot.com` and `x.blogspot.co.uk`.
    #[serde(default = "default_legacy_domains")]
    pub legacy_domains: Vec<String>,

    /// Origin of the legacy blog, compared against `window.location.origin` by the
    /// redirect script (e.g. "http://myblog.blogspot.com")
    #[serde(default)]
    pub legacy_blog_url: Option<String>,

    /// Append a redirect script to every post in a copy of the feed (default: false)
    #[serde(default)]
    pub enable_feed_patch: bool,

    /// Where the patched copy of the feed is written (default: system temp dir)
    #[serde(default = "default_patched_feed_path")]
    pub patched_feed_path: PathBuf,

    /// Charset used to decode percent-escapes in titles (default: utf8)
    #[serde(default)]
    pub title_encoding: TitleEncoding,

    /// Line inserted between front matter and body, e.g. "{% include JB/setup %}"
    #[serde(default)]
    pub post_preamble: Option<String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            export_root: default_export_root(),
            production_base_url: String::new(),
            legacy_domains: default_legacy_domains(),
            legacy_blog_url: None,
            enable_feed_patch: false,
            patched_feed_path: default_patched_feed_path(),
            title_encoding: TitleEncoding::default(),
            post_preamble: None,
        }
    }
}

/// Image fetching configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum simultaneous in-flight image requests (default: 10)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Connect and request timeout, in milliseconds when serialized (default: 3000)
    #[serde(
        default = "default_request_timeout",
        rename = "request_timeout_ms",
        with = "duration_ms_serde"
    )]
    pub request_timeout: Duration,

    /// User-Agent header sent with image requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: default_max_concurrent(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Main configuration for a migration run
///
/// Sub-config fields are flattened, so the JSON format has no nesting:
///
/// ```json
/// {
///   "export_root": "site",
///   "production_base_url": "https://blog.example.com",
///   "max_concurrent_downloads": 4,
///   "request_timeout_ms": 5000
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Output locations, legacy host and feed patching
    #[serde(flatten)]
    pub migration: MigrationConfig,

    /// Image fetching
    #[serde(flatten)]
    pub fetch: FetchConfig,
}

impl Config {
    /// Root directory of the generated site
    pub fn export_root(&self) -> &PathBuf {
        &self.migration.export_root
    }

    /// Check settings that would otherwise fail halfway through a run
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if self.migration.export_root.as_os_str().is_empty() {
            return Err(Error::config("export_root", "must not be empty"));
        }
        if self.migration.legacy_domains.is_empty() {
            return Err(Error::config("legacy_domains", "must name at least one host"));
        }
        if self
            .migration
            .legacy_domains
            .iter()
            .any(|d| d.trim().trim_matches(['.', '*']).is_empty())
        {
            return Err(Error::config("legacy_domains", "must not contain blank entries"));
        }
        if self.fetch.max_concurrent_downloads == 0 {
            return Err(Error::config(
                "max_concurrent_downloads",
                "must be at least 1",
            ));
        }
        if self.fetch.request_timeout.is_zero() {
            return Err(Error::config("request_timeout_ms", "must be positive"));
        }
        if self.migration.enable_feed_patch {
            if self.migration.production_base_url.trim().is_empty() {
                return Err(Error::config(
                    "production_base_url",
                    "is required when feed patching is enabled",
                ));
            }
            if self
                .migration
                .legacy_blog_url
                .as_deref()
                .is_none_or(|u| u.trim().is_empty())
            {
                return Err(Error::config(
                    "legacy_blog_url",
                    "is required when feed patching is enabled",
                ));
            }
        }
        Ok(())
    }
}

fn default_export_root() -> PathBuf {
    PathBuf::from("export")
}

fn default_legacy_domains() -> Vec<String> {
    vec!["blogspot.*".to_string()]
}

fn default_patched_feed_path() -> PathBuf {
    std::env::temp_dir().join("blog-migrate-patched-feed.xml")
}

fn default_max_concurrent() -> usize {
    10
}

fn default_request_timeout() -> Duration {
    Duration::from_millis(3000)
}

fn default_user_agent() -> String {
    concat!("blog-migrate/", env!("CARGO_PKG_VERSION")).to_string()
}

mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
