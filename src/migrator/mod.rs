//! Migration pipeline: feed in, posts and images out.
//!
//! Entries are processed strictly one after another: each one mutates the
//! shared [`FeedDocument`] when feed patching is on. Image downloads are the
//! only concurrent work, and [`Migrator::run`] drains them before returning,
//! whether the run succeeded or not.
//!
//! Submodules:
//! - `entry` - per-entry extraction, rewrite and write
//! - [`post`] - generated post files
//! - [`redirect`] - redirect script for the patched feed

mod entry;
pub mod post;
pub mod redirect;

pub use post::{FrontMatter, MigratedPost};

use crate::config::Config;
use crate::error::Result;
use crate::feed::FeedDocument;
use crate::fetcher::Fetcher;
use crate::transform::ContentTransformer;
use crate::types::FetchReport;
use crate::utils;
use std::path::PathBuf;
use tracing::{error, info};

/// Site-relative directory holding each post's images, followed by the sanitized title
pub const IMAGE_BASE_PATH: &str = "{{BASE_PATH}}/assets/img/";

/// What a migration run produced
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MigrationReport {
    /// Written post files, in feed order
    pub posts: Vec<PathBuf>,
    /// Location of the patched feed, when feed patching is enabled
    pub patched_feed: Option<PathBuf>,
    /// Terminal outcome of every image download
    pub fetch: FetchReport,
}

/// Runs one migration over a feed
pub struct Migrator {
    config: Config,
    transformer: ContentTransformer,
    fetcher: Fetcher,
}

impl Migrator {
    /// Create a migrator downloading over HTTP
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let fetcher = Fetcher::new(&config.fetch)?;
        Self::with_fetcher(config, fetcher)
    }

    /// Create a migrator around an existing fetcher
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the configuration is invalid.
    pub fn with_fetcher(config: Config, fetcher: Fetcher) -> Result<Self> {
        config.validate()?;
        let transformer = ContentTransformer::new(&config.migration.legacy_domains);
        Ok(Self {
            config,
            transformer,
            fetcher,
        })
    }

    /// The active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The fetcher downloads are submitted to (e.g. to subscribe to its events)
    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Migrate every post entry of the feed in `input`
    ///
    /// Stops at the first fatal error; files written for earlier entries stay
    /// in place and the patched feed is not written. Outstanding downloads are
    /// drained in both cases.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error: malformed XML or entry, a rewrite that
    /// left legacy images behind, or a failed write. Failed downloads are only
    /// reported in [`MigrationReport::fetch`].
    pub async fn run(self, input: &[u8]) -> Result<MigrationReport> {
        let result = self.migrate_document(input).await;
        let fetch = self.fetcher.close().await;

        match result {
            Ok((posts, patched_feed)) => {
                info!(
                    posts = posts.len(),
                    images = fetch.completed.len(),
                    failed_images = fetch.failed.len(),
                    "Migration finished"
                );
                Ok(MigrationReport {
                    posts,
                    patched_feed,
                    fetch,
                })
            }
            Err(e) => {
                error!(error = %e, code = e.error_code(), "Migration aborted");
                Err(e)
            }
        }
    }

    async fn migrate_document(&self, input: &[u8]) -> Result<(Vec<PathBuf>, Option<PathBuf>)> {
        let mut document = FeedDocument::parse(input)?;
        let entries = document.post_entries();
        info!(entries = entries.len(), export_root = %self.config.export_root().display(), "Migrating feed");

        let mut posts = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            posts.push(self.migrate_entry(&mut document, entry, index).await?);
        }

        if !self.config.migration.enable_feed_patch {
            return Ok((posts, None));
        }
        let path = self.config.migration.patched_feed_path.clone();
        utils::write_file(&path, document.to_xml()?).await?;
        info!(path = %path.display(), "Patched feed written");
        Ok((posts, Some(path)))
    }
}
