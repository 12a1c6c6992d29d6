//! # blog-migrate
//!
//! Migrates a Blogger export (an Atom feed of posts) into a static site:
//! one front-matter post file per entry, local copies of images hosted on the
//! legacy domain, and optionally a copy of the feed whose posts redirect
//! readers to the new site.
//!
//! ## Pipeline
//!
//! For each post entry, in feed order:
//! 1. extract title, date, HTML content and labels ([`feed`])
//! 2. find legacy-hosted images and submit their downloads ([`fetcher`])
//! 3. rewrite image sources to the local copies and keep the body ([`transform`])
//! 4. write `_posts/<date>-<title>.html` ([`migrator`])
//! 5. in feed-patch mode, append a redirect script to the entry
//!
//! Downloads run concurrently in the background and are drained before the run
//! returns. A malformed entry, an incomplete rewrite or a failed write stops the
//! run; a failed download is only reported.
//!
//! ## Quick Start
//!
//! ```no_run
//! use blog_migrate::{Config, Migrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.migration.export_root = "site".into();
//!
//!     let feed = std::fs::read("blog-export.xml")?;
//!     let report = Migrator::new(config)?.run(&feed).await?;
//!
//!     println!("{} posts, {} images", report.posts.len(), report.fetch.completed.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Export feed parsing and entry extraction
pub mod feed;
/// Bounded-concurrency image downloads
pub mod fetcher;
/// Migration pipeline
pub mod migrator;
/// Filename sanitizing
pub mod sanitize;
/// HTML content rewriting
pub mod transform;
/// Fetch task types and events
pub mod types;
/// Filesystem helpers
pub mod utils;

// Re-export commonly used types
pub use config::{Config, FetchConfig, MigrationConfig};
pub use error::{DownloadError, Error, Result};
pub use feed::{Entry, EntryRef, FeedDocument};
pub use fetcher::{Fetcher, HttpTransport, Transport};
pub use migrator::{FrontMatter, MigratedPost, MigrationReport, Migrator};
pub use sanitize::{TitleEncoding, sanitize};
pub use transform::ContentTransformer;
pub use types::{FetchEvent, FetchId, FetchOutcome, FetchReport, FetchStage, FetchTask};

/// Run a complete migration of `input` with an HTTP fetcher
///
/// Shorthand for [`Migrator::new`] followed by [`Migrator::run`].
///
/// # Errors
///
/// Returns the first fatal error of the run (see [`Migrator::run`]).
pub async fn migrate(config: Config, input: &[u8]) -> Result<MigrationReport> {
    Migrator::new(config)?.run(input).await
}
