//! blog-migrate CLI entry point
//!
//! Reads a Blogger export, writes the site under the export root and exits
//! non-zero if the run had to stop.

use blog_migrate::{Config, Error, Migrator, Result, TitleEncoding};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Migrate a Blogger export into static site posts
#[derive(Debug, Parser)]
#[command(name = "blog-migrate", version, about)]
struct Args {
    /// Blogger export feed (Atom XML)
    input: PathBuf,

    /// JSON configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root directory of the generated site
    #[arg(long)]
    export_root: Option<PathBuf>,

    /// Base URL the posts are published under
    #[arg(long)]
    production_base_url: Option<String>,

    /// Host of the legacy image server; repeat for several. Subdomains match
    /// too, and a trailing `.*` accepts any suffix (`blogspot.*`)
    #[arg(long = "legacy-domain")]
    legacy_domains: Vec<String>,

    /// Origin of the legacy blog, used by the redirect script
    #[arg(long)]
    legacy_blog_url: Option<String>,

    /// Maximum simultaneous image downloads
    #[arg(long)]
    max_concurrent_downloads: Option<usize>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    request_timeout_ms: Option<u64>,

    /// Write a copy of the feed whose posts redirect to the new site
    #[arg(long)]
    patch_feed: bool,

    /// Where to write the patched feed
    #[arg(long)]
    patched_feed_path: Option<PathBuf>,

    /// Charset of percent-escapes in titles (utf8 or latin1)
    #[arg(long)]
    title_encoding: Option<TitleEncoding>,
}

impl Args {
    /// Load the config file, if any, and apply flag overrides
    fn into_config(self) -> Result<(Config, PathBuf)> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => Config::default(),
        };

        let migration = &mut config.migration;
        if let Some(root) = self.export_root {
            migration.export_root = root;
        }
        if let Some(url) = self.production_base_url {
            migration.production_base_url = url;
        }
        if !self.legacy_domains.is_empty() {
            migration.legacy_domains = self.legacy_domains;
        }
        if let Some(url) = self.legacy_blog_url {
            migration.legacy_blog_url = Some(url);
        }
        if self.patch_feed {
            migration.enable_feed_patch = true;
        }
        if let Some(path) = self.patched_feed_path {
            migration.patched_feed_path = path;
        }
        if let Some(encoding) = self.title_encoding {
            migration.title_encoding = encoding;
        }

        if let Some(max) = self.max_concurrent_downloads {
            config.fetch.max_concurrent_downloads = max;
        }
        if let Some(ms) = self.request_timeout_ms {
            config.fetch.request_timeout = std::time::Duration::from_millis(ms);
        }

        Ok((config, self.input))
    }
}

fn load_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("cannot read {}: {}", path.display(), e),
        key: None,
    })?;
    Ok(serde_json::from_str(&text)?)
}

async fn run(args: Args) -> Result<()> {
    let (config, input_path) = args.into_config()?;
    let migrator = Migrator::new(config)?;

    let input = tokio::fs::read(&input_path).await?;
    info!(input = %input_path.display(), bytes = input.len(), "Read export feed");

    let report = migrator.run(&input).await?;
    for e in report.fetch.errors() {
        warn!(code = e.error_code(), error = %e, "Image not migrated");
    }
    if let Some(path) = &report.patched_feed {
        info!(path = %path.display(), "Patched feed available");
    }
    info!(
        posts = report.posts.len(),
        images = report.fetch.completed.len(),
        failed_images = report.fetch.failed.len(),
        cancelled_images = report.fetch.cancelled.len(),
        "Done"
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Args::parse()).await {
        error!(error = %e, code = e.error_code(), "blog-migrate failed");
        process::exit(1);
    }
}
