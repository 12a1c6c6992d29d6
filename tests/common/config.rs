//! Test configuration helpers

use blog_migrate::Config;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Host wiremock listens on; images served from it count as legacy-hosted
pub const MOCK_LEGACY_DOMAIN: &str = "127.0.0.1";

/// Config writing into `root`, with images from the mock server treated as legacy
pub fn test_config(root: &TempDir) -> Config {
    let mut config = Config::default();
    config.migration.export_root = root.path().join("export");
    config.migration.legacy_domains = vec![MOCK_LEGACY_DOMAIN.to_string()];
    config.migration.patched_feed_path = root.path().join("patched").join("feed.xml");
    config.fetch.request_timeout = Duration::from_millis(2000);
    config
}

/// [`test_config`] with feed patching switched on
pub fn patching_config(root: &TempDir) -> Config {
    let mut config = test_config(root);
    config.migration.enable_feed_patch = true;
    config.migration.production_base_url = "https://blog.example.com".to_string();
    config.migration.legacy_blog_url = Some("http://old.blogspot.com".to_string());
    config
}

pub fn posts_dir(config: &Config) -> PathBuf {
    config.export_root().join("_posts")
}

pub fn image_dir(config: &Config, sanitized_title: &str) -> PathBuf {
    config
        .export_root()
        .join("{{BASE_PATH}}/assets/img")
        .join(sanitized_title)
}

/// Sorted file names in `dir`; empty if it does not exist
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
