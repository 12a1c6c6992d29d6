//! Migration of a single post entry.

use super::post::MigratedPost;
use super::{IMAGE_BASE_PATH, Migrator, redirect};
use crate::error::{Error, Result};
use crate::feed::{Entry, EntryRef, FeedDocument};
use crate::sanitize::{image_file_name, sanitize};
use crate::transform::{extract_body, fetchable_url};
use crate::utils;
use std::collections::HashMap;
use std::collections::hash_map::Entry as MapEntry;
use std::path::PathBuf;
use tracing::{debug, info, warn};

impl Migrator {
    /// Migrate one entry and return the path of the written post
    ///
    /// Image downloads are submitted and left running; the rewritten body only
    /// needs their target paths. In feed-patch mode the entry's `content` in
    /// `document` gets the redirect script appended.
    pub(super) async fn migrate_entry(
        &self,
        document: &mut FeedDocument,
        entry_ref: EntryRef,
        index: usize,
    ) -> Result<PathBuf> {
        let entry = document.extract_entry(entry_ref, index)?;
        let slug = sanitize(&entry.title, self.config.migration.title_encoding);
        if slug.is_empty() {
            return Err(Error::MalformedEntry {
                index,
                field: "title",
                reason: format!("sanitizes to an empty name: {:?}", entry.title),
            });
        }
        info!(index, title = %entry.title, published = %entry.published, "Migrating post");

        let img_rel_path = format!("{IMAGE_BASE_PATH}{slug}");
        let urls = self.transformer.find_migratable_images(&entry.content_html);
        if !urls.is_empty() {
            let dest_dir = self.config.export_root().join(&img_rel_path);
            utils::create_dir_all(&dest_dir).await?;
            // One fetch per destination file; the first URL for a name wins
            let mut claimed: HashMap<String, String> = HashMap::new();
            for url in &urls {
                let url = fetchable_url(url);
                match claimed.entry(image_file_name(&url)) {
                    MapEntry::Occupied(first) if first.get() == url.as_ref() => {}
                    MapEntry::Occupied(first) => {
                        warn!(
                            index,
                            url = %url,
                            kept = %first.get(),
                            file = %first.key(),
                            "Image file name already taken in this post, not downloading"
                        );
                    }
                    MapEntry::Vacant(slot) => {
                        self.fetcher.submit(&url, &dest_dir);
                        slot.insert(url.into_owned());
                    }
                }
            }
            debug!(count = claimed.len(), dir = %dest_dir.display(), "Image downloads submitted");
        }

        let rewritten = self
            .transformer
            .rewrite_image_srcs(&entry.content_html, &img_rel_path)?;
        let body = extract_body(&rewritten)?;

        let post = MigratedPost::new(self.config.export_root(), &entry, &slug, body);
        let preamble = self.config.migration.post_preamble.as_deref();
        utils::write_file(&post.output_path, post.render(preamble)).await?;
        debug!(path = %post.output_path.display(), "Post written");

        if self.config.migration.enable_feed_patch {
            self.patch_entry(document, &entry, &slug, index)?;
        }

        Ok(post.output_path)
    }

    fn patch_entry(
        &self,
        document: &mut FeedDocument,
        entry: &Entry,
        slug: &str,
        index: usize,
    ) -> Result<()> {
        let migration = &self.config.migration;
        let post_url = redirect::published_url(&migration.production_base_url, entry.published, slug);
        let script = redirect::redirect_script(
            migration.legacy_blog_url.as_deref().unwrap_or_default(),
            &migration.production_base_url,
            &post_url,
        )?;

        let content = document
            .entry_element_mut(entry.node)
            .and_then(|element| element.child_mut("content"))
            .ok_or_else(|| Error::MalformedEntry {
                index,
                field: "content",
                reason: "is missing from the feed document".to_string(),
            })?;
        content.set_text(format!("{}{}", entry.content_html, script));
        debug!(index, url = %post_url, "Redirect appended to feed entry");
        Ok(())
    }
}
