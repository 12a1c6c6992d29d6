//! Generated post files: front matter plus extracted body.

use crate::feed::Entry;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Metadata header of a generated post
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrontMatter {
    /// Site layout used to render the post (always "post")
    pub layout: String,
    /// Post title as written in the feed
    pub title: String,
    /// Lower-cased labels, rendered sorted
    pub tags: BTreeSet<String>,
}

impl FrontMatter {
    /// Render the `---` delimited block, including the trailing newline
    ///
    /// Colons in the title become `&#58;` so the value cannot be read as a
    /// nested mapping. Line breaks are flattened to spaces.
    pub fn render(&self) -> String {
        let title = self
            .title
            .replace(':', "&#58;")
            .replace(['\r', '\n'], " ");
        let tags = self
            .tags
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "---\nlayout: {}\ntitle: {}\ntags: [{}]\n---\n",
            self.layout, title, tags
        )
    }
}

/// One output post, built once per entry and written once
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigratedPost {
    /// `<export_root>/_posts/<date>-<sanitized title>.html`
    pub output_path: PathBuf,
    /// Header block
    pub front_matter: FrontMatter,
    /// Extracted body markup
    pub body: String,
}

impl MigratedPost {
    /// Build the post for `entry`, whose sanitized title is `slug`
    pub fn new(export_root: &Path, entry: &Entry, slug: &str, body: String) -> Self {
        let file_name = format!("{}-{}.html", entry.published.format("%Y-%m-%d"), slug);
        Self {
            output_path: export_root.join("_posts").join(file_name),
            front_matter: FrontMatter {
                layout: "post".to_string(),
                title: entry.title.clone(),
                tags: entry.tags.clone(),
            },
            body,
        }
    }

    /// File contents: front matter, optional preamble line, body
    pub fn render(&self, preamble: Option<&str>) -> String {
        let mut out = self.front_matter.render();
        if let Some(preamble) = preamble {
            out.push_str(preamble);
            out.push('\n');
        }
        out.push_str(&self.body);
        out.push('\n');
        out
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::EntryRef;
    use chrono::NaiveDate;

    fn entry(title: &str, tags: &[&str]) -> Entry {
        Entry {
            node: EntryRef(0),
            title: title.to_string(),
            published: NaiveDate::from_ymd_opt(2014, 4, 11).unwrap(),
            content_html: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_output_path() {
        let post = MigratedPost::new(
            Path::new("site"),
            &entry("Hello: World", &[]),
            "Hello World",
            String::new(),
        );
        assert_eq!(
            post.output_path,
            PathBuf::from("site/_posts/2014-04-11-Hello World.html")
        );
    }

    #[test]
    fn test_render_front_matter_and_body() {
        let post = MigratedPost::new(
            Path::new("site"),
            &entry("Hello: World", &["travel", "food"]),
            "Hello World",
            "<p>hi</p>".to_string(),
        );
        assert_eq!(
            post.render(None),
            "---\nlayout: post\ntitle: Hello&#58; World\ntags: [food, travel]\n---\n<p>hi</p>\n"
        );
    }

    #[test]
    fn test_render_with_preamble_and_no_tags() {
        let post = MigratedPost::new(
            Path::new("site"),
            &entry("Plain", &[]),
            "Plain",
            "body".to_string(),
        );
        let rendered = post.render(Some("{% include JB/setup %}"));
        assert!(rendered.contains("tags: []\n---\n{% include JB/setup %}\nbody\n"));
    }

    #[test]
    fn test_multiline_title_stays_on_one_line() {
        let fm = FrontMatter {
            layout: "post".into(),
            title: "Two\nlines".into(),
            tags: BTreeSet::new(),
        };
        assert!(fm.render().contains("title: Two lines\n"));
    }
}
