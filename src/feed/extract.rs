//! Post entry selection and field extraction.

use super::document::{FeedDocument, XmlElement, XmlNode};
use crate::error::{Error, Result};
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// `term` of the category marking an entry as a post (not a comment, setting, ...)
pub const POST_KIND: &str = "http://schemas.google.com/blogger/2008/kind#post";

/// `scheme` of the categories that carry post labels
pub const TAG_SCHEME: &str = "http://www.blogger.com/atom/ns#";

/// Position of an entry element among the root element's children
///
/// A lightweight view into the owning [`FeedDocument`]; it stays valid as long
/// as no children are inserted or removed from the root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntryRef(pub(crate) usize);

/// One post extracted from the feed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    /// Where the entry lives in the document
    pub node: EntryRef,
    /// Post title
    pub title: String,
    /// Publication day (time of day and zone are ignored)
    pub published: NaiveDate,
    /// Raw HTML body
    pub content_html: String,
    /// Lower-cased labels
    pub tags: BTreeSet<String>,
}

impl FeedDocument {
    /// Post entries in document order
    ///
    /// An entry qualifies when it is a direct child of the `feed` root element
    /// and has a `category` child whose `term` is [`POST_KIND`]. Returns nothing
    /// if the root is not a `feed`.
    pub fn post_entries(&self) -> Vec<EntryRef> {
        if self.root.local_name() != "feed" {
            return Vec::new();
        }
        self.root
            .children
            .iter()
            .enumerate()
            .filter_map(|(i, node)| match node {
                XmlNode::Element(e) if is_post_entry(e) => Some(EntryRef(i)),
                _ => None,
            })
            .collect()
    }

    /// The entry element behind `entry`
    pub fn entry_element(&self, entry: EntryRef) -> Option<&XmlElement> {
        match self.root.children.get(entry.0) {
            Some(XmlNode::Element(e)) => Some(e),
            _ => None,
        }
    }

    /// Mutable access to the entry element behind `entry`
    pub fn entry_element_mut(&mut self, entry: EntryRef) -> Option<&mut XmlElement> {
        match self.root.children.get_mut(entry.0) {
            Some(XmlNode::Element(e)) => Some(e),
            _ => None,
        }
    }

    /// Extract the fields of one post entry
    ///
    /// `index` is only used to identify the entry in errors.
    ///
    /// # Errors
    /// Returns [`Error::MalformedEntry`] when `title`, `published` or `content`
    /// is missing, or the published date is not `YYYY-MM-DD...`.
    pub fn extract_entry(&self, entry: EntryRef, index: usize) -> Result<Entry> {
        let malformed = |field: &'static str, reason: &str| Error::MalformedEntry {
            index,
            field,
            reason: reason.to_string(),
        };

        let element = self
            .entry_element(entry)
            .ok_or_else(|| malformed("entry", "does not reference an element"))?;

        let title = element
            .child("title")
            .ok_or_else(|| malformed("title", "is missing"))?
            .text();

        let published_raw = element
            .child("published")
            .ok_or_else(|| malformed("published", "is missing"))?
            .text();
        let published = published_raw
            .trim()
            .get(..10)
            .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
            .ok_or_else(|| {
                malformed(
                    "published",
                    &format!("is not an ISO-8601 date: {published_raw:?}"),
                )
            })?;

        let content_html = element
            .child("content")
            .ok_or_else(|| malformed("content", "is missing"))?
            .text();

        let tags = element
            .elements_named("category")
            .filter(|c| c.attr("scheme") == Some(TAG_SCHEME))
            .filter_map(|c| c.attr("term"))
            .map(str::to_lowercase)
            .collect();

        Ok(Entry {
            node: entry,
            title,
            published,
            content_html,
            tags,
        })
    }
}

fn is_post_entry(element: &XmlElement) -> bool {
    element.local_name() == "entry"
        && element
            .elements_named("category")
            .any(|c| c.attr("term") == Some(POST_KIND))
}
