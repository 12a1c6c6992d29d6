//! Blogger export feed handling.
//!
//! - [`document`] - owned XML tree, parsed and written with quick-xml
//! - [`extract`] - post entry selection and field extraction
//!
//! Lookups are structural (by local name and attribute), not a schema parse:
//! unknown elements are carried along untouched.

pub mod document;
pub mod extract;

pub use document::{FeedDocument, XmlElement, XmlNode};
pub use extract::{Entry, EntryRef, POST_KIND, TAG_SCHEME};
