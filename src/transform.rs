//! Post content transformation: legacy image discovery, `src` rewriting and
//! body extraction.
//!
//! Content is parsed as a full HTML document with html5ever, so fragments get
//! the usual implied `html`/`head`/`body` wrappers. Serialization normalizes
//! markup (quoting, implied end tags); it is not byte-for-byte.

use crate::error::{Error, Result};
use crate::sanitize::image_file_name;
use html5ever::parse_document;
use html5ever::serialize::{SerializeOpts, TraversalScope, serialize};
use html5ever::tendril::{StrTendril, TendrilSink};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use std::borrow::Cow;

/// A configured legacy host, as lower-cased DNS labels
///
/// `blogspot.com` matches that host and its subdomains. A trailing `.*`
/// (`blogspot.*`) also accepts any suffix after the fixed labels, which
/// covers country-code hosts such as `x.blogspot.co.uk`.
#[derive(Clone, Debug, PartialEq, Eq)]
struct DomainPattern {
    labels: Vec<String>,
    any_suffix: bool,
}

impl DomainPattern {
    fn parse(domain: &str) -> Option<Self> {
        let domain = domain.trim().trim_start_matches("*.").trim_matches('.').to_ascii_lowercase();
        let (fixed, any_suffix) = match domain.strip_suffix(".*") {
            Some(fixed) => (fixed, true),
            None => (domain.as_str(), false),
        };
        let labels: Vec<String> = fixed.split('.').filter(|l| !l.is_empty()).map(str::to_string).collect();
        (!labels.is_empty()).then_some(Self { labels, any_suffix })
    }

    fn matches(&self, host: &[&str]) -> bool {
        let n = self.labels.len();
        if self.any_suffix {
            // at least one label after the fixed part
            host.windows(n)
                .enumerate()
                .any(|(i, window)| i + n < host.len() && window == self.labels.as_slice())
        } else {
            host.len() >= n && host[host.len() - n..] == *self.labels.as_slice()
        }
    }
}

/// Finds and rewrites images hosted on the legacy domains
#[derive(Clone, Debug)]
pub struct ContentTransformer {
    legacy_domains: Vec<DomainPattern>,
}

impl ContentTransformer {
    /// Create a transformer for images hosted on any of `legacy_domains`
    ///
    /// Each entry matches the host and its subdomains; an entry ending in `.*`
    /// matches any suffix. Blank entries are ignored.
    pub fn new<I, S>(legacy_domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            legacy_domains: legacy_domains
                .into_iter()
                .filter_map(|d| DomainPattern::parse(d.as_ref()))
                .collect(),
        }
    }

    /// Whether `src` points at a legacy domain
    ///
    /// Protocol-relative URLs (`//host/path`) are accepted; relative paths never match.
    pub fn is_legacy_url(&self, src: &str) -> bool {
        let Ok(url) = url::Url::parse(&fetchable_url(src)) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        let labels: Vec<&str> = host.split('.').collect();
        self.legacy_domains.iter().any(|d| d.matches(&labels))
    }

    /// `src` values of legacy-hosted `img` elements, in document order
    pub fn find_migratable_images(&self, html: &str) -> Vec<String> {
        let dom = parse(html);
        let mut found = Vec::new();
        walk(&dom.document, &mut |node: &Handle| {
            if let Some(src) = img_src(node)
                && self.is_legacy_url(&src)
            {
                found.push(src);
            }
        });
        found
    }

    /// Point every legacy-hosted `img` at `base/<sanitized basename>`
    ///
    /// Returns the whole re-serialized document.
    ///
    /// # Errors
    /// Returns [`Error::TransformInvariantViolation`] if any legacy reference
    /// survives the rewrite.
    pub fn rewrite_image_srcs(&self, html: &str, base: &str) -> Result<String> {
        let dom = parse(html);
        let mut rewritten = 0usize;
        walk(&dom.document, &mut |node: &Handle| {
            let NodeData::Element { name, attrs, .. } = &node.data else {
                return;
            };
            if &*name.local != "img" {
                return;
            }
            for attr in attrs.borrow_mut().iter_mut() {
                if &*attr.name.local == "src" && self.is_legacy_url(&attr.value) {
                    let new_src = format!("{}/{}", base, image_file_name(&attr.value));
                    tracing::debug!(old = %attr.value, new = %new_src, "Rewriting image src");
                    attr.value = StrTendril::from_slice(&new_src);
                    rewritten += 1;
                }
            }
        });

        let mut remaining = Vec::new();
        walk(&dom.document, &mut |node: &Handle| {
            if let Some(src) = img_src(node)
                && self.is_legacy_url(&src)
            {
                remaining.push(src);
            }
        });
        if !remaining.is_empty() {
            return Err(Error::TransformInvariantViolation { remaining });
        }

        tracing::trace!(rewritten, "Image sources rewritten");
        serialize_children(&dom.document)
    }
}

/// Inner markup of every `body` element, joined by newlines
///
/// # Errors
/// Returns error if serialization fails.
pub fn extract_body(html: &str) -> Result<String> {
    let dom = parse(html);
    let mut bodies = Vec::new();
    walk(&dom.document, &mut |node: &Handle| {
        if let NodeData::Element { name, .. } = &node.data
            && &*name.local == "body"
        {
            bodies.push(node.clone());
        }
    });
    let parts = bodies
        .iter()
        .map(serialize_children)
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join("\n"))
}

/// Absolute form of an image URL (`//host/x` becomes `http://host/x`)
pub fn fetchable_url(src: &str) -> Cow<'_, str> {
    if src.starts_with("//") {
        Cow::Owned(format!("http:{src}"))
    } else {
        Cow::Borrowed(src)
    }
}

fn parse(html: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default()).one(html)
}

fn walk(node: &Handle, visit: &mut impl FnMut(&Handle)) {
    visit(node);
    for child in node.children.borrow().iter() {
        walk(child, visit);
    }
}

fn img_src(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, attrs, .. } if &*name.local == "img" => attrs
            .borrow()
            .iter()
            .find(|a| &*a.name.local == "src")
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

fn serialize_children(node: &Handle) -> Result<String> {
    let mut out = Vec::new();
    let handle: SerializableHandle = node.clone().into();
    serialize(
        &mut out,
        &handle,
        SerializeOpts {
            traversal_scope: TraversalScope::ChildrenOnly(None),
            ..Default::default()
        },
    )?;
    String::from_utf8(out).map_err(|e| Error::Other(format!("serialized HTML is not UTF-8: {}", e)))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "{{BASE_PATH}}/assets/img/Hello World";

    fn transformer() -> ContentTransformer {
        ContentTransformer::new(["blogspot.com"])
    }

    #[test]
    fn test_legacy_host_matching() {
        let t = transformer();
        assert!(t.is_legacy_url("http://x.blogspot.com/photo.jpg"));
        assert!(t.is_legacy_url("https://1.bp.BLOGSPOT.com/-a/s1600/p.png"));
        assert!(t.is_legacy_url("http://blogspot.com/p.png"));
        assert!(t.is_legacy_url("//2.bp.blogspot.com/p.png"));
        assert!(!t.is_legacy_url("http://notblogspot.com/p.png"));
        assert!(!t.is_legacy_url("http://example.com/blogspot.com/p.png"));
        assert!(!t.is_legacy_url("/assets/img/p.png"));
        assert!(!t.is_legacy_url("{{BASE_PATH}}/assets/img/x/p.png"));
        assert!(!t.is_legacy_url(""));
    }

    #[test]
    fn test_wildcard_suffix_matches_country_code_hosts() {
        let t = ContentTransformer::new(["blogspot.*"]);
        assert!(t.is_legacy_url("http://x.blogspot.com/p.jpg"));
        assert!(t.is_legacy_url("http://x.blogspot.fr/p.jpg"));
        assert!(t.is_legacy_url("http://1.bp.blogspot.co.uk/s1600/p.jpg"));
        assert!(t.is_legacy_url("http://blogspot.de/p.jpg"));
        assert!(!t.is_legacy_url("http://x.notblogspot.fr/p.jpg"));
        assert!(!t.is_legacy_url("http://blogspot/p.jpg"));
        assert!(!t.is_legacy_url("http://example.com/blogspot.fr/p.jpg"));

        // A plain entry stays anchored to its suffix
        let plain = transformer();
        assert!(!plain.is_legacy_url("http://x.blogspot.fr/p.jpg"));
    }

    #[test]
    fn test_several_legacy_domains() {
        let t = ContentTransformer::new(["blogspot.com", " .Photos.Example.org ", ""]);
        assert!(t.is_legacy_url("http://x.blogspot.com/p.jpg"));
        assert!(t.is_legacy_url("https://cdn.photos.example.org/p.jpg"));
        assert!(!t.is_legacy_url("https://example.org/p.jpg"));

        let none = ContentTransformer::new(Vec::<String>::new());
        assert!(!none.is_legacy_url("http://x.blogspot.com/p.jpg"));
    }

    #[test]
    fn test_find_migratable_images_in_order() {
        let html = r#"<p>trip</p>
            <a href="http://x.blogspot.com/big.jpg"><img src="http://x.blogspot.com/one.jpg"></a>
            <img src="https://example.com/other.png">
            <div><img src="http://2.bp.blogspot.com/two.jpg" alt="two"></div>
            <img alt="no source">"#;
        assert_eq!(
            transformer().find_migratable_images(html),
            vec![
                "http://x.blogspot.com/one.jpg".to_string(),
                "http://2.bp.blogspot.com/two.jpg".to_string()
            ]
        );
    }

    #[test]
    fn test_rewrite_points_images_at_local_copies() {
        let html = r#"<p>hi</p><img src="http://x.blogspot.com/photo.jpg"><img src="https://example.com/keep.png">"#;
        let t = transformer();
        let rewritten = t.rewrite_image_srcs(html, BASE).unwrap();
        let body = extract_body(&rewritten).unwrap();
        assert_eq!(
            body,
            r#"<p>hi</p><img src="{{BASE_PATH}}/assets/img/Hello World/photo.jpg"><img src="https://example.com/keep.png">"#
        );
    }

    #[test]
    fn test_rewrite_sanitizes_basename() {
        let html = r#"<img src="http://1.bp.blogspot.com/-x/s1600/No%C3%ABl%20(1).JPG">"#;
        let rewritten = transformer().rewrite_image_srcs(html, BASE).unwrap();
        assert!(rewritten.contains(r#"src="{{BASE_PATH}}/assets/img/Hello World/Noel 1.JPG""#));
    }

    #[test]
    fn test_rewrite_leaves_no_legacy_images() {
        let html = r#"<img src="http://a.blogspot.com/1.jpg"><p><img src="//b.blogspot.com/2.jpg"></p>"#;
        let t = transformer();
        let rewritten = t.rewrite_image_srcs(html, BASE).unwrap();
        assert!(t.find_migratable_images(&rewritten).is_empty());
    }

    #[test]
    fn test_content_without_legacy_images_is_unchanged() {
        let html = r#"<p class="x">Hello <b>world</b></p><img src="https://example.com/a.png">"#;
        let t = transformer();
        assert!(t.find_migratable_images(html).is_empty());
        let rewritten = t.rewrite_image_srcs(html, BASE).unwrap();
        assert_eq!(extract_body(&rewritten).unwrap(), html);
    }

    #[test]
    fn test_extract_body_of_fragment() {
        assert_eq!(extract_body("<p>hi</p>").unwrap(), "<p>hi</p>");
        assert_eq!(extract_body("plain text").unwrap(), "plain text");
        assert_eq!(extract_body("").unwrap(), "");
    }

    #[test]
    fn test_extract_body_of_full_document() {
        let html = "<html><head><title>t</title></head><body><h1>x</h1>\n<p>y</p></body></html>";
        assert_eq!(extract_body(html).unwrap(), "<h1>x</h1>\n<p>y</p>");
    }

    #[test]
    fn test_fetchable_url() {
        assert_eq!(fetchable_url("//h.blogspot.com/a.jpg"), "http://h.blogspot.com/a.jpg");
        assert_eq!(fetchable_url("https://h/a.jpg"), "https://h/a.jpg");
    }
}
