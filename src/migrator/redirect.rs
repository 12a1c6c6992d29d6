//! Client-side redirect appended to posts in the patched feed.

use crate::error::Result;
use chrono::NaiveDate;

/// Where a post lives on the new site: `<base>/YYYY/MM/DD/<slug>`
///
/// The slug is percent-encoded; a trailing `/` on `base` is ignored.
pub fn published_url(base: &str, published: NaiveDate, slug: &str) -> String {
    format!(
        "{}/{}/{}",
        base.trim_end_matches('/'),
        published.format("%Y/%m/%d"),
        urlencoding::encode(slug)
    )
}

/// Script that sends readers of the legacy blog to the new site
///
/// On the legacy origin itself the reader lands on `production_base`;
/// anywhere else (feed readers, mirrors) they go to `post_url`.
///
/// # Errors
///
/// Returns error if a URL cannot be encoded as a JavaScript string.
pub fn redirect_script(legacy_origin: &str, production_base: &str, post_url: &str) -> Result<String> {
    let legacy = js_string(legacy_origin.trim_end_matches('/'))?;
    let home = js_string(production_base)?;
    let post = js_string(post_url)?;
    Ok(format!(
        "<script type=\"text/javascript\">\
         if (window.location.origin === {legacy}) {{ window.location.replace({home}); }} \
         else {{ window.location.replace({post}); }}\
         </script>"
    ))
}

// JSON string literals are valid JavaScript; `</` is split so the value
// cannot close the surrounding script element.
fn js_string(value: &str) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}
