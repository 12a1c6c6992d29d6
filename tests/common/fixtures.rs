//! Blogger export fixtures

use blog_migrate::feed::{POST_KIND, TAG_SCHEME};

/// One entry of a generated export feed
#[derive(Clone, Debug)]
pub struct PostFixture {
    pub title: Option<String>,
    pub published: String,
    pub content_html: String,
    pub labels: Vec<String>,
}

impl PostFixture {
    pub fn new(title: &str, published: &str, content_html: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            published: published.to_string(),
            content_html: content_html.to_string(),
            labels: Vec::new(),
        }
    }

    pub fn untitled(published: &str, content_html: &str) -> Self {
        Self {
            title: None,
            ..Self::new("", published, content_html)
        }
    }

    pub fn with_labels(mut self, labels: &[&str]) -> Self {
        self.labels = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    /// Render as a Blogger `entry` element
    pub fn to_entry(&self) -> String {
        let title = self
            .title
            .as_ref()
            .map(|t| format!("<title type='text'>{}</title>", escape(t)))
            .unwrap_or_default();
        let labels: String = self
            .labels
            .iter()
            .map(|l| format!("<category scheme='{TAG_SCHEME}' term='{}'/>", escape(l)))
            .collect();
        format!(
            "  <entry>\n\
             \x20   <published>{}</published>\n\
             \x20   <category scheme='http://schemas.google.com/g/2005#kind' term='{POST_KIND}'/>\n\
             \x20   {labels}\n\
             \x20   {title}\n\
             \x20   <content type='html'>{}</content>\n\
             \x20 </entry>\n",
            self.published,
            escape(&self.content_html),
        )
    }
}

/// Settings and comment entries that must never be migrated
pub const NON_POST_ENTRIES: &str = "\
  <entry>
    <category scheme='http://schemas.google.com/g/2005#kind' term='http://schemas.google.com/blogger/2008/kind#settings'/>
    <title type='text'>Settings</title>
    <content type='text'>true</content>
  </entry>
  <entry>
    <category scheme='http://schemas.google.com/g/2005#kind' term='http://schemas.google.com/blogger/2008/kind#comment'/>
    <published>2014-04-12T09:00:00.000+02:00</published>
    <title type='text'>Nice post</title>
    <content type='html'>great</content>
  </entry>
";

/// A complete export feed with the given posts, after the non-post entries
pub fn export_feed(posts: &[PostFixture]) -> Vec<u8> {
    let entries: String = posts.iter().map(PostFixture::to_entry).collect();
    format!(
        "<?xml version='1.0' encoding='UTF-8'?>\n\
         <feed xmlns='http://www.w3.org/2005/Atom' xmlns:thr='http://purl.org/syndication/thread/1.0'>\n\
         \x20 <id>tag:blogger.com,1999:blog-1</id>\n\
         \x20 <title type='text'>Old blog</title>\n\
         {NON_POST_ENTRIES}{entries}</feed>\n"
    )
    .into_bytes()
}

/// Escape text for an XML text node or single-quoted attribute
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&apos;")
}
