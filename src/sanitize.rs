//! Filename sanitizing for post titles and image basenames
//!
//! Sanitized names double as durable cross-references: the same string names the
//! post file, the image directory, the rewritten `img` `src` and the published
//! URL. [`sanitize`] is therefore a pure function of its input and encoding.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Characters replaced with an underscore
const QUOTES: &[char] = &['\'', '"', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}'];

/// Characters dropped entirely
///
/// `%` is dropped after decoding so a decoded `%25` cannot form a new escape
/// on a second pass.
const REMOVED: &[char] = &[',', '!', ':', '?', '(', ')', '/', '%'];

/// Charset used to interpret percent-escaped bytes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleEncoding {
    /// Escapes are UTF-8 byte sequences; invalid sequences become U+FFFD
    #[default]
    Utf8,
    /// Every escaped byte is one ISO-8859-1 character
    Latin1,
}

impl TitleEncoding {
    fn decode(self, bytes: &[u8]) -> Cow<'_, str> {
        match self {
            TitleEncoding::Utf8 => String::from_utf8_lossy(bytes),
            TitleEncoding::Latin1 => Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }
}

impl std::fmt::Display for TitleEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TitleEncoding::Utf8 => write!(f, "utf8"),
            TitleEncoding::Latin1 => write!(f, "latin1"),
        }
    }
}

impl std::str::FromStr for TitleEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "utf8" => Ok(TitleEncoding::Utf8),
            "latin1" | "iso88591" => Ok(TitleEncoding::Latin1),
            other => Err(format!("unknown title encoding: {other}")),
        }
    }
}

/// Normalize an arbitrary string into a safe filesystem and URL path segment
///
/// In order:
/// 1. percent-escaped byte runs are decoded with `encoding`
/// 2. accents are stripped (NFD, combining marks dropped, recomposed)
/// 3. quotes and apostrophes become `_`; `, ! : ? ( ) / %` are removed
///
/// An empty result is returned as-is; callers decide whether that is an error.
///
/// # Examples
///
/// ```
/// use blog_migrate::sanitize::{sanitize, TitleEncoding};
///
/// assert_eq!(sanitize("Hello: World", TitleEncoding::Utf8), "Hello World");
/// assert_eq!(sanitize("Caf%C3%A9 d'été", TitleEncoding::Utf8), "Cafe d_ete");
/// ```
#[must_use]
pub fn sanitize(raw: &str, encoding: TitleEncoding) -> String {
    strip_accents(&percent_decode(raw, encoding))
        .chars()
        .filter(|c| !REMOVED.contains(c))
        .map(|c| if QUOTES.contains(&c) { '_' } else { c })
        .collect()
}

/// File name an image URL is stored under: the sanitized last path segment
///
/// Always decoded as UTF-8, so the fetcher and the `src` rewrite agree on the
/// name regardless of the title encoding. Query strings and fragments are
/// ignored. Falls back to `"image"` when the URL has no usable last segment.
#[must_use]
pub fn image_file_name(url: &str) -> String {
    let name = sanitize(url_basename(url), TitleEncoding::Utf8);
    if name.is_empty() {
        "image".to_string()
    } else {
        name
    }
}

/// Last path segment of a URL, still percent-encoded
pub fn url_basename(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

/// Decode maximal runs of `%XX` escapes together so multi-byte sequences survive
fn percent_decode(raw: &str, encoding: TitleEncoding) -> Cow<'_, str> {
    if !raw.contains('%') {
        return Cow::Borrowed(raw);
    }

    let bytes = raw.as_bytes();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < bytes.len() {
        let run_start = i;
        while is_escape(bytes, i) {
            i += 3;
        }
        if i > run_start {
            let decoded = urlencoding::decode_binary(&bytes[run_start..i]);
            out.push_str(&encoding.decode(&decoded));
            continue;
        }
        // Not an escape: copy one whole character
        let ch_len = raw[i..].chars().next().map_or(1, char::len_utf8);
        out.push_str(&raw[i..i + ch_len]);
        i += ch_len;
    }
    Cow::Owned(out)
}

fn is_escape(bytes: &[u8], i: usize) -> bool {
    bytes.get(i) == Some(&b'%')
        && bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
        && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit)
}

fn strip_accents(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).nfc().collect()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_unsafe_punctuation() {
        assert_eq!(sanitize("Hello: World", TitleEncoding::Utf8), "Hello World");
        assert_eq!(
            sanitize("What?! (really), a/b", TitleEncoding::Utf8),
            "What really ab"
        );
    }

    #[test]
    fn test_quotes_become_underscores() {
        assert_eq!(sanitize("l'été", TitleEncoding::Utf8), "l_ete");
        assert_eq!(sanitize("say \"hi\"", TitleEncoding::Utf8), "say _hi_");
        assert_eq!(sanitize("it\u{2019}s", TitleEncoding::Utf8), "it_s");
    }

    #[test]
    fn test_strips_accents() {
        assert_eq!(
            sanitize("Crème brûlée à Noël", TitleEncoding::Utf8),
            "Creme brulee a Noel"
        );
        assert_eq!(sanitize("Ångström", TitleEncoding::Utf8), "Angstrom");
    }

    #[test]
    fn test_non_latin_text_is_kept() {
        assert_eq!(sanitize("東京", TitleEncoding::Utf8), "東京");
        assert_eq!(sanitize("한국어", TitleEncoding::Utf8), "한국어");
    }

    #[test]
    fn test_percent_decoding_utf8() {
        assert_eq!(sanitize("caf%C3%A9.jpg", TitleEncoding::Utf8), "cafe.jpg");
        assert_eq!(sanitize("a%20b", TitleEncoding::Utf8), "a b");
        // The typographic apostrophe arrives encoded in image names
        assert_eq!(sanitize("it%E2%80%99s.png", TitleEncoding::Utf8), "it_s.png");
    }

    #[test]
    fn test_percent_decoding_latin1() {
        assert_eq!(sanitize("caf%E9.jpg", TitleEncoding::Latin1), "cafe.jpg");
        // Literal characters are not reinterpreted, only escapes are
        assert_eq!(sanitize("café%20x", TitleEncoding::Latin1), "cafe x");
    }

    #[test]
    fn test_stray_percent_signs_are_dropped() {
        assert_eq!(sanitize("100%", TitleEncoding::Utf8), "100");
        assert_eq!(sanitize("50%zz", TitleEncoding::Utf8), "50zz");
        assert_eq!(sanitize("%4", TitleEncoding::Utf8), "4");
    }

    #[test]
    fn test_decoded_percent_does_not_form_a_new_escape() {
        assert_eq!(sanitize("%2541", TitleEncoding::Utf8), "41");
        assert_eq!(sanitize("100%25 sure", TitleEncoding::Utf8), "100 sure");
        assert_eq!(sanitize("%2541", TitleEncoding::Latin1), "41");
    }

    #[test]
    fn test_idempotent_on_sanitized_input() {
        let samples = [
            "Hello: World",
            "Crème brûlée: l'histoire (vraie)!",
            "photo%20de%20No%C3%ABl.JPG",
            "Why? Because, /that/ is \"it\"",
            "plain",
            "%2541",
            "100%25 sure",
            "%25%32%35",
            "",
        ];
        for raw in samples {
            for encoding in [TitleEncoding::Utf8, TitleEncoding::Latin1] {
                let once = sanitize(raw, encoding);
                assert_eq!(sanitize(&once, encoding), once, "input {raw:?}");
            }
        }
    }

    #[test]
    fn test_can_sanitize_to_empty() {
        assert_eq!(sanitize("?!:()", TitleEncoding::Utf8), "");
    }

    #[test]
    fn test_image_file_name() {
        assert_eq!(
            image_file_name("http://x.blogspot.com/photo.jpg"),
            "photo.jpg"
        );
        assert_eq!(
            image_file_name("https://1.bp.blogspot.com/-abc/s1600/Mont%20Blanc%C3%A9.JPG?imgmax=800"),
            "Mont Blance.JPG"
        );
        assert_eq!(
            image_file_name("http://x.blogspot.com/"),
            "image"
        );
    }

    #[test]
    fn test_url_basename() {
        assert_eq!(url_basename("http://h/a/b/c.png"), "c.png");
        assert_eq!(url_basename("http://h/a/b/c.png#frag"), "c.png");
        assert_eq!(url_basename("c.png"), "c.png");
    }

    #[test]
    fn test_encoding_from_str() {
        assert_eq!("utf8".parse::<TitleEncoding>(), Ok(TitleEncoding::Utf8));
        assert_eq!("UTF-8".parse::<TitleEncoding>(), Ok(TitleEncoding::Utf8));
        assert_eq!("latin1".parse::<TitleEncoding>(), Ok(TitleEncoding::Latin1));
        assert_eq!("ISO-8859-1".parse::<TitleEncoding>(), Ok(TitleEncoding::Latin1));
        assert!("ebcdic".parse::<TitleEncoding>().is_err());
        assert_eq!(TitleEncoding::Latin1.to_string(), "latin1");
    }
}
