//! HTML page metadata extraction.
//!
//! Pulls the title, meta description, and favicon reference out of a
//! probed response body. The parser is a small state machine over
//! quick-xml's event stream running in permissive mode; when the
//! markup turns out too broken to continue, whatever was collected up
//! to that point still stands.

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use url::Url;

/// Upper bound on the amount of decoded text fed to the parser, in
/// characters. Keeps pathological pages from stalling a probe.
const PARSE_BUDGET: usize = 32_000;

/// Metadata pulled from an HTML document. Every field is best-effort.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Absolute URL, resolved against the probed origin.
    pub favicon: Option<String>,
}

/// Extract metadata from a response body.
///
/// Returns `None` unless `content_type` declares an HTML document. The
/// body is decoded with the charset the header declares; when the
/// header is silent the encoding is inferred from the bytes, so pages
/// that omit a charset do not come back mangled.
pub fn extract(body: &[u8], content_type: &str, base: &Url) -> Option<PageMeta> {
    if !content_type.to_ascii_lowercase().contains("html") {
        return None;
    }

    let text = decode_body(body, declared_charset(content_type));
    let scan = scan_markup(truncate_chars(&text, PARSE_BUDGET));

    let title = Some(scan.title.trim().to_string()).filter(|t| !t.is_empty());
    let description = Some(scan.description).filter(|d| !d.is_empty());
    let favicon = if scan.favicon.is_empty() {
        None
    } else {
        base.join(&scan.favicon).ok().map(|u| u.to_string())
    };

    Some(PageMeta {
        title,
        description,
        favicon,
    })
}

// ── Decoding ──────────────────────────────────────────────────────

/// Charset declared in a Content-Type header, if any.
fn declared_charset(content_type: &str) -> Option<&'static Encoding> {
    let lowered = content_type.to_ascii_lowercase();
    let start = lowered.find("charset=")? + "charset=".len();
    let rest = &content_type[start..];
    let label = rest.split(';').next().unwrap_or(rest).trim().trim_matches('"');
    Encoding::for_label(label.as_bytes())
}

/// Decode with the declared encoding, or infer one from the bytes when
/// the header does not say. A byte-order mark always wins.
fn decode_body(body: &[u8], declared: Option<&'static Encoding>) -> String {
    let encoding = declared.unwrap_or_else(|| {
        let mut detector = EncodingDetector::new();
        detector.feed(body, true);
        detector.guess(None, true)
    });
    let (text, _, _) = encoding.decode(body);
    text.into_owned()
}

/// Cut `text` to at most `limit` characters, on a char boundary.
fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ── Markup scanning ───────────────────────────────────────────────

#[derive(Default)]
struct MarkupScan {
    title: String,
    description: String,
    favicon: String,
}

/// Walk the tag/text event stream, collecting the first title, the
/// first non-empty description, and the first icon link. A reader
/// error ends the walk without discarding what was already gathered.
fn scan_markup(input: &str) -> MarkupScan {
    let mut reader = Reader::from_str(input);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut out = MarkupScan::default();
    let mut in_title = false;
    let mut title_seen = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(tag)) | Ok(Event::Empty(tag)) => {
                let name = tag.name().as_ref().to_ascii_lowercase();
                match name.as_slice() {
                    b"title" if !title_seen => in_title = true,
                    b"meta" if out.description.is_empty() => {
                        if let Some(content) = description_of(&tag) {
                            out.description = content;
                        }
                    }
                    b"link" if out.favicon.is_empty() => {
                        if let Some(href) = icon_href_of(&tag) {
                            out.favicon = href;
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(tag)) => {
                if in_title && tag.name().as_ref().eq_ignore_ascii_case(b"title") {
                    in_title = false;
                    title_seen = true;
                }
            }
            Ok(Event::Text(text)) => {
                if in_title {
                    match text.unescape() {
                        Ok(t) => out.title.push_str(&t),
                        Err(_) => out.title.push_str(&String::from_utf8_lossy(&text)),
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }
    out
}

/// `content` of a `<meta name="description">` or
/// `<meta property="og:description">` tag, trimmed, if non-empty.
fn description_of(tag: &BytesStart) -> Option<String> {
    let mut name = None;
    let mut property = None;
    let mut content = None;
    for attr in tag.html_attributes().flatten() {
        match attr.key.as_ref().to_ascii_lowercase().as_slice() {
            b"name" => name = Some(attr_text(&attr)),
            b"property" => property = Some(attr_text(&attr)),
            b"content" => content = Some(attr_text(&attr)),
            _ => {}
        }
    }

    let ident = name
        .filter(|n| !n.is_empty())
        .or(property)
        .unwrap_or_default()
        .to_lowercase();
    if ident != "description" && ident != "og:description" {
        return None;
    }
    Some(content.unwrap_or_default().trim().to_string()).filter(|c| !c.is_empty())
}

/// `href` of a `<link>` whose `rel` mentions an icon, if non-empty.
fn icon_href_of(tag: &BytesStart) -> Option<String> {
    let mut rel = String::new();
    let mut href = None;
    for attr in tag.html_attributes().flatten() {
        match attr.key.as_ref().to_ascii_lowercase().as_slice() {
            b"rel" => rel = attr_text(&attr).to_lowercase(),
            b"href" => href = Some(attr_text(&attr)),
            _ => {}
        }
    }

    if rel.contains("icon") {
        href.filter(|h| !h.is_empty())
    } else {
        None
    }
}

fn attr_text(attr: &Attribute) -> String {
    match attr.unescape_value() {
        Ok(value) => value.into_owned(),
        Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://localhost:8080").unwrap()
    }

    fn extract_html(body: &str) -> PageMeta {
        extract(body.as_bytes(), "text/html; charset=utf-8", &base()).unwrap()
    }

    #[test]
    fn test_pulls_title_description_and_favicon() {
        let page = extract_html(
            "<html><head>\
             <title> Hi </title>\
             <meta name=\"description\" content=\"desc\">\
             <link rel=\"shortcut icon\" href=\"/f.ico\">\
             </head><body></body></html>",
        );
        assert_eq!(page.title.as_deref(), Some("Hi"));
        assert_eq!(page.description.as_deref(), Some("desc"));
        assert_eq!(page.favicon.as_deref(), Some("http://localhost:8080/f.ico"));
    }

    #[test]
    fn test_og_description_accepted() {
        let page = extract_html(
            "<html><head>\
             <meta property=\"og:description\" content=\"social blurb\">\
             </head></html>",
        );
        assert_eq!(page.description.as_deref(), Some("social blurb"));
        assert_eq!(page.title, None);
    }

    #[test]
    fn test_first_title_and_first_description_win() {
        let page = extract_html(
            "<html><head>\
             <title>First</title>\
             <title>Second</title>\
             <meta name=\"description\" content=\"\">\
             <meta name=\"description\" content=\"real one\">\
             </head></html>",
        );
        assert_eq!(page.title.as_deref(), Some("First"));
        // empty content does not claim the description slot
        assert_eq!(page.description.as_deref(), Some("real one"));
    }

    #[test]
    fn test_entities_in_title_resolved() {
        let page = extract_html("<html><head><title>Caf&#233; &amp; Bar</title></head></html>");
        assert_eq!(page.title.as_deref(), Some("Caf\u{e9} & Bar"));
    }

    #[test]
    fn test_relative_favicon_resolved_against_origin() {
        let page = extract_html("<link rel=\"icon\" href=\"static/fav.png\">");
        assert_eq!(
            page.favicon.as_deref(),
            Some("http://localhost:8080/static/fav.png")
        );

        let page = extract_html("<link rel=\"icon\" href=\"https://cdn.example/fav.png\">");
        assert_eq!(page.favicon.as_deref(), Some("https://cdn.example/fav.png"));
    }

    #[test]
    fn test_non_html_content_type_is_skipped() {
        assert_eq!(extract(b"{\"ok\":true}", "application/json", &base()), None);
        assert!(extract(b"<html></html>", "TEXT/HTML", &base()).is_some());
    }

    #[test]
    fn test_malformed_markup_keeps_what_was_collected() {
        let page = extract_html("<html><head><title>Broken</title><div <<< nope");
        assert_eq!(page.title.as_deref(), Some("Broken"));
    }

    #[test]
    fn test_title_after_inline_script() {
        let page = extract_html(
            "<html><head>\
             <script>if (1 < 2) { refresh(); }</script>\
             <title>Console</title>\
             </head></html>",
        );
        assert_eq!(page.title.as_deref(), Some("Console"));
    }

    #[test]
    fn test_doctype_and_comments_skipped() {
        let page = extract_html(
            "<!DOCTYPE html><!-- generated -->\
             <html><head><title>After preamble</title></head></html>",
        );
        assert_eq!(page.title.as_deref(), Some("After preamble"));
    }

    #[test]
    fn test_uppercase_tags_recognized() {
        let page = extract_html(
            "<HTML><HEAD>\
             <TITLE>Shouty</TITLE>\
             <META NAME=\"description\" CONTENT=\"loud\">\
             <LINK REL=\"ICON\" HREF=\"/up.ico\">\
             </HEAD></HTML>",
        );
        assert_eq!(page.title.as_deref(), Some("Shouty"));
        assert_eq!(page.description.as_deref(), Some("loud"));
        assert_eq!(page.favicon.as_deref(), Some("http://localhost:8080/up.ico"));
    }

    #[test]
    fn test_unquoted_attribute_values() {
        let page = extract_html("<meta name=description content=plain><link rel=icon href=/bare.ico>");
        assert_eq!(page.description.as_deref(), Some("plain"));
        assert_eq!(page.favicon.as_deref(), Some("http://localhost:8080/bare.ico"));
    }

    #[test]
    fn test_unterminated_title_still_collected() {
        let page = extract_html("<html><head><title>Half open");
        assert_eq!(page.title.as_deref(), Some("Half open"));
    }

    #[test]
    fn test_whitespace_only_title_is_none() {
        let page = extract_html("<html><head><title>   </title></head></html>");
        assert_eq!(page.title, None);
    }

    #[test]
    fn test_declared_charset_is_honored() {
        // "Café" in windows-1252: é is a single 0xE9 byte
        let body = b"<html><head><title>Caf\xe9</title></head></html>";
        let page = extract(body, "text/html; charset=windows-1252", &base()).unwrap();
        assert_eq!(page.title.as_deref(), Some("Caf\u{e9}"));
    }

    #[test]
    fn test_missing_charset_is_inferred_from_bytes() {
        // UTF-8 body, header stays silent about the charset
        let body = "<html><head><title>Сервис мониторинга</title></head></html>".as_bytes();
        let page = extract(body, "text/html", &base()).unwrap();
        assert_eq!(page.title.as_deref(), Some("Сервис мониторинга"));
    }

    #[test]
    fn test_oversized_page_is_truncated_before_parsing() {
        let mut body = String::from("<html><head>");
        body.push_str(&"x".repeat(40_000));
        body.push_str("<title>Too late</title></head></html>");
        let page = extract_html(&body);
        assert_eq!(page.title, None);
    }

    #[test]
    fn test_title_within_budget_survives_truncation() {
        let mut body = String::from("<html><head><title>Early</title>");
        body.push_str(&"y".repeat(40_000));
        body.push_str("</head></html>");
        let page = extract_html(&body);
        assert_eq!(page.title.as_deref(), Some("Early"));
    }
}
