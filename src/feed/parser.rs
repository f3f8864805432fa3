use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// Maximum element nesting accepted in a feed document.
/// Guards against maliciously deep documents.
const MAX_DEPTH: usize = 64;

/// Errors that make a feed document untrustworthy as a whole.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The bytes are not well-formed XML.
    #[error("XML parse error: {0}")]
    Xml(String),

    /// Well-formed XML, but not an RSS document.
    #[error("Document has no <channel> element")]
    MissingChannel,

    /// The document ended while elements were still open.
    #[error("Document ended inside <{0}>")]
    Truncated(String),

    #[error("Element nesting exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),
}

/// One `<item>` of a feed, exactly as it appeared in the document.
///
/// Fields are the unescaped element text; missing elements are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
}

/// A parsed RSS channel. Entries keep document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub title: Option<String>,
    pub entries: Vec<RawEntry>,
}

/// Parses an RSS 2.0 document into its channel title and items.
///
/// Only `<item>` elements that are direct children of `<channel>` are
/// entries, and only the unprefixed `title`, `link`, `description` and
/// `pubDate` children are read (so `media:title` never shadows `title`).
/// Text and CDATA sections inside one element are concatenated untrimmed;
/// entry fields are trimmed later by the normalizer.
///
/// # Errors
///
/// Any XML syntax error, mismatched or unclosed element, or a missing
/// `<channel>` fails the whole document: partial documents are not trusted.
///
/// # Security
///
/// `quick-xml` (0.37) never expands `<!ENTITY>` declarations; unknown
/// entities fail unescaping instead, so XXE payloads become parse errors.
pub fn parse_document(bytes: &[u8]) -> Result<Document, ParseError> {
    let mut reader = Reader::from_reader(bytes);

    let mut buf = Vec::new();
    let mut open: Vec<Vec<u8>> = Vec::new();
    let mut saw_channel = false;
    let mut title: Option<String> = None;
    let mut current: Option<RawEntry> = None;
    let mut entries = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if open.len() >= MAX_DEPTH {
                    return Err(ParseError::MaxDepthExceeded(MAX_DEPTH));
                }
                let name = e.name().as_ref().to_vec();
                match name.as_slice() {
                    b"channel" => saw_channel = true,
                    b"item" if parent_is(&open, b"channel") => {
                        current = Some(RawEntry::default());
                    }
                    _ => {}
                }
                open.push(name);
            }
            Ok(Event::End(_)) => {
                // quick-xml rejects mismatched end tags itself
                let closed = open.pop();
                if closed.as_deref() == Some(b"item".as_slice()) && parent_is(&open, b"channel") {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| ParseError::Xml(e.to_string()))?;
                append_text(&open, &text, &mut title, current.as_mut());
            }
            Ok(Event::CData(c)) => {
                let text = reader
                    .decoder()
                    .decode(c.as_ref())
                    .map_err(|e| ParseError::Xml(e.to_string()))?;
                append_text(&open, &text, &mut title, current.as_mut());
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ParseError::Xml(format!(
                    "at position {}: {}",
                    reader.error_position(),
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    if let Some(name) = open.last() {
        return Err(ParseError::Truncated(
            String::from_utf8_lossy(name).into_owned(),
        ));
    }
    if !saw_channel {
        return Err(ParseError::MissingChannel);
    }

    let title = title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    Ok(Document { title, entries })
}

/// True when the innermost open element is `name`.
fn parent_is(open: &[Vec<u8>], name: &[u8]) -> bool {
    open.last().map(Vec::as_slice) == Some(name)
}

fn append_text(
    open: &[Vec<u8>],
    text: &str,
    channel_title: &mut Option<String>,
    entry: Option<&mut RawEntry>,
) {
    let [.., parent, field] = open else {
        return;
    };

    match (parent.as_slice(), entry) {
        (b"item", Some(entry)) => {
            let target = match field.as_slice() {
                b"title" => &mut entry.title,
                b"link" => &mut entry.link,
                b"description" => &mut entry.description,
                b"pubDate" => &mut entry.pub_date,
                _ => return,
            };
            target.push_str(text);
        }
        (b"channel", _) if field.as_slice() == b"title" => {
            channel_title.get_or_insert_with(String::new).push_str(text);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TWO_ITEMS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
<channel>
    <title>Example Blog</title>
    <link>https://example.com/</link>
    <atom:link href="https://example.com/index.xml" rel="self" type="application/rss+xml"/>
    <description>Recent posts</description>
    <item>
        <title>First post</title>
        <link>https://example.com/first</link>
        <description>Hello</description>
        <pubDate>Mon, 02 Jan 2006 15:04:05 -0700</pubDate>
    </item>
    <item>
        <title>Second post</title>
        <link>https://example.com/second</link>
        <description>World</description>
        <pubDate>Tue, 03 Jan 2006 15:04:05 -0700</pubDate>
    </item>
</channel>
</rss>"#;

    #[test]
    fn test_parse_items_in_document_order() {
        let doc = parse_document(TWO_ITEMS.as_bytes()).unwrap();

        assert_eq!(doc.title.as_deref(), Some("Example Blog"));
        assert_eq!(
            doc.entries,
            vec![
                RawEntry {
                    title: "First post".into(),
                    link: "https://example.com/first".into(),
                    description: "Hello".into(),
                    pub_date: "Mon, 02 Jan 2006 15:04:05 -0700".into(),
                },
                RawEntry {
                    title: "Second post".into(),
                    link: "https://example.com/second".into(),
                    description: "World".into(),
                    pub_date: "Tue, 03 Jan 2006 15:04:05 -0700".into(),
                },
            ]
        );
    }

    #[test]
    fn test_empty_channel() {
        let doc = parse_document(br#"<rss version="2.0"><channel></channel></rss>"#).unwrap();
        assert!(doc.entries.is_empty());
        assert!(doc.title.is_none());
    }

    #[test]
    fn test_cdata_and_entities() {
        let xml = r#"<rss><channel><item>
            <title>Fish &amp; Chips</title>
            <link>https://example.com/a?x=1&amp;y=2</link>
            <description><![CDATA[<p>Rich <b>HTML</b></p>]]></description>
        </item></channel></rss>"#;
        let doc = parse_document(xml.as_bytes()).unwrap();
        let entry = &doc.entries[0];
        assert_eq!(entry.title, "Fish & Chips");
        assert_eq!(entry.link, "https://example.com/a?x=1&y=2");
        assert_eq!(entry.description, "<p>Rich <b>HTML</b></p>");
        assert_eq!(entry.pub_date, "");
    }

    #[test]
    fn test_mixed_text_and_cdata_keep_inner_whitespace() {
        let xml = r#"<rss><channel>
            <title>
                Padded
            </title>
            <item><description>Hello <![CDATA[big]]> world</description></item>
        </channel></rss>"#;
        let doc = parse_document(xml.as_bytes()).unwrap();
        assert_eq!(doc.entries[0].description, "Hello big world");
        assert_eq!(doc.title.as_deref(), Some("Padded"));
    }

    #[test]
    fn test_prefixed_elements_do_not_shadow_fields() {
        let xml = r#"<rss xmlns:media="http://search.yahoo.com/mrss/"><channel><item>
            <title>Real title</title>
            <media:title>Media title</media:title>
            <link>https://example.com/a</link>
        </item></channel></rss>"#;
        let doc = parse_document(xml.as_bytes()).unwrap();
        assert_eq!(doc.entries[0].title, "Real title");
    }

    #[test]
    fn test_nested_titles_not_taken_as_channel_title() {
        let xml = r#"<rss><channel>
            <image><title>Logo</title><url>https://example.com/logo.png</url></image>
            <title>Channel</title>
        </channel></rss>"#;
        let doc = parse_document(xml.as_bytes()).unwrap();
        assert_eq!(doc.title.as_deref(), Some("Channel"));
    }

    #[test]
    fn test_malformed_xml_is_error() {
        let result = parse_document(b"<not valid xml");
        assert!(result.is_err());
    }

    #[test]
    fn test_mismatched_tags_is_error() {
        let result = parse_document(b"<rss><channel><item></channel></rss>");
        assert!(matches!(result, Err(ParseError::Xml(_))));
    }

    #[test]
    fn test_unclosed_document_is_truncated() {
        let result = parse_document(b"<rss><channel><item><title>Cut</title>");
        assert!(result.is_err());
    }

    #[test]
    fn test_html_page_has_no_channel() {
        let result = parse_document(b"<html><body><p>Not a feed</p></body></html>");
        assert!(matches!(result, Err(ParseError::MissingChannel)));
    }

    #[test]
    fn test_custom_entity_rejected() {
        let xml = r#"<?xml version="1.0"?>
<!DOCTYPE rss [<!ENTITY xxe SYSTEM "file:///etc/passwd">]>
<rss><channel><item><title>&xxe;</title></item></channel></rss>"#;
        assert!(parse_document(xml.as_bytes()).is_err());
    }

    #[test]
    fn test_excessive_nesting_rejected() {
        let xml = format!(
            "<rss><channel>{}{}</channel></rss>",
            "<x>".repeat(MAX_DEPTH),
            "</x>".repeat(MAX_DEPTH)
        );
        let result = parse_document(xml.as_bytes());
        assert!(matches!(result, Err(ParseError::MaxDepthExceeded(_))));
    }
}
