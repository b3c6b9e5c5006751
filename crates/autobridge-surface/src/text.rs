//! Display text extraction from response nodes.

use std::sync::LazyLock;

use regex::Regex;

use crate::accessor::Accessor;
use crate::node::NodeRef;

static MARKUP: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[^>]+>").ok());

/// Fields probed, in order, when a node has no usable `getText()`.
const TEXT_FIELDS: &[&str] = &["text", "content", "myText", "markdown"];

const ENTITIES: &[(&str, &str)] = &[
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&nbsp;", " "),
    // Must come last so `&amp;lt;` decodes to `&lt;`, not `<`.
    ("&amp;", "&"),
];

/// Remove anything that looks like a markup tag.
pub fn strip_markup(text: &str) -> String {
    match MARKUP.as_ref() {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    }
}

/// Decode the handful of HTML entities rendered panes emit.
pub fn decode_entities(text: &str) -> String {
    ENTITIES
        .iter()
        .fold(text.to_string(), |acc, (entity, plain)| acc.replace(entity, plain))
}

/// Best-effort plain text of a node.
///
/// Tries `getText()` first, then the known text-bearing fields. Returns the
/// first candidate that is non-blank once markup is stripped.
pub fn extract_display_text(accessor: &Accessor, node: &NodeRef) -> Option<String> {
    let from_method = accessor
        .invoke(node, "getText", None)
        .and_then(|v| v.as_str().map(str::to_string));

    std::iter::once(from_method)
        .chain(TEXT_FIELDS.iter().map(|field| {
            accessor
                .get_field(node, field)
                .and_then(|v| v.as_str().map(str::to_string))
        }))
        .flatten()
        .map(|raw| decode_entities(&strip_markup(&raw)).trim().to_string())
        .find(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockNode;

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("<p>Hello <b>world</b></p>"), "Hello world");
        assert_eq!(strip_markup("no tags"), "no tags");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &lt; b &amp;&amp; c &gt; d"), "a < b && c > d");
        assert_eq!(decode_entities("&quot;x&quot; &#39;y&#39;"), "\"x\" 'y'");
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_prefers_get_text() {
        let accessor = Accessor::new();
        let node: NodeRef = MockNode::builder("MarkdownPane")
            .returns("getText", "<html><body>from method</body></html>")
            .field("text", "from field")
            .build();
        assert_eq!(extract_display_text(&accessor, &node).as_deref(), Some("from method"));
    }

    #[test]
    fn test_falls_back_to_fields_in_order() {
        let accessor = Accessor::new();
        let node: NodeRef = MockNode::builder("MessageContent")
            .returns("getText", "   ")
            .field("content", "")
            .field("myText", "<i>answer</i> &amp; more")
            .field("markdown", "**ignored**")
            .build();
        assert_eq!(
            extract_display_text(&accessor, &node).as_deref(),
            Some("answer & more")
        );
    }

    #[test]
    fn test_nothing_usable() {
        let accessor = Accessor::new();
        let node: NodeRef = MockNode::builder("ResponsePanel")
            .failing("getText", "disposed")
            .field("text", "<br/>")
            .build();
        assert!(extract_display_text(&accessor, &node).is_none());
    }
}
