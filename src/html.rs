//! Render an element subtree back to an HTML fragment.
//!
//! Descriptions and overviews keep whatever markup the author wrote
//! between section headings, so the structural parser re-serialises the
//! elements it does not consume.

use crate::tree::{Element, Tag};
use pulldown_cmark_escape::escape_html;

/// Serialise a subtree to a compact HTML string.
pub fn serialize_to_html(element: &Element) -> String {
    let mut out = String::new();
    write_element(&mut out, element);
    out
}

fn write_element(out: &mut String, element: &Element) {
    if element.tag == Tag::Document {
        for child in &element.children {
            write_element(out, child);
        }
        return;
    }
    let name = element.tag.name();
    out.push('<');
    out.push_str(&name);
    out.push('>');
    if element.tag == Tag::Pre {
        out.push_str("<code>");
    }
    let text = if element.text == "\n" && !element.children.is_empty() {
        ""
    } else {
        element.text.as_str()
    };
    escape_html(&mut *out, text).expect("writing to a string cannot fail");
    if element.tag == Tag::Pre {
        out.push_str("</code>");
    }
    for child in &element.children {
        write_element(out, child);
    }
    out.push_str("</");
    out.push_str(&name);
    out.push('>');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::parse_document;

    #[test]
    fn test_paragraph() {
        let root = parse_document("Welcome to the API.\n");
        assert_eq!(
            serialize_to_html(&root.children[0]),
            "<p>Welcome to the API.</p>"
        );
    }

    #[test]
    fn test_escaping() {
        let root = parse_document("a < b & c\n");
        assert_eq!(
            serialize_to_html(&root.children[0]),
            "<p>a &lt; b &amp; c</p>"
        );
    }

    #[test]
    fn test_nested_list() {
        let root = parse_document("+ one\n    + two\n");
        assert_eq!(
            serialize_to_html(&root.children[0]),
            "<ul><li>one<ul><li>two</li></ul></li></ul>"
        );
    }

    #[test]
    fn test_code_block() {
        let root = parse_document("    let x = 1;\n");
        assert_eq!(
            serialize_to_html(&root.children[0]),
            "<pre><code>let x = 1;</code></pre>"
        );
    }
}
