//! Typed section model and the self-parsers behind the section registry.

pub mod attribute;
pub mod payload;
pub mod resource;

pub use attribute::{
    AttrValue, Attribute, Attributes, Parameter, ParameterMember, Parameters, Requirement,
};
pub use payload::{Body, Headers, Model, Payload, Relation, Request, Response, Schema};
pub use resource::{Action, Resource, ResourceGroup};

use crate::html::serialize_to_html;
use crate::tree::{Element, Tag};

/// First word of a section line, delimited by space, tab or colon.
/// This is the token the registry dispatches on.
pub(crate) fn section_keyword(text: &str) -> &str {
    let end = text
        .find([' ', '\t', ':'])
        .unwrap_or(text.len());
    &text[..end]
}

/// Serialise consecutive elements into an HTML description until one of
/// the stop tags (or the end) is reached. Returns the description and
/// the index of the element that stopped the scan.
pub(crate) fn parse_description(
    sequence: &[&Element],
    mut index: usize,
    stop_tags: &[Tag],
) -> (Option<String>, usize) {
    let mut description = String::new();
    while index < sequence.len() && !stop_tags.contains(&sequence[index].tag) {
        description.push_str(&serialize_to_html(sequence[index]));
        description.push('\n');
        index += 1;
    }
    let description = description.trim().to_string();
    if description.is_empty() {
        (None, index)
    } else {
        (Some(description), index)
    }
}

/// Same, over a node's own children.
pub(crate) fn parse_child_description(
    node: &Element,
    index: usize,
    stop_tags: &[Tag],
) -> (Option<String>, usize) {
    let refs: Vec<&Element> = node.children.iter().collect();
    parse_description(&refs, index, stop_tags)
}

/// `[Name][]` bodies stand for a reference to a model or data structure.
pub(crate) fn extract_reference(text: &str) -> Option<&str> {
    let text = text.trim();
    if text.len() > 4 && text.starts_with('[') && text.ends_with("][]") {
        Some(&text[1..text.len() - 3])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::parse_document;

    #[test]
    fn test_section_keyword() {
        assert_eq!(section_keyword("Request A (application/json)"), "Request");
        assert_eq!(section_keyword("Relation: self"), "Relation");
        assert_eq!(section_keyword("Body"), "Body");
        assert_eq!(section_keyword(""), "");
    }

    #[test]
    fn test_extract_reference() {
        assert_eq!(extract_reference("[User][]"), Some("User"));
        assert_eq!(extract_reference("  [User][]  "), Some("User"));
        assert_eq!(extract_reference("[User]"), None);
        assert_eq!(extract_reference("[][]"), None);
        assert_eq!(extract_reference("plain"), None);
    }

    #[test]
    fn test_parse_description_stops_at_tag() {
        let root = parse_document("one\n\ntwo\n\n+ item\n");
        let refs: Vec<&Element> = root.children.iter().collect();
        let (desc, index) = parse_description(&refs, 0, &[Tag::Ul]);
        assert_eq!(desc.as_deref(), Some("<p>one</p>\n<p>two</p>"));
        assert_eq!(index, 2);
    }

    #[test]
    fn test_parse_description_empty() {
        let root = parse_document("+ item\n");
        let refs: Vec<&Element> = root.children.iter().collect();
        let (desc, index) = parse_description(&refs, 0, &[Tag::Ul]);
        assert_eq!(desc, None);
        assert_eq!(index, 0);
    }
}
