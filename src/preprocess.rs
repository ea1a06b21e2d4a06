//! Source and tree normalisation.
//!
//! Two line passes run before the Markdown parse and two tree passes run
//! after it, in this order:
//!
//! 1. back-quote removal — Blueprint headers use back-ticks as cosmetic
//!    emphasis that would otherwise corrupt tokenisation,
//! 2. indentation alignment — snap leading spaces to the next multiple
//!    of four so sloppy 2- and 3-space nesting still forms lists,
//! 3. title unwrap — fold the paragraph wrapper of loose list items so
//!    section header text is always directly readable,
//! 4. heading lift — documents with a single `h1` get every other
//!    heading promoted one level.
//!
//! Back-ticks are removed unconditionally, fenced code blocks included.

use crate::error::WarningSink;
use crate::tree::{Element, Tag};

/// Remove every back-quote character.
pub fn strip_backquotes(text: &str) -> String {
    text.replace('`', "")
}

/// Pad non-multiple-of-four indentation up to the next multiple of four.
pub fn align_indentation(text: &str) -> String {
    let mut out = Vec::new();
    for line in text.split('\n') {
        let indent = line.len() - line.trim_start_matches(' ').len();
        if indent > 0 && indent % 4 != 0 {
            let padded = indent + (4 - indent % 4);
            out.push(format!("{}{}", " ".repeat(padded), &line[indent..]));
        } else {
            out.push(line.to_string());
        }
    }
    out.join("\n")
}

pub(crate) fn preprocess(text: &str) -> String {
    align_indentation(&strip_backquotes(text))
}

/// Whenever a node's text is exactly `"\n"` and its first child is a
/// paragraph, replace the node's text with the paragraph's text and drop
/// that child. Depth first, whole tree.
pub fn unwrap_titles(element: &mut Element) {
    for child in &mut element.children {
        unwrap_titles(child);
    }
    if element.tag != Tag::Document
        && element.text == "\n"
        && element.children.first().map(|c| c.tag) == Some(Tag::P)
    {
        let paragraph = element.children.remove(0);
        element.text = paragraph.text;
        element.children.splice(0..0, paragraph.children);
    }
}

/// If the document has exactly one top-level `h1` (not counting the
/// `Data Structures` section), demote every other heading by one level,
/// stopping at the `Data Structures` heading.
pub(crate) fn lift_headings(root: &mut Element, sink: &mut WarningSink) {
    let h1_count = root
        .children
        .iter()
        .filter(|item| item.tag == Tag::Heading(1) && item.text != "Data Structures")
        .count();
    if h1_count != 1 {
        return;
    }
    sink.warn(
        "",
        "there is only one top-level heading in the document, raising all the other headers",
    );
    for item in &mut root.children {
        match item.tag {
            Tag::Heading(1) => {
                if item.text == "Data Structures" {
                    break;
                }
            }
            Tag::Heading(level) => item.tag = Tag::Heading(level - 1),
            _ => {}
        }
    }
}
