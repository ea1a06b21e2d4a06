//! Element tree consumed by the structural parser.
//!
//! The tree is deliberately small: the only tags the Blueprint grammar
//! cares about are paragraphs, code blocks, lists, list items and
//! headings. Everything else pulldown-cmark produces is treated as a
//! transparent container whose inline text flows into the nearest kept
//! ancestor.

use pulldown_cmark::{Event, Options, Parser, Tag as MdTag};

/// Block-level tag of an [`Element`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tag {
    Document,
    P,
    Pre,
    Ul,
    Ol,
    Li,
    /// `h1`..`h6`
    Heading(u8),
}

impl Tag {
    pub fn heading_level(&self) -> Option<u8> {
        match self {
            Tag::Heading(level) => Some(*level),
            _ => None,
        }
    }

    /// Lowercase HTML tag name.
    pub fn name(&self) -> String {
        match self {
            Tag::Document => "div".to_string(),
            Tag::P => "p".to_string(),
            Tag::Pre => "pre".to_string(),
            Tag::Ul => "ul".to_string(),
            Tag::Ol => "ol".to_string(),
            Tag::Li => "li".to_string(),
            Tag::Heading(level) => format!("h{level}"),
        }
    }
}

/// One node of the element tree. `text` is the concatenated inline text
/// of the node (soft and hard breaks become `\n`); block-level children
/// keep their own text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    pub tag: Tag,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            text: String::new(),
            children: Vec::new(),
        }
    }

    pub fn is_heading(&self) -> bool {
        matches!(self.tag, Tag::Heading(_))
    }

    pub fn heading_level(&self) -> Option<u8> {
        self.tag.heading_level()
    }
}

fn map_tag(tag: &MdTag) -> Option<Tag> {
    match tag {
        MdTag::Paragraph => Some(Tag::P),
        MdTag::CodeBlock(_) => Some(Tag::Pre),
        MdTag::List(None) => Some(Tag::Ul),
        MdTag::List(Some(_)) => Some(Tag::Ol),
        MdTag::Item => Some(Tag::Li),
        MdTag::Heading { level, .. } => Some(Tag::Heading(*level as u8)),
        _ => None,
    }
}

/// Strip the common leading-space prefix of the non-empty lines.
///
/// CommonMark leaves indented code inside a list item with a uniform
/// residue relative to the 4-space nesting grid the Blueprint grammar
/// assumes; the residue is constant per block, so the common prefix is
/// exactly what has to go.
fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start_matches(' ').len())
        .min()
        .unwrap_or(0);
    if indent == 0 {
        return text.to_string();
    }
    text.lines()
        .map(|line| if line.len() >= indent { &line[indent..] } else { line.trim_start_matches(' ') })
        .collect::<Vec<_>>()
        .join("\n")
}

fn finish(mut element: Element) -> Element {
    if element.tag == Tag::Pre {
        let mut content = dedent(&element.text);
        if content.ends_with('\n') {
            content.pop();
        }
        element.text = content;
    } else if element.text.is_empty() && !element.children.is_empty() {
        // Mirrors the etree shape of a loose list item: no direct text,
        // a leading newline, then block children.
        element.text.push('\n');
    }
    element
}

/// Build the element tree of an already preprocessed document.
///
/// The stack machine mirrors the event pairing contract of
/// pulldown-cmark: every `Start` is matched by an `End`, and inline
/// events attach to the innermost open element.
pub fn parse_document(text: &str) -> Element {
    let parser = Parser::new_ext(text, Options::empty());
    let mut stack: Vec<Element> = vec![Element::new(Tag::Document)];
    // For every open markdown tag, whether it produced an element.
    let mut opened: Vec<bool> = Vec::new();

    for event in parser {
        match event {
            Event::Start(tag) => match map_tag(&tag) {
                Some(kept) => {
                    stack.push(Element::new(kept));
                    opened.push(true);
                }
                None => opened.push(false),
            },
            Event::End(_) => {
                if opened.pop() == Some(true) {
                    let element = finish(stack.pop().expect("unbalanced tags"));
                    stack
                        .last_mut()
                        .expect("document root is always open")
                        .children
                        .push(element);
                }
            }
            Event::Text(s)
            | Event::Code(s)
            | Event::Html(s)
            | Event::InlineHtml(s)
            | Event::InlineMath(s)
            | Event::DisplayMath(s) => {
                stack.last_mut().unwrap().text.push_str(&s);
            }
            Event::SoftBreak | Event::HardBreak => {
                stack.last_mut().unwrap().text.push('\n');
            }
            Event::FootnoteReference(_) | Event::Rule | Event::TaskListMarker(_) => {}
        }
    }

    stack.pop().expect("document root is always open")
}
