//! Payload sections: requests, responses, models and their nested
//! headers, body and schema assets.

use std::ops::Deref;

use indexmap::IndexMap;
use itertools::Itertools;

use super::resource::Action;
use super::{extract_reference, parse_child_description, section_keyword};
use crate::error::{SectionError, WarningSink};
use crate::registry::{self, Section};
use crate::tree::{Element, Tag};

/// Ordered `Name: Value` pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headers {
    headers: IndexMap<String, String>,
}

impl Headers {
    pub fn parse_from_etree(node: &Element) -> Result<Self, SectionError> {
        let content = node
            .children
            .first()
            .filter(|child| matches!(child.tag, Tag::P | Tag::Pre))
            .ok_or(SectionError::Format("headers"))?;
        let mut headers = IndexMap::new();
        for line in content.text.lines().filter(|line| !line.trim().is_empty()) {
            let (name, value) = line
                .split_once(':')
                .ok_or(SectionError::Format("headers"))?;
            headers.insert(name.trim().to_string(), value.trim().to_string());
        }
        Ok(Self { headers })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl std::fmt::Display for Headers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            self.iter()
                .map(|(name, value)| format!("{name}: {value}"))
                .join("\n")
        )
    }
}

/// Raw body text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Body {
    pub content: String,
}

/// Raw schema text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    pub content: String,
}

fn parse_asset(node: &Element) -> Result<String, SectionError> {
    let content = node
        .children
        .first()
        .filter(|child| matches!(child.tag, Tag::P | Tag::Pre))
        .ok_or(SectionError::Format("asset"))?;
    Ok(content.text.clone())
}

impl Body {
    pub fn parse_from_etree(node: &Element) -> Result<Self, SectionError> {
        Ok(Self {
            content: parse_asset(node)?,
        })
    }
}

impl Schema {
    pub fn parse_from_etree(node: &Element) -> Result<Self, SectionError> {
        Ok(Self {
            content: parse_asset(node)?,
        })
    }
}

impl std::fmt::Display for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Body\n{}", self.content)
    }
}

impl std::fmt::Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Schema\n{}", self.content)
    }
}

/// A link relation: `+ Relation: self`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relation {
    pub link_id: String,
}

impl Relation {
    pub fn parse_from_etree(node: &Element) -> Result<Self, SectionError> {
        let link_id = node
            .text
            .rsplit(':')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        Ok(Self { link_id })
    }

}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Relation {}", self.link_id)
    }
}

/// Common shape of Request, Response and Model sections.
#[derive(Clone, Debug, PartialEq)]
pub struct Payload {
    pub(crate) keyword: &'static str,
    pub(crate) name: Option<String>,
    pub(crate) media_type: Option<(String, String)>,
    pub(crate) description: Option<String>,
    pub(crate) headers: Option<Headers>,
    pub(crate) attributes: Option<super::Attributes>,
    pub(crate) body: Option<Body>,
    pub(crate) schema: Option<Schema>,
    pub(crate) reference: Option<String>,
}

impl Payload {
    pub fn keyword(&self) -> &'static str {
        self.keyword
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn media_type(&self) -> Option<(&str, &str)> {
        self.media_type
            .as_ref()
            .map(|(kind, subtype)| (kind.as_str(), subtype.as_str()))
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn headers(&self) -> Option<&Headers> {
        self.headers.as_ref()
    }

    pub fn attributes(&self) -> Option<&super::Attributes> {
        self.attributes.as_ref()
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    /// `[Name][]` reference to a resource model, if the section body was
    /// nothing else.
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    /// Parse an `application/json` body.
    pub fn json_value(&self) -> Option<serde_json::Value> {
        match self.media_type() {
            Some(("application", "json")) => {
                serde_json::from_str(&self.body.as_ref()?.content).ok()
            }
            _ => None,
        }
    }

    /// Fill this payload from a referenced model.
    pub(crate) fn copy_from(&mut self, other: &Payload) {
        if self.name.is_none() {
            self.name = other.name.clone();
        }
        self.description = other.description.clone();
        self.media_type = other.media_type.clone();
        self.headers = other.headers.clone();
        self.attributes = other.attributes.clone();
        self.body = other.body.clone();
        self.schema = other.schema.clone();
    }

    /// Split `Keyword [name] [(type/subtype)]` into name and media type.
    fn parse_definition(
        text: &str,
        sink: &mut WarningSink,
    ) -> Result<(Option<String>, Option<(String, String)>), SectionError> {
        let text = match text.find('\n') {
            Some(pos) => {
                sink.warn(
                    "",
                    format!("invalid format, description was discarded: {text:?}"),
                );
                &text[..pos]
            }
            None => text,
        };
        let Some(sep) = text.find([' ', '\t']) else {
            return Ok((None, None));
        };
        let rest = text[sep + 1..].trim();
        if rest.is_empty() {
            return Ok((None, None));
        }
        if let Some(stripped) = rest.strip_suffix(')') {
            let open = stripped
                .rfind('(')
                .ok_or(SectionError::Format("payload"))?;
            let media = stripped[open + 1..].trim();
            let media = match media.split_once('/') {
                Some((kind, subtype)) => (kind.to_string(), subtype.to_string()),
                None => (media.to_string(), String::new()),
            };
            let name = rest[..open].trim_end();
            let name = (!name.is_empty()).then(|| name.to_string());
            Ok((name, Some(media)))
        } else {
            Ok((Some(rest.to_string()), None))
        }
    }

    /// Shared section parser: definition line, description, then either
    /// an inline code-block body or a list of nested sections.
    pub(crate) fn parse_from_etree(
        keyword: &'static str,
        node: &Element,
        sink: &mut WarningSink,
    ) -> Result<Payload, SectionError> {
        let (name, media_type) = Self::parse_definition(&node.text, sink)?;
        let (description, index) = parse_child_description(node, 0, &[Tag::Pre, Tag::Ul]);
        let mut payload = Payload {
            keyword,
            name,
            media_type,
            description,
            headers: None,
            attributes: None,
            body: None,
            schema: None,
            reference: None,
        };
        match node.children.get(index) {
            Some(child) if child.tag == Tag::Pre => {
                payload.body = Some(Body {
                    content: child.text.clone(),
                });
            }
            Some(child) if child.tag == Tag::Ul => {
                for item in &child.children {
                    let name = section_keyword(&item.text).to_string();
                    match registry::dispatch(item, sink) {
                        Ok(Some(Section::Headers(headers))) => payload.headers = Some(headers),
                        Ok(Some(Section::Attributes(attributes))) => {
                            payload.attributes = Some(attributes)
                        }
                        Ok(Some(Section::Body(body))) => payload.body = Some(body),
                        Ok(Some(Section::Schema(schema))) => payload.schema = Some(schema),
                        Ok(Some(_)) => {}
                        Ok(None) => sink.warn("", format!("section {name:?} is unknown")),
                        Err(err) => sink.warn(
                            format!("payload section {keyword}"),
                            format!("failed to parse section {name:?}: {err}"),
                        ),
                    }
                }
            }
            _ => {}
        }
        Ok(payload)
    }

    /// A payload is a reference when it carries nothing but a single
    /// paragraph or code block holding `[Name][]`.
    fn detect_reference(&mut self, node: &Element) {
        if self.headers.is_none()
            && self.attributes.is_none()
            && self.body.is_none()
            && self.schema.is_none()
            && node.children.len() == 1
            && matches!(node.children[0].tag, Tag::P | Tag::Pre)
        {
            self.reference = extract_reference(&node.children[0].text).map(str::to_string);
        }
    }
}

impl std::fmt::Display for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.keyword)?;
        if let Some(name) = &self.name {
            write!(f, " {name}")?;
        }
        if let Some((kind, subtype)) = &self.media_type {
            write!(f, " ({kind}/{subtype})")?;
        }
        Ok(())
    }
}

/// A model payload, indexed under the containing resource's name.
#[derive(Clone, Debug)]
pub struct Model {
    pub(crate) payload: Payload,
    pub(crate) parent: Option<*const super::Resource>,
}

impl Model {
    pub(crate) fn parse_from_etree(
        node: &Element,
        sink: &mut WarningSink,
    ) -> Result<Self, SectionError> {
        Ok(Self {
            payload: Payload::parse_from_etree("Model", node, sink)?,
            parent: None,
        })
    }

    pub fn parent(&self) -> Option<&super::Resource> {
        self.parent.map(|ptr| unsafe { &*ptr })
    }
}

impl Deref for Model {
    type Target = Payload;

    fn deref(&self) -> &Payload {
        &self.payload
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.payload.fmt(f)
    }
}

/// A request payload of an action.
#[derive(Clone, Debug)]
pub struct Request {
    pub(crate) payload: Payload,
    pub(crate) parent: Option<*const Action>,
    /// `(status code, index within the code bucket)` of each linked
    /// response; survives deep copies, unlike a pointer.
    pub(crate) response_refs: Vec<(u16, usize)>,
}

impl Request {
    pub(crate) fn parse_from_etree(
        node: &Element,
        sink: &mut WarningSink,
    ) -> Result<Self, SectionError> {
        let mut payload = Payload::parse_from_etree("Request", node, sink)?;
        payload.detect_reference(node);
        Ok(Self {
            payload,
            parent: None,
            response_refs: Vec::new(),
        })
    }

    pub fn parent(&self) -> Option<&Action> {
        self.parent.map(|ptr| unsafe { &*ptr })
    }

    /// The responses following this request, in declaration order.
    pub fn responses(&self) -> Vec<&Response> {
        let Some(action) = self.parent() else {
            return Vec::new();
        };
        self.response_refs
            .iter()
            .filter_map(|&(code, index)| action.responses_for(code).get(index))
            .collect()
    }

    /// The expanded URI of the owning action.
    pub fn uri(&self) -> Option<&str> {
        self.parent().and_then(Action::uri)
    }
}

impl Deref for Request {
    type Target = Payload;

    fn deref(&self) -> &Payload {
        &self.payload
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.payload.fmt(f)
    }
}

/// A response payload of an action.
#[derive(Clone, Debug)]
pub struct Response {
    pub(crate) payload: Payload,
    pub(crate) parent: Option<*const Action>,
    pub(crate) http_code: u16,
    /// Position of the linked request within the owning action.
    pub(crate) request_index: Option<usize>,
}

impl Response {
    pub(crate) fn parse_from_etree(
        node: &Element,
        sink: &mut WarningSink,
    ) -> Result<Self, SectionError> {
        let mut payload = Payload::parse_from_etree("Response", node, sink)?;
        payload.detect_reference(node);
        let http_code = match payload.name.as_deref() {
            Some(name) => name
                .trim()
                .parse::<u16>()
                .map_err(|_| SectionError::BadStatusCode(name.to_string()))?,
            None => 200,
        };
        Ok(Self {
            payload,
            parent: None,
            http_code,
            request_index: None,
        })
    }

    pub fn http_code(&self) -> u16 {
        self.http_code
    }

    pub fn parent(&self) -> Option<&Action> {
        self.parent.map(|ptr| unsafe { &*ptr })
    }

    /// The request this response answers, if any preceded it.
    pub fn request(&self) -> Option<&Request> {
        let action = self.parent()?;
        action.request_at(self.request_index?)
    }
}

impl Deref for Response {
    type Target = Payload;

    fn deref(&self) -> &Payload {
        &self.payload
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.payload.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::parse_document;

    fn sink() -> WarningSink {
        WarningSink::new(false)
    }

    fn first_item(doc: &str) -> Element {
        let mut root = parse_document(doc);
        crate::preprocess::unwrap_titles(&mut root);
        root.children[0].children[0].clone()
    }

    #[test]
    fn test_headers() {
        let li = first_item("+ Headers\n\n        X-Key: secret\n        Accept: text/plain\n");
        let headers = Headers::parse_from_etree(&li).unwrap();
        assert_eq!(headers.get("X-Key"), Some("secret"));
        assert_eq!(headers.to_string(), "X-Key: secret\nAccept: text/plain");
    }

    #[test]
    fn test_headers_without_colon_fail() {
        let li = first_item("+ Headers\n\n        garbage\n");
        assert!(matches!(
            Headers::parse_from_etree(&li),
            Err(SectionError::Format("headers"))
        ));
    }

    #[test]
    fn test_relation() {
        let li = first_item("+ Relation: self\n");
        let relation = Relation::parse_from_etree(&li).unwrap();
        assert_eq!(relation.link_id, "self");
        assert_eq!(relation.to_string(), "Relation self");
    }

    #[test]
    fn test_response_with_inline_body() {
        let li = first_item("+ Response 200 (text/plain)\n\n        pong\n");
        let response = Response::parse_from_etree(&li, &mut sink()).unwrap();
        assert_eq!(response.http_code(), 200);
        assert_eq!(response.media_type(), Some(("text", "plain")));
        assert_eq!(response.body().unwrap().content, "pong");
        assert_eq!(response.to_string(), "Response 200 (text/plain)");
    }

    #[test]
    fn test_response_bad_code() {
        let li = first_item("+ Response abc\n");
        assert!(matches!(
            Response::parse_from_etree(&li, &mut sink()),
            Err(SectionError::BadStatusCode(_))
        ));
    }

    #[test]
    fn test_request_with_nested_sections() {
        let li = first_item(
            "+ Request Create (application/json)\n    + Headers\n\n            X-Key: 1\n    + Body\n\n            {}\n",
        );
        let request = Request::parse_from_etree(&li, &mut sink()).unwrap();
        assert_eq!(request.name(), Some("Create"));
        assert_eq!(request.media_type(), Some(("application", "json")));
        assert_eq!(request.headers().unwrap().get("X-Key"), Some("1"));
        assert_eq!(request.body().unwrap().content, "{}");
    }

    #[test]
    fn test_reference_body() {
        let li = first_item("+ Response 200\n\n    [Thing][]\n");
        let response = Response::parse_from_etree(&li, &mut sink()).unwrap();
        assert_eq!(response.reference(), Some("Thing"));
    }

    #[test]
    fn test_json_value() {
        let li = first_item(
            "+ Response 200 (application/json)\n\n        {\"ok\": true}\n",
        );
        let response = Response::parse_from_etree(&li, &mut sink()).unwrap();
        let value = response.json_value().unwrap();
        assert_eq!(value["ok"], serde_json::Value::Bool(true));
    }

    #[test]
    fn test_model_display() {
        let li = first_item("+ Model (application/json)\n\n        {}\n");
        let model = Model::parse_from_etree(&li, &mut sink()).unwrap();
        assert_eq!(model.name(), None);
        assert_eq!(model.to_string(), "Model (application/json)");
    }
}
