//! Resources, actions and resource groups.

use indexmap::IndexMap;

use super::payload::{Payload, Relation, Request, Response};
use super::{Attributes, Model, Parameters, parse_description, section_keyword};
use crate::error::{SectionError, WarningSink};
use crate::registry::{self, Section};
use crate::tree::{Element, Tag};
use crate::uri::UriTemplate;

const METHODS: [&str; 6] = ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD"];

/// Parsed `name [METHOD template]` header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Definition {
    pub name: Option<String>,
    pub method: Option<String>,
    pub template: Option<String>,
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Split a bracketed tail: `part` is `METHOD template`, `METHOD` or
/// `template` depending on the caller.
fn split_bracket(part: &str) -> (Option<String>, Option<String>) {
    match part.find([' ', '\t']) {
        Some(sep) => (non_empty(&part[..sep]), non_empty(&part[sep..])),
        None => (None, non_empty(part)),
    }
}

/// A resource header is `name [METHOD template]`, `name [template]`,
/// `METHOD template` or a bare template.
pub(crate) fn parse_resource_definition(text: &str) -> Result<Definition, SectionError> {
    let text = text.trim();
    if let Some(stripped) = text.strip_suffix(']') {
        let open = stripped
            .rfind('[')
            .ok_or(SectionError::Format("resource"))?;
        let (method, template) = split_bracket(stripped[open + 1..].trim());
        return Ok(Definition {
            name: non_empty(&text[..open]),
            method,
            template,
        });
    }
    match text.find([' ', '\t']) {
        Some(sep) if METHODS.contains(&&text[..sep]) => Ok(Definition {
            name: None,
            method: non_empty(&text[..sep]),
            template: non_empty(&text[sep + 1..]),
        }),
        _ => Ok(Definition {
            name: None,
            method: None,
            template: non_empty(text),
        }),
    }
}

/// An action header is `name [METHOD template]`, `name [METHOD]` or a
/// bare method.
pub(crate) fn parse_action_definition(text: &str) -> Result<Definition, SectionError> {
    let text = text.trim();
    if let Some(stripped) = text.strip_suffix(']') {
        let open = stripped
            .rfind('[')
            .ok_or(SectionError::Format("action"))?;
        let part = stripped[open + 1..].trim();
        let (method, template) = match part.find([' ', '\t']) {
            Some(sep) => (non_empty(&part[..sep]), non_empty(&part[sep..])),
            None => (non_empty(part), None),
        };
        return Ok(Definition {
            name: non_empty(&text[..open]),
            method,
            template,
        });
    }
    Ok(Definition {
        name: None,
        method: non_empty(text),
        template: None,
    })
}

/// Union of parameter values for template expansion: later layers
/// override earlier ones, declared values override defaults.
pub(crate) fn parameter_values(layers: &[Option<&Parameters>]) -> IndexMap<String, String> {
    let mut values = IndexMap::new();
    for parameters in layers.iter().flatten() {
        for parameter in parameters.iter() {
            let Some(name) = parameter.name() else {
                continue;
            };
            if let Some(default) = parameter.default_value() {
                values.insert(name.to_string(), default.to_string());
            }
            if let Some(super::AttrValue::Text(value)) = parameter.value() {
                values.insert(name.to_string(), value.clone());
            }
        }
    }
    values
}

/// An HTTP operation bound to a resource.
#[derive(Clone, Debug)]
pub struct Action {
    pub(crate) name: Option<String>,
    pub(crate) request_method: Option<String>,
    pub(crate) uri_template: Option<UriTemplate>,
    pub(crate) description: Option<String>,
    pub(crate) relation: Option<Relation>,
    pub(crate) parameters: Option<Parameters>,
    pub(crate) attributes: Option<Attributes>,
    pub(crate) requests: IndexMap<String, Request>,
    pub(crate) responses: IndexMap<u16, Vec<Response>>,
    pub(crate) uri: Option<String>,
    pub(crate) parent: Option<*const Resource>,
}

impl Action {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn request_method(&self) -> Option<&str> {
        self.request_method.as_deref()
    }

    pub fn uri_template(&self) -> Option<&UriTemplate> {
        self.uri_template.as_ref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn relation(&self) -> Option<&Relation> {
        self.relation.as_ref()
    }

    pub fn parameters(&self) -> Option<&Parameters> {
        self.parameters.as_ref()
    }

    pub fn attributes(&self) -> Option<&Attributes> {
        self.attributes.as_ref()
    }

    /// Owning resource, fixed up after parsing.
    pub fn parent(&self) -> Option<&Resource> {
        self.parent.map(|ptr| unsafe { &*ptr })
    }

    /// Name if declared, otherwise `"{method} {template}"`.
    pub fn id(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => {
                let mut id = String::new();
                if let Some(method) = &self.request_method {
                    id.push_str(method);
                    id.push(' ');
                }
                if let Some(template) = &self.uri_template {
                    id.push_str(template.as_str());
                }
                id.trim().to_string()
            }
        }
    }

    /// The URI expanded from the template and the parameter defaults of
    /// this action and its resource. Computed once after parsing.
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn requests(&self) -> impl Iterator<Item = &Request> {
        self.requests.values()
    }

    pub fn request(&self, name: &str) -> Option<&Request> {
        self.requests.get(name)
    }

    /// All responses in declaration order of their status codes.
    pub fn responses(&self) -> impl Iterator<Item = &Response> {
        self.responses.values().flatten()
    }

    pub fn responses_for(&self, code: u16) -> &[Response] {
        self.responses
            .get(&code)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub(crate) fn request_at(&self, index: usize) -> Option<&Request> {
        self.requests.get_index(index).map(|(_, request)| request)
    }

    /// Request/response pairs in declaration order. An action without
    /// requests yields one synthetic `default` request carrying the
    /// action's attributes and every response.
    pub fn exchanges(&self) -> Vec<(Request, Vec<&Response>)> {
        if self.requests.is_empty() {
            let request = Request {
                payload: Payload {
                    keyword: "Request",
                    name: Some("default".to_string()),
                    media_type: None,
                    description: None,
                    headers: None,
                    attributes: self.attributes.clone(),
                    body: None,
                    schema: None,
                    reference: None,
                },
                parent: None,
                response_refs: Vec::new(),
            };
            vec![(request, self.responses().collect())]
        } else {
            self.requests
                .values()
                .map(|request| (request.clone(), request.responses()))
                .collect()
        }
    }

    pub fn exchange_count(&self) -> usize {
        self.requests.len().max(1)
    }

    pub(crate) fn compute_uri(&mut self, resource_parameters: Option<&Parameters>) {
        if let Some(template) = &self.uri_template {
            let values = parameter_values(&[resource_parameters, self.parameters.as_ref()]);
            self.uri = Some(template.expand(&values));
        }
    }

    /// Parse one action window starting at `sequence[index]` (its
    /// heading). Returns the action and the index past its last element.
    pub(crate) fn parse_from_etree(
        sequence: &[&Element],
        index: usize,
        sink: &mut WarningSink,
    ) -> Result<(Action, usize), SectionError> {
        let definition = parse_action_definition(&sequence[index].text)?;
        let (description, mut index) = parse_description(sequence, index + 1, &[Tag::Ul]);

        let mut relation = None;
        let mut parameters = None;
        let mut attributes = None;
        let mut parsed_requests: Vec<Request> = Vec::new();
        let mut flat_responses: Vec<Response> = Vec::new();
        // Responses attach to every request seen since the last response;
        // the next request after a response starts a fresh batch.
        let mut pending: Vec<usize> = Vec::new();
        let mut clear_on_next_request = false;

        if index < sequence.len() && sequence[index].tag == Tag::Ul {
            let context = definition.name.clone().unwrap_or_default();
            for item in &sequence[index].children {
                let keyword = section_keyword(&item.text).to_string();
                match registry::dispatch(item, sink) {
                    Ok(Some(Section::Request(request))) => {
                        if clear_on_next_request {
                            pending.clear();
                            clear_on_next_request = false;
                        }
                        parsed_requests.push(request);
                        pending.push(parsed_requests.len() - 1);
                    }
                    Ok(Some(Section::Response(response))) => {
                        clear_on_next_request = true;
                        if pending.is_empty() {
                            flat_responses.push(response);
                        } else {
                            // One uniquely owned instance per pending
                            // request; the first keeps the original.
                            let mut instances = vec![response];
                            for _ in 1..pending.len() {
                                let copy = instances[0].clone();
                                instances.push(copy);
                            }
                            for (instance, &request_index) in
                                instances.iter_mut().zip(&pending)
                            {
                                instance.request_index = Some(request_index);
                            }
                            flat_responses.extend(instances);
                        }
                    }
                    Ok(Some(Section::Relation(r))) => relation = Some(r),
                    Ok(Some(Section::Parameters(p))) => parameters = Some(p),
                    Ok(Some(Section::Attributes(a))) => attributes = Some(a),
                    Ok(Some(_)) => sink.warn(
                        format!("action {context}"),
                        format!("section {keyword:?} is not expected here"),
                    ),
                    Ok(None) => sink.warn("", format!("section {keyword:?} is unknown")),
                    Err(err) => sink.warn(
                        format!("action {context}"),
                        format!("failed to parse section {keyword:?}: {err}"),
                    ),
                }
            }
            index += 1;
        }

        // Generated names for undeclared requests.
        let mut requests = IndexMap::new();
        let mut generated = 0;
        for mut request in parsed_requests {
            let name = match request.payload.name.clone().filter(|n| !n.is_empty()) {
                Some(name) => name,
                None => {
                    let name = format!("#{generated}");
                    generated += 1;
                    request.payload.name = Some(name.clone());
                    name
                }
            };
            requests.insert(name, request);
        }

        let mut responses: IndexMap<u16, Vec<Response>> = IndexMap::new();
        let mut links = Vec::new();
        for response in flat_responses {
            let bucket = responses.entry(response.http_code).or_default();
            if let Some(request_index) = response.request_index {
                links.push((request_index, response.http_code, bucket.len()));
            }
            bucket.push(response);
        }
        for (request_index, code, bucket_index) in links {
            if let Some((_, request)) = requests.get_index_mut(request_index) {
                request.response_refs.push((code, bucket_index));
            }
        }

        // Requests without their own attributes inherit the action's.
        for request in requests.values_mut() {
            if request.payload.attributes.is_none() {
                request.payload.attributes = attributes.clone();
            }
        }

        let action = Action {
            name: definition.name,
            request_method: definition.method,
            uri_template: definition.template.map(UriTemplate::new),
            description,
            relation,
            parameters,
            attributes,
            requests,
            responses,
            uri: None,
            parent: None,
        };
        Ok((action, index))
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Action")?;
        let middle = [
            self.request_method.as_deref(),
            self.uri_template.as_ref().map(|t| t.as_str()),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
        match &self.name {
            None => {
                if let Some(method) = &self.request_method {
                    write!(f, " {method}")?;
                }
            }
            Some(name) => {
                write!(f, " {name}")?;
                if !middle.is_empty() {
                    write!(f, " [{middle}]")?;
                }
            }
        }
        Ok(())
    }
}

/// An addressable endpoint family identified by URI template and/or
/// name.
#[derive(Clone, Debug)]
pub struct Resource {
    pub(crate) name: Option<String>,
    pub(crate) request_method: Option<String>,
    pub(crate) uri_template: Option<UriTemplate>,
    pub(crate) description: Option<String>,
    pub(crate) parameters: Option<Parameters>,
    pub(crate) attributes: Option<Attributes>,
    pub(crate) model: Option<Model>,
    pub(crate) actions: IndexMap<String, Action>,
    pub(crate) parent: Option<*const ResourceGroup>,
}

impl Resource {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn request_method(&self) -> Option<&str> {
        self.request_method.as_deref()
    }

    pub fn uri_template(&self) -> Option<&UriTemplate> {
        self.uri_template.as_ref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn parameters(&self) -> Option<&Parameters> {
        self.parameters.as_ref()
    }

    pub fn attributes(&self) -> Option<&Attributes> {
        self.attributes.as_ref()
    }

    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    /// Owning group, fixed up after parsing.
    pub fn parent(&self) -> Option<&ResourceGroup> {
        self.parent.map(|ptr| unsafe { &*ptr })
    }

    pub fn id(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => {
                let mut id = String::new();
                if let Some(method) = &self.request_method {
                    id.push_str(method);
                    id.push(' ');
                }
                if let Some(template) = &self.uri_template {
                    id.push_str(template.as_str());
                }
                id.trim().to_string()
            }
        }
    }

    /// URI expanded with this resource's own parameter values.
    pub fn uri(&self) -> Option<String> {
        let template = self.uri_template.as_ref()?;
        Some(template.expand(&parameter_values(&[self.parameters.as_ref()])))
    }

    pub fn get(&self, id: &str) -> Option<&Action> {
        self.actions.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.values()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Resource")?;
        let middle = [
            self.request_method.as_deref(),
            self.uri_template.as_ref().map(|t| t.as_str()),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
        match &self.name {
            Some(name) => {
                write!(f, " {name}")?;
                if !middle.is_empty() {
                    write!(f, " [{middle}]")?;
                }
            }
            None => {
                if !middle.is_empty() {
                    write!(f, " {middle}")?;
                }
            }
        }
        Ok(())
    }
}

/// A named cluster of resources; the implicit group has no name.
#[derive(Clone, Debug, Default)]
pub struct ResourceGroup {
    pub(crate) name: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) resources: IndexMap<String, Resource>,
}

impl ResourceGroup {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn get(&self, id: &str) -> Option<&Resource> {
        self.resources.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl std::fmt::Display for ResourceGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ResourceGroup with {} resources ({} actions)",
            self.len(),
            self.iter().map(Resource::len).sum::<usize>()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/users/{id}", None, None, Some("/users/{id}"))]
    #[case("GET /ping", None, Some("GET"), Some("/ping"))]
    #[case("Users [/users]", Some("Users"), None, Some("/users"))]
    #[case("Users [GET /users]", Some("Users"), Some("GET"), Some("/users"))]
    #[case("Not A Method /x", None, None, Some("Not A Method /x"))]
    fn test_parse_resource_definition(
        #[case] text: &str,
        #[case] name: Option<&str>,
        #[case] method: Option<&str>,
        #[case] template: Option<&str>,
    ) {
        let def = parse_resource_definition(text).unwrap();
        assert_eq!(def.name.as_deref(), name);
        assert_eq!(def.method.as_deref(), method);
        assert_eq!(def.template.as_deref(), template);
    }

    #[rstest]
    #[case("GET", None, Some("GET"), None)]
    #[case("List Users [GET]", Some("List Users"), Some("GET"), None)]
    #[case(
        "List Users [GET /users{?page}]",
        Some("List Users"),
        Some("GET"),
        Some("/users{?page}")
    )]
    fn test_parse_action_definition(
        #[case] text: &str,
        #[case] name: Option<&str>,
        #[case] method: Option<&str>,
        #[case] template: Option<&str>,
    ) {
        let def = parse_action_definition(text).unwrap();
        assert_eq!(def.name.as_deref(), name);
        assert_eq!(def.method.as_deref(), method);
        assert_eq!(def.template.as_deref(), template);
    }

    #[test]
    fn test_unbalanced_bracket_fails() {
        assert!(parse_resource_definition("Users /users]").is_err());
        assert!(parse_action_definition("List GET]").is_err());
    }
}
