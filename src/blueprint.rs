//! The blueprint: structural parsing of the element tree, reference
//! resolution, the path index and the query interface.

use indexmap::IndexMap;

use crate::error::{MergeError, ParseError, ParseOptions, Warning, WarningSink};
use crate::html::serialize_to_html;
use crate::preprocess;
use crate::registry::{self, Section};
use crate::sections::resource::parse_resource_definition;
use crate::sections::{
    Action, Attribute, AttrValue, Attributes, Model, Payload, Resource, ResourceGroup,
    parse_description, section_keyword,
};
use crate::tree::{Element, Tag};
use crate::trie::{ActionKey, PathTrie};
use crate::uri::UriTemplate;

/// Result of an indexed lookup on a blueprint.
#[derive(Debug)]
pub enum Lookup<'a> {
    Group(&'a ResourceGroup),
    Resource(&'a Resource),
    Action(&'a Action),
    Actions(Vec<&'a Action>),
}

impl<'a> Lookup<'a> {
    pub fn as_group(&self) -> Option<&'a ResourceGroup> {
        match self {
            Lookup::Group(group) => Some(*group),
            _ => None,
        }
    }

    pub fn as_resource(&self) -> Option<&'a Resource> {
        match self {
            Lookup::Resource(resource) => Some(*resource),
            _ => None,
        }
    }

    pub fn as_action(&self) -> Option<&'a Action> {
        match self {
            Lookup::Action(action) => Some(*action),
            _ => None,
        }
    }

    pub fn as_actions(&self) -> Option<&[&'a Action]> {
        match self {
            Lookup::Actions(actions) => Some(actions.as_slice()),
            _ => None,
        }
    }
}

/// A parsed API Blueprint document.
#[derive(Debug)]
pub struct Blueprint {
    metadata: IndexMap<String, String>,
    name: String,
    overview: Option<String>,
    groups: IndexMap<Option<String>, ResourceGroup>,
    data_structures: IndexMap<String, Attribute>,
    trie: PathTrie,
    warnings: Vec<Warning>,
}

impl Blueprint {
    /// Parse a Blueprint source document with default options.
    pub fn parse(text: &str) -> Result<Blueprint, ParseError> {
        Self::parse_with(text, ParseOptions::default())
    }

    /// Parse a Blueprint source document: preprocess the lines, build
    /// the element tree, normalise it, then run the structural parser.
    pub fn parse_with(text: &str, options: ParseOptions) -> Result<Blueprint, ParseError> {
        let source = preprocess::preprocess(text);
        let mut root = crate::tree::parse_document(&source);
        let mut sink = WarningSink::new(options.report_warnings);
        preprocess::unwrap_titles(&mut root);
        preprocess::lift_headings(&mut root, &mut sink);
        DocumentParser::new(options, sink).run(&root)
    }

    /// Parse an already normalised element tree.
    pub fn from_tree(root: &Element, options: ParseOptions) -> Result<Blueprint, ParseError> {
        let sink = WarningSink::new(options.report_warnings);
        DocumentParser::new(options, sink).run(root)
    }

    pub fn metadata(&self) -> &IndexMap<String, String> {
        &self.metadata
    }

    pub fn format(&self) -> &str {
        self.metadata
            .get("FORMAT")
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// HTML fragment between the name heading and the first section.
    pub fn overview(&self) -> Option<&str> {
        self.overview.as_deref()
    }

    /// Diagnostics recorded while parsing this document.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Resource groups in source order.
    pub fn iter(&self) -> impl Iterator<Item = &ResourceGroup> {
        self.groups.values()
    }

    /// Group names in source order; the implicit group is `None`.
    pub fn group_names(&self) -> impl Iterator<Item = Option<&str>> {
        self.groups.keys().map(Option::as_deref)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// All resources in source order.
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.iter().flat_map(ResourceGroup::iter)
    }

    /// All actions in source order.
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.resources().flat_map(Resource::iter)
    }

    pub fn count_resources(&self) -> usize {
        self.iter().map(ResourceGroup::len).sum()
    }

    pub fn count_actions(&self) -> usize {
        self.resources().map(Resource::len).sum()
    }

    pub fn data_structures(&self) -> &IndexMap<String, Attribute> {
        &self.data_structures
    }

    /// Indexed lookup. Three key shapes:
    ///
    /// - `">group>resource>action"` walks the owned tree; a leading `">"`
    ///   with an empty segment addresses the implicit group;
    /// - `"/path[:METHOD]"` is a longest-prefix URI lookup, optionally
    ///   narrowed to one method;
    /// - anything else is a direct group name.
    pub fn get(&self, key: &str) -> Option<Lookup<'_>> {
        if key.is_empty() {
            return None;
        }
        if let Some(rest) = key.strip_prefix('>') {
            let parts: Vec<&str> = rest.split('>').collect();
            let group_key = if parts[0].is_empty() {
                None
            } else {
                Some(parts[0].to_string())
            };
            let group = self.groups.get(&group_key)?;
            if parts.len() == 1 {
                return Some(Lookup::Group(group));
            }
            let resource = group.get(parts[1])?;
            if parts.len() == 2 {
                return Some(Lookup::Resource(resource));
            }
            return resource.get(parts[2]).map(Lookup::Action);
        }
        if key.starts_with('/') {
            let (path, method) = match key.find(':') {
                Some(pos) => (&key[..pos], Some(&key[pos + 1..])),
                None => (key, None),
            };
            let path = if path.len() > 1 && path.ends_with('/') {
                &path[..path.len() - 1]
            } else {
                path
            };
            let buckets = self.trie.longest_prefix(path)?;
            let keys: Vec<&ActionKey> = match method {
                Some(method) => buckets.get(method)?.iter().collect(),
                None => buckets.values().flatten().collect(),
            };
            let actions = keys
                .into_iter()
                .filter_map(|key| self.action_by_key(key))
                .collect();
            return Some(Lookup::Actions(actions));
        }
        self.groups
            .get(&Some(key.to_string()))
            .map(Lookup::Group)
    }

    fn action_by_key(&self, key: &ActionKey) -> Option<&Action> {
        self.groups.get(&key.0)?.get(&key.1)?.get(&key.2)
    }

    /// Merge another blueprint into this one. Groups, resources and
    /// actions that are new are deep-copied over; colliding data
    /// structures or action ids refuse the merge before any mutation.
    pub fn merge(&mut self, other: &Blueprint) -> Result<(), MergeError> {
        for key in other.data_structures.keys() {
            if self.data_structures.contains_key(key) {
                return Err(MergeError::DataStructureCollision(key.clone()));
            }
        }
        for (group_key, group) in &other.groups {
            if let Some(mine) = self.groups.get(group_key) {
                for (resource_id, resource) in &group.resources {
                    if let Some(mine) = mine.resources.get(resource_id) {
                        for action_id in resource.actions.keys() {
                            if let Some(action) = mine.actions.get(action_id) {
                                return Err(MergeError::DuplicateAction(action.to_string()));
                            }
                        }
                    }
                }
            }
        }

        if !other.name.is_empty() {
            self.name.push_str(" & ");
            self.name.push_str(&other.name);
        }
        match (&mut self.overview, &other.overview) {
            (Some(mine), Some(theirs)) => {
                mine.push('\n');
                mine.push_str(theirs);
            }
            (mine @ None, Some(theirs)) => *mine = Some(theirs.clone()),
            (_, None) => {}
        }
        for (key, attribute) in &other.data_structures {
            self.data_structures.insert(key.clone(), attribute.clone());
        }
        for (group_key, group) in &other.groups {
            match self.groups.get_mut(group_key) {
                None => {
                    self.groups.insert(group_key.clone(), group.clone());
                }
                Some(mine) => {
                    for (resource_id, resource) in &group.resources {
                        match mine.resources.get_mut(resource_id) {
                            None => {
                                mine.resources
                                    .insert(resource_id.clone(), resource.clone());
                            }
                            Some(mine) => {
                                for (action_id, action) in &resource.actions {
                                    mine.actions.insert(action_id.clone(), action.clone());
                                }
                            }
                        }
                    }
                }
            }
        }
        self.reset_trie();
        self.fix_parents();
        Ok(())
    }

    /// Rebuild the path index from every action with an expandable URI.
    /// The root `"/"` indexes all of them.
    fn reset_trie(&mut self) {
        let mut trie = PathTrie::default();
        for (group_key, group) in &self.groups {
            for (resource_id, resource) in &group.resources {
                for (action_id, action) in &resource.actions {
                    if let Some(uri) = action.uri() {
                        let method = action.request_method().unwrap_or_default();
                        trie.insert_uri(
                            uri,
                            method,
                            (group_key.clone(), resource_id.clone(), action_id.clone()),
                        );
                    }
                }
            }
        }
        self.trie = trie;
    }

    /// Rewrite every parent back-pointer. Runs after parsing and after
    /// every structural change; the graph is read-only in between, so
    /// the pointers stay valid while the owning maps do not reallocate.
    fn fix_parents(&mut self) {
        for group in self.groups.values_mut() {
            let group_ptr = group as *const ResourceGroup;
            for resource in group.resources.values_mut() {
                resource.parent = Some(group_ptr);
                let resource_ptr = resource as *const Resource;
                if let Some(attributes) = &mut resource.attributes {
                    fix_attributes(attributes);
                }
                if let Some(model) = &mut resource.model {
                    model.parent = Some(resource_ptr);
                    if let Some(attributes) = &mut model.payload.attributes {
                        fix_attributes(attributes);
                    }
                }
                for action in resource.actions.values_mut() {
                    action.parent = Some(resource_ptr);
                    let action_ptr = action as *const Action;
                    if let Some(attributes) = &mut action.attributes {
                        fix_attributes(attributes);
                    }
                    for request in action.requests.values_mut() {
                        request.parent = Some(action_ptr);
                        if let Some(attributes) = &mut request.payload.attributes {
                            fix_attributes(attributes);
                        }
                    }
                    for bucket in action.responses.values_mut() {
                        for response in bucket {
                            response.parent = Some(action_ptr);
                            if let Some(attributes) = &mut response.payload.attributes {
                                fix_attributes(attributes);
                            }
                        }
                    }
                }
            }
        }
        for attribute in self.data_structures.values_mut() {
            fix_attribute_tree(attribute);
        }
    }
}

fn fix_attributes(attributes: &mut Attributes) {
    for child in attributes.children_mut() {
        fix_attribute_tree(child);
    }
}

fn fix_attribute_tree(attribute: &mut Attribute) {
    let parent_ptr = attribute as *const Attribute;
    if let Some(AttrValue::List(children)) = &mut attribute.value {
        for child in children {
            child.parent = Some(parent_ptr);
            fix_attribute_tree(child);
        }
    }
}

impl std::fmt::Display for Blueprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Blueprint \"{}\", format {}, with {} resource groups ({} resources, {} actions)",
            self.name,
            self.format(),
            self.len(),
            self.count_resources(),
            self.count_actions()
        )
    }
}

/// One structural parse. Owns the warning sink and the two symbol
/// tables the resolution passes need.
struct DocumentParser {
    options: ParseOptions,
    sink: WarningSink,
    groups: IndexMap<Option<String>, ResourceGroup>,
    data_structures: IndexMap<String, Attribute>,
    /// Resource name to its attributes, as parsed.
    resource_attributes: IndexMap<String, Attributes>,
    /// Resource name to its model.
    models: IndexMap<String, Model>,
}

impl DocumentParser {
    fn new(options: ParseOptions, sink: WarningSink) -> Self {
        Self {
            options,
            sink,
            groups: IndexMap::new(),
            data_structures: IndexMap::new(),
            resource_attributes: IndexMap::new(),
            models: IndexMap::new(),
        }
    }

    fn run(mut self, root: &Element) -> Result<Blueprint, ParseError> {
        let children: Vec<&Element> = root.children.iter().collect();
        if children.len() < 3 {
            return Err(ParseError::TooShort);
        }

        if children[0].tag != Tag::P {
            return Err(ParseError::MissingMetadata);
        }
        let mut metadata = IndexMap::new();
        for line in children[0].text.split('\n') {
            let colon = line.find(':').filter(|&pos| pos > 0);
            let Some(colon) = colon else {
                return Err(ParseError::InvalidMetadata(line.to_string()));
            };
            metadata.insert(
                line[..colon].to_string(),
                line[colon + 1..].trim().to_string(),
            );
        }
        if !metadata.contains_key("FORMAT") {
            return Err(ParseError::MissingFormat);
        }

        if children[1].tag != Tag::Heading(1) {
            return Err(ParseError::MissingName);
        }
        let name = children[1].text.clone();

        let (overview, mut index) = parse_description(&children, 2, &[Tag::Heading(1)]);

        // Partition the rest into top-level windows: each window opens
        // at a heading and closes at the next heading of equal or lower
        // level.
        if index < children.len() {
            let mut sequence: Vec<&Element> = vec![children[index]];
            let mut window_level = children[index].heading_level().unwrap_or(6);
            index += 1;
            while index < children.len() {
                let item = children[index];
                if let Some(level) = item.heading_level() {
                    if level <= window_level {
                        self.parse_window(&sequence);
                        sequence.clear();
                        window_level = level;
                    }
                }
                sequence.push(item);
                index += 1;
            }
            self.parse_window(&sequence);
        }

        self.resolve_data_structure_references();
        self.resolve_attribute_references();
        self.compute_uris();

        let mut blueprint = Blueprint {
            metadata,
            name,
            overview,
            groups: self.groups,
            data_structures: self.data_structures,
            trie: PathTrie::default(),
            warnings: self.sink.into_warnings(),
        };
        blueprint.reset_trie();
        blueprint.fix_parents();
        Ok(blueprint)
    }

    fn parse_window(&mut self, sequence: &[&Element]) {
        let head = sequence[0];
        if is_group_heading(head) {
            self.parse_resource_group(sequence);
        } else if is_data_structures_heading(head) {
            self.parse_data_structures(sequence);
        } else {
            self.parse_resource(sequence, None);
        }
    }

    fn parse_resource_group(&mut self, sequence: &[&Element]) {
        let text = sequence[0].text.as_str();
        let name = text
            .strip_prefix("Group")
            .unwrap_or(text)
            .trim()
            .to_string();
        let level = sequence[0].heading_level().unwrap_or(5);
        let (description, index) =
            parse_description(sequence, 1, &[Tag::Heading((level + 1).min(6))]);
        let key = Some(name.clone());
        self.groups.insert(
            key.clone(),
            ResourceGroup {
                name: Some(name),
                description,
                resources: IndexMap::new(),
            },
        );
        if sequence.len() <= index {
            return;
        }

        let mut children: Vec<&Element> = vec![sequence[index]];
        let mut window_level = sequence[index].heading_level().unwrap_or(6);
        for item in &sequence[index + 1..] {
            if let Some(level) = item.heading_level() {
                if level <= window_level {
                    self.parse_resource(&children, key.clone());
                    children.clear();
                    window_level = level;
                }
            }
            children.push(item);
        }
        if !children.is_empty() {
            self.parse_resource(&children, key);
        }
    }

    fn parse_resource(&mut self, sequence: &[&Element], group_key: Option<String>) {
        self.groups.entry(group_key.clone()).or_default();

        let definition = match parse_resource_definition(&sequence[0].text) {
            Ok(definition) => definition,
            Err(err) => {
                self.sink.warn(
                    "resource",
                    format!("invalid definition {:?}: {err}", sequence[0].text),
                );
                return;
            }
        };
        let context = definition
            .name
            .clone()
            .unwrap_or_else(|| sequence[0].text.clone());
        let level = sequence[0].heading_level().unwrap_or(5);
        let (mut description, mut index) = parse_description(
            sequence,
            1,
            &[Tag::Heading((level + 1).min(6)), Tag::Ul],
        );
        if sequence.len() <= index {
            self.sink
                .warn("", format!("skipping empty resource {context}"));
            return;
        }

        let mut parameters = None;
        let mut attributes = None;
        let mut model = None;
        let mut wrong_kind = false;
        let mut leftover_items: Vec<String> = Vec::new();
        if matches!(sequence[index].tag, Tag::Ul | Tag::Ol) {
            for item in &sequence[index].children {
                let keyword = section_keyword(&item.text).to_string();
                match registry::dispatch(item, &mut self.sink) {
                    Ok(Some(Section::Parameters(p))) => parameters = Some(p),
                    Ok(Some(Section::Attributes(a))) => attributes = Some(a),
                    Ok(Some(Section::Model(m))) => model = Some(m),
                    Ok(Some(_)) => wrong_kind = true,
                    Ok(None) => leftover_items.push(serialize_to_html(item)),
                    Err(err) => self.sink.warn(
                        format!("resource {context}"),
                        format!("failed to parse section {keyword:?}: {err}"),
                    ),
                }
            }
            index += 1;
        }
        // Bullet items no parser claimed stay in the description.
        if !leftover_items.is_empty() {
            let mut text = description.unwrap_or_default();
            text.push_str("<ul>\n");
            for item in &leftover_items {
                text.push_str(item);
                text.push('\n');
            }
            text.push_str("</ul>");
            description = Some(text);
        }
        if wrong_kind {
            self.sink.warn(
                format!("resource {context}"),
                "payload-level sections found at resource level".to_string(),
            );
            parameters = None;
            attributes = None;
            model = None;
        }

        let mut resource = Resource {
            name: definition.name,
            request_method: definition.method,
            uri_template: definition.template.map(UriTemplate::new),
            description,
            parameters,
            attributes,
            model,
            actions: IndexMap::new(),
            parent: None,
        };
        if let Some(name) = &resource.name {
            if let Some(model) = &resource.model {
                self.models.insert(name.clone(), model.clone());
            }
            if let Some(attributes) = &resource.attributes {
                self.resource_attributes
                    .insert(name.clone(), attributes.clone());
            }
        }

        if sequence.len() <= index {
            if wrong_kind && self.options.implicit_actions {
                if let Ok((mut action, _)) =
                    Action::parse_from_etree(sequence, 0, &mut self.sink)
                {
                    action.name = resource.name.clone();
                    action.request_method = resource.request_method.clone();
                    action.uri_template = resource.uri_template.clone();
                    self.sink
                        .warn("", format!("assumed single implicit action in {resource}"));
                    resource.actions.insert(action.id(), action);
                }
            }
            self.insert_resource(group_key, resource);
            return;
        }

        while index < sequence.len() && sequence[index].is_heading() {
            match Action::parse_from_etree(sequence, index, &mut self.sink) {
                Err(err) => {
                    self.sink.warn(
                        format!("resource {context}"),
                        format!("failed to parse action: {err}"),
                    );
                    index += 1;
                }
                Ok((mut action, next_index)) => {
                    index = next_index;
                    if action.uri_template.is_none() {
                        action.uri_template = resource.uri_template.clone();
                    }
                    if action.request_method.is_none() {
                        action.request_method = resource.request_method.clone();
                    }
                    self.resolve_model_references(&mut action);
                    resource.actions.insert(action.id(), action);
                }
            }
        }
        self.insert_resource(group_key, resource);
    }

    fn insert_resource(&mut self, group_key: Option<String>, resource: Resource) {
        let group = self.groups.entry(group_key).or_default();
        group.resources.insert(resource.id(), resource);
    }

    /// `[Name][]` payloads copy the named resource's model. Models are
    /// visible to every action parsed after the declaring resource.
    fn resolve_model_references(&mut self, action: &mut Action) {
        let models = &self.models;
        let sink = &mut self.sink;
        let mut resolve = |payload: &mut Payload| {
            let Some(reference) = payload.reference().map(str::to_string) else {
                return;
            };
            match models.get(&reference) {
                Some(model) => payload.copy_from(&model.payload),
                None => sink.warn("", format!("bad reference: {reference}")),
            }
        };
        for request in action.requests.values_mut() {
            resolve(&mut request.payload);
        }
        for bucket in action.responses.values_mut() {
            for response in bucket {
                resolve(&mut response.payload);
            }
        }
    }

    fn parse_data_structures(&mut self, sequence: &[&Element]) {
        let mut index = 1;
        while index < sequence.len() {
            let heading = sequence[index];
            index += 1;
            let mut node = Element {
                tag: heading.tag,
                text: heading.text.clone(),
                children: Vec::new(),
            };
            while index < sequence.len() && !sequence[index].is_heading() {
                node.children.push(sequence[index].clone());
                index += 1;
            }
            match Attribute::parse_data_structure(&node) {
                Ok(attribute) => {
                    let name = attribute.name().unwrap_or_default().to_string();
                    self.data_structures.insert(name, attribute);
                }
                Err(err) => self.sink.warn(
                    "data structures",
                    format!("failed to parse {:?}: {err}", heading.text),
                ),
            }
        }
    }

    /// Data-structure entries that were bare references are replaced by
    /// the referenced resource's attributes.
    fn resolve_data_structure_references(&mut self) {
        let keys: Vec<String> = self.data_structures.keys().cloned().collect();
        for key in keys {
            let Some(reference) = self.data_structures[&key].reference.clone() else {
                continue;
            };
            match self.resource_attributes.get(&reference) {
                Some(attributes) => {
                    let replacement = Attribute::new(
                        Some(key.clone()),
                        None,
                        crate::sections::Requirement::Unknown,
                        None,
                        Some(AttrValue::List(attributes.iter().cloned().collect())),
                    );
                    self.data_structures.insert(key, replacement);
                }
                None => {
                    self.sink.warn(
                        "data structures",
                        format!("invalid attributes reference: {reference}"),
                    );
                    self.data_structures.shift_remove(&key);
                }
            }
        }
    }

    /// Resolve `Attributes (Name)` references on resources and actions
    /// against the resource-attributes table, then the data structures.
    fn resolve_attribute_references(&mut self) {
        let resource_attributes = &self.resource_attributes;
        let data_structures = &self.data_structures;
        let sink = &mut self.sink;

        let lookup = |reference: &str| -> Option<Attributes> {
            if let Some(attributes) = resource_attributes.get(reference) {
                return Some(attributes.clone());
            }
            data_structures.get(reference).map(|attribute| {
                let children = match &attribute.value {
                    Some(AttrValue::List(children)) => children.clone(),
                    _ => Vec::new(),
                };
                Attributes::from_children(children)
            })
        };

        for group in self.groups.values_mut() {
            for resource in group.resources.values_mut() {
                if let Some(reference) = resource
                    .attributes
                    .as_ref()
                    .and_then(|a| a.reference())
                    .map(str::to_string)
                {
                    resource.attributes = lookup(&reference);
                    if resource.attributes.is_none() {
                        sink.warn("", format!("invalid attributes reference: {reference}"));
                    }
                }
                for action in resource.actions.values_mut() {
                    let Some(reference) = action
                        .attributes
                        .as_ref()
                        .and_then(|a| a.reference())
                        .map(str::to_string)
                    else {
                        continue;
                    };
                    let old = action.attributes.clone();
                    action.attributes = lookup(&reference);
                    if action.attributes.is_none() {
                        sink.warn("", format!("invalid attributes reference: {reference}"));
                    }
                    // Requests that inherited the unresolved reference
                    // follow the action's resolution.
                    for request in action.requests.values_mut() {
                        if request.payload.attributes == old {
                            request.payload.attributes = action.attributes.clone();
                        }
                    }
                }
            }
        }
    }

    /// Expand every action URI from its template and the parameter
    /// values of the action and its resource.
    fn compute_uris(&mut self) {
        for group in self.groups.values_mut() {
            for resource in group.resources.values_mut() {
                let Resource {
                    parameters,
                    actions,
                    ..
                } = resource;
                for action in actions.values_mut() {
                    action.compute_uri(parameters.as_ref());
                }
            }
        }
    }
}

fn is_group_heading(element: &Element) -> bool {
    element.is_heading() && element.text.starts_with("Group")
}

fn is_data_structures_heading(element: &Element) -> bool {
    element.is_heading() && element.text == "Data Structures"
}
