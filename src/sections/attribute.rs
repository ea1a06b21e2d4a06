//! Attribute and parameter sections.
//!
//! An attribute line reads, in order: an optional leading bullet, an
//! optional `- description` tail, an optional `(type[, required|optional])`
//! suffix and finally `name[: value]`. Array-typed attributes expand a
//! comma-separated value into child attributes carrying the bracketed
//! subtype.

use indexmap::IndexMap;

use super::{extract_reference, parse_child_description};
use crate::error::SectionError;
use crate::tree::{Element, Tag};

/// Three-valued requirement flag. `Unknown` is not `Optional`: an
/// attribute without an explicit flag falls back to the schema default.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Requirement {
    Required,
    Optional,
    Unknown,
}

impl Requirement {
    pub fn is_required(&self) -> bool {
        matches!(self, Requirement::Required)
    }
}

/// An attribute value is either a literal or a list of child attributes.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Text(String),
    List(Vec<Attribute>),
}

#[derive(Clone, Debug)]
pub struct Attribute {
    pub(crate) name: Option<String>,
    pub(crate) type_name: String,
    pub(crate) required: Requirement,
    pub(crate) description: Option<String>,
    pub(crate) value: Option<AttrValue>,
    pub(crate) reference: Option<String>,
    pub(crate) parent: Option<*const Attribute>,
}

impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.type_name == other.type_name
            && self.required == other.required
            && self.description == other.description
            && self.value == other.value
            && self.reference == other.reference
    }
}

impl Attribute {
    pub(crate) fn new(
        name: Option<String>,
        type_name: Option<String>,
        required: Requirement,
        description: Option<String>,
        value: Option<AttrValue>,
    ) -> Self {
        Self {
            name,
            type_name: type_name.unwrap_or_else(|| "object".to_string()),
            required,
            description,
            value,
            reference: None,
            parent: None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn required(&self) -> Requirement {
        self.required
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn value(&self) -> Option<&AttrValue> {
        self.value.as_ref()
    }

    /// Set for data-structure entries whose body is a bare `[Name][]`.
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn is_array(&self) -> bool {
        self.type_name.starts_with("array")
    }

    /// Enclosing attribute for nested values, fixed up after parsing.
    pub fn parent(&self) -> Option<&Attribute> {
        self.parent.map(|ptr| unsafe { &*ptr })
    }

    /// `array[T]` carries the bracketed subtype; bare `array` means
    /// `object` elements.
    pub fn extract_array_subtype(type_name: &str) -> Result<String, SectionError> {
        if !type_name.starts_with("array") {
            return Err(SectionError::NotArray(type_name.to_string()));
        }
        let subtype = &type_name["array".len()..];
        if subtype.is_empty() {
            return Ok("object".to_string());
        }
        if !subtype.starts_with('[') || !subtype.ends_with(']') {
            return Err(SectionError::TypeFormat(type_name.to_string()));
        }
        Ok(subtype[1..subtype.len() - 1].to_string())
    }

    pub fn parse_from_string(line: &str) -> Result<Attribute, SectionError> {
        let mut line = line.trim();
        if line.starts_with(['-', '+']) {
            line = line[1..].trim_start();
        }
        let description = match line.rfind('-') {
            Some(pos) => {
                let tail = line[pos + 1..].trim().to_string();
                line = line[..pos].trim_end();
                Some(tail).filter(|t| !t.is_empty())
            }
            None => None,
        };
        let (type_name, required) = if line.ends_with(')') {
            let open = line
                .rfind('(')
                .ok_or_else(|| SectionError::TypeFormat(line.to_string()))?;
            let mut type_name = line[open + 1..line.len() - 1].trim().to_string();
            line = line[..open].trim_end();
            let required = match type_name.rfind(',') {
                Some(comma) => {
                    let word = type_name[comma + 1..].trim().to_string();
                    type_name = type_name[..comma].trim_end().to_string();
                    if word == "required" {
                        Requirement::Required
                    } else {
                        Requirement::Optional
                    }
                }
                None => Requirement::Unknown,
            };
            (Some(type_name), required)
        } else {
            (None, Requirement::Unknown)
        };
        let (name, value) = match line.find(':') {
            Some(colon) => {
                let name = line[..colon].trim().to_string();
                let value = line[colon + 1..].trim().to_string();
                (name, Some(value).filter(|v| !v.is_empty()))
            }
            None => (line.trim().to_string(), None),
        };
        let name = Some(name).filter(|n| !n.is_empty());

        let value = match value {
            Some(text) => match type_name
                .as_deref()
                .map(Attribute::extract_array_subtype)
            {
                Some(Ok(subtype)) => Some(AttrValue::List(
                    text.split(',')
                        .map(|piece| {
                            Attribute::new(
                                None,
                                Some(subtype.clone()),
                                Requirement::Unknown,
                                None,
                                Some(AttrValue::Text(piece.trim().to_string())),
                            )
                        })
                        .collect(),
                )),
                _ => Some(AttrValue::Text(text)),
            },
            None => None,
        };

        Ok(Attribute::new(name, type_name, required, description, value))
    }

    pub fn parse_from_etree(node: &Element) -> Result<Attribute, SectionError> {
        let mut attr = Attribute::parse_from_string(&node.text)?;
        let (description, index) = parse_child_description(node, 0, &[Tag::Ul]);
        attr.description = merge_descriptions(attr.description.take(), description);
        if node.children.len() <= index {
            return Ok(attr);
        }
        if attr.value.is_some() {
            return Err(SectionError::MultipleValues(
                attr.name.clone().unwrap_or_default(),
            ));
        }
        let mut children = node.children[index]
            .children
            .iter()
            .map(Attribute::parse_from_etree)
            .collect::<Result<Vec<_>, _>>()?;
        if attr.is_array() {
            if let Ok(subtype) = Attribute::extract_array_subtype(&attr.type_name) {
                for child in &mut children {
                    if child.type_name == "object" {
                        child.type_name = subtype.clone();
                    }
                }
            }
        }
        attr.value = Some(AttrValue::List(children));
        Ok(attr)
    }

    /// Data-structure entry: a plain attribute, unless its sole child is
    /// a paragraph holding a `[Name][]` reference.
    pub(crate) fn parse_data_structure(node: &Element) -> Result<Attribute, SectionError> {
        let mut attr = Attribute::parse_from_etree(node)?;
        if node.children.len() == 1
            && matches!(node.children[0].tag, Tag::P | Tag::Pre)
        {
            if let Some(reference) = extract_reference(&node.children[0].text) {
                attr.description = None;
                attr.reference = Some(reference.to_string());
                attr.value = None;
            }
        }
        Ok(attr)
    }
}

impl std::fmt::Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = self.name.clone().unwrap_or_default();
        if let Some(AttrValue::Text(value)) = &self.value {
            out.push_str(": ");
            out.push_str(value);
        }
        out.push_str(" (");
        out.push_str(&self.type_name);
        match self.required {
            Requirement::Required => out.push_str(", required"),
            Requirement::Optional => out.push_str(", optional"),
            Requirement::Unknown => {}
        }
        out.push(')');
        if let Some(description) = &self.description {
            out.push_str(" - ");
            out.push_str(&description.replace('\n', " "));
        }
        if let Some(AttrValue::List(children)) = &self.value {
            out.push('\n');
            for child in children {
                for line in child.to_string().lines() {
                    out.push_str("  ");
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        f.write_str(out.trim_end_matches('\n'))
    }
}

fn merge_descriptions(inline: Option<String>, block: Option<String>) -> Option<String> {
    match (inline, block) {
        (None, block) => block,
        (inline, None) => inline,
        (Some(inline), Some(block)) => Some(format!("{inline}\n{block}")),
    }
}

/// An ordered collection of attributes, or a bare `Attributes (Name)`
/// reference to be resolved after the structural pass.
#[derive(Clone, Debug, Default)]
pub struct Attributes {
    children: IndexMap<String, Attribute>,
    reference: Option<String>,
}

impl PartialEq for Attributes {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(other.children.iter())
                .all(|((ka, va), (kb, vb))| ka == kb && va == vb)
    }
}

impl Attributes {
    pub(crate) fn from_children(children: Vec<Attribute>) -> Self {
        let children = children
            .into_iter()
            .map(|child| (child.name.clone().unwrap_or_default(), child))
            .collect();
        Self {
            children,
            reference: None,
        }
    }

    pub(crate) fn from_reference(reference: String) -> Self {
        Self {
            children: IndexMap::new(),
            reference: Some(reference),
        }
    }

    pub fn parse_from_etree(node: &Element) -> Result<Self, SectionError> {
        match parse_collection(node, Attribute::parse_from_etree) {
            Ok(children) => Ok(Self::from_children(children)),
            Err(err) => {
                if node.text.trim_end().ends_with(')') {
                    let text = node.text.trim_end();
                    if let Some(open) = text.rfind('(') {
                        return Ok(Self::from_reference(
                            text[open + 1..text.len() - 1].to_string(),
                        ));
                    }
                }
                Err(err)
            }
        }
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.children.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.children.values()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub(crate) fn children_mut(&mut self) -> impl Iterator<Item = &mut Attribute> {
        self.children.values_mut()
    }
}

impl std::fmt::Display for Attributes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Attributes with {} items", self.children.len())
    }
}

fn parse_collection<T>(
    node: &Element,
    parse_child: impl Fn(&Element) -> Result<T, SectionError>,
) -> Result<Vec<T>, SectionError> {
    let list = node
        .children
        .first()
        .filter(|child| child.tag == Tag::Ul)
        .ok_or(SectionError::Format("collection"))?;
    list.children.iter().map(parse_child).collect()
}

/// One `+ Members` entry of a parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterMember {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl ParameterMember {
    pub(crate) fn parse_from_string(line: &str) -> Result<Self, SectionError> {
        let attr = Attribute::parse_from_string(line)?;
        Ok(Self {
            name: attr.name,
            description: attr.description,
        })
    }
}

impl std::fmt::Display for ParameterMember {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} - {}",
            self.name.as_deref().unwrap_or_default(),
            self.description.as_deref().unwrap_or_default()
        )
    }
}

/// A URI parameter: an attribute plus an optional default value and an
/// optional member enumeration.
#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub(crate) name: Option<String>,
    pub(crate) type_name: String,
    pub(crate) required: Requirement,
    pub(crate) description: Option<String>,
    pub(crate) value: Option<AttrValue>,
    pub(crate) default_value: Option<String>,
    pub(crate) members: Vec<ParameterMember>,
}

impl Parameter {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn required(&self) -> Requirement {
        self.required
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn value(&self) -> Option<&AttrValue> {
        self.value.as_ref()
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    pub fn members(&self) -> &[ParameterMember] {
        &self.members
    }

    pub fn parse_from_etree(node: &Element) -> Result<Self, SectionError> {
        let attr = Attribute::parse_from_string(&node.text)?;
        let (description, index) = parse_child_description(node, 0, &[Tag::Ul]);
        let description = merge_descriptions(attr.description.clone(), description);
        let mut default_value = None;
        let mut members = Vec::new();
        if let Some(list) = node.children.get(index) {
            for item in &list.children {
                if item.text.starts_with("Default") {
                    if attr.required != Requirement::Optional {
                        return Err(SectionError::DefaultOnRequired(
                            attr.name.clone().unwrap_or_default(),
                        ));
                    }
                    let sep = item
                        .text
                        .find(':')
                        .ok_or(SectionError::Format("parameter"))?;
                    default_value = Some(item.text[sep + 1..].trim().to_string());
                } else if item.text.starts_with("Members") {
                    let list = item
                        .children
                        .first()
                        .filter(|child| child.tag == Tag::Ul)
                        .ok_or(SectionError::Format("parameter members"))?;
                    members = list
                        .children
                        .iter()
                        .map(|member| ParameterMember::parse_from_string(&member.text))
                        .collect::<Result<Vec<_>, _>>()?;
                }
            }
        }
        Ok(Self {
            name: attr.name,
            type_name: attr.type_name,
            required: attr.required,
            description,
            value: attr.value,
            default_value,
            members,
        })
    }
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let attr = Attribute {
            name: self.name.clone(),
            type_name: self.type_name.clone(),
            required: self.required,
            description: self.description.clone(),
            value: self.value.clone(),
            reference: None,
            parent: None,
        };
        attr.fmt(f)
    }
}

/// The `+ Parameters` collection of a resource or action.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Parameters {
    children: IndexMap<String, Parameter>,
}

impl Parameters {
    pub fn parse_from_etree(node: &Element) -> Result<Self, SectionError> {
        let children = parse_collection(node, Parameter::parse_from_etree)?;
        let children = children
            .into_iter()
            .map(|child| (child.name.clone().unwrap_or_default(), child))
            .collect();
        Ok(Self { children })
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.children.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.children.values()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl std::fmt::Display for Parameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parameters with {} items", self.children.len())
    }
}
