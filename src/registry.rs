//! The section registry: one process-wide mapping from section keywords
//! to self-parsers, assembled eagerly in a single deterministic order
//! before the first parse. Registering the same keyword twice is a
//! programming error and panics at initialisation.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::error::{SectionError, WarningSink};
use crate::sections::{
    Attributes, Body, Headers, Model, Parameters, Relation, Request, Response, Schema,
    section_keyword,
};
use crate::tree::Element;

/// A parsed nested section, tagged by kind.
#[derive(Clone, Debug)]
pub enum Section {
    Parameters(Parameters),
    Attributes(Attributes),
    Headers(Headers),
    Body(Body),
    Schema(Schema),
    Model(Model),
    Request(Request),
    Response(Response),
    Relation(Relation),
}

type SectionParser = fn(&Element, &mut WarningSink) -> Result<Section, SectionError>;

fn parse_parameters(node: &Element, _sink: &mut WarningSink) -> Result<Section, SectionError> {
    Parameters::parse_from_etree(node).map(Section::Parameters)
}

fn parse_attributes(node: &Element, _sink: &mut WarningSink) -> Result<Section, SectionError> {
    Attributes::parse_from_etree(node).map(Section::Attributes)
}

fn parse_headers(node: &Element, _sink: &mut WarningSink) -> Result<Section, SectionError> {
    Headers::parse_from_etree(node).map(Section::Headers)
}

fn parse_body(node: &Element, _sink: &mut WarningSink) -> Result<Section, SectionError> {
    Body::parse_from_etree(node).map(Section::Body)
}

fn parse_schema(node: &Element, _sink: &mut WarningSink) -> Result<Section, SectionError> {
    Schema::parse_from_etree(node).map(Section::Schema)
}

fn parse_model(node: &Element, sink: &mut WarningSink) -> Result<Section, SectionError> {
    Model::parse_from_etree(node, sink).map(Section::Model)
}

fn parse_request(node: &Element, sink: &mut WarningSink) -> Result<Section, SectionError> {
    Request::parse_from_etree(node, sink).map(Section::Request)
}

fn parse_response(node: &Element, sink: &mut WarningSink) -> Result<Section, SectionError> {
    Response::parse_from_etree(node, sink).map(Section::Response)
}

fn parse_relation(node: &Element, _sink: &mut WarningSink) -> Result<Section, SectionError> {
    Relation::parse_from_etree(node).map(Section::Relation)
}

/// Keyword aliases and their parsers, in registration order.
const ENTRIES: &[(&[&str], SectionParser)] = &[
    (&["Parameters", "Parameter"], parse_parameters),
    (&["Attributes", "Attribute"], parse_attributes),
    (&["Headers", "Header"], parse_headers),
    (&["Body"], parse_body),
    (&["Schema"], parse_schema),
    (&["Model"], parse_model),
    (&["Request"], parse_request),
    (&["Response"], parse_response),
    (&["Relation"], parse_relation),
];

static REGISTRY: LazyLock<HashMap<&'static str, SectionParser>> = LazyLock::new(|| {
    let mut registry = HashMap::new();
    for (aliases, parser) in ENTRIES {
        for alias in *aliases {
            let previous = registry.insert(*alias, *parser);
            assert!(
                previous.is_none(),
                "duplicate section registration: {alias}"
            );
        }
    }
    registry
});

/// Dispatch a list item to the parser registered for its leading
/// keyword. `Ok(None)` means the keyword is unknown.
pub(crate) fn dispatch(
    node: &Element,
    sink: &mut WarningSink,
) -> Result<Option<Section>, SectionError> {
    match REGISTRY.get(section_keyword(&node.text)) {
        Some(parser) => parser(node, sink).map(Some),
        None => Ok(None),
    }
}
