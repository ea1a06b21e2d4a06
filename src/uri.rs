//! RFC 6570 URI template expansion, the subset Blueprint documents use:
//! simple expansion plus the `+`, `#`, `/`, `.`, `?` and `&` operators.

use indexmap::IndexMap;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use regex::Regex;

/// Everything but unreserved characters gets percent-encoded.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Reserved expansion additionally passes the reserved set through.
const RESERVED: &AsciiSet = &UNRESERVED
    .remove(b':')
    .remove(b'/')
    .remove(b'?')
    .remove(b'#')
    .remove(b'[')
    .remove(b']')
    .remove(b'@')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=');

/// A parsed-enough URI template: the raw string plus expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    raw: String,
}

impl UriTemplate {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Expand the template with the given variable values. Variables
    /// without a value expand to nothing; form-style parameters without a
    /// value are omitted entirely.
    pub fn expand(&self, values: &IndexMap<String, String>) -> String {
        let expr = Regex::new(r"\{([^{}]*)\}").unwrap();
        expr.replace_all(&self.raw, |caps: &regex::Captures| {
            expand_expression(&caps[1], values)
        })
        .into_owned()
    }
}

impl std::fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn expand_expression(expression: &str, values: &IndexMap<String, String>) -> String {
    let (operator, spec) = match expression.chars().next() {
        Some(op @ ('+' | '#' | '/' | '.' | '?' | '&')) => (Some(op), &expression[op.len_utf8()..]),
        _ => (None, expression),
    };
    let set = if matches!(operator, Some('+') | Some('#')) {
        RESERVED
    } else {
        UNRESERVED
    };

    // Value modifiers (`:n`, `*`) are accepted and ignored.
    let names = spec.split(',').map(|name| {
        name.trim()
            .trim_end_matches('*')
            .split(':')
            .next()
            .unwrap_or("")
    });

    match operator {
        Some('?') | Some('&') => {
            let pairs: Vec<String> = names
                .filter_map(|name| {
                    values
                        .get(name)
                        .map(|v| format!("{name}={}", utf8_percent_encode(v, set)))
                })
                .collect();
            if pairs.is_empty() {
                return String::new();
            }
            let lead = if operator == Some('?') { '?' } else { '&' };
            format!("{lead}{}", pairs.join("&"))
        }
        Some(op @ ('/' | '.')) => {
            let parts: Vec<String> = names
                .filter_map(|name| {
                    values
                        .get(name)
                        .map(|v| utf8_percent_encode(v, set).to_string())
                })
                .collect();
            if parts.is_empty() {
                return String::new();
            }
            format!("{op}{}", parts.join(&op.to_string()))
        }
        Some('#') => {
            let parts: Vec<String> = names
                .filter_map(|name| {
                    values
                        .get(name)
                        .map(|v| utf8_percent_encode(v, set).to_string())
                })
                .collect();
            if parts.is_empty() {
                return String::new();
            }
            format!("#{}", parts.join(","))
        }
        _ => names
            .filter_map(|name| {
                values
                    .get(name)
                    .map(|v| utf8_percent_encode(v, set).to_string())
            })
            .collect::<Vec<_>>()
            .join(","),
    }
}
