//! JSON path selection over `serde_json::Value`.
//!
//! Supported syntax: `$`, `.name`, `['name']`, `..name`, `..*`, `[n]`,
//! `[*]` and `.*`. Filters and slices are not supported.

use serde_json::Value;

use crate::error::{LoaderError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Child(String),
    Index(usize),
    Wildcard,
    Descendant(String),
    DescendantWildcard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn parse(expression: &str) -> Result<Self> {
        let invalid = || LoaderError::InvalidJsonPath(expression.to_string());
        let trimmed = expression.trim();
        let mut rest = trimmed.strip_prefix('$').ok_or_else(invalid)?;
        let mut segments = Vec::new();

        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix("..") {
                let (name, tail) = take_name(after);
                segments.push(match name {
                    "" => return Err(invalid()),
                    "*" => Segment::DescendantWildcard,
                    _ => Segment::Descendant(name.to_string()),
                });
                rest = tail;
            } else if let Some(after) = rest.strip_prefix('.') {
                let (name, tail) = take_name(after);
                segments.push(match name {
                    "" => return Err(invalid()),
                    "*" => Segment::Wildcard,
                    _ => Segment::Child(name.to_string()),
                });
                rest = tail;
            } else if let Some(after) = rest.strip_prefix('[') {
                let close = after.find(']').ok_or_else(invalid)?;
                let inner = after[..close].trim();
                segments.push(parse_bracket(inner).ok_or_else(invalid)?);
                rest = &after[close + 1..];
            } else {
                return Err(invalid());
            }
        }

        Ok(Self {
            segments,
        })
    }

    /// All values selected by this path, in document order
    pub fn select<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![root];
        for segment in &self.segments {
            let mut next = Vec::new();
            for value in current {
                match segment {
                    Segment::Child(name) => next.extend(value.get(name.as_str())),
                    Segment::Index(i) => next.extend(value.as_array().and_then(|a| a.get(*i))),
                    Segment::Wildcard => next.extend(children(value)),
                    Segment::Descendant(name) => collect_named(value, name, &mut next),
                    Segment::DescendantWildcard => collect_all(value, &mut next),
                }
            }
            current = next;
        }
        current
    }
}

/// Text form used when comparing a selected value against a string predicate
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn take_name(input: &str) -> (&str, &str) {
    let end = input.find(['.', '[']).unwrap_or(input.len());
    (&input[..end], &input[end..])
}

fn parse_bracket(inner: &str) -> Option<Segment> {
    if inner == "*" {
        return Some(Segment::Wildcard);
    }
    if let Ok(index) = inner.parse::<usize>() {
        return Some(Segment::Index(index));
    }
    let quoted = inner
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')))?;
    Some(Segment::Child(quoted.to_string()))
}

fn children(value: &Value) -> Vec<&Value> {
    match value {
        Value::Object(map) => map.values().collect(),
        Value::Array(items) => items.iter().collect(),
        _ => Vec::new(),
    }
}

fn collect_named<'a>(value: &'a Value, name: &str, out: &mut Vec<&'a Value>) {
    if let Some(found) = value.as_object().and_then(|m| m.get(name)) {
        out.push(found);
    }
    for child in children(value) {
        collect_named(child, name, out);
    }
}

fn collect_all<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    for child in children(value) {
        out.push(child);
        collect_all(child, out);
    }
}
