//! XML body support: a location-path subset of XPath and semantic document
//! equality.
//!
//! Supported XPath: absolute paths built from `/name`, `//name` and `*`
//! steps, an optional `[@attr = 'value']` predicate per step, and a final
//! `text()` or `@attr` step.

use roxmltree::{Document, Node};

use crate::error::{LoaderError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    /// `None` matches any element
    name: Option<String>,
    attribute: Option<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Output {
    /// Full text content of the selected element
    Element,
    /// Direct text children of the selected element
    Text,
    Attribute(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPath {
    steps: Vec<Step>,
    output: Output,
}

impl XPath {
    pub fn parse(expression: &str) -> Result<Self> {
        let invalid = || LoaderError::InvalidXPath(expression.to_string());
        let trimmed = expression.trim();
        if !trimmed.starts_with('/') {
            return Err(invalid());
        }

        let mut rest = trimmed;
        let mut steps = Vec::new();
        let mut output = Output::Element;

        while !rest.is_empty() {
            let axis = if let Some(after) = rest.strip_prefix("//") {
                rest = after;
                Axis::Descendant
            } else if let Some(after) = rest.strip_prefix('/') {
                rest = after;
                Axis::Child
            } else {
                return Err(invalid());
            };

            let end = step_end(rest);
            let step = rest[..end].trim();
            rest = &rest[end..];

            if step == "text()" || step.starts_with('@') {
                if axis != Axis::Child || !rest.is_empty() || steps.is_empty() {
                    return Err(invalid());
                }
                output = match step.strip_prefix('@') {
                    Some(name) if !name.is_empty() => Output::Attribute(name.to_string()),
                    Some(_) => return Err(invalid()),
                    None => Output::Text,
                };
                break;
            }

            steps.push(parse_step(axis, step).ok_or_else(invalid)?);
        }

        if steps.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            steps,
            output,
        })
    }

    /// String values selected from `xml`; an unparseable document selects nothing
    pub fn evaluate(&self, xml: &str) -> Vec<String> {
        let Ok(doc) = Document::parse(xml) else {
            return Vec::new();
        };

        let mut current = vec![doc.root()];
        for step in &self.steps {
            let mut next = Vec::new();
            for node in current {
                match step.axis {
                    Axis::Child => next.extend(node.children().filter(|n| step.accepts(n))),
                    Axis::Descendant => next.extend(
                        node.descendants()
                            .filter(|n| *n != node)
                            .filter(|n| step.accepts(n)),
                    ),
                }
            }
            current = next;
        }

        current
            .into_iter()
            .filter_map(|node| match &self.output {
                Output::Element => Some(
                    node.descendants()
                        .filter(|n| n.is_text())
                        .filter_map(|n| n.text())
                        .collect(),
                ),
                Output::Text => Some(
                    node.children()
                        .filter(|n| n.is_text())
                        .filter_map(|n| n.text())
                        .collect(),
                ),
                Output::Attribute(name) => node.attribute(name.as_str()).map(str::to_string),
            })
            .collect()
    }
}

impl Step {
    fn accepts(&self, node: &Node) -> bool {
        if !node.is_element() {
            return false;
        }
        if let Some(name) = &self.name {
            if node.tag_name().name() != name {
                return false;
            }
        }
        match &self.attribute {
            Some((attr, value)) => node.attribute(attr.as_str()) == Some(value.as_str()),
            None => true,
        }
    }
}

/// Byte offset where the current step ends (next `/` outside brackets)
fn step_end(input: &str) -> usize {
    let mut depth = 0usize;
    for (i, c) in input.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '/' if depth == 0 => return i,
            _ => {}
        }
    }
    input.len()
}

fn parse_step(axis: Axis, step: &str) -> Option<Step> {
    let (name, predicate) = match step.find('[') {
        Some(open) => {
            let inner = step[open + 1..].strip_suffix(']')?;
            (step[..open].trim(), Some(inner.trim()))
        }
        None => (step, None),
    };

    if name.is_empty() || name.contains(['(', ')', '@']) {
        return None;
    }

    let attribute = match predicate {
        Some(inner) => {
            let (attr, value) = inner.strip_prefix('@')?.split_once('=')?;
            let value = value.trim();
            let value = value
                .strip_prefix('\'')
                .and_then(|v| v.strip_suffix('\''))
                .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))?;
            Some((attr.trim().to_string(), value.to_string()))
        }
        None => None,
    };

    Some(Step {
        axis,
        name: (name != "*").then(|| name.to_string()),
        attribute,
    })
}

/// Owned, whitespace-insensitive form of an XML document used for equality
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalXml {
    root: XmlElement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct XmlElement {
    namespace: Option<String>,
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlChild>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum XmlChild {
    Element(XmlElement),
    Text(String),
}

impl CanonicalXml {
    pub fn parse(xml: &str) -> Result<Self> {
        let doc = Document::parse(xml).map_err(|e| LoaderError::InvalidXml(e.to_string()))?;
        Ok(Self {
            root: XmlElement::from_node(doc.root_element()),
        })
    }
}

impl XmlElement {
    fn from_node(node: Node) -> Self {
        let mut attributes: Vec<(String, String)> = node
            .attributes()
            .map(|a| (a.name().to_string(), a.value().to_string()))
            .collect();
        attributes.sort();

        let children = node
            .children()
            .filter_map(|child| {
                if child.is_element() {
                    Some(XmlChild::Element(XmlElement::from_node(child)))
                } else if child.is_text() {
                    child
                        .text()
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(|t| XmlChild::Text(t.to_string()))
                } else {
                    None
                }
            })
            .collect();

        Self {
            namespace: node.tag_name().namespace().map(str::to_string),
            name: node.tag_name().name().to_string(),
            attributes,
            children,
        }
    }
}
