//! # Request matching for the embedded server
//!
//! `StubRule` predicates are compiled once at registration (regexes, JSON
//! documents, path expressions) and installed on `wiremock` mocks through
//! its [`Match`] extension trait.

pub mod json_path;
pub mod xpath;

use regex::Regex;
use serde_json::Value;
use wiremock::{Match, Request};

use crate::error::{LoaderError, Result};
use crate::stub::{BodyPredicate, HttpMethod, PathPredicate, RequestPattern, StringPredicate};

pub use json_path::JsonPath;
pub use xpath::{CanonicalXml, XPath};

/// Compile `pattern` so that it has to match the whole input
fn full_match_regex(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|source| LoaderError::InvalidRegex {
        pattern: pattern.to_string(),
        source,
    })
}

#[derive(Debug, Clone)]
pub enum CompiledString {
    EqualTo(String),
    Contains(String),
    Matches(Regex),
}

impl CompiledString {
    pub fn compile(predicate: &StringPredicate) -> Result<Self> {
        Ok(match predicate {
            StringPredicate::EqualTo(v) => CompiledString::EqualTo(v.clone()),
            StringPredicate::Contains(v) => CompiledString::Contains(v.clone()),
            StringPredicate::Matches(p) => CompiledString::Matches(full_match_regex(p)?),
        })
    }

    pub fn is_match(&self, value: &str) -> bool {
        match self {
            CompiledString::EqualTo(expected) => value == expected,
            CompiledString::Contains(fragment) => value.contains(fragment.as_str()),
            CompiledString::Matches(regex) => regex.is_match(value),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MethodMatcher(pub HttpMethod);

impl MethodMatcher {
    pub fn matches_method(&self, method: &str) -> bool {
        match self.0 {
            HttpMethod::Any => true,
            expected => method.eq_ignore_ascii_case(&expected.to_string()),
        }
    }
}

impl Match for MethodMatcher {
    fn matches(&self, request: &Request) -> bool {
        self.matches_method(request.method.as_str())
    }
}

/// Matches path plus query, either exactly or against a full-match regex
#[derive(Debug, Clone)]
pub enum UrlMatcher {
    Equals(String),
    Pattern(Regex),
}

impl UrlMatcher {
    pub fn compile(pattern: &RequestPattern) -> Result<Option<Self>> {
        if let Some(url) = &pattern.url {
            return Ok(Some(UrlMatcher::Equals(url.clone())));
        }
        pattern
            .url_pattern
            .as_deref()
            .map(|p| full_match_regex(p).map(UrlMatcher::Pattern))
            .transpose()
    }

    pub fn matches_url(&self, path_and_query: &str) -> bool {
        match self {
            UrlMatcher::Equals(expected) => path_and_query == expected,
            UrlMatcher::Pattern(regex) => regex.is_match(path_and_query),
        }
    }
}

impl Match for UrlMatcher {
    fn matches(&self, request: &Request) -> bool {
        let url = match request.url.query() {
            Some(query) => format!("{}?{}", request.url.path(), query),
            None => request.url.path().to_string(),
        };
        self.matches_url(&url)
    }
}

#[derive(Debug, Clone)]
pub struct HeaderMatcher {
    name: String,
    predicate: CompiledString,
}

impl HeaderMatcher {
    pub fn compile(name: &str, predicate: &StringPredicate) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            predicate: CompiledString::compile(predicate)?,
        })
    }
}

impl Match for HeaderMatcher {
    fn matches(&self, request: &Request) -> bool {
        request
            .headers
            .get_all(self.name.as_str())
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| self.predicate.is_match(v))
    }
}

#[derive(Debug, Clone)]
pub enum BodyMatcher {
    Text(CompiledString),
    Json(Value),
    JsonPath {
        path: JsonPath,
        predicate: Option<CompiledString>,
    },
    Xml(CanonicalXml),
    XPath {
        path: XPath,
        predicate: Option<CompiledString>,
    },
}

impl BodyMatcher {
    pub fn compile(predicate: &BodyPredicate) -> Result<Self> {
        Ok(match predicate {
            BodyPredicate::EqualTo(v) => {
                BodyMatcher::Text(CompiledString::compile(&StringPredicate::EqualTo(v.clone()))?)
            }
            BodyPredicate::Contains(v) => {
                BodyMatcher::Text(CompiledString::compile(&StringPredicate::Contains(v.clone()))?)
            }
            BodyPredicate::Matches(p) => {
                BodyMatcher::Text(CompiledString::compile(&StringPredicate::Matches(p.clone()))?)
            }
            BodyPredicate::EqualToJson(json) => BodyMatcher::Json(serde_json::from_str(json)?),
            BodyPredicate::MatchesJsonPath(PathPredicate {
                expression,
                predicate,
            }) => BodyMatcher::JsonPath {
                path: JsonPath::parse(expression)?,
                predicate: predicate.as_ref().map(CompiledString::compile).transpose()?,
            },
            BodyPredicate::EqualToXml(xml) => BodyMatcher::Xml(CanonicalXml::parse(xml)?),
            BodyPredicate::MatchesXPath(PathPredicate {
                expression,
                predicate,
            }) => BodyMatcher::XPath {
                path: XPath::parse(expression)?,
                predicate: predicate.as_ref().map(CompiledString::compile).transpose()?,
            },
        })
    }

    pub fn matches_body(&self, body: &[u8]) -> bool {
        let Ok(text) = std::str::from_utf8(body) else {
            return false;
        };

        match self {
            BodyMatcher::Text(predicate) => predicate.is_match(text),
            BodyMatcher::Json(expected) => serde_json::from_str::<Value>(text)
                .map(|actual| &actual == expected)
                .unwrap_or(false),
            BodyMatcher::JsonPath { path, predicate } => {
                let Ok(doc) = serde_json::from_str::<Value>(text) else {
                    return false;
                };
                let selected = path.select(&doc);
                match predicate {
                    Some(p) => selected
                        .into_iter()
                        .any(|v| p.is_match(&json_path::value_text(v))),
                    None => !selected.is_empty(),
                }
            }
            BodyMatcher::Xml(expected) => CanonicalXml::parse(text)
                .map(|actual| &actual == expected)
                .unwrap_or(false),
            BodyMatcher::XPath { path, predicate } => {
                let selected = path.evaluate(text);
                match predicate {
                    Some(p) => selected.iter().any(|v| p.is_match(v)),
                    None => !selected.is_empty(),
                }
            }
        }
    }
}

impl Match for BodyMatcher {
    fn matches(&self, request: &Request) -> bool {
        self.matches_body(&request.body)
    }
}
