//! # Stub rules
//!
//! Declarative request matchers paired with the response to return. The
//! serde representation is the WireMock admin mapping format, so a rule can
//! be posted as-is to a remote server's `/__admin/mappings` endpoint.

use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use strum::{Display, EnumString};

/// Name of the transformer that renders response bodies as templates
pub const RESPONSE_TEMPLATE_TRANSFORMER: &str = "response-template";

/// Priority of catch-all rules; larger numbers lose to smaller ones
pub const CATCH_ALL_PRIORITY: u8 = 10;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum HttpMethod {
    Any,
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

/// Predicate applied to a single string value (a header, a selected JSON
/// value, an XPath result)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StringPredicate {
    EqualTo(String),
    Contains(String),
    /// Regex that must match the whole value
    Matches(String),
}

impl StringPredicate {
    pub fn equal_to(value: impl Into<String>) -> Self {
        StringPredicate::EqualTo(value.into())
    }

    pub fn containing(value: impl Into<String>) -> Self {
        StringPredicate::Contains(value.into())
    }

    pub fn matching(pattern: impl Into<String>) -> Self {
        StringPredicate::Matches(pattern.into())
    }
}

/// Expression-based body predicate (JSON path or XPath) with an optional
/// check on the selected values
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathPredicate {
    pub expression: String,
    #[serde(flatten)]
    pub predicate: Option<StringPredicate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BodyPredicate {
    EqualTo(String),
    Contains(String),
    Matches(String),
    EqualToJson(String),
    MatchesJsonPath(PathPredicate),
    EqualToXml(String),
    #[serde(rename = "matchesXPath")]
    MatchesXPath(PathPredicate),
}

impl BodyPredicate {
    pub fn equal_to_json(json: impl Into<String>) -> Self {
        BodyPredicate::EqualToJson(json.into())
    }

    pub fn matching_json_path(expression: impl Into<String>, predicate: StringPredicate) -> Self {
        BodyPredicate::MatchesJsonPath(PathPredicate {
            expression: expression.into(),
            predicate: Some(predicate),
        })
    }

    pub fn equal_to_xml(xml: impl Into<String>) -> Self {
        BodyPredicate::EqualToXml(xml.into())
    }

    pub fn matching_xpath(expression: impl Into<String>, predicate: StringPredicate) -> Self {
        BodyPredicate::MatchesXPath(PathPredicate {
            expression: expression.into(),
            predicate: Some(predicate),
        })
    }

    pub fn matching(pattern: impl Into<String>) -> Self {
        BodyPredicate::Matches(pattern.into())
    }
}

/// Request half of a stub rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPattern {
    pub method: HttpMethod,
    /// Exact path plus query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Regex over path plus query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_pattern: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, StringPredicate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub body_patterns: Vec<BodyPredicate>,
}

impl RequestPattern {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: Some(url.into()),
            url_pattern: None,
            headers: BTreeMap::new(),
            body_patterns: Vec::new(),
        }
    }

    /// Matches every URL
    pub fn any_url(method: HttpMethod) -> Self {
        Self {
            method,
            url: None,
            url_pattern: None,
            headers: BTreeMap::new(),
            body_patterns: Vec::new(),
        }
    }

    pub fn url_matching(method: HttpMethod, pattern: impl Into<String>) -> Self {
        Self {
            url_pattern: Some(pattern.into()),
            ..Self::any_url(method)
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, predicate: StringPredicate) -> Self {
        self.headers.insert(name.into(), predicate);
        self
    }

    pub fn with_body(mut self, predicate: BodyPredicate) -> Self {
        self.body_patterns.push(predicate);
        self
    }

    pub fn will_return(self, response: ResponseDefinition) -> StubRule {
        StubRule::new(self, response)
    }
}

/// Response half of a stub rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDefinition {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transformers: Vec<String>,
}

impl ResponseDefinition {
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            body: None,
            headers: BTreeMap::new(),
            transformers: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::with_status(200)
    }

    pub fn ok_with_body(body: impl Into<String>) -> Self {
        Self::ok().with_body(body)
    }

    pub fn ok_json(body: impl Into<String>) -> Self {
        Self::ok()
            .with_body(body)
            .with_header("Content-Type", "application/json")
    }

    pub fn created() -> Self {
        Self::with_status(201)
    }

    pub fn not_found() -> Self {
        Self::with_status(404)
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_transformer(mut self, name: impl Into<String>) -> Self {
        self.transformers.push(name.into());
        self
    }

    pub fn is_templated(&self) -> bool {
        self.transformers
            .iter()
            .any(|t| t == RESPONSE_TEMPLATE_TRANSFORMER)
    }
}

/// A request matcher and the response it produces
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StubRule {
    pub request: RequestPattern,
    pub response: ResponseDefinition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    pub persistent: bool,
}

impl StubRule {
    pub fn new(request: RequestPattern, response: ResponseDefinition) -> Self {
        Self {
            request,
            response,
            priority: None,
            persistent: false,
        }
    }

    /// `ANY <any url> -> 404` at low priority
    pub fn catch_all_not_found() -> Self {
        RequestPattern::any_url(HttpMethod::Any)
            .will_return(ResponseDefinition::not_found())
            .at_priority(CATCH_ALL_PRIORITY)
    }

    pub fn at_priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority.max(1));
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }
}

/// Server-wide random delay applied to every response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DelayDistribution {
    /// Milliseconds, both bounds inclusive
    Uniform { lower: u64, upper: u64 },
}

impl DelayDistribution {
    pub fn uniform(lower: u64, upper: u64) -> Self {
        DelayDistribution::Uniform {
            lower: lower.min(upper),
            upper: lower.max(upper),
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        match *self {
            DelayDistribution::Uniform { lower, upper } => {
                let millis = Uniform::new_inclusive(lower.min(upper), lower.max(upper)).sample(rng);
                Duration::from_millis(millis)
            }
        }
    }
}

/// Random printable ASCII text with a length in `min..max`
pub fn random_ascii(min: usize, max: usize) -> String {
    let mut rng = rand::thread_rng();
    let len = if max > min { rng.gen_range(min..max) } else { min };
    random_ascii_of_len(&mut rng, len)
}

/// Random printable ASCII text of exactly `len` characters
pub fn random_ascii_exact(len: usize) -> String {
    random_ascii_of_len(&mut rand::thread_rng(), len)
}

fn random_ascii_of_len<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len).map(|_| char::from(rng.gen_range(32u8..=126))).collect()
}
