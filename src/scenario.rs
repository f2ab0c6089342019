//! # Scenarios
//!
//! The fixed set of bulk-registration routines. Each scenario knows how
//! many rules it registers, how wide its worker pool is, whether it needs a
//! catch-all 404 and a server-wide delay, and how to build rule `i`
//! (1-based).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use strum::{Display, EnumIter, EnumString};

use crate::stub::{
    random_ascii, random_ascii_exact, BodyPredicate, DelayDistribution, HttpMethod,
    RequestPattern, ResponseDefinition, StringPredicate, StubRule, RESPONSE_TEMPLATE_TRANSFORMER,
};

/// Default rule count for `many-stub-get`
pub const DEFAULT_STUB_COUNT: usize = 6000;

/// Log a progress marker every this many rule indexes
pub const PROGRESS_EVERY: usize = 100;

pub const CUSTOMER_ACK: &str = r#"{"customer":"Customer: 993","response":"Acknowledgement"}"#;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum Scenario {
    /// Thousands of small GET stubs behind a catch-all 404
    #[serde(rename = "many-stub-get")]
    #[strum(serialize = "many-stub-get")]
    ManyStubGet,
    /// 1000 POST webhooks answering a fixed JSON acknowledgement
    #[serde(rename = "only-post-1000")]
    #[strum(serialize = "only-post-1000")]
    OnlyPost1000,
    /// 100 GET stubs with 50-90 KB bodies
    #[serde(rename = "get-large-stub")]
    #[strum(serialize = "get-large-stub")]
    GetLargeStub,
    /// Every matcher type plus a templated response, under random delay
    #[serde(rename = "mixed-100")]
    #[strum(serialize = "mixed-100")]
    Mixed100,
}

/// Shape of one scenario run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioPlan {
    pub scenario: Scenario,
    pub rule_count: usize,
    pub pool_size: usize,
    pub catch_all: bool,
    pub global_delay: Option<DelayDistribution>,
}

/// A request the load driver can send to hit a registered rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RequestTarget {
    pub method: HttpMethod,
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MixedGroup {
    AcceptGet,
    JsonEquality,
    JsonPath,
    XmlEquality,
    XPath,
    TextRegex,
    Templated,
}

const MIXED_GROUPS: [(MixedGroup, usize); 7] = [
    (MixedGroup::AcceptGet, 50),
    (MixedGroup::JsonEquality, 10),
    (MixedGroup::JsonPath, 10),
    (MixedGroup::XmlEquality, 2),
    (MixedGroup::XPath, 10),
    (MixedGroup::TextRegex, 10),
    (MixedGroup::Templated, 1),
];

/// Group of mixed rule `index` and its 1-based position inside the group
fn mixed_slot(index: usize) -> (MixedGroup, usize) {
    let mut offset = 0;
    for (group, count) in MIXED_GROUPS {
        if index <= offset + count {
            return (group, index.saturating_sub(offset).max(1));
        }
        offset += count;
    }
    (MixedGroup::Templated, 1)
}

fn mixed_rule_count() -> usize {
    MIXED_GROUPS.iter().map(|(_, count)| count).sum()
}

impl Scenario {
    pub fn plan(self, stub_count: usize) -> ScenarioPlan {
        let (rule_count, pool_size, catch_all, global_delay) = match self {
            Scenario::ManyStubGet => (stub_count, 20, true, None),
            Scenario::OnlyPost1000 => (1000, 100, false, None),
            Scenario::GetLargeStub => (100, 10, true, None),
            Scenario::Mixed100 => (
                mixed_rule_count(),
                10,
                false,
                Some(DelayDistribution::uniform(100, 2000)),
            ),
        };
        ScenarioPlan {
            scenario: self,
            rule_count,
            pool_size,
            catch_all,
            global_delay,
        }
    }

    /// Request pattern of rule `index`
    pub fn request(self, index: usize) -> RequestPattern {
        match self {
            Scenario::ManyStubGet | Scenario::GetLargeStub => {
                RequestPattern::get(format!("/load-test/{index}"))
            }
            Scenario::OnlyPost1000 => RequestPattern::post(format!("/webhooks/customer/{index}")),
            Scenario::Mixed100 => mixed_request(index),
        }
    }

    /// Response of rule `index`; random bodies differ on every call
    pub fn response(self, index: usize) -> ResponseDefinition {
        match self {
            Scenario::ManyStubGet => ResponseDefinition::ok_with_body(random_ascii(2000, 5000)),
            Scenario::OnlyPost1000 => ResponseDefinition::ok_json(CUSTOMER_ACK),
            Scenario::GetLargeStub => ResponseDefinition::ok_with_body(random_ascii(50000, 90000)),
            Scenario::Mixed100 => mixed_response(index),
        }
    }

    pub fn rule(self, index: usize) -> StubRule {
        self.request(index)
            .will_return(self.response(index))
            .persistent(false)
    }

    /// Distinct method/path pairs registered by this scenario, in rule order
    pub fn request_targets(self, stub_count: usize) -> Vec<RequestTarget> {
        let plan = self.plan(stub_count);
        let mut seen = HashSet::new();
        (1..=plan.rule_count)
            .filter_map(|index| {
                let request = self.request(index);
                let target = RequestTarget {
                    method: request.method,
                    path: request.url?,
                };
                seen.insert(target.clone()).then_some(target)
            })
            .collect()
    }
}

fn mixed_request(index: usize) -> RequestPattern {
    let (group, i) = mixed_slot(index);
    match group {
        MixedGroup::AcceptGet => RequestPattern::get(format!("/load-test/{i}"))
            .with_header("Accept", StringPredicate::containing("text/plain")),
        MixedGroup::JsonEquality => RequestPattern::post("/load-test/json")
            .with_header("Accept", StringPredicate::equal_to("text/plain"))
            .with_header("Content-Type", StringPredicate::matching(".*/json"))
            .with_body(BodyPredicate::equal_to_json(POSTED_JSON)),
        MixedGroup::JsonPath => RequestPattern::post("/load-test/jsonpath")
            .with_header("Content-Type", StringPredicate::equal_to("application/json"))
            .with_body(BodyPredicate::matching_json_path(
                "$.matchThis.inner.innermost",
                StringPredicate::equal_to("42"),
            )),
        MixedGroup::XmlEquality => RequestPattern::post("/load-test/xml")
            .with_header("Content-Type", StringPredicate::matching(".*/xml.*"))
            .with_body(BodyPredicate::equal_to_xml(posted_xml(i))),
        MixedGroup::XPath => RequestPattern::post("/load-test/xpath")
            .with_header("Content-Type", StringPredicate::matching(".*/xml.*"))
            .with_body(BodyPredicate::matching_xpath(
                "//description/text()",
                StringPredicate::containing("JSON Web Token"),
            )),
        MixedGroup::TextRegex => RequestPattern::post("/load-test/text")
            .with_header("Content-Type", StringPredicate::matching(".*text/plain.*"))
            .with_body(BodyPredicate::matching(".*[0-9]{5}.*")),
        MixedGroup::Templated => RequestPattern::put("/load-test/templated"),
    }
}

fn mixed_response(index: usize) -> ResponseDefinition {
    let (group, i) = mixed_slot(index);
    match group {
        MixedGroup::AcceptGet => ResponseDefinition::ok_with_body(random_ascii(1, 2000)),
        MixedGroup::JsonPath => ResponseDefinition::created(),
        MixedGroup::JsonEquality
        | MixedGroup::XmlEquality
        | MixedGroup::XPath
        | MixedGroup::TextRegex => ResponseDefinition::ok_with_body(random_ascii_exact(i * 200)),
        MixedGroup::Templated => ResponseDefinition::ok_with_body(TEMPLATED_RESPONSE)
            .with_transformer(RESPONSE_TEMPLATE_TRANSFORMER),
    }
}

/// `POSTED_XML` with its root id set to `id`
pub fn posted_xml(id: usize) -> String {
    POSTED_XML.replace("$1", &id.to_string())
}

pub const POSTED_JSON: &str = r#"{
    "things": [
        {
            "name": "First",
            "value": 111
        },
        {
            "name": "Second",
            "value": 22222
        },
        {
            "name": "Third",
            "value": 111
        },
        {
            "name": "Fourth",
            "value": 555
        }
    ],
    "meta": {
        "countOfThings": 4,
        "tags": ["one", "two"]
    }
}"#;

pub const JSON_FOR_JSON_PATH_MATCH: &str = r#"{
    "matchThis": {
        "inner": {
            "innermost": 42
        }
    }
}"#;

pub const POSTED_XML: &str = r#"<?xml version="1.0"?>

<things id="$1">
    <stuff id="1"/>
    <fluff id="2"/>

    <inside>
        <deep-inside level="3">
            <one/>
            <two/>
            <three/>
            <four/>
            <one/>
            <description subject="JWT">
                JSON Web Token (JWT) is a compact, URL-safe means of representing claims to be transferred between two parties. The claims in a JWT are encoded as a JSON object that is used as the payload of a JSON Web Signature (JWS) structure or as the plaintext of a JSON Web Encryption (JWE) structure, enabling the claims to be digitally signed or integrity protected with a Message Authentication Code (MAC) and/or encrypted.
            </description>
        </deep-inside>
    </inside>

</things>"#;

pub const TEMPLATED_RESPONSE: &str = r#"Templated response
==================

{{date offset="-5 months" format="yyyy-MM-dd"}}

{{date (parseDate request.headers.MyDate) timezone='Australia/Sydney'}}

{{randomValue length=36 type='ALPHANUMERIC_AND_SYMBOLS'}}

{{jsonPath request.body '$..inner'}}"#;
