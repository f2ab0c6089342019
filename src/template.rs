//! # Response templating
//!
//! Renders stub response bodies with values taken from the incoming
//! request, using Handlebars plus the helpers load-test stubs rely on:
//! `date`, `parseDate`, `randomValue` and `jsonPath`.

use chrono::{DateTime, Duration as ChronoDuration, Months, NaiveDate, Utc};
use chrono_tz::Tz;
use handlebars::{
    handlebars_helper, Context, Handlebars, Helper, HelperResult, Output, RenderContext,
    RenderError,
};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::str::FromStr;
use strum::EnumString;

use crate::error::{LoaderError, Result};
use crate::matching::{json_path, JsonPath};

static MUSTACHE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{\{.*?\}\}").expect("static regex"));

static HEADER_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"request\.headers\.([A-Za-z0-9_-]+)").expect("static regex")
});

/// Request data exposed to templates as `request.*`
#[derive(Debug, Clone, Default)]
pub struct TemplateRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl TemplateRequest {
    pub fn from_wiremock(request: &wiremock::Request) -> Self {
        Self {
            method: request.method.as_str().to_string(),
            path: request.url.path().to_string(),
            query: request.url.query().map(str::to_string),
            headers: request
                .headers
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
                })
                .collect(),
            body: String::from_utf8_lossy(&request.body).into_owned(),
        }
    }

    fn to_context(&self) -> Value {
        let url = match &self.query {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        };

        let mut headers = Map::new();
        for (name, value) in &self.headers {
            headers
                .entry(name.to_ascii_lowercase())
                .or_insert_with(|| Value::String(value.clone()));
        }

        let query: Map<String, Value> = self
            .query
            .as_deref()
            .unwrap_or_default()
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                (k.to_string(), Value::String(v.to_string()))
            })
            .collect();

        json!({
            "request": {
                "url": url,
                "path": self.path,
                "method": self.method,
                "headers": headers,
                "query": query,
                "body": self.body,
            }
        })
    }
}

/// Handlebars engine with the response-template helpers installed
#[derive(Debug, Clone)]
pub struct ResponseTemplater {
    handlebars: Handlebars<'static>,
}

impl ResponseTemplater {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.register_helper("date", Box::new(date_helper));
        handlebars.register_helper("parseDate", Box::new(parse_date));
        handlebars.register_helper("randomValue", Box::new(random_value_helper));
        handlebars.register_helper("jsonPath", Box::new(json_path_helper));
        Self { handlebars }
    }

    /// Check a template compiles before it is attached to a stub
    pub fn validate(&self, template: &str) -> Result<()> {
        handlebars::Template::compile(&normalize(template))
            .map(|_| ())
            .map_err(|e| LoaderError::Template(e.to_string()))
    }

    pub fn render(&self, template: &str, request: &TemplateRequest) -> Result<String> {
        self.handlebars
            .render_template(&normalize(template), &request.to_context())
            .map_err(|e| LoaderError::Template(e.to_string()))
    }
}

impl Default for ResponseTemplater {
    fn default() -> Self {
        Self::new()
    }
}

/// Header names reach the context lower-cased; only references inside
/// `{{ }}` are rewritten
fn normalize(template: &str) -> String {
    MUSTACHE
        .replace_all(template, |expr: &regex::Captures| {
            HEADER_REFERENCE
                .replace_all(&expr[0], |caps: &regex::Captures| {
                    format!("request.headers.{}", caps[1].to_ascii_lowercase())
                })
                .into_owned()
        })
        .into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
enum RandomType {
    Alphanumeric,
    Alphabetic,
    Numeric,
    Hexadecimal,
    AlphanumericAndSymbols,
    Uuid,
}

const ALPHABETIC: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const NUMERIC: &str = "0123456789";
const HEXADECIMAL: &str = "0123456789abcdef";
const SYMBOLS: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

fn random_value(kind: RandomType, length: usize) -> String {
    let alphabet: String = match kind {
        RandomType::Uuid => return uuid::Uuid::new_v4().to_string(),
        RandomType::Alphanumeric => format!("{ALPHABETIC}{NUMERIC}"),
        RandomType::Alphabetic => ALPHABETIC.to_string(),
        RandomType::Numeric => NUMERIC.to_string(),
        RandomType::Hexadecimal => HEXADECIMAL.to_string(),
        RandomType::AlphanumericAndSymbols => format!("{ALPHABETIC}{NUMERIC}{SYMBOLS}"),
    };
    let chars: Vec<char> = alphabet.chars().collect();
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| chars[rng.gen_range(0..chars.len())])
        .collect()
}

fn random_value_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let kind = match h.hash_get("type").and_then(|v| v.value().as_str()) {
        Some(name) => RandomType::from_str(name)
            .map_err(|_| RenderError::new(format!("unknown randomValue type '{name}'")))?,
        None => RandomType::Alphanumeric,
    };
    let length = h
        .hash_get("length")
        .and_then(|v| v.value().as_u64())
        .unwrap_or(36) as usize;
    out.write(&random_value(kind, length))?;
    Ok(())
}

handlebars_helper!(parse_date: |value: Json| {
    value
        .as_str()
        .and_then(parse_datetime)
        .map(|dt| Value::String(dt.to_rfc3339()))
        .unwrap_or(Value::Null)
});

fn parse_datetime(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    DateTime::parse_from_rfc3339(input)
        .or_else(|_| DateTime::parse_from_rfc2822(input))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })
}

/// Apply offsets such as `-5 months` or `3 days`
fn apply_offset(base: DateTime<Utc>, offset: &str) -> Option<DateTime<Utc>> {
    let mut parts = offset.split_whitespace();
    let amount: i64 = parts.next()?.parse().ok()?;
    let unit = parts.next()?.trim_end_matches('s').to_ascii_lowercase();
    match unit.as_str() {
        "second" => base.checked_add_signed(ChronoDuration::seconds(amount)),
        "minute" => base.checked_add_signed(ChronoDuration::minutes(amount)),
        "hour" => base.checked_add_signed(ChronoDuration::hours(amount)),
        "day" => base.checked_add_signed(ChronoDuration::days(amount)),
        "week" => base.checked_add_signed(ChronoDuration::weeks(amount)),
        "month" | "year" => {
            let months = if unit == "year" { amount * 12 } else { amount };
            let shift = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
            if months >= 0 {
                base.checked_add_months(shift)
            } else {
                base.checked_sub_months(shift)
            }
        }
        _ => None,
    }
}

/// Translate the common Java date pattern letters to strftime
fn to_strftime(pattern: &str) -> String {
    const TOKENS: [(&str, &str); 9] = [
        ("yyyy", "%Y"),
        ("MM", "%m"),
        ("dd", "%d"),
        ("HH", "%H"),
        ("mm", "%M"),
        ("ss", "%S"),
        ("SSS", "%3f"),
        ("yy", "%y"),
        ("Z", "%z"),
    ];
    let mut out = String::new();
    let mut rest = pattern;
    'outer: while !rest.is_empty() {
        for (token, replacement) in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(replacement);
                rest = tail;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            if c == '%' {
                out.push_str("%%");
            } else {
                out.push(c);
            }
        }
        rest = chars.as_str();
    }
    out
}

fn date_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let mut when = match h.param(0).map(|p| p.value()) {
        Some(Value::String(s)) => match parse_datetime(s) {
            Some(dt) => dt,
            None => return Ok(()),
        },
        Some(Value::Null) => return Ok(()),
        Some(_) | None => Utc::now(),
    };

    if let Some(offset) = h.hash_get("offset").and_then(|v| v.value().as_str()) {
        when = apply_offset(when, offset)
            .ok_or_else(|| RenderError::new(format!("invalid date offset '{offset}'")))?;
    }

    let format = h.hash_get("format").and_then(|v| v.value().as_str());
    let rendered = match h.hash_get("timezone").and_then(|v| v.value().as_str()) {
        Some(name) => {
            let tz: Tz = name
                .parse()
                .map_err(|_| RenderError::new(format!("unknown timezone '{name}'")))?;
            format_date(when.with_timezone(&tz), format)
        }
        None => format_date(when, format),
    };
    out.write(&rendered)?;
    Ok(())
}

fn format_date<T>(when: DateTime<T>, format: Option<&str>) -> String
where
    T: chrono::TimeZone,
    T::Offset: std::fmt::Display,
{
    match format {
        Some("epoch") => when.timestamp_millis().to_string(),
        Some("unix") => when.timestamp().to_string(),
        Some(pattern) => when.format(&to_strftime(pattern)).to_string(),
        None => when.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    }
}

fn json_path_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let source = h
        .param(0)
        .ok_or_else(|| RenderError::new("jsonPath requires a document"))?
        .value();
    let expression = h
        .param(1)
        .and_then(|p| p.value().as_str())
        .ok_or_else(|| RenderError::new("jsonPath requires an expression"))?;

    let path = JsonPath::parse(expression).map_err(|e| RenderError::new(e.to_string()))?;
    let document = match source {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(doc) => doc,
            Err(_) => return Ok(()),
        },
        other => other.clone(),
    };

    let selected = path.select(&document);
    let rendered = match selected.as_slice() {
        [] => String::new(),
        [single] if !expression.contains("..") && !expression.contains('*') => {
            json_path::value_text(single)
        }
        many => Value::Array(many.iter().map(|v| (*v).clone()).collect()).to_string(),
    };
    out.write(&rendered)?;
    Ok(())
}
