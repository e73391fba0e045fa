//! Parsing of the AI service's reply text.
//!
//! The model is asked for strict JSON but does not always comply: replies arrive
//! wrapped in Markdown fences, as a single object instead of an array, nested under a
//! wrapper key, or with a sentence of prose around them. [`parse_reply`] accepts those
//! shapes and reports anything else as [`ParsedReply::Unparseable`] together with the
//! raw text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::records::TestCaseRecord;

const NOT_AVAILABLE: &str = "N/A";
const DEFAULT_STATUS: &str = "Draft";

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n(.*?)\r?\n?[ \t]*```").expect("valid fence pattern"));

/// Outcome of parsing one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedReply {
    Cases(Vec<DraftCase>),
    Unparseable { raw: String, reason: String },
}

/// A test case as drafted by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftCase {
    pub title: String,
    pub objective: String,
    pub precondition: String,
    pub steps: Vec<DraftStep>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftStep {
    pub step: String,
    pub test_data: String,
    pub expected_result: String,
}

impl DraftStep {
    fn placeholder() -> Self {
        Self {
            step: NOT_AVAILABLE.to_string(),
            test_data: NOT_AVAILABLE.to_string(),
            expected_result: NOT_AVAILABLE.to_string(),
        }
    }

    fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self {
                step: text_field(map, "Step", NOT_AVAILABLE),
                test_data: text_field(map, "Test Data", NOT_AVAILABLE),
                expected_result: text_field(map, "Expected Result", NOT_AVAILABLE),
            },
            other => Self {
                step: value_text(other),
                ..Self::placeholder()
            },
        }
    }
}

impl DraftCase {
    fn from_map(map: &Map<String, Value>) -> Self {
        let steps = match lookup(map, "Test steps") {
            Some(Value::Array(items)) => items.iter().map(DraftStep::from_value).collect(),
            _ => Vec::new(),
        };
        Self {
            title: text_field(map, "Title", NOT_AVAILABLE),
            objective: text_field(map, "Objective", NOT_AVAILABLE),
            precondition: text_field(map, "Precondition", NOT_AVAILABLE),
            steps,
            status: text_field(map, "Status", DEFAULT_STATUS),
        }
    }

    /// Flattens the case into one record per step, attributed to `story_id`.
    /// A case without steps still yields one row so it stays visible.
    pub fn into_records(self, story_id: &str) -> Vec<TestCaseRecord> {
        let steps = if self.steps.is_empty() {
            vec![DraftStep::placeholder()]
        } else {
            self.steps
        };
        steps
            .into_iter()
            .enumerate()
            .map(|(index, step)| TestCaseRecord {
                source_story_id: story_id.to_string(),
                name: self.title.clone(),
                objective: self.objective.clone(),
                precondition: self.precondition.clone(),
                description: step.step,
                test_data: step.test_data,
                expected_result: step.expected_result,
                status: self.status.clone(),
                opens_case: index == 0,
            })
            .collect()
    }
}

/// Parses a reply into draft test cases.
pub fn parse_reply(text: &str) -> ParsedReply {
    let unparseable = |reason: String| ParsedReply::Unparseable {
        raw: text.to_string(),
        reason,
    };

    let body = strip_fences(text);
    if body.is_empty() {
        return unparseable("reply is empty".to_string());
    }

    let value = match serde_json::from_str::<Value>(body) {
        Ok(value) => value,
        Err(err) => {
            return match embedded_cases(body) {
                Some(cases) => ParsedReply::Cases(cases),
                None => unparseable(format!("reply is not valid JSON: {err}")),
            }
        }
    };

    match cases_from_value(value) {
        Ok(cases) => ParsedReply::Cases(cases),
        Err(reason) => unparseable(reason),
    }
}

fn strip_fences(text: &str) -> &str {
    match CODE_FENCE.captures(text).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => text.trim(),
    }
}

/// The first JSON value embedded in prose that reads as test cases. Every `[` and `{`
/// is tried as a start, so bracketed prose ahead of the payload is passed over.
fn embedded_cases(text: &str) -> Option<Vec<DraftCase>> {
    text.char_indices()
        .filter(|(_, c)| matches!(c, '[' | '{'))
        .find_map(|(start, _)| {
            let value = serde_json::Deserializer::from_str(&text[start..])
                .into_iter::<Value>()
                .next()?
                .ok()?;
            match value {
                Value::Array(_) | Value::Object(_) => cases_from_value(value).ok(),
                _ => None,
            }
        })
}

fn cases_from_value(value: Value) -> Result<Vec<DraftCase>, String> {
    match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(map) => Ok(DraftCase::from_map(map)),
                other => Err(format!(
                    "test case {} is {} rather than an object",
                    index + 1,
                    json_type(other)
                )),
            })
            .collect(),
        Value::Object(map) if is_wrapper(&map) => {
            let inner = map.into_iter().next().map(|(_, v)| v).unwrap_or(Value::Null);
            cases_from_value(inner)
        }
        Value::Object(map) => Ok(vec![DraftCase::from_map(&map)]),
        other => Err(format!(
            "expected a test case object or array, found {}",
            json_type(&other)
        )),
    }
}

/// Keys that belong to a test case itself and never name an envelope.
const CASE_FIELDS: [&str; 6] = ["Title", "Objective", "Precondition", "Test steps", "Coverage", "Status"];

/// `{"test_cases": [...]}` and similar single-key envelopes.
fn is_wrapper(map: &Map<String, Value>) -> bool {
    map.len() == 1
        && CASE_FIELDS.iter().all(|field| lookup(map, field).is_none())
        && matches!(map.values().next(), Some(Value::Array(_)))
}

/// Key lookup that ignores case, spaces and underscores, so `Test steps`,
/// `test_steps` and `TestSteps` all match.
fn lookup<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let wanted = normalize_key(key);
    map.get(key)
        .or_else(|| map.iter().find(|(k, _)| normalize_key(k) == wanted).map(|(_, v)| v))
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn text_field(map: &Map<String, Value>, key: &str, default: &str) -> String {
    match lookup(map, key) {
        None | Some(Value::Null) => default.to_string(),
        Some(value) => value_text(value),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join("\n"),
        other => other.to_string(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
