use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{AssertionError, Result};
use crate::lookup::DatabaseLookup;
use crate::response::CaseResponse;
use crate::substitution::value_text;

/// Assertion kinds accepted in case documents.
pub const SUPPORTED_KINDS: &[&str] = &["equals", "contains", "db_equals", "db_contains"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionKind {
    Equals,
    Contains,
    DbEquals,
    DbContains,
}

impl FromStr for AssertionKind {
    type Err = AssertionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "equals" => Ok(Self::Equals),
            "contains" => Ok(Self::Contains),
            "db_equals" => Ok(Self::DbEquals),
            "db_contains" => Ok(Self::DbContains),
            other => Err(AssertionError::UnsupportedKind {
                found: other.to_string(),
                supported: SUPPORTED_KINDS,
            }),
        }
    }
}

/// One labelled check: an expected-value descriptor and an actual-value
/// locator, serialized in case documents as a 2-element list.
#[derive(Debug, Clone, PartialEq)]
pub struct AssertionRule {
    pub expected: Value,
    pub actual: Value,
}

impl Serialize for AssertionRule {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        (&self.expected, &self.actual).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AssertionRule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let (expected, actual) = <(Value, Value)>::deserialize(deserializer)?;
        Ok(Self { expected, actual })
    }
}

/// Rule set for one assertion kind: label -> rule, as it appears under a kind
/// key in a case's `validate` mapping.
pub type AssertionRules = BTreeMap<String, AssertionRule>;

/// Equality with a string-coercion fallback, used where the original
/// attempted same-type coercion before raw comparison.
fn coerced_equal(a: &Value, b: &Value) -> bool {
    a == b || value_text(a) == value_text(b)
}

/// Evaluates typed assertions against a response.
///
/// Evaluation is fail-fast per invocation: the first failing rule stops the
/// call and surfaces its label, expected and actual values. Callers needing
/// isolation invoke once per rule.
pub struct AssertionEvaluator {
    lookup: Option<Arc<dyn DatabaseLookup>>,
}

impl AssertionEvaluator {
    pub fn new() -> Self {
        Self { lookup: None }
    }

    pub fn with_lookup(lookup: Arc<dyn DatabaseLookup>) -> Self {
        Self {
            lookup: Some(lookup),
        }
    }

    /// Evaluate every rule under one kind key against `response`.
    pub async fn evaluate(
        &self,
        response: &CaseResponse,
        kind: &str,
        rules: &AssertionRules,
    ) -> Result<()> {
        // unsupported kinds fail before any rule is touched
        let kind = AssertionKind::from_str(kind)?;

        // deep copy with an eager decode; the original response stays
        // pristine for reuse. A non-JSON body is fatal to the call.
        let mut copy = response.clone();
        copy.decode_json()
            .map_err(AssertionError::DecodeFailure)?;

        for (label, rule) in rules {
            let actual = self.resolve_actual(&copy, &rule.actual);
            log::info!(
                "assertion '{}': kind {:?}, expected {}, actual {}",
                label,
                kind,
                rule.expected,
                actual
            );
            self.apply(kind, label, &rule.expected, &actual).await?;
        }
        Ok(())
    }

    /// Resolve the actual-value locator against the response.
    ///
    /// A locator naming a recognized response field resolves to that field's
    /// value. Otherwise, when the decoded body is a flat mapping, the first
    /// key whose value matches the locator is returned, modelling "find
    /// which field currently holds this literal". Failing both, the locator
    /// itself is the actual value.
    fn resolve_actual(&self, response: &CaseResponse, locator: &Value) -> Value {
        let name = value_text(locator);
        if let Some(value) = response.get_field(&name) {
            return value;
        }
        if let Some(Value::Object(body)) = &response.json {
            for (key, value) in body {
                if coerced_equal(value, locator) {
                    return Value::String(key.clone());
                }
            }
        }
        locator.clone()
    }

    async fn apply(
        &self,
        kind: AssertionKind,
        label: &str,
        expected: &Value,
        actual: &Value,
    ) -> Result<()> {
        match kind {
            AssertionKind::Equals => {
                if expected == actual {
                    Ok(())
                } else {
                    Err(self.failed(label, expected, actual))
                }
            }
            AssertionKind::Contains => {
                if contains(actual, expected) {
                    Ok(())
                } else {
                    Err(self.failed(label, expected, actual))
                }
            }
            // both db kinds use containment against the resolved value,
            // preserved from the observed behavior of the original
            AssertionKind::DbEquals | AssertionKind::DbContains => {
                let resolved = self.resolve_db_expected(expected).await?;
                if contains(actual, &resolved) {
                    Ok(())
                } else {
                    Err(self.failed(label, &resolved, actual))
                }
            }
        }
    }

    /// Run the expected descriptor as a query against the lookup
    /// collaborator; the first column of the one-row result is the
    /// effective expected value.
    async fn resolve_db_expected(&self, expected: &Value) -> Result<Value> {
        let query = value_text(expected);
        let lookup = self.lookup.as_ref().ok_or_else(|| {
            crate::error::LookupError::QueryFailed {
                query: query.clone(),
                message: "no database lookup collaborator configured".to_string(),
            }
        })?;
        Ok(lookup.query_first(&query).await?)
    }

    fn failed(&self, label: &str, expected: &Value, actual: &Value) -> crate::error::CaseFlowError {
        let err = AssertionError::Failed {
            label: label.to_string(),
            expected: value_text(expected),
            actual: value_text(actual),
        };
        log::error!("{}", err);
        err.into()
    }
}

impl Default for AssertionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// Membership test: string substring, array element, or object key.
fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::String(s) => s.contains(&value_text(expected)),
        Value::Array(items) => items.iter().any(|item| coerced_equal(item, expected)),
        Value::Object(map) => map.contains_key(&value_text(expected)),
        _ => false,
    }
}
