use jsonpath_rust::JsonPathQuery;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{ExtractionError, Result};
use crate::response::CaseResponse;
use crate::substitution::value_text;
use crate::variable_store::VariableStore;

/// Declarative instruction for pulling one value out of a response.
///
/// Serialized in case documents as a 3-element list
/// `[source_field, expression, index]`. An expression starting with `$` is a
/// JSONPath query over the named field; anything else is a regular expression
/// over the field's string form.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRule {
    pub source: String,
    pub expression: String,
    pub index: i64,
}

impl Serialize for ExtractionRule {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        (&self.source, &self.expression, self.index).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ExtractionRule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let (source, expression, index) = <(String, String, i64)>::deserialize(deserializer)?;
        Ok(Self {
            source,
            expression,
            index,
        })
    }
}

/// Locates values in responses and writes them into the variable store.
pub struct ExtractionEngine {
    store: Arc<VariableStore>,
}

impl ExtractionEngine {
    pub fn new(store: Arc<VariableStore>) -> Self {
        Self { store }
    }

    /// Apply one extraction rule. Never propagates failure past this
    /// boundary: a miss, a bad expression, or a missing field is logged and
    /// the store is left untouched.
    pub fn extract(&self, response: &CaseResponse, variable: &str, rule: &ExtractionRule) {
        match self.try_extract(response, variable, rule) {
            Ok(value) => {
                log::info!("extracted {} = {}", variable, value);
            }
            Err(e) => {
                log::error!("extraction of '{}' failed: {}", variable, e);
            }
        }
    }

    fn try_extract(
        &self,
        response: &CaseResponse,
        variable: &str,
        rule: &ExtractionRule,
    ) -> Result<Value> {
        // defensive copy with an eager body decode; a non-JSON body only
        // makes the `json` field unavailable
        let copy = response.decoded();

        let data = copy
            .get_field(&rule.source)
            .ok_or_else(|| ExtractionError::MissingField(rule.source.clone()))?;

        let matches = if rule.expression.starts_with('$') {
            self.query_path(&data, &rule.expression)?
        } else {
            self.match_regex(&data, &rule.expression)?
        };

        let index = usize::try_from(rule.index).ok();
        let chosen = index
            .and_then(|i| matches.get(i))
            .ok_or_else(|| ExtractionError::Miss {
                variable: variable.to_string(),
                matched: matches.len(),
                index: rule.index.max(0) as usize,
            })?
            .clone();

        self.store.set(variable, chosen.clone())?;
        Ok(chosen)
    }

    /// Ordered JSONPath matches over the field value.
    fn query_path(&self, data: &Value, expression: &str) -> Result<Vec<Value>> {
        let result = data.clone().path(expression).map_err(|e| {
            ExtractionError::InvalidExpression {
                expression: expression.to_string(),
                message: e.to_string(),
            }
        })?;
        log::debug!("jsonpath {} matched {}", expression, result);
        Ok(match result {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        })
    }

    /// Non-overlapping regex matches over the string form of the field
    /// value, in order of appearance. With a capture group the group's text
    /// is taken, mirroring `findall` semantics.
    fn match_regex(&self, data: &Value, expression: &str) -> Result<Vec<Value>> {
        let pattern = Regex::new(expression).map_err(|e| ExtractionError::InvalidExpression {
            expression: expression.to_string(),
            message: e.to_string(),
        })?;
        let haystack = value_text(data);
        let matches: Vec<Value> = pattern
            .captures_iter(&haystack)
            .filter_map(|caps| {
                let m = if caps.len() > 1 { caps.get(1) } else { caps.get(0) };
                m.map(|m| Value::String(m.as_str().to_string()))
            })
            .collect();
        log::debug!("regex {} matched {:?}", expression, matches);
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn engine(dir: &TempDir) -> (ExtractionEngine, Arc<VariableStore>) {
        let store = Arc::new(VariableStore::new(dir.path().join("extract.yaml")));
        store.clear().unwrap();
        (ExtractionEngine::new(store.clone()), store)
    }

    fn json_response(body: &str) -> CaseResponse {
        CaseResponse::new(200, HashMap::new(), body.to_string())
    }

    fn rule(source: &str, expression: &str, index: i64) -> ExtractionRule {
        ExtractionRule {
            source: source.to_string(),
            expression: expression.to_string(),
            index,
        }
    }

    #[test]
    fn test_jsonpath_extraction() {
        let dir = TempDir::new().unwrap();
        let (engine, store) = engine(&dir);
        let response = json_response(r#"{"a": {"b": 5}}"#);

        engine.extract(&response, "b_value", &rule("json", "$.a.b", 0));
        assert_eq!(store.get("b_value"), Some(json!(5)));
    }

    #[test]
    fn test_regex_extraction_with_index() {
        let dir = TempDir::new().unwrap();
        let (engine, store) = engine(&dir);
        let response = json_response("token=abc123;token=def456");

        engine.extract(&response, "second", &rule("text", r"token=(\w+)", 1));
        assert_eq!(store.get("second"), Some(json!("def456")));
    }

    #[test]
    fn test_out_of_range_index_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let (engine, store) = engine(&dir);
        let response = json_response(r#"{"a": 1}"#);

        engine.extract(&response, "miss", &rule("json", "$.a", 5));
        assert_eq!(store.get("miss"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_negative_index_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let (engine, store) = engine(&dir);
        let response = json_response("token=abc");

        engine.extract(&response, "neg", &rule("text", r"token=(\w+)", -1));
        assert_eq!(store.get("neg"), None);
    }

    #[test]
    fn test_missing_field_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let (engine, store) = engine(&dir);
        let response = json_response(r#"{"a": 1}"#);

        engine.extract(&response, "v", &rule("cookies", "$.a", 0));
        assert!(store.is_empty());
    }

    #[test]
    fn test_non_json_body_does_not_break_text_extraction() {
        let dir = TempDir::new().unwrap();
        let (engine, store) = engine(&dir);
        let response = json_response("plain body id=77");

        engine.extract(&response, "id", &rule("text", r"id=(\d+)", 0));
        assert_eq!(store.get("id"), Some(json!("77")));
    }

    #[test]
    fn test_jsonpath_wildcard_returns_ordered_matches() {
        let dir = TempDir::new().unwrap();
        let (engine, store) = engine(&dir);
        let response = json_response(r#"{"items": [{"id": 1}, {"id": 2}, {"id": 3}]}"#);

        engine.extract(&response, "mid", &rule("json", "$.items[*].id", 1));
        assert_eq!(store.get("mid"), Some(json!(2)));
    }

    #[test]
    fn test_rule_deserializes_from_three_element_list() {
        let parsed: ExtractionRule = serde_yaml::from_str("[json, $.access_token, 0]").unwrap();
        assert_eq!(parsed, rule("json", "$.access_token", 0));
    }
}
