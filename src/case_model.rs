use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::assertion::{AssertionRules, SUPPORTED_KINDS};
use crate::error::{CaseError, Result};
use crate::extraction::ExtractionRule;

/// One declarative test case as read from a case document.
///
/// Constructed once per test invocation and never mutated afterwards.
/// `request` and `validate` stay as raw values because both pass through the
/// substitution engine before being given their final shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseDescriptor {
    pub feature: String,
    pub story: String,
    pub title: String,
    pub request: Value,
    #[serde(default)]
    pub validate: Option<Value>,
    #[serde(default)]
    pub extract: Option<BTreeMap<String, ExtractionRule>>,
    #[serde(default)]
    pub parametrize: Option<Vec<Vec<Value>>>,
}

/// Validate and construct a case from parsed document data.
///
/// `file` names the source document for diagnostics.
pub fn verify_case(raw: &Value, file: &str) -> Result<CaseDescriptor> {
    let case: CaseDescriptor =
        serde_json::from_value(raw.clone()).map_err(|e| CaseError::ValidationError {
            file: file.to_string(),
            message: e.to_string(),
        })?;
    if let Some(validate) = &case.validate {
        check_validate_shape(validate, file)?;
    }
    Ok(case)
}

/// Shape check for the `validate` mapping: supported kind keys, each holding
/// a mapping of label to a 2-element `[expected, actual_locator]` list.
fn check_validate_shape(validate: &Value, file: &str) -> Result<()> {
    let kinds = validate.as_object().ok_or_else(|| CaseError::ValidationError {
        file: file.to_string(),
        message: "'validate' must be a mapping of assertion kind to rules".to_string(),
    })?;
    for (kind, rules) in kinds {
        if !SUPPORTED_KINDS.contains(&kind.as_str()) {
            return Err(CaseError::ValidationError {
                file: file.to_string(),
                message: format!(
                    "assertion kind '{}' must be one of {:?}",
                    kind, SUPPORTED_KINDS
                ),
            }
            .into());
        }
        let labels = rules.as_object().ok_or_else(|| CaseError::ValidationError {
            file: file.to_string(),
            message: format!("'validate.{}' must be a mapping of label to rule", kind),
        })?;
        for (label, rule) in labels {
            let ok = matches!(rule, Value::Array(items) if items.len() == 2);
            if !ok {
                return Err(CaseError::ValidationError {
                    file: file.to_string(),
                    message: format!(
                        "'validate.{}.{}' must be a 2-element [expected, actual] list",
                        kind, label
                    ),
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Parse a (substituted) `validate` value into typed rule sets per kind.
pub fn parse_validate(validate: &Value) -> Result<BTreeMap<String, AssertionRules>> {
    Ok(serde_json::from_value(validate.clone())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_case() -> Value {
        json!({
            "feature": "auth",
            "story": "login",
            "title": "valid credentials",
            "request": {"method": "post", "url": "/login"}
        })
    }

    #[test]
    fn test_minimal_case_verifies() {
        let case = verify_case(&minimal_case(), "login").unwrap();
        assert_eq!(case.title, "valid credentials");
        assert!(case.validate.is_none());
        assert!(case.extract.is_none());
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let mut raw = minimal_case();
        raw.as_object_mut().unwrap().remove("title");
        let err = verify_case(&raw, "login").unwrap_err();
        assert!(err.to_string().contains("login"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut raw = minimal_case();
        raw.as_object_mut()
            .unwrap()
            .insert("extras".to_string(), json!(1));
        assert!(verify_case(&raw, "login").is_err());
    }

    #[test]
    fn test_extract_must_be_three_element_lists() {
        let mut raw = minimal_case();
        raw.as_object_mut()
            .unwrap()
            .insert("extract".to_string(), json!({"token": ["json", "$.token"]}));
        assert!(verify_case(&raw, "login").is_err());

        raw.as_object_mut()
            .unwrap()
            .insert("extract".to_string(), json!({"token": ["json", "$.token", 0]}));
        let case = verify_case(&raw, "login").unwrap();
        let extract = case.extract.unwrap();
        assert_eq!(extract["token"].expression, "$.token");
    }

    #[test]
    fn test_validate_kind_must_be_supported() {
        let mut raw = minimal_case();
        raw.as_object_mut().unwrap().insert(
            "validate".to_string(),
            json!({"startswith": {"check": [200, "status_code"]}}),
        );
        let err = verify_case(&raw, "login").unwrap_err();
        assert!(err.to_string().contains("startswith"));
    }

    #[test]
    fn test_validate_rule_must_be_pair() {
        let mut raw = minimal_case();
        raw.as_object_mut().unwrap().insert(
            "validate".to_string(),
            json!({"equals": {"check": [200]}}),
        );
        assert!(verify_case(&raw, "login").is_err());
    }

    #[test]
    fn test_parse_validate_into_typed_rules() {
        let validate = json!({
            "equals": {"status ok": [200, "status_code"]},
            "contains": {"has ok": ["ok", "text"]}
        });
        let parsed = parse_validate(&validate).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["equals"]["status ok"].expected, json!(200));
        assert_eq!(parsed["contains"]["has ok"].actual, json!("text"));
    }
}
