use regex::Regex;
use serde_json::Value;
use std::sync::Arc;

use crate::error::SubstitutionError;
use crate::registry::HelperRegistry;
use crate::variable_store::VariableStore;

/// Plain-text form of a value as it appears inside a rewritten payload.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Format a resolved value for textual insertion into a serialized payload.
/// A string consisting only of digits is kept as a quoted literal so the
/// reparse does not turn it into a number. Shared with the parametrize
/// expansion, which substitutes values under the same rule.
pub(crate) fn format_resolved(value: &Value) -> String {
    match value {
        Value::String(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => {
            format!("'{}'", s)
        }
        other => value_text(other),
    }
}

/// Rewrites serialized request payloads by resolving `${name(args)}` call
/// expressions against the helper registry and flat `${name}` placeholders
/// against the variable store.
///
/// The payload is dumped to YAML, rewritten textually, and reparsed. This is
/// deliberately not a real parser: the grammar is one level of call
/// expressions with a literal comma split of arguments.
pub struct SubstitutionEngine {
    registry: Arc<HelperRegistry>,
    store: Arc<VariableStore>,
    call_expr: Regex,
    var_expr: Regex,
}

impl SubstitutionEngine {
    pub fn new(registry: Arc<HelperRegistry>, store: Arc<VariableStore>) -> Self {
        Self {
            registry,
            store,
            // the patterns are literals, construction cannot fail
            call_expr: Regex::new(r"\$\{(.*?)\((.*?)\)\}").unwrap(),
            var_expr: Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap(),
        }
    }

    /// Resolve every expression in `payload`, best-effort. Helper failures
    /// leave the occurrence textually unchanged; a rewrite that no longer
    /// parses as YAML is `MalformedPayload`.
    pub fn substitute(&self, payload: &Value) -> Result<Value, SubstitutionError> {
        let text = serde_yaml::to_string(payload)
            .map_err(|e| SubstitutionError::MalformedPayload(e.to_string()))?;
        let rewritten = self.rewrite(&text);
        serde_yaml::from_str(&rewritten)
            .map_err(|e| SubstitutionError::MalformedPayload(e.to_string()))
    }

    /// Textual rewrite pass over a serialized payload.
    fn rewrite(&self, text: &str) -> String {
        let mut result = text.to_string();

        // call expressions first, in first-to-last textual order, each
        // distinct match resolved once and replaced everywhere
        let mut seen: Vec<String> = Vec::new();
        let calls: Vec<(String, String, String)> = self
            .call_expr
            .captures_iter(text)
            .map(|c| (c[0].to_string(), c[1].to_string(), c[2].to_string()))
            .collect();
        for (full, name, raw_args) in calls {
            if seen.contains(&full) {
                continue;
            }
            seen.push(full.clone());
            let args: Vec<String> = if raw_args.is_empty() {
                Vec::new()
            } else {
                // literal comma split, no escaping support
                raw_args.split(',').map(str::to_string).collect()
            };
            match self.registry.resolve(&name, &args) {
                Ok(value) => {
                    result = result.replace(&full, &format_resolved(&value));
                }
                Err(e) => {
                    log::warn!("helper expression {} left unresolved: {}", full, e);
                }
            }
        }

        // flat variable placeholders resolved from the store
        let snapshot = result.clone();
        let vars: Vec<(String, String)> = self
            .var_expr
            .captures_iter(&snapshot)
            .map(|c| (c[0].to_string(), c[1].to_string()))
            .collect();
        for (full, name) in vars {
            match self.store.get(&name) {
                Some(value) => {
                    result = result.replace(&full, &format_resolved(&value));
                }
                None => {
                    log::warn!("variable placeholder {} has no store entry", full);
                }
            }
        }

        result
    }
}
