use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::case_model::{verify_case, CaseDescriptor};
use crate::error::{CaseError, Result};
use crate::substitution::{format_resolved, value_text};

/// Cases executed in order against a shared variable store. A document with
/// two or more cases is one flow; a parametrized document expands into one
/// single-case flow per data row.
pub type CaseFlow = Vec<CaseDescriptor>;

/// Read one YAML case document into its flows.
pub fn read_case_file(path: &Path) -> Result<Vec<CaseFlow>> {
    let file = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let raw = fs::read_to_string(path)
        .map_err(|_| CaseError::FileNotFound(path.display().to_string()))?;
    let cases: Vec<Value> =
        serde_yaml::from_str(&raw).map_err(|e| CaseError::ParseError {
            file: file.clone(),
            message: e.to_string(),
        })?;

    match cases.len() {
        0 => Ok(Vec::new()),
        1 => {
            let case = &cases[0];
            if case.get("parametrize").is_some() {
                let expanded = expand_parametrized(case, &file)?;
                expanded
                    .iter()
                    .map(|row| Ok(vec![verify_case(row, &file)?]))
                    .collect()
            } else {
                Ok(vec![vec![verify_case(case, &file)?]])
            }
        }
        _ => {
            let flow: Result<CaseFlow> =
                cases.iter().map(|case| verify_case(case, &file)).collect();
            Ok(vec![flow?])
        }
    }
}

/// Expand a `$ddt{name}` parametrized case: the first table row is the
/// parameter names, each later row yields one concrete case. Substitution is
/// textual over the dumped document, with digit-string values kept quoted so
/// the reparse does not retype them.
fn expand_parametrized(case: &Value, file: &str) -> Result<Vec<Value>> {
    let table = case
        .get("parametrize")
        .and_then(Value::as_array)
        .ok_or_else(|| CaseError::InvalidParametrize {
            file: file.to_string(),
            message: "'parametrize' must be a list of rows".to_string(),
        })?;
    let names: Vec<String> = table
        .first()
        .and_then(Value::as_array)
        .map(|row| row.iter().map(value_text).collect())
        .ok_or_else(|| CaseError::InvalidParametrize {
            file: file.to_string(),
            message: "first row must list the parameter names".to_string(),
        })?;
    if names.is_empty() {
        return Err(CaseError::InvalidParametrize {
            file: file.to_string(),
            message: "parameter name row is empty".to_string(),
        }
        .into());
    }
    for row in table {
        let width = row.as_array().map(Vec::len).unwrap_or(0);
        if width != names.len() {
            return Err(CaseError::InvalidParametrize {
                file: file.to_string(),
                message: format!("expected rows of {} values, found {}", names.len(), width),
            }
            .into());
        }
    }

    let template = serde_yaml::to_string(case).map_err(|e| CaseError::ParseError {
        file: file.to_string(),
        message: e.to_string(),
    })?;

    let mut expanded = Vec::new();
    for row in table.iter().skip(1) {
        let values = match row.as_array() {
            Some(values) => values,
            None => continue,
        };
        let mut text = template.clone();
        for (name, value) in names.iter().zip(values) {
            let token = format!("$ddt{{{}}}", name);
            text = text.replace(&token, &format_resolved(value));
        }
        let mut concrete: Value =
            serde_yaml::from_str(&text).map_err(|e| CaseError::ParseError {
                file: file.to_string(),
                message: format!("after parametrize substitution: {}", e),
            })?;
        if let Some(map) = concrete.as_object_mut() {
            map.remove("parametrize");
        }
        expanded.push(concrete);
    }
    log::info!("expanded {} parametrized case(s) from {}", expanded.len(), file);
    Ok(expanded)
}

/// Recursively collect `.yaml`/`.yml` case files under `dir`, sorted.
pub fn discover_case_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_yaml(dir, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_yaml(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_yaml(&path, out)?;
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        ) {
            out.push(path);
        }
    }
    Ok(())
}
