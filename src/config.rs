use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{CaseFlowError, Result};

/// Runner configuration loaded from a YAML document.
///
/// `environment` is the key-value section consulted by the `env` helper;
/// `global_params` are run-wide query parameters merged into every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default)]
    pub base_url: String,

    #[serde(default)]
    pub environment: HashMap<String, String>,

    #[serde(default)]
    pub global_params: HashMap<String, String>,

    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    #[serde(default = "default_case_dir")]
    pub case_dir: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("extract.yaml")
}

fn default_case_dir() -> PathBuf {
    PathBuf::from("testcases")
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            environment: HashMap::new(),
            global_params: HashMap::new(),
            store_path: default_store_path(),
            case_dir: default_case_dir(),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from `path`. A missing file yields the defaults
    /// with a log line; a malformed file is an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "config file {} not found, using defaults",
                    path.display()
                );
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        serde_yaml::from_str(&raw).map_err(|e| {
            CaseFlowError::Configuration(format!("{}: {}", path.display(), e))
        })
    }
}
