use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Run-scoped key-value namespace shared across test cases.
///
/// Written only by the extraction engine, read by substitution and assertion
/// expected-value resolution. Cleared exactly once at run start; later writes
/// for the same key overwrite earlier ones. The lock exists for the day case
/// execution becomes parallel; today the runner guarantees a single
/// writer/reader in flight at a time.
pub struct VariableStore {
    entries: RwLock<BTreeMap<String, Value>>,
    path: PathBuf,
}

impl VariableStore {
    /// Create a store persisted to `path`. The file is not touched until
    /// `clear` or the first `set`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Reset the namespace for a new run. Truncates the persisted document.
    pub fn clear(&self) -> Result<()> {
        self.entries.write().clear();
        fs::write(&self.path, "")?;
        log::info!("variable store cleared: {}", self.path.display());
        Ok(())
    }

    /// Insert or overwrite a variable and flush the whole map to disk.
    pub fn set(&self, name: &str, value: Value) -> Result<()> {
        let snapshot = {
            let mut entries = self.entries.write();
            entries.insert(name.to_string(), value);
            entries.clone()
        };
        let doc = serde_yaml::to_string(&snapshot)?;
        fs::write(&self.path, doc)?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.entries.read().get(name).cloned()
    }

    /// Snapshot of every entry currently in the namespace.
    pub fn read_all(&self) -> BTreeMap<String, Value> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Re-read the in-memory map from the persisted document. Used when
    /// another process appended to the file mid-run.
    pub fn load(&self) -> Result<()> {
        let map = read_store_file(&self.path);
        *self.entries.write() = map;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read a persisted store document into a flat map. Missing or empty files
/// yield an empty map; a malformed document is logged and treated as empty.
pub fn read_store_file(path: &Path) -> BTreeMap<String, Value> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            log::warn!("unable to read store file {}: {}", path.display(), e);
            return BTreeMap::new();
        }
    };
    if raw.trim().is_empty() {
        return BTreeMap::new();
    }
    match serde_yaml::from_str::<BTreeMap<String, Value>>(&raw) {
        Ok(map) => map,
        Err(e) => {
            log::error!("store file {} is not a flat mapping: {}", path.display(), e);
            BTreeMap::new()
        }
    }
}
