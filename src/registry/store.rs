//! Registry persistence backends

use crate::error::RegistryError;
use crate::gateway::RepoId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The persisted record: the user-added repositories, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryRecord {
    #[serde(default)]
    pub repositories: Vec<RepoId>,
}

/// Where the user set lives between runs.
///
/// The whole record is read and written on every mutation.
pub trait RegistryStore: Send + Sync {
    fn load(&self) -> Result<RegistryRecord, RegistryError>;

    fn save(&self, record: &RegistryRecord) -> Result<(), RegistryError>;
}

/// `<data_dir>/repo-chat/repositories.json`, or `./repositories.json` when
/// the platform has no data directory
pub fn default_registry_path() -> PathBuf {
    match dirs::data_dir() {
        Some(dir) => dir.join("repo-chat").join("repositories.json"),
        None => PathBuf::from("repositories.json"),
    }
}

/// Single JSON file on disk
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RegistryStore for JsonFileStore {
    fn load(&self) -> Result<RegistryRecord, RegistryError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No registry file at {}, starting empty", self.path.display());
                Ok(RegistryRecord::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, record: &RegistryRecord) -> Result<(), RegistryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Write next to the target, then move into place
        let temp_path = self.path.with_extension("json.tmp");
        let formatted = serde_json::to_string_pretty(record)?;
        std::fs::write(&temp_path, formatted)?;
        if let Err(e) = std::fs::rename(&temp_path, &self.path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Volatile store for tests and embedding hosts
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Mutex<RegistryRecord>,
    fail_saves: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: RegistryRecord) -> Self {
        Self {
            record: Mutex::new(record),
            fail_saves: false,
        }
    }

    /// A store whose `save` always fails
    pub fn failing() -> Self {
        Self {
            record: Mutex::new(RegistryRecord::default()),
            fail_saves: true,
        }
    }
}

impl RegistryStore for MemoryStore {
    fn load(&self) -> Result<RegistryRecord, RegistryError> {
        Ok(self
            .record
            .lock()
            .map_err(|_| poisoned())?
            .clone())
    }

    fn save(&self, record: &RegistryRecord) -> Result<(), RegistryError> {
        if self.fail_saves {
            return Err(std::io::Error::other("store is read-only").into());
        }
        *self.record.lock().map_err(|_| poisoned())? = record.clone();
        Ok(())
    }
}

fn poisoned() -> RegistryError {
    std::io::Error::other("registry store lock poisoned").into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nope.json"));
        assert_eq!(store.load().unwrap(), RegistryRecord::default());
    }

    #[test]
    fn test_save_creates_parent_dirs_and_record_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("repositories.json");
        let store = JsonFileStore::new(&path);

        let record = RegistryRecord {
            repositories: vec![RepoId::new("tokio-rs", "tokio")],
        };
        store.save(&record).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({"repositories": [{"owner": "tokio-rs", "repo": "tokio"}]})
        );
        assert_eq!(store.load().unwrap(), record);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_serde_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repositories.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, RegistryError::Serde(_)));
    }

    #[test]
    fn test_default_path_file_name() {
        let path = default_registry_path();
        assert!(path.ends_with("repositories.json"));
    }
}
