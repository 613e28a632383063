//! Repository registry
//!
//! The set of repositories a user has opened, kept apart from a fixed set of
//! defaults that is always listed. Only the user set is persisted.

pub mod store;

pub use store::{default_registry_path, JsonFileStore, MemoryStore, RegistryRecord, RegistryStore};

use crate::error::RegistryError;
use crate::gateway::RepoId;
use std::sync::{Mutex, OnceLock};
use tracing::{debug, info, warn};

/// Repositories listed for every user, never persisted
pub const DEFAULT_REPOSITORIES: [(&str, &str); 3] = [
    ("Yonom", "assistant-ui"),
    ("langchain-ai", "langchain"),
    ("openai", "whisper"),
];

pub fn default_repos() -> Vec<RepoId> {
    DEFAULT_REPOSITORIES
        .iter()
        .map(|(owner, name)| RepoId::new(*owner, *name))
        .collect()
}

pub struct RepositoryRegistry {
    store: Box<dyn RegistryStore>,
    defaults: Vec<RepoId>,
    /// Held for the whole read-check-write of a mutation
    lock: Mutex<()>,
}

impl RepositoryRegistry {
    pub fn new(store: Box<dyn RegistryStore>) -> Self {
        Self {
            store,
            defaults: default_repos(),
            lock: Mutex::new(()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }

    pub fn is_default(&self, repo: &RepoId) -> bool {
        self.defaults.contains(repo)
    }

    pub fn defaults(&self) -> &[RepoId] {
        &self.defaults
    }

    /// User-added repositories, in insertion order
    pub fn list(&self) -> Result<Vec<RepoId>, RegistryError> {
        Ok(self.store.load()?.repositories)
    }

    /// Defaults followed by user-added repositories
    pub fn all(&self) -> Result<Vec<RepoId>, RegistryError> {
        let mut repos = self.defaults.clone();
        repos.extend(self.list()?);
        Ok(repos)
    }

    /// Add `repo` to the user set.
    ///
    /// Returns `false` when it is a default or already present.
    pub fn add(&self, repo: RepoId) -> Result<bool, RegistryError> {
        if self.is_default(&repo) {
            debug!(repo = %repo, "Default repository, not added to user set");
            return Ok(false);
        }

        let _guard = self.lock.lock().map_err(|_| poisoned())?;
        let mut record = self.store.load()?;
        if record.repositories.contains(&repo) {
            return Ok(false);
        }
        record.repositories.push(repo.clone());
        self.store.save(&record).inspect_err(|e| {
            warn!(repo = %repo, error = %e, "Failed to persist registry");
        })?;
        info!(repo = %repo, "Repository added to registry");
        Ok(true)
    }

    /// Remove `owner/name` from the user set. Absent entries are a no-op
    /// returning `false`.
    pub fn remove(&self, owner: &str, name: &str) -> Result<bool, RegistryError> {
        let _guard = self.lock.lock().map_err(|_| poisoned())?;
        let mut record = self.store.load()?;
        let before = record.repositories.len();
        record.repositories.retain(|r| !r.matches(owner, name));
        if record.repositories.len() == before {
            return Ok(false);
        }
        self.store.save(&record)?;
        info!(owner, name, "Repository removed from registry");
        Ok(true)
    }
}

fn poisoned() -> RegistryError {
    std::io::Error::other("registry lock poisoned").into()
}

static GLOBAL: OnceLock<RepositoryRegistry> = OnceLock::new();

/// The process-wide registry.
///
/// Initialized on first access with a [`JsonFileStore`] at `REGISTRY_PATH`
/// or [`default_registry_path`], unless [`install_global`] ran first.
pub fn global() -> &'static RepositoryRegistry {
    GLOBAL.get_or_init(|| {
        let path = std::env::var("REGISTRY_PATH")
            .map(Into::into)
            .unwrap_or_else(|_| default_registry_path());
        debug!("Registry store at {}", path.display());
        RepositoryRegistry::new(Box::new(JsonFileStore::new(path)))
    })
}

/// Set the process-wide registry. Gives `registry` back if one is already in
/// place.
pub fn install_global(registry: RepositoryRegistry) -> Result<(), RepositoryRegistry> {
    GLOBAL.set(registry)
}
