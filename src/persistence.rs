//! Durable definition storage
//!
//! The workbench writes committed definitions through a [`DefinitionStore`].
//! Two stores ship with the crate: [`MemoryStore`] and
//! [`JsonDirectoryStore`], which keeps one pretty-printed JSON file per
//! definition laid out as `<root>/<category>/<name>.json`.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::definition::Definition;
use crate::id::StableId;

/// Storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No stored definition for {0}")]
    NotFound(StableId),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Where committed definitions are kept between runs
pub trait DefinitionStore: Send + Sync {
    fn load(&self, id: &StableId) -> Result<Definition, StoreError>;

    /// Write a definition, replacing any stored revision
    fn save(&self, definition: &Definition) -> Result<(), StoreError>;

    /// Remove a stored definition; `NotFound` if there is none
    fn remove(&self, id: &StableId) -> Result<(), StoreError>;

    /// Ids of every stored definition, sorted
    fn list(&self) -> Result<Vec<StableId>, StoreError>;
}

// =============================================================================
// In-memory store
// =============================================================================

/// Store backed by a map; contents are lost with the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<StableId, Definition>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl DefinitionStore for MemoryStore {
    fn load(&self, id: &StableId) -> Result<Definition, StoreError> {
        self.entries
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn save(&self, definition: &Definition) -> Result<(), StoreError> {
        self.entries
            .write()
            .insert(definition.id.clone(), definition.clone());
        Ok(())
    }

    fn remove(&self, id: &StableId) -> Result<(), StoreError> {
        self.entries
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn list(&self) -> Result<Vec<StableId>, StoreError> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}

// =============================================================================
// JSON directory store
// =============================================================================

/// One JSON file per definition under a root directory
#[derive(Debug, Clone)]
pub struct JsonDirectoryStore {
    root: PathBuf,
}

impl JsonDirectoryStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File a definition is stored in
    pub fn path_for(&self, id: &StableId) -> PathBuf {
        self.root
            .join(id.category())
            .join(format!("{}.json", id.name()))
    }
}

impl DefinitionStore for JsonDirectoryStore {
    fn load(&self, id: &StableId) -> Result<Definition, StoreError> {
        let path = self.path_for(id);
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(id.clone()),
            _ => StoreError::Io(e),
        })?;
        let definition: Definition = serde_json::from_str(&content)?;
        if definition.id != *id {
            return Err(StoreError::Backend(format!(
                "{} contains definition {}",
                path.display(),
                definition.id
            )));
        }
        Ok(definition)
    }

    fn save(&self, definition: &Definition) -> Result<(), StoreError> {
        let path = self.path_for(&definition.id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(definition)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;

        debug!(id = %definition.id, path = %path.display(), "definition written");
        Ok(())
    }

    fn remove(&self, id: &StableId) -> Result<(), StoreError> {
        fs::remove_file(self.path_for(id)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(id.clone()),
            _ => StoreError::Io(e),
        })
    }

    fn list(&self) -> Result<Vec<StableId>, StoreError> {
        let mut ids = Vec::new();

        for entry in WalkDir::new(&self.root).min_depth(2).max_depth(2) {
            let entry = entry.map_err(|e| StoreError::Backend(e.to_string()))?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let category = path
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|s| s.to_str());
            let name = path.file_stem().and_then(|s| s.to_str());
            match (category, name) {
                (Some(category), Some(name)) => match StableId::new(category, name) {
                    Ok(id) => ids.push(id),
                    Err(e) => warn!(path = %path.display(), error = %e, "skipping stray file"),
                },
                _ => warn!(path = %path.display(), "skipping unreadable file name"),
            }
        }

        ids.sort();
        Ok(ids)
    }
}
