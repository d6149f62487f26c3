//! Definition Registry
//!
//! Authoritative in-memory store of committed definitions, keyed by
//! [`StableId`]. Readers load an immutable snapshot without locking; writers
//! are serialized, clone the map, apply their change and publish the new map
//! with a single atomic swap. A published [`Definition`] is never mutated in
//! place, so a reader holding an `Arc<Definition>` always sees one whole
//! revision.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::checksum::Checksum;
use crate::definition::Definition;
use crate::error::{Result, WorkbenchError};
use crate::id::StableId;
use crate::validation::ReferenceResolver;

type EntryMap = HashMap<StableId, Arc<Definition>>;

#[derive(Debug, Default)]
struct RegistryState {
    entries: EntryMap,
    /// Bumped on every successful write
    generation: u64,
}

/// The definition registry
#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    state: ArcSwap<RegistryState>,
    /// Serializes writers; readers never take it
    writer: Mutex<()>,
}

impl DefinitionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition under its own id
    ///
    /// Fails with `DuplicateId` if the id is taken; replacing an existing
    /// entry is reserved for the commit pipeline.
    pub fn register(&self, mut definition: Definition) -> Result<Arc<Definition>> {
        definition.committed = true;
        definition.revision = definition.revision.max(1);
        let definition = Arc::new(definition);

        self.update(|entries| {
            if entries.contains_key(&definition.id) {
                return Err(WorkbenchError::DuplicateId(definition.id.clone()));
            }
            entries.insert(definition.id.clone(), Arc::clone(&definition));
            Ok(())
        })?;

        debug!(id = %definition.id, revision = definition.revision, "definition registered");
        Ok(definition)
    }

    /// Resolve an id to its committed definition
    pub fn resolve(&self, id: &StableId) -> Result<Arc<Definition>> {
        self.get(id)
            .ok_or_else(|| WorkbenchError::NotFound(id.clone()))
    }

    /// Get a definition if present
    pub fn get(&self, id: &StableId) -> Option<Arc<Definition>> {
        self.state.load().entries.get(id).cloned()
    }

    /// Remove a definition
    pub fn unregister(&self, id: &StableId) -> Result<Arc<Definition>> {
        let removed = self.update(|entries| {
            entries
                .remove(id)
                .ok_or_else(|| WorkbenchError::NotFound(id.clone()))
        })?;
        debug!(id = %id, "definition unregistered");
        Ok(removed)
    }

    /// Remove a definition no other definition links to
    ///
    /// The check and the removal happen under the writer lock, so no commit
    /// can slip a new link in between.
    pub(crate) fn unregister_unreferenced(&self, id: &StableId) -> Result<Arc<Definition>> {
        let removed = self.update(|entries| {
            if !entries.contains_key(id) {
                return Err(WorkbenchError::NotFound(id.clone()));
            }
            let referrers = referrers(entries, id);
            if !referrers.is_empty() {
                return Err(WorkbenchError::Referenced {
                    id: id.clone(),
                    referrers,
                });
            }
            entries
                .remove(id)
                .ok_or_else(|| WorkbenchError::NotFound(id.clone()))
        })?;
        debug!(id = %id, "definition unregistered");
        Ok(removed)
    }

    /// Definitions of one category as of this call, ordered by id
    pub fn list_by_category(&self, category: &str) -> CategoryIter {
        self.snapshot().list_by_category(category)
    }

    /// Point-in-time view of the whole registry
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            state: self.state.load_full(),
        }
    }

    /// Write counter; changes whenever any entry changes
    pub fn generation(&self) -> u64 {
        self.state.load().generation
    }

    pub fn contains(&self, id: &StableId) -> bool {
        self.state.load().entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.state.load().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a definition that must not exist yet
    pub(crate) fn insert_new(&self, definition: Arc<Definition>) -> Result<()> {
        self.update(|entries| {
            if entries.contains_key(&definition.id) {
                return Err(WorkbenchError::DuplicateId(definition.id.clone()));
            }
            entries.insert(definition.id.clone(), definition);
            Ok(())
        })
    }

    /// Insert or replace, returning the previous revision
    pub(crate) fn replace(&self, definition: Arc<Definition>) -> Option<Arc<Definition>> {
        // The closure cannot fail, so neither can the update.
        self.update(|entries| Ok(entries.insert(definition.id.clone(), definition)))
            .unwrap_or(None)
    }

    fn update<T>(&self, apply: impl FnOnce(&mut EntryMap) -> Result<T>) -> Result<T> {
        let _guard = self.writer.lock();
        let current = self.state.load_full();

        let mut entries = current.entries.clone();
        let out = apply(&mut entries)?;

        let generation = current.generation + 1;
        self.state.store(Arc::new(RegistryState { entries, generation }));
        trace!(generation, "registry swapped");
        Ok(out)
    }
}

fn referrers(entries: &EntryMap, id: &StableId) -> Vec<StableId> {
    let mut ids: Vec<StableId> = entries
        .values()
        .filter(|def| &def.id != id && def.fields.values().any(|value| value.refers_to(id)))
        .map(|def| def.id.clone())
        .collect();
    ids.sort();
    ids
}

impl ReferenceResolver for DefinitionRegistry {
    fn exists(&self, id: &StableId) -> bool {
        self.contains(id)
    }
}

/// Immutable view of the registry at one generation
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    state: Arc<RegistryState>,
}

impl RegistrySnapshot {
    pub fn get(&self, id: &StableId) -> Option<&Arc<Definition>> {
        self.state.entries.get(id)
    }

    pub fn contains(&self, id: &StableId) -> bool {
        self.state.entries.contains_key(id)
    }

    pub fn generation(&self) -> u64 {
        self.state.generation
    }

    pub fn len(&self) -> usize {
        self.state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.entries.is_empty()
    }

    /// All ids, sorted
    pub fn ids(&self) -> Vec<StableId> {
        let mut ids: Vec<_> = self.state.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Definitions of one category, ordered by id
    pub fn list_by_category(&self, category: &str) -> CategoryIter {
        let mut ids: Vec<_> = self
            .state
            .entries
            .keys()
            .filter(|id| id.category() == category)
            .cloned()
            .collect();
        ids.sort();

        CategoryIter {
            state: Arc::clone(&self.state),
            ids: ids.into_iter(),
        }
    }

    /// Ids of definitions whose fields link to `id`, sorted
    pub fn referrers(&self, id: &StableId) -> Vec<StableId> {
        referrers(&self.state.entries, id)
    }

    /// Fingerprint over every entry's id and content, in id order
    pub fn fingerprint(&self) -> Checksum {
        let checksums: Vec<Checksum> = self
            .ids()
            .iter()
            .filter_map(|id| self.state.entries.get(id))
            .map(|def| def.checksum())
            .collect();
        Checksum::combine(&checksums)
    }
}

impl ReferenceResolver for RegistrySnapshot {
    fn exists(&self, id: &StableId) -> bool {
        self.contains(id)
    }
}

/// Lazy iterator over a category's definitions in a registry snapshot
#[derive(Debug)]
pub struct CategoryIter {
    state: Arc<RegistryState>,
    ids: std::vec::IntoIter<StableId>,
}

impl Iterator for CategoryIter {
    type Item = Arc<Definition>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.ids.next()?;
        self.state.entries.get(&id).cloned()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}

impl ExactSizeIterator for CategoryIter {}
