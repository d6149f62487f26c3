//! Commit pipeline
//!
//! `commit` turns a valid working copy into a new registry revision:
//!
//! 1. validate; errors fail the commit and leave the registry untouched
//! 2. derive the id (new copies) and reject taken ids
//! 3. swap the new revision into the registry
//! 4. close the working copy, dropping its history and lock
//! 5. publish the change
//! 6. persist through the store, if one is configured
//!
//! A failed write in step 6 does not undo steps 3-5. The write is queued
//! and `PersistDeferred` is returned; [`Workbench::retry_deferred`] drains
//! the queue.
//!
//! Store writes for one id are serialized, and a write only goes out while
//! it still matches the registry. Once a newer commit or delete for the id
//! has landed, the older write is dropped and the newer change persists
//! itself, so the store never moves backwards.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::definition::{diff_fields, Definition};
use crate::error::{Result, WorkbenchError};
use crate::events::{ChangeEvent, ChangeKind};
use crate::id::StableId;
use crate::persistence::{DefinitionStore, StoreError};
use crate::validation::{has_errors, Diagnostic};
use crate::value::Fields;
use crate::workbench::Workbench;
use crate::working_copy::{CopyKind, SessionState, WorkingCopy};

/// Outcome of a successful commit or delete
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitReceipt {
    pub id: StableId,
    pub kind: ChangeKind,
    /// Top-level fields whose committed value changed, sorted
    pub changed_fields: Vec<String>,
    /// New revision; for deletes, the revision that was removed
    pub revision: u64,
    /// Warnings that did not block the commit
    pub warnings: Vec<Diagnostic>,
}

/// A store write that failed and waits for a retry
#[derive(Debug, Clone)]
pub(crate) enum DeferredWrite {
    Save(Arc<Definition>),
    Remove(StableId),
}

/// Result of draining the deferred-write queue
#[derive(Debug, Default)]
pub struct RetryReport {
    pub persisted: Vec<StableId>,
    pub failed: Vec<(StableId, StoreError)>,
}

impl RetryReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl Workbench {
    /// Validate a working copy and publish it as the next revision
    pub fn commit(&self, wc: &mut WorkingCopy) -> Result<CommitReceipt> {
        wc.ensure_open()?;

        let diagnostics = self.diagnostics(wc).to_vec();
        if has_errors(&diagnostics) {
            warn!(session = %wc.session(), errors = diagnostics.iter().filter(|d| d.is_error()).count(), "commit rejected");
            return Err(WorkbenchError::ValidationFailed(diagnostics));
        }

        let (id, previous_fields) = match wc.kind() {
            CopyKind::Existing { base, .. } => (base.id.clone(), base.fields.clone()),
            CopyKind::New { category, name } => {
                let name = name
                    .as_ref()
                    .ok_or_else(|| WorkbenchError::MissingName(category.clone()))?;
                (StableId::new(category.as_str(), name.as_str())?, Fields::new())
            }
        };

        let revision = self.registry.get(&id).map_or(0, |current| current.revision) + 1;
        let definition = Arc::new(Definition {
            id: id.clone(),
            schema_version: wc.schema().version.clone(),
            fields: wc.fields().clone(),
            committed: true,
            revision,
            updated_at: Utc::now(),
        });

        let kind = if wc.is_new() {
            self.registry.insert_new(Arc::clone(&definition))?;
            ChangeKind::Created
        } else {
            self.registry.replace(Arc::clone(&definition));
            ChangeKind::Updated
        };

        let changed_fields = diff_fields(&previous_fields, &definition.fields);
        wc.close(SessionState::Committed);
        info!(id = %id, revision, changed = changed_fields.len(), "definition committed");

        self.events.publish(ChangeEvent {
            id: id.clone(),
            kind,
            changed_fields: changed_fields.clone(),
            revision,
            at: definition.updated_at,
        });

        let receipt = CommitReceipt {
            id,
            kind,
            changed_fields,
            revision,
            warnings: diagnostics,
        };
        self.persist(DeferredWrite::Save(definition), receipt)
    }

    /// Remove a definition from the registry and the store
    ///
    /// Fails with `AlreadyOpen` while a working copy holds the id, and with
    /// `Referenced` while any other definition links to it.
    pub fn delete(&self, id: &StableId) -> Result<CommitReceipt> {
        let lock = self.locks.try_acquire(id)?;
        let removed = self.registry.unregister_unreferenced(id)?;
        drop(lock);
        info!(id = %id, revision = removed.revision, "definition deleted");

        let changed_fields: Vec<String> = removed.fields.keys().cloned().collect();
        self.events.publish(ChangeEvent {
            id: id.clone(),
            kind: ChangeKind::Deleted,
            changed_fields: changed_fields.clone(),
            revision: removed.revision,
            at: Utc::now(),
        });

        let receipt = CommitReceipt {
            id: id.clone(),
            kind: ChangeKind::Deleted,
            changed_fields,
            revision: removed.revision,
            warnings: Vec::new(),
        };
        self.persist(DeferredWrite::Remove(id.clone()), receipt)
    }

    /// Retry every queued store write
    pub fn retry_deferred(&self) -> RetryReport {
        let mut report = RetryReport::default();
        let Some(store) = self.store.as_ref() else {
            return report;
        };

        let pending: Vec<(StableId, DeferredWrite)> = {
            let queue = self.deferred.lock();
            queue.iter().map(|(id, w)| (id.clone(), w.clone())).collect()
        };

        for (id, write) in pending {
            let gate = self.write_gate(&id);
            let _serial = gate.lock();

            // A newer commit may have replaced or written the entry meanwhile.
            if !self.deferred.lock().get(&id).is_some_and(|queued| queued.same_as(&write)) {
                continue;
            }
            if !self.is_current(&write) {
                debug!(id = %id, "deferred write superseded");
                self.deferred.lock().remove(&id);
                continue;
            }

            match write_through(store.as_ref(), &write) {
                Ok(()) => {
                    self.deferred.lock().remove(&id);
                    report.persisted.push(id);
                }
                Err(e) => {
                    warn!(id = %id, error = %e, "deferred write failed again");
                    report.failed.push((id, e));
                }
            }
        }

        info!(persisted = report.persisted.len(), failed = report.failed.len(), "deferred writes retried");
        report
    }

    /// Ids whose latest change has not reached the store
    pub fn pending_writes(&self) -> Vec<StableId> {
        self.deferred.lock().keys().cloned().collect()
    }

    fn persist(&self, write: DeferredWrite, receipt: CommitReceipt) -> Result<CommitReceipt> {
        let Some(store) = self.store.as_ref() else {
            return Ok(receipt);
        };

        let gate = self.write_gate(&receipt.id);
        let _serial = gate.lock();
        if !self.is_current(&write) {
            debug!(id = %receipt.id, revision = receipt.revision, "store write superseded by a newer change");
            return Ok(receipt);
        }

        match write_through(store.as_ref(), &write) {
            Ok(()) => {
                self.deferred.lock().remove(&receipt.id);
                Ok(receipt)
            }
            Err(source) => {
                error!(id = %receipt.id, error = %source, "persisting commit failed, write deferred");
                self.deferred.lock().insert(receipt.id.clone(), write);
                Err(WorkbenchError::PersistDeferred {
                    receipt: Box::new(receipt),
                    source,
                })
            }
        }
    }

    fn write_gate(&self, id: &StableId) -> Arc<Mutex<()>> {
        Arc::clone(self.write_gates.lock().entry(id.clone()).or_default())
    }

    /// Whether `write` still describes the registry's state for its id
    fn is_current(&self, write: &DeferredWrite) -> bool {
        match write {
            DeferredWrite::Save(definition) => self
                .registry
                .get(&definition.id)
                .is_some_and(|current| Arc::ptr_eq(&current, definition)),
            DeferredWrite::Remove(id) => !self.registry.contains(id),
        }
    }
}

impl DeferredWrite {
    fn same_as(&self, other: &DeferredWrite) -> bool {
        match (self, other) {
            (DeferredWrite::Save(a), DeferredWrite::Save(b)) => Arc::ptr_eq(a, b),
            (DeferredWrite::Remove(a), DeferredWrite::Remove(b)) => a == b,
            _ => false,
        }
    }
}

fn write_through(store: &dyn DefinitionStore, write: &DeferredWrite) -> std::result::Result<(), StoreError> {
    match write {
        DeferredWrite::Save(definition) => store.save(definition),
        DeferredWrite::Remove(id) => match store.remove(id) {
            Err(StoreError::NotFound(_)) => Ok(()),
            other => other,
        },
    }
}
