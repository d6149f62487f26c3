//! Exclusive edit locks
//!
//! At most one working copy may be open per definition. Acquisition fails
//! fast with `AlreadyOpen`; the returned guard releases on drop.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{Result, WorkbenchError};
use crate::id::StableId;

/// Ids currently held by an open working copy
#[derive(Debug, Default)]
pub(crate) struct LockTable {
    held: Mutex<HashSet<StableId>>,
}

impl LockTable {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn try_acquire(self: &Arc<Self>, id: &StableId) -> Result<EditLock> {
        if !self.held.lock().insert(id.clone()) {
            return Err(WorkbenchError::AlreadyOpen(id.clone()));
        }
        trace!(id = %id, "edit lock acquired");
        Ok(EditLock {
            table: Arc::clone(self),
            id: id.clone(),
        })
    }

    pub(crate) fn is_held(&self, id: &StableId) -> bool {
        self.held.lock().contains(id)
    }

    fn release(&self, id: &StableId) {
        self.held.lock().remove(id);
        trace!(id = %id, "edit lock released");
    }
}

/// Guard for one locked id
#[derive(Debug)]
pub(crate) struct EditLock {
    table: Arc<LockTable>,
    id: StableId,
}

impl EditLock {
    pub(crate) fn id(&self) -> &StableId {
        &self.id
    }
}

impl Drop for EditLock {
    fn drop(&mut self) {
        self.table.release(&self.id);
    }
}
