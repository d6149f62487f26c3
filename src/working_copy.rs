//! Working copies
//!
//! A [`WorkingCopy`] is an isolated, editable clone of one definition (or a
//! blank template for a new one). Edits never touch the registry; only a
//! commit publishes them. Copies of existing definitions hold the
//! definition's edit lock for as long as they stay open.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::trace;

use crate::config::HistoryConfig;
use crate::definition::Definition;
use crate::edit::FieldEdit;
use crate::error::{Result, WorkbenchError};
use crate::history::{EditOrigin, UndoHistory};
use crate::id::{self, StableId};
use crate::lock::EditLock;
use crate::schema::CategorySchema;
use crate::validation::Diagnostic;
use crate::value::{self, FieldPath, FieldValue, Fields};
use crate::version::SchemaVersion;

/// Identifies one editing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        SessionId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Lifecycle of a working copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Committed,
    Discarded,
}

/// What the copy will become on commit
#[derive(Debug, Clone)]
pub enum CopyKind {
    /// Edits an already committed definition
    Existing {
        /// Registry revision the copy was opened from
        base: Arc<Definition>,
        /// Set when the copy was migrated on open
        migrated_from: Option<SchemaVersion>,
    },
    /// Becomes a new definition; the name is chosen before commit
    New { category: String, name: Option<String> },
}

#[derive(Debug)]
struct CachedDiagnostics {
    generation: u64,
    diagnostics: Vec<Diagnostic>,
}

/// An isolated editable copy of a definition
#[derive(Debug)]
pub struct WorkingCopy {
    session: SessionId,
    kind: CopyKind,
    schema: Arc<CategorySchema>,
    fields: Fields,
    /// Last committed content, or template defaults for new copies
    baseline: Fields,
    dirty: BTreeSet<String>,
    diagnostics: Option<CachedDiagnostics>,
    history: UndoHistory,
    lock: Option<EditLock>,
    state: SessionState,
}

impl WorkingCopy {
    pub(crate) fn existing(
        base: Arc<Definition>,
        fields: Fields,
        migrated_from: Option<SchemaVersion>,
        schema: Arc<CategorySchema>,
        history: &HistoryConfig,
        lock: EditLock,
    ) -> Self {
        Self::build(
            CopyKind::Existing { base, migrated_from },
            schema,
            fields,
            history,
            Some(lock),
        )
    }

    pub(crate) fn blank(schema: Arc<CategorySchema>, history: &HistoryConfig) -> Self {
        let kind = CopyKind::New {
            category: schema.category.clone(),
            name: None,
        };
        let fields = schema.instantiate();
        Self::build(kind, schema, fields, history, None)
    }

    fn build(
        kind: CopyKind,
        schema: Arc<CategorySchema>,
        fields: Fields,
        history: &HistoryConfig,
        lock: Option<EditLock>,
    ) -> Self {
        Self {
            session: SessionId::next(),
            kind,
            schema,
            baseline: fields.clone(),
            fields,
            dirty: BTreeSet::new(),
            diagnostics: None,
            history: UndoHistory::new(history),
            lock,
            state: SessionState::Open,
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn kind(&self) -> &CopyKind {
        &self.kind
    }

    pub fn is_new(&self) -> bool {
        matches!(self.kind, CopyKind::New { .. })
    }

    /// Id of the definition being edited; `None` for a new copy
    pub fn id(&self) -> Option<&StableId> {
        match &self.kind {
            CopyKind::Existing { base, .. } => Some(&base.id),
            CopyKind::New { .. } => None,
        }
    }

    pub fn category(&self) -> &str {
        &self.schema.category
    }

    pub fn schema(&self) -> &Arc<CategorySchema> {
        &self.schema
    }

    /// Committed revision this copy started from
    pub fn base(&self) -> Option<&Arc<Definition>> {
        match &self.kind {
            CopyKind::Existing { base, .. } => Some(base),
            CopyKind::New { .. } => None,
        }
    }

    /// Choose the name part of a new definition's id
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        self.ensure_open()?;
        let name = name.into();
        match &mut self.kind {
            CopyKind::New { name: slot, .. } => {
                if !id::is_valid_name(&name) {
                    return Err(WorkbenchError::InvalidStableId {
                        value: name,
                        reason: "name must be snake_case".into(),
                    });
                }
                *slot = Some(name);
                Ok(())
            }
            CopyKind::Existing { base, .. } => Err(WorkbenchError::InvalidStableId {
                value: base.id.to_string(),
                reason: "the id of a committed definition cannot change".into(),
            }),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            CopyKind::Existing { base, .. } => Some(base.id.name()),
            CopyKind::New { name, .. } => name.as_deref(),
        }
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn baseline(&self) -> &Fields {
        &self.baseline
    }

    pub fn get(&self, path: &FieldPath) -> Option<&FieldValue> {
        value::get(&self.fields, path)
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Top-level fields that differ from the baseline
    pub fn dirty_fields(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn history(&self) -> &UndoHistory {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Apply an edit and record it as an undo step
    pub fn edit(&mut self, edit: FieldEdit) -> Result<()> {
        self.edit_at(edit, Instant::now())
    }

    /// Like [`edit`](Self::edit) with an explicit timestamp for coalescing
    pub fn edit_at(&mut self, edit: FieldEdit, at: Instant) -> Result<()> {
        self.ensure_open()?;
        self.record(edit, EditOrigin::User, at)
    }

    pub fn undo(&mut self) -> Result<()> {
        self.ensure_open()?;
        let path = self.history.undo(&mut self.fields)?;
        self.touched(&path);
        Ok(())
    }

    pub fn redo(&mut self) -> Result<()> {
        self.ensure_open()?;
        let path = self.history.redo(&mut self.fields)?;
        self.touched(&path);
        Ok(())
    }

    /// Restore one field to its baseline value
    ///
    /// Recorded as its own undo step, so it clears the redo stack like any
    /// other edit and can itself be undone.
    pub fn revert_field(&mut self, path: &FieldPath) -> Result<()> {
        self.ensure_open()?;
        let target = value::get(&self.baseline, path).cloned();
        let current = value::get(&self.fields, path);

        let element = path.split_index();
        let edit = match (target, current) {
            (Some(target), Some(current)) if &target == current => return Ok(()),
            (Some(target), Some(_)) => FieldEdit::Set {
                path: path.clone(),
                value: target,
            },
            (Some(target), None) => match element {
                Some((list, index)) => FieldEdit::Insert {
                    path: list,
                    index,
                    value: target,
                },
                None => FieldEdit::Set {
                    path: path.clone(),
                    value: target,
                },
            },
            // List elements leave by index; record fields by name.
            (None, Some(_)) => match element {
                Some((list, index)) => FieldEdit::Remove { path: list, index },
                None => FieldEdit::Clear { path: path.clone() },
            },
            (None, None) => return Ok(()),
        };
        self.record(edit, EditOrigin::Revert, Instant::now())
    }

    /// Diagnostics from the last validation, if still current
    pub fn last_diagnostics(&self) -> Option<&[Diagnostic]> {
        self.diagnostics.as_ref().map(|c| c.diagnostics.as_slice())
    }

    fn record(&mut self, edit: FieldEdit, origin: EditOrigin, at: Instant) -> Result<()> {
        let op = self.history.apply(&mut self.fields, edit, origin, at)?;
        self.touched(op.path());
        Ok(())
    }

    fn touched(&mut self, path: &FieldPath) {
        self.diagnostics = None;
        let Some(name) = path.head() else {
            return;
        };
        if self.fields.get(name) == self.baseline.get(name) {
            self.dirty.remove(name);
        } else {
            self.dirty.insert(name.to_string());
        }
        trace!(session = %self.session, path = %path, dirty = self.dirty.len(), "field touched");
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        match self.state {
            SessionState::Open => Ok(()),
            _ => Err(WorkbenchError::SessionClosed(self.session)),
        }
    }

    pub(crate) fn cached_diagnostics(&self, generation: u64) -> Option<&[Diagnostic]> {
        self.diagnostics
            .as_ref()
            .filter(|c| c.generation == generation)
            .map(|c| c.diagnostics.as_slice())
    }

    pub(crate) fn cache_diagnostics(&mut self, generation: u64, diagnostics: Vec<Diagnostic>) {
        self.diagnostics = Some(CachedDiagnostics {
            generation,
            diagnostics,
        });
    }

    /// End the session: drop history, release the lock
    pub(crate) fn close(&mut self, state: SessionState) {
        if state == SessionState::Discarded {
            self.fields = self.baseline.clone();
        }
        self.dirty.clear();
        self.diagnostics = None;
        self.history.clear();
        self.lock = None;
        self.state = state;
    }
}
