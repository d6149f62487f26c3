//! Undo/redo history for one working-copy session.
//!
//! History is linear: recording a new step clears the redo stack. Steps are
//! [`EditOperation`]s, which carry their own inverse.
//!
//! # Coalescing
//!
//! A new step merges into the previous one when all of these hold:
//!
//! * the coalescing window is non-zero and the redo stack is empty,
//! * both steps are user edits (never reverts),
//! * both are `Set` operations on the same path,
//! * the old and new values of both are text,
//! * the new step arrives within the window of the previous step's time.
//!
//! The merged step keeps the original previous value, takes the new value,
//! and restarts the window from the new step's time. Nothing else is merged,
//! so numeric edits such as `damage = 10; damage = 20` stay separate steps.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::config::HistoryConfig;
use crate::edit::{EditOperation, FieldEdit};
use crate::error::{Result, WorkbenchError};
use crate::value::{FieldPath, FieldValue, Fields};

/// Where a history step came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOrigin {
    /// A direct field edit
    User,
    /// `revert_field`
    Revert,
}

/// One undoable step
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub op: EditOperation,
    pub origin: EditOrigin,
    /// Time of the latest edit folded into this step
    pub at: Instant,
}

/// Undo and redo stacks of a working copy
#[derive(Debug)]
pub struct UndoHistory {
    undo: VecDeque<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    coalesce_window: Duration,
    max_depth: usize,
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::new(&HistoryConfig::default())
    }
}

impl UndoHistory {
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            coalesce_window: config.coalesce_window(),
            max_depth: config.max_depth.max(1),
        }
    }

    /// Apply `edit` to `fields` and record it as a new step
    ///
    /// Returns the recorded operation. On error nothing is recorded and
    /// `fields` is unchanged.
    pub fn apply(&mut self, fields: &mut Fields, edit: FieldEdit, origin: EditOrigin, at: Instant) -> Result<EditOperation> {
        let op = edit.apply(fields)?;

        if !self.try_coalesce(&op, origin, at) {
            self.undo.push_back(HistoryEntry {
                op: op.clone(),
                origin,
                at,
            });
            if self.undo.len() > self.max_depth {
                self.undo.pop_front();
            }
        }

        if !self.redo.is_empty() {
            trace!(cleared = self.redo.len(), "redo stack cleared");
        }
        self.redo.clear();
        Ok(op)
    }

    fn try_coalesce(&mut self, op: &EditOperation, origin: EditOrigin, at: Instant) -> bool {
        if self.coalesce_window.is_zero() || origin != EditOrigin::User || !self.redo.is_empty() {
            return false;
        }
        let window = self.coalesce_window;
        let Some(top) = self.undo.back_mut() else {
            return false;
        };
        if top.origin != EditOrigin::User || at.saturating_duration_since(top.at) > window {
            return false;
        }

        let EditOperation::Set {
            path: top_path,
            previous: Some(FieldValue::Text(_)),
            value: top_value @ FieldValue::Text(_),
        } = &mut top.op
        else {
            return false;
        };
        let EditOperation::Set {
            path,
            previous: Some(FieldValue::Text(_)),
            value: value @ FieldValue::Text(_),
        } = op
        else {
            return false;
        };
        if top_path != path {
            return false;
        }

        *top_value = value.clone();
        top.at = at;
        trace!(path = %path, "edit coalesced");
        true
    }

    /// Revert the latest step, returning the path it touched
    pub fn undo(&mut self, fields: &mut Fields) -> Result<FieldPath> {
        let entry = self.undo.pop_back().ok_or(WorkbenchError::NothingToUndo)?;
        if let Err(e) = entry.op.inverse().apply(fields) {
            self.undo.push_back(entry);
            return Err(e);
        }
        let path = entry.op.path().clone();
        self.redo.push(entry);
        Ok(path)
    }

    /// Re-apply the latest undone step, returning the path it touched
    pub fn redo(&mut self, fields: &mut Fields) -> Result<FieldPath> {
        let entry = self.redo.pop().ok_or(WorkbenchError::NothingToRedo)?;
        if let Err(e) = entry.op.apply(fields) {
            self.redo.push(entry);
            return Err(e);
        }
        let path = entry.op.path().clone();
        self.undo.push_back(entry);
        Ok(path)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Most recent undoable step
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.undo.back()
    }

    /// Drop both stacks
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
