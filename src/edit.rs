//! Field edits
//!
//! A [`FieldEdit`] is what a caller asks for ("set `damage` to 42"). Applying
//! it yields an [`EditOperation`], which also records what was there before,
//! so it can be inverted and replayed by the undo history.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::value::{self, FieldPath, FieldValue, Fields};

/// A requested change to a working copy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FieldEdit {
    /// Write a value; the parent container must exist
    Set { path: FieldPath, value: FieldValue },
    /// Remove a record entry
    Clear { path: FieldPath },
    /// Insert into the list at `path` before `index`
    Insert {
        path: FieldPath,
        index: usize,
        value: FieldValue,
    },
    /// Remove element `index` from the list at `path`
    Remove { path: FieldPath, index: usize },
}

impl FieldEdit {
    pub fn set(path: FieldPath, value: impl Into<FieldValue>) -> Self {
        FieldEdit::Set {
            path,
            value: value.into(),
        }
    }

    pub fn clear(path: FieldPath) -> Self {
        FieldEdit::Clear { path }
    }

    pub fn insert(path: FieldPath, index: usize, value: impl Into<FieldValue>) -> Self {
        FieldEdit::Insert {
            path,
            index,
            value: value.into(),
        }
    }

    pub fn remove(path: FieldPath, index: usize) -> Self {
        FieldEdit::Remove { path, index }
    }

    pub fn path(&self) -> &FieldPath {
        match self {
            FieldEdit::Set { path, .. }
            | FieldEdit::Clear { path }
            | FieldEdit::Insert { path, .. }
            | FieldEdit::Remove { path, .. } => path,
        }
    }

    /// Apply to `fields`, returning the reversible operation
    ///
    /// On error `fields` is unchanged.
    pub fn apply(self, fields: &mut Fields) -> Result<EditOperation> {
        match self {
            FieldEdit::Set { path, value } => {
                let previous = value::set(fields, &path, value.clone())?;
                Ok(EditOperation::Set {
                    path,
                    previous,
                    value,
                })
            }
            FieldEdit::Clear { path } => {
                let previous = value::remove(fields, &path)?;
                Ok(EditOperation::Clear { path, previous })
            }
            FieldEdit::Insert { path, index, value } => {
                value::insert_at(fields, &path, index, value.clone())?;
                Ok(EditOperation::Insert { path, index, value })
            }
            FieldEdit::Remove { path, index } => {
                let previous = value::remove_at(fields, &path, index)?;
                Ok(EditOperation::Remove {
                    path,
                    index,
                    previous,
                })
            }
        }
    }
}

/// An applied, reversible mutation; the unit of undo/redo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditOperation {
    Set {
        path: FieldPath,
        /// `None` when the field was absent
        previous: Option<FieldValue>,
        value: FieldValue,
    },
    Clear {
        path: FieldPath,
        previous: FieldValue,
    },
    Insert {
        path: FieldPath,
        index: usize,
        value: FieldValue,
    },
    Remove {
        path: FieldPath,
        index: usize,
        previous: FieldValue,
    },
}

impl EditOperation {
    /// Field (or list) the operation touches
    pub fn path(&self) -> &FieldPath {
        match self {
            EditOperation::Set { path, .. }
            | EditOperation::Clear { path, .. }
            | EditOperation::Insert { path, .. }
            | EditOperation::Remove { path, .. } => path,
        }
    }

    /// Replay this operation
    pub fn apply(&self, fields: &mut Fields) -> Result<()> {
        match self {
            EditOperation::Set { path, value, .. } => {
                value::set(fields, path, value.clone())?;
            }
            EditOperation::Clear { path, .. } => {
                value::remove(fields, path)?;
            }
            EditOperation::Insert { path, index, value } => {
                value::insert_at(fields, path, *index, value.clone())?;
            }
            EditOperation::Remove { path, index, .. } => {
                value::remove_at(fields, path, *index)?;
            }
        }
        Ok(())
    }

    /// The operation that undoes this one
    pub fn inverse(&self) -> EditOperation {
        match self {
            EditOperation::Set {
                path,
                previous: Some(previous),
                value,
            } => EditOperation::Set {
                path: path.clone(),
                previous: Some(value.clone()),
                value: previous.clone(),
            },
            EditOperation::Set {
                path,
                previous: None,
                value,
            } => EditOperation::Clear {
                path: path.clone(),
                previous: value.clone(),
            },
            EditOperation::Clear { path, previous } => EditOperation::Set {
                path: path.clone(),
                previous: None,
                value: previous.clone(),
            },
            EditOperation::Insert { path, index, value } => EditOperation::Remove {
                path: path.clone(),
                index: *index,
                previous: value.clone(),
            },
            EditOperation::Remove {
                path,
                index,
                previous,
            } => EditOperation::Insert {
                path: path.clone(),
                index: *index,
                value: previous.clone(),
            },
        }
    }
}
