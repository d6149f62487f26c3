//! Error types for the definition workbench

use thiserror::Error;

use crate::commit::CommitReceipt;
use crate::id::StableId;
use crate::persistence::StoreError;
use crate::validation::{Diagnostic, Severity};
use crate::version::SchemaVersion;
use crate::working_copy::SessionId;

/// Result type for workbench operations
pub type Result<T> = std::result::Result<T, WorkbenchError>;

/// Workbench errors
#[derive(Error, Debug)]
pub enum WorkbenchError {
    #[error("Definition not found: {0}")]
    NotFound(StableId),

    #[error("Definition already exists: {0}")]
    DuplicateId(StableId),

    #[error("Definition {0} is already open in another working copy")]
    AlreadyOpen(StableId),

    #[error("Validation failed with {} error(s)", error_count(.0))]
    ValidationFailed(Vec<Diagnostic>),

    #[error("Definition {id} was authored against schema {found}, catalog has {expected}: {reason}")]
    SchemaIncompatible {
        id: StableId,
        found: SchemaVersion,
        expected: SchemaVersion,
        reason: String,
    },

    #[error("Definition {id} cannot be migrated from {from} to {to}: {reason}")]
    Unmigratable {
        id: StableId,
        from: SchemaVersion,
        to: SchemaVersion,
        reason: String,
    },

    #[error("Definition {id} is still referenced by {}", join_ids(.referrers))]
    Referenced { id: StableId, referrers: Vec<StableId> },

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    /// The in-memory commit stands; only the durable write is outstanding.
    #[error("Committed {} in memory but persisting it failed: {source}", .receipt.id)]
    PersistDeferred {
        receipt: Box<CommitReceipt>,
        #[source]
        source: StoreError,
    },

    #[error("Invalid stable id '{value}': {reason}")]
    InvalidStableId { value: String, reason: String },

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Invalid schema for category '{category}': {reason}")]
    InvalidSchema { category: String, reason: String },

    #[error("Invalid field path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("New '{0}' definition has no name; call set_name before committing")]
    MissingName(String),

    #[error("Working copy session {0} is closed")]
    SessionClosed(SessionId),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Semver error: {0}")]
    Semver(#[from] semver::Error),
}

impl WorkbenchError {
    pub(crate) fn invalid_path(path: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Diagnostics carried by a `ValidationFailed` error
    pub fn diagnostics(&self) -> Option<&[Diagnostic]> {
        match self {
            Self::ValidationFailed(diagnostics) => Some(diagnostics),
            _ => None,
        }
    }
}

fn join_ids(ids: &[StableId]) -> String {
    ids.iter().map(StableId::to_string).collect::<Vec<_>>().join(", ")
}

fn error_count(diagnostics: &[Diagnostic]) -> usize {
    diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count()
}
