//! Committed definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checksum::Checksum;
use crate::id::StableId;
use crate::value::{self, FieldPath, FieldValue, Fields};
use crate::version::SchemaVersion;

/// A schema-typed content record addressed by a stable id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    /// Owning id; never changes once committed
    pub id: StableId,
    /// Schema version this definition was authored against
    pub schema_version: SchemaVersion,
    /// Field content
    pub fields: Fields,
    /// Whether this value has gone through a commit
    #[serde(default)]
    pub committed: bool,
    /// Bumped on every commit, starting at 1
    #[serde(default)]
    pub revision: u64,
    /// When this revision was committed
    pub updated_at: DateTime<Utc>,
}

impl Definition {
    /// Create an uncommitted definition
    pub fn new(id: StableId, schema_version: SchemaVersion, fields: Fields) -> Self {
        Self {
            id,
            schema_version,
            fields,
            committed: false,
            revision: 0,
            updated_at: Utc::now(),
        }
    }

    /// Category of the owning id
    pub fn category(&self) -> &str {
        self.id.category()
    }

    /// Look up a field value by path
    pub fn get(&self, path: &FieldPath) -> Option<&FieldValue> {
        value::get(&self.fields, path)
    }

    /// Look up a top-level field by name
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Checksum of the field content only
    pub fn content_checksum(&self) -> Checksum {
        Checksum::of(&self.fields)
    }

    /// Checksum over everything observable about this definition
    pub fn checksum(&self) -> Checksum {
        Checksum::of(self)
    }
}

/// Names of top-level fields that differ between two field sets, sorted
pub fn diff_fields(old: &Fields, new: &Fields) -> Vec<String> {
    let mut changed: Vec<String> = old
        .keys()
        .chain(new.keys())
        .filter(|name| old.get(*name) != new.get(*name))
        .cloned()
        .collect();
    changed.sort();
    changed.dedup();
    changed
}
