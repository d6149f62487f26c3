//! Schema migrations
//!
//! When a stored or registered definition was authored against an older
//! schema version than the catalog holds, the workbench hands it to the
//! migration registered for its category before anyone edits it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::definition::Definition;
use crate::schema::CategorySchema;
use crate::version::SchemaVersion;

/// A migration declined to convert a definition
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct Unmigratable {
    pub reason: String,
}

impl Unmigratable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Converts definitions of one category between schema versions
pub trait SchemaMigration: Send + Sync {
    /// Produce `definition` as it should look under `to`
    ///
    /// The workbench stamps the result with `to` and rejects results whose
    /// id differs from the input.
    fn migrate(
        &self,
        definition: Definition,
        from: &SchemaVersion,
        to: &SchemaVersion,
    ) -> Result<Definition, Unmigratable>;
}

impl<F> SchemaMigration for F
where
    F: Fn(Definition, &SchemaVersion, &SchemaVersion) -> Result<Definition, Unmigratable> + Send + Sync,
{
    fn migrate(
        &self,
        definition: Definition,
        from: &SchemaVersion,
        to: &SchemaVersion,
    ) -> Result<Definition, Unmigratable> {
        self(definition, from, to)
    }
}

/// Fills fields added by a newer schema with their defaults and drops fields
/// the schema no longer declares
///
/// Refuses to migrate across a major version, where a field's meaning may
/// have changed.
#[derive(Debug, Clone)]
pub struct FillNewFields {
    schema: Arc<CategorySchema>,
}

impl FillNewFields {
    pub fn new(schema: Arc<CategorySchema>) -> Self {
        Self { schema }
    }
}

impl SchemaMigration for FillNewFields {
    fn migrate(
        &self,
        mut definition: Definition,
        from: &SchemaVersion,
        to: &SchemaVersion,
    ) -> Result<Definition, Unmigratable> {
        if from.version.major != to.version.major {
            return Err(Unmigratable::new(format!(
                "major version change {} -> {} needs a hand-written migration",
                from, to
            )));
        }

        definition
            .fields
            .retain(|name, _| self.schema.field(name).is_some());
        for spec in &self.schema.fields {
            definition
                .fields
                .entry(spec.name.clone())
                .or_insert_with(|| spec.initial_value());
        }
        Ok(definition)
    }
}

/// Migration hooks keyed by category
#[derive(Default, Clone)]
pub struct MigrationHooks {
    hooks: HashMap<String, Arc<dyn SchemaMigration>>,
}

impl MigrationHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the hook for a category, replacing any previous one
    pub fn register(&mut self, category: impl Into<String>, hook: impl SchemaMigration + 'static) {
        let category = category.into();
        debug!(category = %category, "migration registered");
        self.hooks.insert(category, Arc::new(hook));
    }

    pub fn get(&self, category: &str) -> Option<&Arc<dyn SchemaMigration>> {
        self.hooks.get(category)
    }

    pub fn contains(&self, category: &str) -> bool {
        self.hooks.contains_key(category)
    }
}

impl fmt::Debug for MigrationHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut categories: Vec<_> = self.hooks.keys().collect();
        categories.sort();
        f.debug_struct("MigrationHooks")
            .field("categories", &categories)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::StableId;
    use crate::schema::{FieldSpec, FieldType};
    use crate::value::{FieldValue, Fields};

    fn old_pistol() -> Definition {
        let mut fields = Fields::new();
        fields.insert("damage".into(), FieldValue::Integer(12));
        fields.insert("legacy_noise".into(), FieldValue::Integer(3));
        Definition::new(
            StableId::parse("weapon_pistol").unwrap(),
            SchemaVersion::new(1, 0, 0),
            fields,
        )
    }

    fn schema() -> Arc<CategorySchema> {
        Arc::new(
            CategorySchema::new("weapon", SchemaVersion::new(1, 1, 0))
                .with_field(FieldSpec::new("damage", FieldType::Integer))
                .with_field(FieldSpec::new("weight", FieldType::Float).with_default(1.5)),
        )
    }

    #[test]
    fn test_fill_new_fields() {
        let hook = FillNewFields::new(schema());
        let migrated = hook
            .migrate(old_pistol(), &SchemaVersion::new(1, 0, 0), &SchemaVersion::new(1, 1, 0))
            .unwrap();

        assert_eq!(migrated.field("damage"), Some(&FieldValue::Integer(12)));
        assert_eq!(migrated.field("weight"), Some(&FieldValue::Float(1.5)));
        assert!(migrated.field("legacy_noise").is_none());
    }

    #[test]
    fn test_fill_new_fields_refuses_major_change() {
        let hook = FillNewFields::new(schema());
        let result = hook.migrate(old_pistol(), &SchemaVersion::new(1, 0, 0), &SchemaVersion::new(2, 0, 0));
        assert!(result.is_err());
    }

    #[test]
    fn test_closure_hooks() {
        let mut hooks = MigrationHooks::new();
        hooks.register(
            "weapon",
            |mut def: Definition, _from: &SchemaVersion, _to: &SchemaVersion| -> Result<Definition, Unmigratable> {
                def.fields.insert("damage".into(), FieldValue::Integer(99));
                Ok(def)
            },
        );

        assert!(hooks.contains("weapon"));
        assert!(hooks.get("armor").is_none());

        let hook = hooks.get("weapon").unwrap();
        let migrated = hook
            .migrate(old_pistol(), &SchemaVersion::new(1, 0, 0), &SchemaVersion::new(1, 1, 0))
            .unwrap();
        assert_eq!(migrated.field("damage"), Some(&FieldValue::Integer(99)));
    }
}
