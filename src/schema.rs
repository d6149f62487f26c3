//! Category schemas
//!
//! A [`CategorySchema`] declares the typed fields of one definition category
//! (e.g. `weapon`), their defaults and constraints, and the cross-field rules
//! validated on every working copy. The [`SchemaCatalog`] holds one schema
//! per category and is loaded from `*.json` files:
//!
//! ```text
//! schemas/
//! ├── weapon.json
//! ├── armor.json
//! └── ammo.json
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::checksum::Checksum;
use crate::error::{Result, WorkbenchError};
use crate::id::is_valid_category;
use crate::value::{FieldPath, FieldValue, Fields, PathSegment};
use crate::version::SchemaVersion;

/// Type of a schema field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldType {
    Bool,
    Integer,
    /// Accepts integers as well
    Float,
    Text,
    Enum { variants: Vec<String> },
    /// Stable id of a definition in `category`
    Reference { category: String },
    List { item: Box<FieldType> },
    Record { fields: Vec<FieldSpec> },
}

impl FieldType {
    /// Get the type name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::Bool => "bool",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Text => "text",
            FieldType::Enum { .. } => "enum",
            FieldType::Reference { .. } => "reference",
            FieldType::List { .. } => "list",
            FieldType::Record { .. } => "record",
        }
    }

    /// Whether `value` has the right shape for this type (null excluded)
    pub fn accepts(&self, value: &FieldValue) -> bool {
        matches!(
            (self, value),
            (FieldType::Bool, FieldValue::Bool(_))
                | (FieldType::Integer, FieldValue::Integer(_))
                | (FieldType::Float, FieldValue::Float(_) | FieldValue::Integer(_))
                | (FieldType::Text, FieldValue::Text(_))
                | (FieldType::Enum { .. }, FieldValue::Enum(_))
                | (FieldType::Reference { .. }, FieldValue::Reference(_))
                | (FieldType::List { .. }, FieldValue::List(_))
                | (FieldType::Record { .. }, FieldValue::Record(_))
        )
    }

    /// Value used when a field declares no default
    pub fn blank(&self) -> FieldValue {
        match self {
            FieldType::List { .. } => FieldValue::List(Vec::new()),
            FieldType::Record { fields } => FieldValue::Record(instantiate_fields(fields)),
            _ => FieldValue::Null,
        }
    }
}

/// Inclusive numeric bounds
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NumericRange {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl NumericRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

impl std::fmt::Display for NumericRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.min, self.max) {
            (Some(min), Some(max)) => write!(f, "[{}, {}]", min, max),
            (Some(min), None) => write!(f, ">= {}", min),
            (None, Some(max)) => write!(f, "<= {}", max),
            (None, None) => write!(f, "any"),
        }
    }
}

/// A single field declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<FieldValue>,
    /// Must be present and non-null (unless `nullable`) to commit
    #[serde(default)]
    pub required: bool,
    /// Null counts as a deliberate value rather than a missing one
    #[serde(default)]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<NumericRange>,
    /// Still accepted, but setting it produces a warning
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            default: None,
            required: false,
            nullable: false,
            range: None,
            deprecated: false,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.range = Some(NumericRange::new(min, max));
        self
    }

    /// Value placed in a blank working copy
    pub fn initial_value(&self) -> FieldValue {
        self.default
            .clone()
            .unwrap_or_else(|| self.field_type.blank())
    }

    /// Synthetic spec applied to each element of a list field
    pub(crate) fn item_spec(&self, item: &FieldType) -> FieldSpec {
        FieldSpec {
            name: self.name.clone(),
            field_type: item.clone(),
            default: None,
            required: false,
            nullable: false,
            range: self.range,
            deprecated: false,
            description: None,
        }
    }
}

/// Invariant spanning several fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum CrossFieldRule {
    /// Both numeric; `lesser <= greater` when both are set
    LessOrEqual { lesser: FieldPath, greater: FieldPath },
    /// `field` must be set whenever `when` equals `equals`
    RequiredIf {
        field: FieldPath,
        when: FieldPath,
        equals: FieldValue,
    },
}

impl CrossFieldRule {
    fn paths(&self) -> [&FieldPath; 2] {
        match self {
            CrossFieldRule::LessOrEqual { lesser, greater } => [lesser, greater],
            CrossFieldRule::RequiredIf { field, when, .. } => [field, when],
        }
    }
}

/// Schema of one definition category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySchema {
    /// Category token (e.g., "weapon")
    pub category: String,
    /// Version definitions of this category are authored against
    #[serde(default)]
    pub version: SchemaVersion,
    /// Fields in declaration order
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub rules: Vec<CrossFieldRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CategorySchema {
    /// Create a new schema
    pub fn new(category: impl Into<String>, version: SchemaVersion) -> Self {
        Self {
            category: category.into(),
            version,
            fields: Vec::new(),
            rules: Vec::new(),
            description: None,
        }
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_rule(mut self, rule: CrossFieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Get a top-level field declaration
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Find the declaration governing `path`, descending through records and
    /// list items
    pub fn spec_at(&self, path: &FieldPath) -> Option<FieldSpec> {
        fn descend(spec: &FieldSpec, rest: &[PathSegment]) -> Option<FieldSpec> {
            let Some((segment, rest)) = rest.split_first() else {
                return Some(spec.clone());
            };
            match (&spec.field_type, segment) {
                (FieldType::Record { fields }, PathSegment::Field(name)) => {
                    descend(fields.iter().find(|f| &f.name == name)?, rest)
                }
                (FieldType::List { item }, PathSegment::Index(_)) => descend(&spec.item_spec(item), rest),
                _ => None,
            }
        }

        let (first, rest) = path.segments().split_first()?;
        let PathSegment::Field(name) = first else {
            return None;
        };
        descend(self.field(name)?, rest)
    }

    /// Fresh field set pre-filled with defaults
    pub fn instantiate(&self) -> Fields {
        instantiate_fields(&self.fields)
    }

    /// Compute the checksum for this schema
    pub fn checksum(&self) -> Checksum {
        Checksum::of(self)
    }

    /// Check the schema is internally consistent
    pub fn check(&self) -> Result<()> {
        if !is_valid_category(&self.category) {
            return Err(self.invalid(format!(
                "category '{}' must be a lowercase token without underscores",
                self.category
            )));
        }
        self.check_fields(&self.fields, None)?;

        for rule in &self.rules {
            for path in rule.paths() {
                if self.spec_at(path).is_none() {
                    return Err(self.invalid(format!("rule references unknown field '{}'", path)));
                }
            }
            if let CrossFieldRule::LessOrEqual { lesser, greater } = rule {
                for path in [lesser, greater] {
                    let numeric = self
                        .spec_at(path)
                        .map(|s| matches!(s.field_type, FieldType::Integer | FieldType::Float))
                        .unwrap_or(false);
                    if !numeric {
                        return Err(self.invalid(format!("rule field '{}' is not numeric", path)));
                    }
                }
            }
        }
        debug!(
            category = %self.category,
            fields = self.fields.len(),
            rules = self.rules.len(),
            "schema checked"
        );
        Ok(())
    }

    fn check_fields(&self, specs: &[FieldSpec], parent: Option<&FieldPath>) -> Result<()> {
        let mut seen = HashSet::new();
        for spec in specs {
            let path = match parent {
                Some(p) => p.child(&spec.name),
                None => FieldPath::field(&spec.name),
            };
            if spec.name.is_empty() || !seen.insert(spec.name.as_str()) {
                return Err(self.invalid(format!("duplicate or empty field name at '{}'", path)));
            }
            if let Some(default) = &spec.default {
                if let Some(reason) = default_problem(spec, default) {
                    return Err(self.invalid(format!("default for '{}' {}", path, reason)));
                }
            }
            match &spec.field_type {
                FieldType::Record { fields } => self.check_fields(fields, Some(&path))?,
                FieldType::List { item } => {
                    if let FieldType::Record { fields } = item.as_ref() {
                        self.check_fields(fields, Some(&path.index(0)))?;
                    }
                }
                FieldType::Enum { variants } if variants.is_empty() => {
                    return Err(self.invalid(format!("enum '{}' declares no variants", path)));
                }
                FieldType::Reference { category } if !is_valid_category(category) => {
                    return Err(self.invalid(format!(
                        "reference '{}' targets invalid category '{}'",
                        path, category
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn invalid(&self, reason: String) -> WorkbenchError {
        WorkbenchError::InvalidSchema {
            category: self.category.clone(),
            reason,
        }
    }
}

fn instantiate_fields(specs: &[FieldSpec]) -> Fields {
    specs
        .iter()
        .map(|spec| (spec.name.clone(), spec.initial_value()))
        .collect()
}

fn default_problem(spec: &FieldSpec, default: &FieldValue) -> Option<String> {
    if default.is_null() {
        return None;
    }
    if !spec.field_type.accepts(default) {
        return Some(format!(
            "is a {}, expected {}",
            default.kind_name(),
            spec.field_type.type_name()
        ));
    }
    if let (Some(range), Some(n)) = (spec.range, default.as_f64()) {
        if !range.contains(n) {
            return Some(format!("{} is outside {}", n, range));
        }
    }
    if let (FieldType::Enum { variants }, FieldValue::Enum(v)) = (&spec.field_type, default) {
        if !variants.contains(v) {
            return Some(format!("'{}' is not a declared variant", v));
        }
    }
    None
}

/// All category schemas known to a workbench
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    schemas: HashMap<String, Arc<CategorySchema>>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from schemas, checking each
    pub fn from_schemas(schemas: impl IntoIterator<Item = CategorySchema>) -> Result<Self> {
        let mut catalog = Self::new();
        for schema in schemas {
            catalog.insert(schema)?;
        }
        Ok(catalog)
    }

    /// Load every `*.json` schema file under `dir`
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut catalog = Self::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|x| x == "json").unwrap_or(false))
        {
            let content = fs::read_to_string(entry.path())?;
            let schema: CategorySchema = serde_json::from_str(&content)?;
            debug!(path = %entry.path().display(), category = %schema.category, "loaded schema");
            catalog.insert(schema)?;
        }

        Ok(catalog)
    }

    /// Add a schema; a category can only be declared once
    pub fn insert(&mut self, schema: CategorySchema) -> Result<()> {
        schema.check()?;
        if self.schemas.contains_key(&schema.category) {
            return Err(WorkbenchError::InvalidSchema {
                category: schema.category,
                reason: "category is already declared".to_string(),
            });
        }
        self.schemas.insert(schema.category.clone(), Arc::new(schema));
        Ok(())
    }

    /// Get the schema for a category
    pub fn get(&self, category: &str) -> Result<Arc<CategorySchema>> {
        self.schemas
            .get(category)
            .cloned()
            .ok_or_else(|| WorkbenchError::UnknownCategory(category.to_string()))
    }

    pub fn contains(&self, category: &str) -> bool {
        self.schemas.contains_key(category)
    }

    /// All declared categories, sorted
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<_> = self.schemas.keys().map(String::as_str).collect();
        categories.sort_unstable();
        categories
    }

    /// Default-filled field set for a new definition of `category`
    pub fn instantiate(&self, category: &str) -> Result<Fields> {
        Ok(self.get(category)?.instantiate())
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
