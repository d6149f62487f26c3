//! Definition validation
//!
//! Validation is a pure function of a field set, its category schema and a
//! read-only [`ReferenceResolver`]. Validators run in a fixed order and each
//! walks the schema in declaration order, so the same input always yields the
//! same diagnostics in the same order.
//!
//! ## Validators
//! 1. **Required**: required fields are present (and non-null unless nullable)
//! 2. **Type**: values match their declared type
//! 3. **Range**: numeric values fall inside declared bounds
//! 4. **Enum**: enum values name a declared variant
//! 5. **Reference**: references point at an existing definition of the
//!    declared category
//! 6. **Unknown fields**: undeclared fields (warning)
//! 7. **Deprecated fields**: deprecated fields that are set (warning)
//! 8. **Cross-field**: schema rules such as `min <= max`

use std::collections::HashSet;
use std::fmt;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::{Deserialize, Serialize};

use crate::config::ValidationConfig;
use crate::id::StableId;
use crate::schema::{CategorySchema, CrossFieldRule, FieldSpec, FieldType};
use crate::value::{self, FieldPath, FieldValue, Fields};

// =============================================================================
// Diagnostics
// =============================================================================

/// Diagnostic code for categorizing issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    /// Required field is absent or null
    MissingRequired,
    /// Value kind does not match the declared type
    TypeMismatch,
    /// Numeric value outside declared bounds
    OutOfRange,
    /// Enum value is not a declared variant
    InvalidEnumVariant,
    /// Referenced id is not in the registry
    UnresolvedReference,
    /// Referenced id belongs to the wrong category
    WrongReferenceCategory,
    /// Cross-field rule violated
    CrossFieldViolation,
    /// Field is not declared by the schema
    UnknownField,
    /// Deprecated field is set
    DeprecatedField,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingRequired => "E001",
            Self::TypeMismatch => "E002",
            Self::OutOfRange => "E003",
            Self::InvalidEnumVariant => "E004",
            Self::UnresolvedReference => "E005",
            Self::WrongReferenceCategory => "E006",
            Self::CrossFieldViolation => "E007",
            Self::UnknownField => "W001",
            Self::DeprecatedField => "W002",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::MissingRequired
            | Self::TypeMismatch
            | Self::OutOfRange
            | Self::InvalidEnumVariant
            | Self::UnresolvedReference
            | Self::WrongReferenceCategory
            | Self::CrossFieldViolation => Severity::Error,

            Self::UnknownField | Self::DeprecatedField => Severity::Warning,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Reported, does not block commit
    Warning,
    /// Blocks commit
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A single validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    /// Field the finding concerns
    pub path: FieldPath,
    pub message: String,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, path: FieldPath, message: impl Into<String>) -> Self {
        Self {
            severity: code.severity(),
            code,
            path,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] {}: {}", self.severity, self.code, self.path, self.message)
    }
}

/// Whether any diagnostic blocks commit
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

// =============================================================================
// Reference resolution
// =============================================================================

/// Read-only existence check used for reference validation
pub trait ReferenceResolver {
    fn exists(&self, id: &StableId) -> bool;
}

impl ReferenceResolver for HashSet<StableId> {
    fn exists(&self, id: &StableId) -> bool {
        self.contains(id)
    }
}

impl<R: ReferenceResolver + ?Sized> ReferenceResolver for &R {
    fn exists(&self, id: &StableId) -> bool {
        (**self).exists(id)
    }
}

// =============================================================================
// Validators
// =============================================================================

/// Input handed to every validator
pub struct ValidationContext<'a> {
    pub schema: &'a CategorySchema,
    pub fields: &'a Fields,
    pub resolver: &'a dyn ReferenceResolver,
}

impl ValidationContext<'_> {
    /// Visit every declared field slot that the schema can reach, including
    /// nested record fields and list elements
    pub fn walk(&self, visit: &mut dyn FnMut(&FieldSpec, &FieldPath, Option<&FieldValue>)) {
        walk_fields(&self.schema.fields, self.fields, None, visit);
    }
}

fn walk_fields(
    specs: &[FieldSpec],
    fields: &Fields,
    parent: Option<&FieldPath>,
    visit: &mut dyn FnMut(&FieldSpec, &FieldPath, Option<&FieldValue>),
) {
    for spec in specs {
        let path = match parent {
            Some(p) => p.child(&spec.name),
            None => FieldPath::field(&spec.name),
        };
        let value = fields.get(&spec.name);
        visit(spec, &path, value);
        if let Some(value) = value {
            descend(spec, &path, value, visit);
        }
    }
}

fn descend(
    spec: &FieldSpec,
    path: &FieldPath,
    value: &FieldValue,
    visit: &mut dyn FnMut(&FieldSpec, &FieldPath, Option<&FieldValue>),
) {
    match (&spec.field_type, value) {
        (FieldType::Record { fields: nested }, FieldValue::Record(record)) => {
            walk_fields(nested, record, Some(path), visit);
        }
        (FieldType::List { item }, FieldValue::List(items)) => {
            let item_spec = spec.item_spec(item);
            for (i, element) in items.iter().enumerate() {
                let element_path = path.index(i);
                visit(&item_spec, &element_path, Some(element));
                descend(&item_spec, &element_path, element, visit);
            }
        }
        _ => {}
    }
}

/// One validation pass
pub trait Validator: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    fn validate(&self, cx: &ValidationContext<'_>, out: &mut Vec<Diagnostic>);
}

struct RequiredFields;

impl Validator for RequiredFields {
    fn name(&self) -> &'static str {
        "required"
    }

    fn validate(&self, cx: &ValidationContext<'_>, out: &mut Vec<Diagnostic>) {
        cx.walk(&mut |spec, path, value| {
            if !spec.required {
                return;
            }
            let missing = match value {
                None => true,
                Some(v) => v.is_null() && !spec.nullable,
            };
            if missing {
                out.push(Diagnostic::new(
                    DiagnosticCode::MissingRequired,
                    path.clone(),
                    format!("'{}' is required", path),
                ));
            }
        });
    }
}

struct TypeConformance;

impl Validator for TypeConformance {
    fn name(&self) -> &'static str {
        "type"
    }

    fn validate(&self, cx: &ValidationContext<'_>, out: &mut Vec<Diagnostic>) {
        cx.walk(&mut |spec, path, value| {
            let Some(value) = value else { return };
            if !value.is_null() && !spec.field_type.accepts(value) {
                out.push(Diagnostic::new(
                    DiagnosticCode::TypeMismatch,
                    path.clone(),
                    format!(
                        "expected {}, found {}",
                        spec.field_type.type_name(),
                        value.kind_name()
                    ),
                ));
            }
        });
    }
}

struct RangeCheck;

impl Validator for RangeCheck {
    fn name(&self) -> &'static str {
        "range"
    }

    fn validate(&self, cx: &ValidationContext<'_>, out: &mut Vec<Diagnostic>) {
        cx.walk(&mut |spec, path, value| {
            let (Some(range), Some(value)) = (spec.range, value) else {
                return;
            };
            if !spec.field_type.accepts(value) {
                return;
            }
            if let Some(n) = value.as_f64() {
                if !range.contains(n) {
                    out.push(Diagnostic::new(
                        DiagnosticCode::OutOfRange,
                        path.clone(),
                        format!("{} is outside {}", value, range),
                    ));
                }
            }
        });
    }
}

struct EnumMembership;

impl Validator for EnumMembership {
    fn name(&self) -> &'static str {
        "enum"
    }

    fn validate(&self, cx: &ValidationContext<'_>, out: &mut Vec<Diagnostic>) {
        cx.walk(&mut |spec, path, value| {
            if let (FieldType::Enum { variants }, Some(FieldValue::Enum(variant))) = (&spec.field_type, value) {
                if !variants.contains(variant) {
                    out.push(Diagnostic::new(
                        DiagnosticCode::InvalidEnumVariant,
                        path.clone(),
                        format!("'{}' is not one of: {}", variant, variants.join(", ")),
                    ));
                }
            }
        });
    }
}

struct ReferenceResolution;

impl Validator for ReferenceResolution {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn validate(&self, cx: &ValidationContext<'_>, out: &mut Vec<Diagnostic>) {
        cx.walk(&mut |spec, path, value| {
            let (FieldType::Reference { category }, Some(FieldValue::Reference(target))) = (&spec.field_type, value) else {
                return;
            };
            if target.category() != category {
                out.push(Diagnostic::new(
                    DiagnosticCode::WrongReferenceCategory,
                    path.clone(),
                    format!("'{}' is a {}, expected a {}", target, target.category(), category),
                ));
            } else if !cx.resolver.exists(target) {
                out.push(Diagnostic::new(
                    DiagnosticCode::UnresolvedReference,
                    path.clone(),
                    format!("'{}' does not exist", target),
                ));
            }
        });
    }
}

struct UnknownFields {
    suggest: bool,
}

impl UnknownFields {
    fn check_record(&self, specs: &[FieldSpec], record: &Fields, parent: Option<&FieldPath>, out: &mut Vec<Diagnostic>) {
        let matcher = SkimMatcherV2::default();
        for name in record.keys() {
            if specs.iter().any(|s| &s.name == name) {
                continue;
            }
            let path = match parent {
                Some(p) => p.child(name),
                None => FieldPath::field(name),
            };
            let suggestion = if self.suggest {
                specs
                    .iter()
                    .filter_map(|s| matcher.fuzzy_match(&s.name, name).map(|score| (score, &s.name)))
                    .max_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(a.1)))
                    .map(|(_, candidate)| candidate.clone())
            } else {
                None
            };
            let message = match suggestion {
                Some(candidate) => format!("unknown field '{}'; did you mean '{}'?", name, candidate),
                None => format!("unknown field '{}'", name),
            };
            out.push(Diagnostic::new(DiagnosticCode::UnknownField, path, message));
        }
    }
}

impl Validator for UnknownFields {
    fn name(&self) -> &'static str {
        "unknown-fields"
    }

    fn validate(&self, cx: &ValidationContext<'_>, out: &mut Vec<Diagnostic>) {
        self.check_record(&cx.schema.fields, cx.fields, None, out);
        cx.walk(&mut |spec, path, value| {
            if let (FieldType::Record { fields: nested }, Some(FieldValue::Record(record))) = (&spec.field_type, value) {
                self.check_record(nested, record, Some(path), out);
            }
        });
    }
}

struct DeprecatedFields;

impl Validator for DeprecatedFields {
    fn name(&self) -> &'static str {
        "deprecated"
    }

    fn validate(&self, cx: &ValidationContext<'_>, out: &mut Vec<Diagnostic>) {
        cx.walk(&mut |spec, path, value| {
            if spec.deprecated && value.map_or(false, |v| !v.is_null()) {
                out.push(Diagnostic::new(
                    DiagnosticCode::DeprecatedField,
                    path.clone(),
                    format!("'{}' is deprecated", path),
                ));
            }
        });
    }
}

struct CrossFieldRules;

impl Validator for CrossFieldRules {
    fn name(&self) -> &'static str {
        "cross-field"
    }

    fn validate(&self, cx: &ValidationContext<'_>, out: &mut Vec<Diagnostic>) {
        for rule in &cx.schema.rules {
            match rule {
                CrossFieldRule::LessOrEqual { lesser, greater } => {
                    let low = value::get(cx.fields, lesser).and_then(FieldValue::as_f64);
                    let high = value::get(cx.fields, greater).and_then(FieldValue::as_f64);
                    if let (Some(low), Some(high)) = (low, high) {
                        if low > high {
                            out.push(Diagnostic::new(
                                DiagnosticCode::CrossFieldViolation,
                                lesser.clone(),
                                format!("'{}' ({}) must not exceed '{}' ({})", lesser, low, greater, high),
                            ));
                        }
                    }
                }
                CrossFieldRule::RequiredIf { field, when, equals } => {
                    if value::get(cx.fields, when) != Some(equals) {
                        continue;
                    }
                    let set = value::get(cx.fields, field).map_or(false, |v| !v.is_null());
                    if !set {
                        out.push(Diagnostic::new(
                            DiagnosticCode::CrossFieldViolation,
                            field.clone(),
                            format!("'{}' is required when '{}' is {}", field, when, equals),
                        ));
                    }
                }
            }
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Ordered set of validators
pub struct ValidationEngine {
    validators: Vec<Box<dyn Validator>>,
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new(&ValidationConfig::default())
    }
}

impl ValidationEngine {
    /// Standard validator set
    pub fn new(config: &ValidationConfig) -> Self {
        let mut validators: Vec<Box<dyn Validator>> = vec![
            Box::new(RequiredFields),
            Box::new(TypeConformance),
            Box::new(RangeCheck),
            Box::new(EnumMembership),
            Box::new(ReferenceResolution),
        ];
        if config.warn_unknown_fields {
            validators.push(Box::new(UnknownFields {
                suggest: config.suggest_field_names,
            }));
        }
        validators.push(Box::new(DeprecatedFields));
        validators.push(Box::new(CrossFieldRules));
        Self { validators }
    }

    /// Append a custom validator; it runs after the standard ones
    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Names of the validators in run order
    pub fn validator_names(&self) -> Vec<&'static str> {
        self.validators.iter().map(|v| v.name()).collect()
    }

    /// Validate a field set against its schema
    pub fn validate(
        &self,
        schema: &CategorySchema,
        fields: &Fields,
        resolver: &dyn ReferenceResolver,
    ) -> Vec<Diagnostic> {
        let cx = ValidationContext {
            schema,
            fields,
            resolver,
        };
        let mut diagnostics = Vec::new();
        for validator in &self.validators {
            validator.validate(&cx, &mut diagnostics);
        }
        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::SchemaVersion;

    fn weapon() -> CategorySchema {
        CategorySchema::new("weapon", SchemaVersion::default())
            .with_field(FieldSpec::new("damage", FieldType::Integer).required().with_range(0.0, 100.0))
            .with_field(FieldSpec::new(
                "rarity",
                FieldType::Enum {
                    variants: vec!["common".into(), "rare".into()],
                },
            ))
            .with_field(FieldSpec::new(
                "ammo",
                FieldType::Reference {
                    category: "ammo".into(),
                },
            ))
            .with_field(FieldSpec::new("min_range", FieldType::Float))
            .with_field(FieldSpec::new("max_range", FieldType::Float))
            .with_field(FieldSpec::new("legacy_slot", FieldType::Text).deprecated())
            .with_rule(CrossFieldRule::LessOrEqual {
                lesser: FieldPath::field("min_range"),
                greater: FieldPath::field("max_range"),
            })
    }

    fn fields(pairs: &[(&str, FieldValue)]) -> Fields {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn no_refs() -> HashSet<StableId> {
        HashSet::new()
    }

    fn codes(diagnostics: &[Diagnostic]) -> Vec<DiagnosticCode> {
        diagnostics.iter().map(|d| d.code).collect()
    }

    #[test]
    fn test_range_violation_reports_path() {
        let engine = ValidationEngine::default();
        let input = fields(&[("damage", FieldValue::Integer(150))]);
        let diagnostics = engine.validate(&weapon(), &input, &no_refs());

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DiagnosticCode::OutOfRange);
        assert_eq!(diagnostics[0].path.to_string(), "damage");
        assert!(has_errors(&diagnostics));
    }

    #[test]
    fn test_missing_required_and_type_mismatch() {
        let engine = ValidationEngine::default();
        let diagnostics = engine.validate(&weapon(), &Fields::new(), &no_refs());
        assert_eq!(codes(&diagnostics), vec![DiagnosticCode::MissingRequired]);

        let input = fields(&[("damage", "lots".into())]);
        let diagnostics = engine.validate(&weapon(), &input, &no_refs());
        assert_eq!(codes(&diagnostics), vec![DiagnosticCode::TypeMismatch]);
    }

    #[test]
    fn test_enum_and_reference_checks() {
        let engine = ValidationEngine::default();
        let known: HashSet<StableId> = [StableId::parse("ammo_nine_mm").unwrap()].into();

        let input = fields(&[
            ("damage", FieldValue::Integer(5)),
            ("rarity", FieldValue::Enum("legendary".into())),
            ("ammo", FieldValue::Reference(StableId::parse("ammo_shells").unwrap())),
        ]);
        let diagnostics = engine.validate(&weapon(), &input, &known);
        assert_eq!(
            codes(&diagnostics),
            vec![DiagnosticCode::InvalidEnumVariant, DiagnosticCode::UnresolvedReference]
        );

        let input = fields(&[
            ("damage", FieldValue::Integer(5)),
            ("ammo", FieldValue::Reference(StableId::parse("armor_vest").unwrap())),
        ]);
        let diagnostics = engine.validate(&weapon(), &input, &known);
        assert_eq!(codes(&diagnostics), vec![DiagnosticCode::WrongReferenceCategory]);

        let input = fields(&[
            ("damage", FieldValue::Integer(5)),
            ("ammo", FieldValue::Reference(StableId::parse("ammo_nine_mm").unwrap())),
        ]);
        assert!(engine.validate(&weapon(), &input, &known).is_empty());
    }

    #[test]
    fn test_warnings_do_not_count_as_errors() {
        let engine = ValidationEngine::default();
        let input = fields(&[
            ("damage", FieldValue::Integer(5)),
            ("damge", FieldValue::Integer(5)),
            ("legacy_slot", "hip".into()),
        ]);
        let diagnostics = engine.validate(&weapon(), &input, &no_refs());

        assert_eq!(
            codes(&diagnostics),
            vec![DiagnosticCode::UnknownField, DiagnosticCode::DeprecatedField]
        );
        assert!(diagnostics[0].message.contains("did you mean 'damage'"));
        assert!(!has_errors(&diagnostics));
    }

    #[test]
    fn test_cross_field_rule() {
        let engine = ValidationEngine::default();
        let input = fields(&[
            ("damage", FieldValue::Integer(5)),
            ("min_range", FieldValue::Float(8.0)),
            ("max_range", FieldValue::Integer(3)),
        ]);
        let diagnostics = engine.validate(&weapon(), &input, &no_refs());
        assert_eq!(codes(&diagnostics), vec![DiagnosticCode::CrossFieldViolation]);
        assert_eq!(diagnostics[0].path, FieldPath::field("min_range"));
    }

    #[test]
    fn test_nested_paths_and_list_items() {
        let schema = CategorySchema::new("weapon", SchemaVersion::default())
            .with_field(FieldSpec::new(
                "stats",
                FieldType::Record {
                    fields: vec![FieldSpec::new("weight", FieldType::Float).required()],
                },
            ))
            .with_field(
                FieldSpec::new(
                    "spread",
                    FieldType::List {
                        item: Box::new(FieldType::Integer),
                    },
                )
                .with_range(0.0, 10.0),
            );

        let input = fields(&[
            ("stats", FieldValue::Record(Fields::new())),
            (
                "spread",
                FieldValue::List(vec![FieldValue::Integer(1), FieldValue::Integer(40)]),
            ),
        ]);
        let diagnostics = ValidationEngine::default().validate(&schema, &input, &no_refs());
        let paths: Vec<String> = diagnostics.iter().map(|d| d.path.to_string()).collect();
        assert_eq!(paths, vec!["stats.weight", "spread[1]"]);
    }

    #[test]
    fn test_validation_is_deterministic() {
        let engine = ValidationEngine::default();
        let input = fields(&[
            ("damage", FieldValue::Integer(-1)),
            ("zeta", FieldValue::Null),
            ("alpha", FieldValue::Null),
            ("rarity", FieldValue::Enum("mythic".into())),
        ]);
        let first = engine.validate(&weapon(), &input, &no_refs());
        let second = engine.validate(&weapon(), &input, &no_refs());
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn test_unknown_field_warnings_can_be_disabled() {
        let config = ValidationConfig {
            warn_unknown_fields: false,
            ..ValidationConfig::default()
        };
        let engine = ValidationEngine::new(&config);
        assert!(!engine.validator_names().contains(&"unknown-fields"));

        let input = fields(&[("damage", FieldValue::Integer(1)), ("extra", FieldValue::Null)]);
        assert!(engine.validate(&weapon(), &input, &no_refs()).is_empty());
    }
}
