//! Field values and field paths
//!
//! Definitions store their content as [`Fields`], an ordered map from field
//! name to [`FieldValue`]. Nested records and lists are addressed with a
//! [`FieldPath`] such as `stats.range` or `loadout[1].slot`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkbenchError};
use crate::id::StableId;

/// Field name -> value, ordered by name
pub type Fields = BTreeMap<String, FieldValue>;

/// A typed field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    /// Enum variant name
    Enum(String),
    /// Weak link to another definition, resolved through the registry
    Reference(StableId),
    List(Vec<FieldValue>),
    Record(Fields),
}

impl FieldValue {
    /// Short name of the value kind, used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Integer(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::Text(_) => "text",
            FieldValue::Enum(_) => "enum",
            FieldValue::Reference(_) => "reference",
            FieldValue::List(_) => "list",
            FieldValue::Record(_) => "record",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Numeric view of integer and float values
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Fields> {
        match self {
            FieldValue::Record(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Whether this value links to `id`, at any depth
    pub fn refers_to(&self, id: &StableId) -> bool {
        match self {
            FieldValue::Reference(target) => target == id,
            FieldValue::List(items) => items.iter().any(|item| item.refers_to(id)),
            FieldValue::Record(fields) => fields.values().any(|value| value.refers_to(id)),
            _ => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Text(s) => write!(f, "{:?}", s),
            FieldValue::Enum(v) => write!(f, "{}", v),
            FieldValue::Reference(id) => write!(f, "@{}", id),
            FieldValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            FieldValue::Record(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<StableId> for FieldValue {
    fn from(value: StableId) -> Self {
        FieldValue::Reference(value)
    }
}

impl From<Fields> for FieldValue {
    fn from(value: Fields) -> Self {
        FieldValue::Record(value)
    }
}

/// One step of a [`FieldPath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// Location of a value inside a definition's fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Path to a top-level field
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            segments: vec![PathSegment::Field(name.into())],
        }
    }

    /// Parse `a.b[2].c`
    pub fn parse(input: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut chars = input.char_indices().peekable();
        let mut expect_name = true;

        while let Some(&(start, c)) = chars.peek() {
            match c {
                '.' if !expect_name && !segments.is_empty() => {
                    chars.next();
                    expect_name = true;
                }
                '[' if !expect_name => {
                    chars.next();
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some((_, ']')) => break,
                            Some((_, d)) if d.is_ascii_digit() => digits.push(d),
                            _ => {
                                return Err(WorkbenchError::invalid_path(
                                    input,
                                    "malformed list index",
                                ))
                            }
                        }
                    }
                    let index = digits
                        .parse::<usize>()
                        .map_err(|_| WorkbenchError::invalid_path(input, "empty list index"))?;
                    segments.push(PathSegment::Index(index));
                    expect_name = false;
                }
                c if expect_name && (c.is_ascii_alphanumeric() || c == '_') => {
                    let mut end = start;
                    while let Some(&(i, c)) = chars.peek() {
                        if c.is_ascii_alphanumeric() || c == '_' {
                            end = i + c.len_utf8();
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    segments.push(PathSegment::Field(input[start..end].to_string()));
                    expect_name = false;
                }
                _ => {
                    return Err(WorkbenchError::invalid_path(
                        input,
                        format!("unexpected character '{}'", c),
                    ))
                }
            }
        }

        if segments.is_empty() || expect_name {
            return Err(WorkbenchError::invalid_path(input, "path is incomplete"));
        }
        Ok(Self { segments })
    }

    /// Extend with a record field
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut path = self.clone();
        path.segments.push(PathSegment::Field(name.into()));
        path
    }

    /// Extend with a list index
    pub fn index(&self, index: usize) -> Self {
        let mut path = self.clone();
        path.segments.push(PathSegment::Index(index));
        path
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Name of the top-level field this path lives under
    pub fn head(&self) -> Option<&str> {
        match self.segments.first() {
            Some(PathSegment::Field(name)) => Some(name),
            _ => None,
        }
    }

    /// The path of the top-level field this path lives under
    pub fn root(&self) -> Option<FieldPath> {
        self.head().map(FieldPath::field)
    }

    /// Split `list[i]` into the list path and `i`
    pub fn split_index(&self) -> Option<(FieldPath, usize)> {
        match self.segments.split_last()? {
            (PathSegment::Index(index), parent) if !parent.is_empty() => Some((
                FieldPath {
                    segments: parent.to_vec(),
                },
                *index,
            )),
            _ => None,
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if i == 0 => write!(f, "{}", name)?,
                PathSegment::Field(name) => write!(f, ".{}", name)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for FieldPath {
    type Err = WorkbenchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = WorkbenchError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}

/// Look up the value at `path`
pub fn get<'a>(fields: &'a Fields, path: &FieldPath) -> Option<&'a FieldValue> {
    let (first, rest) = path.segments.split_first()?;
    let PathSegment::Field(name) = first else {
        return None;
    };
    let mut current = fields.get(name)?;
    for segment in rest {
        current = match (current, segment) {
            (FieldValue::Record(record), PathSegment::Field(name)) => record.get(name)?,
            (FieldValue::List(items), PathSegment::Index(index)) => items.get(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

fn resolve_mut<'a>(fields: &'a mut Fields, segments: &[PathSegment]) -> Option<&'a mut FieldValue> {
    let (first, rest) = segments.split_first()?;
    let PathSegment::Field(name) = first else {
        return None;
    };
    let mut current = fields.get_mut(name)?;
    for segment in rest {
        current = match (current, segment) {
            (FieldValue::Record(record), PathSegment::Field(name)) => record.get_mut(name)?,
            (FieldValue::List(items), PathSegment::Index(index)) => items.get_mut(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write `value` at `path`, returning the value it replaced
///
/// The parent container must already exist. A list slot must already exist;
/// growing a list goes through [`insert_at`].
pub fn set(fields: &mut Fields, path: &FieldPath, value: FieldValue) -> Result<Option<FieldValue>> {
    let (last, parent) = path
        .segments
        .split_last()
        .ok_or_else(|| WorkbenchError::invalid_path(path, "empty path"))?;

    if parent.is_empty() {
        return match last {
            PathSegment::Field(name) => Ok(fields.insert(name.clone(), value)),
            PathSegment::Index(_) => Err(WorkbenchError::invalid_path(
                path,
                "path must start with a field name",
            )),
        };
    }

    let container = resolve_mut(fields, parent)
        .ok_or_else(|| WorkbenchError::invalid_path(path, "parent does not exist"))?;
    match (container, last) {
        (FieldValue::Record(record), PathSegment::Field(name)) => Ok(record.insert(name.clone(), value)),
        (FieldValue::List(items), PathSegment::Index(index)) => {
            let len = items.len();
            let slot = items.get_mut(*index).ok_or_else(|| {
                WorkbenchError::invalid_path(path, format!("index out of bounds (len {})", len))
            })?;
            Ok(Some(std::mem::replace(slot, value)))
        }
        (other, _) => Err(WorkbenchError::invalid_path(
            path,
            format!("cannot address into a {} value", other.kind_name()),
        )),
    }
}

/// Remove the record entry at `path`, returning it
pub fn remove(fields: &mut Fields, path: &FieldPath) -> Result<FieldValue> {
    let (last, parent) = path
        .segments
        .split_last()
        .ok_or_else(|| WorkbenchError::invalid_path(path, "empty path"))?;

    let PathSegment::Field(name) = last else {
        return Err(WorkbenchError::invalid_path(
            path,
            "list elements are removed by index, not cleared",
        ));
    };

    let record = if parent.is_empty() {
        fields
    } else {
        match resolve_mut(fields, parent) {
            Some(FieldValue::Record(record)) => record,
            Some(other) => {
                return Err(WorkbenchError::invalid_path(
                    path,
                    format!("cannot address into a {} value", other.kind_name()),
                ))
            }
            None => return Err(WorkbenchError::invalid_path(path, "parent does not exist")),
        }
    };

    record
        .remove(name)
        .ok_or_else(|| WorkbenchError::invalid_path(path, "field is not set"))
}

fn list_mut<'a>(fields: &'a mut Fields, path: &FieldPath) -> Result<&'a mut Vec<FieldValue>> {
    match resolve_mut(fields, &path.segments) {
        Some(FieldValue::List(items)) => Ok(items),
        Some(other) => Err(WorkbenchError::invalid_path(
            path,
            format!("expected a list, found {}", other.kind_name()),
        )),
        None => Err(WorkbenchError::invalid_path(path, "list does not exist")),
    }
}

/// Insert `value` into the list at `path` before `index`
pub fn insert_at(fields: &mut Fields, path: &FieldPath, index: usize, value: FieldValue) -> Result<()> {
    let items = list_mut(fields, path)?;
    if index > items.len() {
        return Err(WorkbenchError::invalid_path(
            path.index(index),
            format!("insert position out of bounds (len {})", items.len()),
        ));
    }
    items.insert(index, value);
    Ok(())
}

/// Remove and return element `index` of the list at `path`
pub fn remove_at(fields: &mut Fields, path: &FieldPath, index: usize) -> Result<FieldValue> {
    let items = list_mut(fields, path)?;
    if index >= items.len() {
        return Err(WorkbenchError::invalid_path(
            path.index(index),
            format!("index out of bounds (len {})", items.len()),
        ));
    }
    Ok(items.remove(index))
}
