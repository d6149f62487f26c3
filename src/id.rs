//! Stable identifiers
//!
//! A [`StableId`] addresses a definition as `{category}_{name}`. The category
//! is a single lowercase token, so the rendered form always splits at the
//! first underscore:
//!
//! ```text
//! weapon_pistol        -> category "weapon", name "pistol"
//! weapon_heavy_pistol  -> category "weapon", name "heavy_pistol"
//! ```

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkbenchError};

fn category_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z][a-z0-9]*$").expect("category pattern is valid"))
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z][a-z0-9]*(_[a-z0-9]+)*$").expect("name pattern is valid")
    })
}

/// Check a category token (lowercase, no underscores)
pub fn is_valid_category(category: &str) -> bool {
    category_pattern().is_match(category)
}

/// Check a name token (lowercase snake_case)
pub fn is_valid_name(name: &str) -> bool {
    name_pattern().is_match(name)
}

/// Persistent identifier of a definition
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StableId {
    category: String,
    name: String,
}

impl StableId {
    /// Build an id from its two tokens
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let category = category.into();
        let name = name.into();

        if !is_valid_category(&category) {
            return Err(WorkbenchError::InvalidStableId {
                value: format!("{}_{}", category, name),
                reason: format!(
                    "category '{}' must be a lowercase token without underscores",
                    category
                ),
            });
        }
        if !is_valid_name(&name) {
            return Err(WorkbenchError::InvalidStableId {
                value: format!("{}_{}", category, name),
                reason: format!("name '{}' must be lowercase snake_case", name),
            });
        }

        Ok(Self { category, name })
    }

    /// Parse the rendered `{category}_{name}` form
    pub fn parse(value: &str) -> Result<Self> {
        let Some((category, name)) = value.split_once('_') else {
            return Err(WorkbenchError::InvalidStableId {
                value: value.to_string(),
                reason: "expected '{category}_{name}'".to_string(),
            });
        };
        Self::new(category, name)
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.category, self.name)
    }
}

impl std::str::FromStr for StableId {
    type Err = WorkbenchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StableId {
    type Error = WorkbenchError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<StableId> for String {
    fn from(id: StableId) -> Self {
        id.to_string()
    }
}
