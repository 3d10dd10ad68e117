//! Type units
//!
//! A unit is a TOML file describing one type: its name, optional parent,
//! the capability marker, the hooks declared directly on it, and free-form
//! attributes for those hooks to read.
//!
//! ```toml
//! [unit]
//! name = "Widget"
//! extends = "ActiveRecord"
//! loadable = true
//!
//! [hooks]
//! init = "require"
//!
//! [attributes]
//! table = "widgets"
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::naming::is_type_name;

/// Errors reading a unit
#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    #[error("Failed to read unit {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse unit: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid type name in unit: '{0}'")]
    InvalidName(String),

    #[error("Unit defines '{found}', expected '{expected}'")]
    NameMismatch { expected: String, found: String },
}

/// Hooks declared directly on a type, by hook name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeclaredHooks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<String>,

    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub matcher: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UnitHeader {
    name: String,
    #[serde(default)]
    extends: Option<String>,
    #[serde(default)]
    loadable: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UnitFile {
    unit: UnitHeader,
    #[serde(default)]
    hooks: DeclaredHooks,
    #[serde(default)]
    attributes: toml::Table,
}

/// Where a type's unit came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "from", rename_all = "lowercase")]
pub enum UnitOrigin {
    /// Found on disk through an autoload rule
    File { path: PathBuf },

    /// Rendered from a base type's template
    Synthesized { base: String },
}

/// A loaded type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDef {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    /// Capability marker declared on this type itself
    pub loadable: bool,

    pub hooks: DeclaredHooks,

    /// Attribute table (a JSON object)
    pub attributes: Value,

    pub origin: UnitOrigin,
}

impl TypeDef {
    /// Parse unit source text
    pub fn parse(source: &str, origin: UnitOrigin) -> Result<Self, UnitError> {
        let file: UnitFile = toml::from_str(source)?;

        if !is_type_name(&file.unit.name) {
            return Err(UnitError::InvalidName(file.unit.name));
        }
        if let Some(parent) = &file.unit.extends {
            if !is_type_name(parent) {
                return Err(UnitError::InvalidName(parent.clone()));
            }
        }

        Ok(Self {
            name: file.unit.name,
            extends: file.unit.extends,
            loadable: file.unit.loadable,
            hooks: file.hooks,
            attributes: kiln_config::toml_to_json(toml::Value::Table(file.attributes)),
            origin,
        })
    }

    /// Read and parse a unit file
    pub fn from_file(path: &Path) -> Result<Self, UnitError> {
        let source = fs::read_to_string(path).map_err(|source| UnitError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(
            &source,
            UnitOrigin::File {
                path: path.to_path_buf(),
            },
        )
    }

    /// Fail unless this unit defines `expected`
    pub fn expect_name(self, expected: &str) -> Result<Self, UnitError> {
        if self.name != expected {
            return Err(UnitError::NameMismatch {
                expected: expected.to_string(),
                found: self.name,
            });
        }
        Ok(self)
    }

    /// Look up an attribute by key
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// String attribute by key
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attribute(key).and_then(Value::as_str)
    }
}
