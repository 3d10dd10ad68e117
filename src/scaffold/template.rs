//! Materialization templates
//!
//! One file per base type under the template root:
//!
//! ```toml
//! variables = ["class", "table"]
//! source = '''
//! [unit]
//! name = "{{ class }}"
//! extends = "{{ base }}"
//! '''
//! ```

use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::render::placeholders;
use super::ScaffoldError;
use crate::naming::is_identifier;

/// Variables bound by the materializer itself
pub const RESERVED_VARIABLES: &[&str] = &["target", "base"];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TemplateFile {
    #[serde(default)]
    variables: Vec<String>,
    source: String,
}

/// A read-only template for one base type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub base: String,

    /// Substitution variables callers may pass
    pub variables: BTreeSet<String>,

    /// Every name referenced by a placeholder
    pub placeholders: BTreeSet<String>,

    pub source: String,

    /// File the template was read from, if any
    pub path: Option<PathBuf>,
}

impl Template {
    /// Validate and build a template.
    ///
    /// Declared variables must be identifiers and not reserved; every
    /// placeholder must name a declared or reserved variable.
    pub fn new(
        base: &str,
        variables: BTreeSet<String>,
        source: String,
        path: Option<PathBuf>,
    ) -> Result<Self, ScaffoldError> {
        let invalid = |reason: String| ScaffoldError::InvalidTemplate {
            base: base.to_string(),
            reason,
        };

        for name in &variables {
            if !is_identifier(name) {
                return Err(invalid(format!("variable '{}' is not an identifier", name)));
            }
            if RESERVED_VARIABLES.contains(&name.as_str()) {
                return Err(invalid(format!("variable '{}' is reserved", name)));
            }
        }

        let placeholders = placeholders(&source)?;
        for name in &placeholders {
            if !variables.contains(name) && !RESERVED_VARIABLES.contains(&name.as_str()) {
                return Err(invalid(format!("placeholder '{}' is not declared", name)));
            }
        }

        Ok(Self {
            base: base.to_string(),
            variables,
            placeholders,
            source,
            path,
        })
    }

    /// Read the template file for `base`
    pub fn from_file(base: &str, path: &Path) -> Result<Self, ScaffoldError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ScaffoldError::NoTemplate {
                    base: base.to_string(),
                    path: path.to_path_buf(),
                });
            }
            Err(source) => {
                return Err(ScaffoldError::TemplateIo {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let file: TemplateFile =
            toml::from_str(&contents).map_err(|e| ScaffoldError::InvalidTemplate {
                base: base.to_string(),
                reason: e.to_string(),
            })?;

        Self::new(
            base,
            file.variables.into_iter().collect(),
            file.source,
            Some(path.to_path_buf()),
        )
    }
}
