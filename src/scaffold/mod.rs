//! Materializer
//!
//! Renders new type units from templates keyed by base type. Rendering is
//! pure and deterministic; loading the result (see
//! [`Resolver::build`](crate::resolver::Resolver::build)) and writing it
//! to disk ([`Scaffolder::persist`]) are separate steps.

mod render;
mod template;

pub use render::{placeholders, render};
pub use template::{Template, RESERVED_VARIABLES};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::naming::{is_identifier, is_type_name, unit_path};

/// Substitution variables, name -> value
pub type Substitutions = BTreeMap<String, String>;

/// Which input failed the identifier-safety check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierRole {
    Target,
    Base,
    Variable,
    Value,
}

impl std::fmt::Display for IdentifierRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            IdentifierRole::Target => "target name",
            IdentifierRole::Base => "base name",
            IdentifierRole::Variable => "variable name",
            IdentifierRole::Value => "variable value",
        };
        f.write_str(label)
    }
}

/// Synthesis failures. Each is final for the attempt that raised it.
#[derive(Debug, thiserror::Error)]
pub enum ScaffoldError {
    #[error("Unsafe {role}: '{value}'")]
    UnsafeIdentifier { role: IdentifierRole, value: String },

    #[error("No template for base type '{base}' (looked for {path})")]
    NoTemplate { base: String, path: PathBuf },

    #[error("Failed to read template {path}: {source}")]
    TemplateIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid template for '{base}': {reason}")]
    InvalidTemplate { base: String, reason: String },

    #[error("Template for '{base}' does not declare variable '{name}'")]
    UnknownVariable { base: String, name: String },

    #[error("Variable '{0}' is reserved")]
    ReservedVariable(String),

    #[error("Template for '{base}' needs variable '{name}'")]
    MissingVariable { base: String, name: String },

    #[error("Unbound placeholder '{0}'")]
    Unbound(String),

    #[error("Invalid placeholder '{0}'")]
    InvalidPlaceholder(String),

    #[error("Unterminated placeholder at byte {offset}")]
    Unterminated { offset: usize },

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Renders units from templates under a fixed root
#[derive(Debug)]
pub struct Scaffolder {
    root: PathBuf,
    templates: HashMap<String, Template>,
}

impl Scaffolder {
    /// Templates are read lazily from `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            templates: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Register an in-memory template, shadowing any file for `base`
    pub fn register_template(
        &mut self,
        base: &str,
        variables: &[&str],
        source: &str,
    ) -> Result<(), ScaffoldError> {
        if !is_type_name(base) {
            return Err(ScaffoldError::UnsafeIdentifier {
                role: IdentifierRole::Base,
                value: base.to_string(),
            });
        }
        let variables = variables.iter().map(|v| v.to_string()).collect();
        let template = Template::new(base, variables, source.to_string(), None)?;
        self.templates.insert(base.to_string(), template);
        Ok(())
    }

    /// The template for `base`, read from disk on first use
    pub fn template(&mut self, base: &str) -> Result<&Template, ScaffoldError> {
        if !self.templates.contains_key(base) {
            let path = self.root.join(unit_path(base));
            let template = Template::from_file(base, &path)?;
            debug!(base = %base, path = %path.display(), "Loaded template");
            self.templates.insert(base.to_string(), template);
        }
        self.templates
            .get(base)
            .ok_or_else(|| ScaffoldError::NoTemplate {
                base: base.to_string(),
                path: self.root.join(unit_path(base)),
            })
    }

    /// Variables the template for `base` accepts
    pub fn variables(&mut self, base: &str) -> Result<BTreeSet<String>, ScaffoldError> {
        Ok(self.template(base)?.variables.clone())
    }

    /// Render the unit source for `target` from the template of `base`.
    ///
    /// Every name and substitution is checked before anything is rendered.
    pub fn synthesize(
        &mut self,
        target: &str,
        base: &str,
        substitutions: &Substitutions,
    ) -> Result<String, ScaffoldError> {
        check_inputs(target, base, substitutions)?;

        let template = self.template(base)?;
        for name in substitutions.keys() {
            if !template.variables.contains(name) {
                return Err(ScaffoldError::UnknownVariable {
                    base: base.to_string(),
                    name: name.clone(),
                });
            }
        }

        let mut bindings = substitutions.clone();
        bindings.insert("target".to_string(), target.to_string());
        bindings.insert("base".to_string(), base.to_string());

        if let Some(missing) = template.placeholders.iter().find(|p| !bindings.contains_key(*p)) {
            return Err(ScaffoldError::MissingVariable {
                base: base.to_string(),
                name: missing.clone(),
            });
        }

        let source = render(&template.source, &bindings)?;
        debug!(type_name = %target, base = %base, bytes = source.len(), "Synthesized unit");
        Ok(source)
    }

    /// Render and write the unit under `destination`, where an autoload
    /// rule rooted there will find it. Existing files are overwritten.
    pub fn persist(
        &mut self,
        target: &str,
        base: &str,
        substitutions: &Substitutions,
        destination: &Path,
    ) -> Result<PathBuf, ScaffoldError> {
        let source = self.synthesize(target, base, substitutions)?;
        let path = destination.join(unit_path(target));

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ScaffoldError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, source).map_err(|source| ScaffoldError::Io {
            path: path.clone(),
            source,
        })?;

        info!(type_name = %target, base = %base, path = %path.display(), "Persisted synthesized unit");
        Ok(path)
    }
}

fn check_inputs(target: &str, base: &str, substitutions: &Substitutions) -> Result<(), ScaffoldError> {
    if !is_type_name(target) {
        return Err(ScaffoldError::UnsafeIdentifier {
            role: IdentifierRole::Target,
            value: target.to_string(),
        });
    }
    if !is_type_name(base) {
        return Err(ScaffoldError::UnsafeIdentifier {
            role: IdentifierRole::Base,
            value: base.to_string(),
        });
    }
    for (name, value) in substitutions {
        if !is_identifier(name) {
            return Err(ScaffoldError::UnsafeIdentifier {
                role: IdentifierRole::Variable,
                value: name.clone(),
            });
        }
        if RESERVED_VARIABLES.contains(&name.as_str()) {
            return Err(ScaffoldError::ReservedVariable(name.clone()));
        }
        if !is_type_name(value) {
            return Err(ScaffoldError::UnsafeIdentifier {
                role: IdentifierRole::Value,
                value: value.clone(),
            });
        }
    }
    Ok(())
}
