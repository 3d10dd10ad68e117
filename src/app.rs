//! Application bootstrap
//!
//! Lays out an application directory and wires a [`Resolver`] from its
//! configuration. Loader settings come from the `loader` fragment:
//!
//! ```toml
//! # config/loader.toml
//! templates = "templates"
//! materializers = ["Controller", "ActiveRecord"]
//!
//! [[autoload]]
//! pattern = "*Controller"
//! root = "app/controllers"
//!
//! [[autoload]]
//! type = "Plugins"
//! root = "plugins"
//!
//! [[autoload]]
//! root = "lib"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use kiln_config::{load_or_build, ConfigError, ConfigTree};

use crate::hooks::HookSet;
use crate::resolver::Resolver;
use crate::rules::{AutoloadRule, RuleError, RuleTable};
use crate::scaffold::Scaffolder;

/// Fragment holding loader settings
pub const LOADER_FRAGMENT: &str = "loader";

/// Default configuration directory, relative to the application root
pub const CONFIG_DIR: &str = "config";

/// Bootstrap errors
#[derive(Debug, thiserror::Error)]
pub enum BootError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid loader settings: {0}")]
    Settings(String),

    #[error(transparent)]
    Rule(#[from] RuleError),
}

/// One configured autoload rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    /// Wildcard matcher
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Type-reference matcher
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,

    /// Source root, relative to the application root
    pub root: String,
}

impl RuleSpec {
    /// Build the rule; with neither matcher set it matches every name
    pub fn to_rule(&self, base_dir: &Path) -> Result<AutoloadRule, BootError> {
        let root = base_dir.join(&self.root);
        match (&self.pattern, &self.type_name) {
            (Some(_), Some(_)) => Err(BootError::Settings(format!(
                "autoload rule for '{}' sets both 'pattern' and 'type'",
                self.root
            ))),
            (Some(pattern), None) => Ok(AutoloadRule::wildcard(pattern, root)?),
            (None, Some(type_name)) => Ok(AutoloadRule::type_ref(type_name, root)?),
            (None, None) => Ok(AutoloadRule::always(root)),
        }
    }
}

fn default_templates() -> String {
    "templates".to_string()
}

/// Loader settings from the `loader` fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoaderSettings {
    /// Template root, relative to the application root
    #[serde(default = "default_templates")]
    pub templates: String,

    /// Base types asked to make missing types, in order
    #[serde(default)]
    pub materializers: Vec<String>,

    /// Static autoload rules, highest priority first
    #[serde(default)]
    pub autoload: Vec<RuleSpec>,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            templates: default_templates(),
            materializers: Vec::new(),
            autoload: Vec::new(),
        }
    }
}

impl LoaderSettings {
    /// Read settings from a configuration tree; defaults when absent
    pub fn from_config(config: &ConfigTree) -> Result<Self, BootError> {
        match config.fragment(LOADER_FRAGMENT) {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| BootError::Settings(e.to_string())),
            None => Ok(Self::default()),
        }
    }
}

/// An application directory
#[derive(Debug, Clone)]
pub struct App {
    root: PathBuf,
    config_dir: PathBuf,
    snapshot: Option<PathBuf>,
}

impl App {
    /// Application rooted at `root`, configuration under `root/config`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let config_dir = root.join(CONFIG_DIR);
        Self {
            root,
            config_dir,
            snapshot: None,
        }
    }

    pub fn with_config_dir(mut self, config_dir: impl Into<PathBuf>) -> Self {
        self.config_dir = config_dir.into();
        self
    }

    /// Prefer this snapshot over scanning the configuration directory
    pub fn with_snapshot(mut self, snapshot: impl Into<PathBuf>) -> Self {
        self.snapshot = Some(snapshot.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Snapshot if usable, otherwise a fresh scan
    pub fn load_config(&self) -> Result<ConfigTree, ConfigError> {
        load_or_build(&self.config_dir, self.snapshot.as_deref())
    }

    /// Build a resolver for this application
    pub fn boot(&self, hooks: HookSet) -> Result<Resolver, BootError> {
        let config = self.load_config()?;
        let settings = LoaderSettings::from_config(&config)?;

        let mut rules = RuleTable::new();
        for spec in &settings.autoload {
            rules.register(spec.to_rule(&self.root)?);
        }

        info!(
            root = %self.root.display(),
            fragments = config.len(),
            rules = rules.len(),
            "Loader ready"
        );

        let scaffolder = Scaffolder::new(self.root.join(&settings.templates));
        Ok(Resolver::new(config, hooks, scaffolder)
            .with_rules(rules)
            .with_materializers(settings.materializers)
            .with_base_dir(&self.root))
    }
}
