//! Resolver
//!
//! Turns a type name into a loaded, initialized type:
//!
//! ```text
//! Unknown -> Resolving -> (rule search) -> Loaded -> Initialized
//!                      -> (rules exhausted) -> make hooks -> Loaded -> ...
//! ```
//!
//! All state lives in one `Resolver` value; hooks receive it mutably, so
//! resolution is reentrant. Registry marks make `resolve` and `initialize`
//! idempotent: a name that is already loaded short-circuits, which is what
//! breaks dependency cycles between initializers.

mod error;

pub use error::{BuildError, ResolveError};

use serde_json::Value;
use std::any::Any;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use kiln_config::ConfigTree;

use crate::hooks::{HookResult, HookSet};
use crate::naming::{canonical_name, is_type_name, underscored};
use crate::registry::{Capability, HookSlot, Registry, TypeState};
use crate::rules::{AutoloadRule, RuleOrigin, RuleTable, TypeMatcher};
use crate::scaffold::{Scaffolder, ScaffoldError, Substitutions};
use crate::unit::{TypeDef, UnitOrigin};

/// Per-process resolution context
#[derive(Debug)]
pub struct Resolver {
    config: ConfigTree,
    rules: RuleTable,
    registry: Registry,
    hooks: HookSet,
    scaffolder: Scaffolder,
    /// Base types asked to make a type once the rules are exhausted
    materializers: Vec<String>,
    /// Root that type-contributed autoload roots are relative to
    base_dir: PathBuf,
}

impl Resolver {
    pub fn new(config: ConfigTree, hooks: HookSet, scaffolder: Scaffolder) -> Self {
        Self {
            config,
            rules: RuleTable::new(),
            registry: Registry::new(),
            hooks,
            scaffolder,
            materializers: Vec::new(),
            base_dir: PathBuf::from("."),
        }
    }

    pub fn with_rules(mut self, rules: RuleTable) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_materializers<I, S>(mut self, bases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.materializers = bases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Add an autoload rule.
    ///
    /// Static rules go after the other static rules but ahead of every rule
    /// contributed by a type; contributed rules are appended.
    pub fn register_rule(&mut self, rule: AutoloadRule) {
        match rule.origin {
            RuleOrigin::Static => self.rules.insert_static(rule),
            RuleOrigin::Type(_) => self.rules.register(rule),
        }
    }

    pub fn config(&self) -> &ConfigTree {
        &self.config
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn hooks(&self) -> &HookSet {
        &self.hooks
    }

    pub fn scaffolder_mut(&mut self) -> &mut Scaffolder {
        &mut self.scaffolder
    }

    pub fn materializers(&self) -> &[String] {
        &self.materializers
    }

    pub fn state(&self, name: &str) -> TypeState {
        self.registry.state(name)
    }

    pub fn type_def(&self, name: &str) -> Option<Arc<TypeDef>> {
        self.registry.def(name)
    }

    pub fn capabilities(&self, name: &str) -> BTreeSet<Capability> {
        self.registry
            .entry(name)
            .map(|e| e.capabilities.clone())
            .unwrap_or_default()
    }

    /// Configuration slice of a type, stored under its underscored name
    pub fn config_slice(&self, name: &str) -> Option<&Value> {
        self.config.get(&[&underscored(name)])
    }

    /// Resolve `name` to a usable type.
    ///
    /// Returns `Initialized`, or `Loaded` when the type is still inside its
    /// own initialization further up the call stack.
    pub fn resolve(&mut self, name: &str) -> Result<TypeState, ResolveError> {
        if name.contains('\\') {
            return self.resolve(&canonical_name(name));
        }

        match self.registry.state(name) {
            TypeState::Unknown => {}
            TypeState::Resolving => return Err(ResolveError::InProgress(name.to_string())),
            TypeState::Loaded | TypeState::Initialized => return self.loaded_outcome(name),
        }

        if !is_type_name(name) {
            return Err(ResolveError::InvalidName(name.to_string()));
        }

        self.registry.begin(name);
        debug!(type_name = %name, "Resolving type");

        let rules = self.rules.clone();
        let found = rules.find(name, self, |resolver, path| resolver.read_unit(name, path));

        let result = match found {
            Some(def) => self.load(name, def),
            None => self.materialize(name),
        };

        if let Err(e) = &result {
            self.registry.abandon(name);
            debug!(type_name = %name, error = %e, "Resolution failed");
        }
        result
    }

    /// Run the init hook of a loaded type, at most once.
    ///
    /// Only a hook declared on the type itself runs; a type that merely
    /// inherits one initializes trivially, since its ancestors already ran
    /// theirs under their own names. Hook failures, panics included, are
    /// recorded and returned.
    pub fn initialize(&mut self, name: &str) -> Result<TypeState, ResolveError> {
        match self.registry.state(name) {
            TypeState::Initialized => return Ok(TypeState::Initialized),
            TypeState::Loaded => {}
            TypeState::Unknown | TypeState::Resolving => {
                return Err(ResolveError::NotLoaded(name.to_string()));
            }
        }

        if !self.registry.begin_init(name) {
            // Already attempted: either failed or running further up
            return self.loaded_outcome(name);
        }

        let hook = self
            .registry
            .hook_owner(name, HookSlot::Init)
            .and_then(|owner| owner.hooks.init.clone())
            .and_then(|hook_name| self.hooks.init(&hook_name));

        let Some(hook) = hook else {
            self.finish_init(name);
            return Ok(TypeState::Initialized);
        };

        let slice = self.config_slice(name).cloned();
        debug!(type_name = %name, configured = slice.is_some(), "Running init hook");

        let reason = match run_hook(|| hook.init(self, slice.as_ref(), name)) {
            Ok(true) => {
                self.finish_init(name);
                return Ok(TypeState::Initialized);
            }
            Ok(false) => "init hook reported failure".to_string(),
            Err(reason) => reason,
        };

        warn!(type_name = %name, reason = %reason, "Type failed to initialize");
        self.registry.record_init_failure(name, reason.clone());
        Err(ResolveError::Initialization {
            name: name.to_string(),
            reason,
        })
    }

    /// Synthesize `target` from the template of `base` and load it directly,
    /// bypassing the autoload rules.
    pub fn build(
        &mut self,
        target: &str,
        base: &str,
        substitutions: &Substitutions,
    ) -> Result<TypeState, BuildError> {
        if self.registry.is_loaded(target) {
            return Err(BuildError::AlreadyDefined(target.to_string()));
        }

        let source = self.scaffolder.synthesize(target, base, substitutions)?;
        let origin = UnitOrigin::Synthesized {
            base: base.to_string(),
        };
        let def = TypeDef::parse(&source, origin)
            .and_then(|def| def.expect_name(target))
            .map_err(|e| ResolveError::Load {
                name: target.to_string(),
                reason: e.to_string(),
            })?;
        self.hooks.check(&def.hooks).map_err(|reason| ResolveError::Load {
            name: target.to_string(),
            reason,
        })?;

        let fresh = self.registry.begin(target);
        let result = self.load(target, def);
        if result.is_err() && fresh {
            self.registry.abandon(target);
        }
        result.map_err(BuildError::from)
    }

    /// Render `target` and write it under `destination` for later runs to
    /// find through the autoload rules
    pub fn persist(
        &mut self,
        target: &str,
        base: &str,
        substitutions: &Substitutions,
        destination: &Path,
    ) -> Result<PathBuf, ScaffoldError> {
        self.scaffolder
            .persist(target, base, substitutions, destination)
    }

    /// Read a candidate unit; `None` if it is not loadable as `name`
    fn read_unit(&self, name: &str, path: &Path) -> Option<TypeDef> {
        let def = match TypeDef::from_file(path).and_then(|def| def.expect_name(name)) {
            Ok(def) => def,
            Err(e) => {
                warn!(type_name = %name, path = %path.display(), error = %e, "Skipping unloadable unit");
                return None;
            }
        };
        if let Err(reason) = self.hooks.check(&def.hooks) {
            warn!(type_name = %name, path = %path.display(), reason = %reason, "Skipping unloadable unit");
            return None;
        }
        Some(def)
    }

    /// Register a found unit, then initialize it if it participates
    fn load(&mut self, name: &str, def: TypeDef) -> Result<TypeState, ResolveError> {
        if let Some(parent) = def.extends.clone() {
            if let Err(e) = self.resolve(&parent) {
                return Err(ResolveError::Dependency {
                    name: name.to_string(),
                    dependency: parent,
                    reason: e.to_string(),
                });
            }
        }

        let def = self.registry.mark_loaded(def);
        info!(type_name = %name, origin = ?def.origin, "Loaded type");

        if self.registry.has_capability(name, Capability::Loadable) {
            self.initialize(name)
        } else {
            self.finish_init(name);
            Ok(TypeState::Initialized)
        }
    }

    /// Ask each materializer base type to make `name`
    fn materialize(&mut self, name: &str) -> Result<TypeState, ResolveError> {
        for base in self.materializers.clone() {
            if base == name {
                continue;
            }
            if let Err(e) = self.resolve(&base) {
                debug!(type_name = %name, base = %base, error = %e, "Materializer unavailable");
                continue;
            }

            let hook = self
                .registry
                .hook_owner(&base, HookSlot::Make)
                .and_then(|owner| owner.hooks.make.clone())
                .and_then(|hook_name| self.hooks.make(&hook_name));
            let (Some(hook), Some(owner)) = (hook, self.registry.def(&base)) else {
                continue;
            };

            debug!(type_name = %name, base = %base, "Trying make hook");
            if let Err(reason) = run_hook(|| hook.make(self, &owner, name)) {
                warn!(type_name = %name, base = %base, reason = %reason, "Make hook failed");
            }

            if self.registry.is_loaded(name) {
                return self.loaded_outcome(name);
            }
        }
        Err(ResolveError::NotFound(name.to_string()))
    }

    /// Outcome for a name that is already loaded
    fn loaded_outcome(&self, name: &str) -> Result<TypeState, ResolveError> {
        if let Some(reason) = self.registry.init_failure(name) {
            return Err(ResolveError::Initialization {
                name: name.to_string(),
                reason: reason.to_string(),
            });
        }
        Ok(self.registry.state(name))
    }

    fn finish_init(&mut self, name: &str) {
        self.registry.mark_initialized(name);
        info!(type_name = %name, "Type initialized");

        if let Some(rule) = self.contributed_rule(name) {
            self.rules.register(rule);
        }
    }

    /// Rule from the type's own `autoload = { root, pattern? }` setting
    fn contributed_rule(&self, name: &str) -> Option<AutoloadRule> {
        let autoload = self.config_slice(name)?.get("autoload")?;
        let root = self.base_dir.join(autoload.get("root")?.as_str()?);

        let rule = match autoload.get("pattern").and_then(Value::as_str) {
            Some(pattern) => AutoloadRule::wildcard(pattern, root),
            None => AutoloadRule::type_ref(name, root),
        };
        match rule {
            Ok(rule) => Some(rule.contributed_by(name)),
            Err(e) => {
                warn!(type_name = %name, error = %e, "Ignoring invalid autoload setting");
                None
            }
        }
    }
}

impl TypeMatcher for Resolver {
    fn type_matches(&mut self, type_name: &str, candidate: &str) -> bool {
        if type_name == candidate {
            return false;
        }
        if let Err(e) = self.resolve(type_name) {
            debug!(matcher = %type_name, error = %e, "Matcher type unavailable");
            return false;
        }

        let hook = self
            .registry
            .hook_owner(type_name, HookSlot::Match)
            .and_then(|owner| owner.hooks.matcher.clone())
            .and_then(|hook_name| self.hooks.matcher(&hook_name));
        let (Some(hook), Some(owner)) = (hook, self.registry.def(type_name)) else {
            return false;
        };

        match run_hook(|| hook.matches(self, &owner, candidate)) {
            Ok(matched) => matched,
            Err(reason) => {
                warn!(matcher = %type_name, candidate = %candidate, reason = %reason, "Match hook failed");
                false
            }
        }
    }
}

/// Run a hook, turning an error or a panic into a failure reason
fn run_hook(call: impl FnOnce() -> HookResult) -> Result<bool, String> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(payload) => Err(format!("hook panicked: {}", panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string payload")
}
