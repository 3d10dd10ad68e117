//! Hook protocol
//!
//! Units name their hooks; the code behind those names is native and lives
//! in a [`HookSet`]. Any closure with the right signature is a hook.

mod builtin;

pub use builtin::{ConfiguredHook, PrefixMatch, RequireHook, TemplateMake};

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::registry::HookSlot;
use crate::resolver::{BuildError, ResolveError, Resolver};
use crate::scaffold::ScaffoldError;
use crate::unit::{DeclaredHooks, TypeDef};

/// Errors raised inside hooks
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Scaffold(#[from] ScaffoldError),
}

pub type HookResult = Result<bool, HookError>;

/// One-time initialization of a type with its configuration slice
pub trait InitHook {
    fn init(&self, resolver: &mut Resolver, slice: Option<&Value>, declared: &str) -> HookResult;
}

/// Custom matcher for type-reference autoload rules
pub trait MatchHook {
    fn matches(&self, resolver: &mut Resolver, owner: &TypeDef, candidate: &str) -> HookResult;
}

/// Materialization of a missing type
pub trait MakeHook {
    fn make(&self, resolver: &mut Resolver, owner: &TypeDef, target: &str) -> HookResult;
}

impl<F> InitHook for F
where
    F: Fn(&mut Resolver, Option<&Value>, &str) -> HookResult,
{
    fn init(&self, resolver: &mut Resolver, slice: Option<&Value>, declared: &str) -> HookResult {
        self(resolver, slice, declared)
    }
}

impl<F> MatchHook for F
where
    F: Fn(&mut Resolver, &TypeDef, &str) -> HookResult,
{
    fn matches(&self, resolver: &mut Resolver, owner: &TypeDef, candidate: &str) -> HookResult {
        self(resolver, owner, candidate)
    }
}

impl<F> MakeHook for F
where
    F: Fn(&mut Resolver, &TypeDef, &str) -> HookResult,
{
    fn make(&self, resolver: &mut Resolver, owner: &TypeDef, target: &str) -> HookResult {
        self(resolver, owner, target)
    }
}

/// Named hooks available to units
#[derive(Clone, Default)]
pub struct HookSet {
    init: HashMap<String, Arc<dyn InitHook>>,
    matchers: HashMap<String, Arc<dyn MatchHook>>,
    make: HashMap<String, Arc<dyn MakeHook>>,
}

impl fmt::Debug for HookSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookSet")
            .field("init", &self.names(HookSlot::Init))
            .field("match", &self.names(HookSlot::Match))
            .field("make", &self.names(HookSlot::Make))
            .finish()
    }
}

impl HookSet {
    /// An empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in hooks: `require`, `configured`, `prefix`, `template`
    pub fn builtin() -> Self {
        Self::new()
            .with_init("require", RequireHook)
            .with_init("configured", ConfiguredHook)
            .with_match("prefix", PrefixMatch)
            .with_make("template", TemplateMake)
    }

    pub fn with_init(mut self, name: &str, hook: impl InitHook + 'static) -> Self {
        self.init.insert(name.to_string(), Arc::new(hook));
        self
    }

    pub fn with_match(mut self, name: &str, hook: impl MatchHook + 'static) -> Self {
        self.matchers.insert(name.to_string(), Arc::new(hook));
        self
    }

    pub fn with_make(mut self, name: &str, hook: impl MakeHook + 'static) -> Self {
        self.make.insert(name.to_string(), Arc::new(hook));
        self
    }

    /// Register a closure init hook
    pub fn init_fn<F>(self, name: &str, hook: F) -> Self
    where
        F: Fn(&mut Resolver, Option<&Value>, &str) -> HookResult + 'static,
    {
        self.with_init(name, hook)
    }

    /// Register a closure match hook
    pub fn match_fn<F>(self, name: &str, hook: F) -> Self
    where
        F: Fn(&mut Resolver, &TypeDef, &str) -> HookResult + 'static,
    {
        self.with_match(name, hook)
    }

    /// Register a closure make hook
    pub fn make_fn<F>(self, name: &str, hook: F) -> Self
    where
        F: Fn(&mut Resolver, &TypeDef, &str) -> HookResult + 'static,
    {
        self.with_make(name, hook)
    }

    pub fn init(&self, name: &str) -> Option<Arc<dyn InitHook>> {
        self.init.get(name).cloned()
    }

    pub fn matcher(&self, name: &str) -> Option<Arc<dyn MatchHook>> {
        self.matchers.get(name).cloned()
    }

    pub fn make(&self, name: &str) -> Option<Arc<dyn MakeHook>> {
        self.make.get(name).cloned()
    }

    pub fn contains(&self, slot: HookSlot, name: &str) -> bool {
        match slot {
            HookSlot::Init => self.init.contains_key(name),
            HookSlot::Match => self.matchers.contains_key(name),
            HookSlot::Make => self.make.contains_key(name),
        }
    }

    /// Sorted hook names for a slot
    pub fn names(&self, slot: HookSlot) -> Vec<&str> {
        let mut names: Vec<&str> = match slot {
            HookSlot::Init => self.init.keys().map(String::as_str).collect(),
            HookSlot::Match => self.matchers.keys().map(String::as_str).collect(),
            HookSlot::Make => self.make.keys().map(String::as_str).collect(),
        };
        names.sort_unstable();
        names
    }

    /// Check that every hook a unit declares exists
    pub fn check(&self, hooks: &DeclaredHooks) -> Result<(), String> {
        let declared = [
            (HookSlot::Init, "init", &hooks.init),
            (HookSlot::Match, "match", &hooks.matcher),
            (HookSlot::Make, "make", &hooks.make),
        ];
        for (slot, label, name) in declared {
            if let Some(name) = name {
                if !self.contains(slot, name) {
                    return Err(format!("unknown {} hook '{}'", label, name));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        let hooks = HookSet::builtin();
        assert_eq!(hooks.names(HookSlot::Init), vec!["configured", "require"]);
        assert_eq!(hooks.names(HookSlot::Match), vec!["prefix"]);
        assert_eq!(hooks.names(HookSlot::Make), vec!["template"]);
    }

    #[test]
    fn test_closure_registration() {
        let hooks = HookSet::new()
            .init_fn("noop", |_, _, _| Ok(true))
            .match_fn("never", |_, _, _| Ok(false));

        assert!(hooks.contains(HookSlot::Init, "noop"));
        assert!(hooks.contains(HookSlot::Match, "never"));
        assert!(!hooks.contains(HookSlot::Make, "noop"));
        assert!(hooks.init("noop").is_some());
        assert!(hooks.make("noop").is_none());
    }

    #[test]
    fn test_check_declared_hooks() {
        let hooks = HookSet::builtin();
        let ok = DeclaredHooks {
            init: Some("require".to_string()),
            matcher: None,
            make: Some("template".to_string()),
        };
        assert!(hooks.check(&ok).is_ok());

        let bad = DeclaredHooks {
            init: None,
            matcher: Some("require".to_string()),
            make: None,
        };
        let err = hooks.check(&bad).unwrap_err();
        assert!(err.contains("match hook 'require'"));
    }
}
