//! Autoload rule table
//!
//! An ordered list of (matcher, source root) pairs. Rules are tried strictly
//! in insertion order. A structural match alone never ends the search: only
//! a candidate unit that exists and is accepted by the caller does.

use globset::{Glob, GlobMatcher};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::naming::{is_type_name, unit_path};

/// Errors building a rule
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("Invalid wildcard pattern: {0}")]
    InvalidPattern(#[from] globset::Error),

    #[error("Invalid matcher type name: '{0}'")]
    InvalidTypeName(String),
}

/// Answers type-reference matchers.
///
/// Implemented by the resolver: the referenced type is resolved on demand
/// and its match hook is asked about the candidate.
pub trait TypeMatcher {
    fn type_matches(&mut self, type_name: &str, candidate: &str) -> bool;
}

/// How a rule decides whether it applies to a name
#[derive(Clone)]
pub enum Matcher {
    /// Wildcard pattern over the whole name (`*Controller`)
    Wildcard { pattern: String, matcher: GlobMatcher },

    /// Matches every name
    Always,

    /// A resolvable type exposing a match hook
    Type(String),
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Wildcard { pattern, .. } => write!(f, "Wildcard({})", pattern),
            Matcher::Always => write!(f, "Always"),
            Matcher::Type(name) => write!(f, "Type({})", name),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Wildcard { pattern, .. } => write!(f, "{}", pattern),
            Matcher::Always => write!(f, "*"),
            Matcher::Type(name) => write!(f, "type:{}", name),
        }
    }
}

/// Where a rule came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOrigin {
    /// Loader settings
    Static,

    /// A type's own configuration slice
    Type(String),
}

/// One (matcher, source root) pair
#[derive(Debug, Clone)]
pub struct AutoloadRule {
    pub matcher: Matcher,
    pub root: PathBuf,
    pub origin: RuleOrigin,
}

impl AutoloadRule {
    /// Rule matching names against a wildcard pattern
    pub fn wildcard(pattern: &str, root: impl Into<PathBuf>) -> Result<Self, RuleError> {
        let matcher = Glob::new(pattern)?.compile_matcher();
        Ok(Self {
            matcher: Matcher::Wildcard {
                pattern: pattern.to_string(),
                matcher,
            },
            root: root.into(),
            origin: RuleOrigin::Static,
        })
    }

    /// Rule matching every name
    pub fn always(root: impl Into<PathBuf>) -> Self {
        Self {
            matcher: Matcher::Always,
            root: root.into(),
            origin: RuleOrigin::Static,
        }
    }

    /// Rule delegating the match decision to a type's match hook
    pub fn type_ref(type_name: &str, root: impl Into<PathBuf>) -> Result<Self, RuleError> {
        if !is_type_name(type_name) {
            return Err(RuleError::InvalidTypeName(type_name.to_string()));
        }
        Ok(Self {
            matcher: Matcher::Type(type_name.to_string()),
            root: root.into(),
            origin: RuleOrigin::Static,
        })
    }

    /// Tag the rule as contributed by a type's configuration
    pub fn contributed_by(mut self, type_name: &str) -> Self {
        self.origin = RuleOrigin::Type(type_name.to_string());
        self
    }

    /// Structural match of `name` against this rule
    pub fn matches<M: TypeMatcher + ?Sized>(&self, name: &str, types: &mut M) -> bool {
        match &self.matcher {
            Matcher::Wildcard { matcher, .. } => matcher.is_match(name),
            Matcher::Always => true,
            Matcher::Type(type_name) => types.type_matches(type_name, name),
        }
    }

    /// Candidate unit location for `name` under this rule's root
    pub fn candidate(&self, name: &str) -> PathBuf {
        self.root.join(unit_path(name))
    }
}

/// Ordered autoload rules
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<AutoloadRule>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule; it has lower priority than every rule before it
    pub fn register(&mut self, rule: AutoloadRule) {
        debug!(matcher = %rule.matcher, root = %rule.root.display(), "Registered autoload rule");
        self.rules.push(rule);
    }

    /// Add a static rule after every static rule and ahead of the first
    /// rule contributed by a type
    pub fn insert_static(&mut self, rule: AutoloadRule) {
        let at = self
            .rules
            .iter()
            .position(|r| r.origin != RuleOrigin::Static)
            .unwrap_or(self.rules.len());
        debug!(matcher = %rule.matcher, root = %rule.root.display(), position = at, "Inserted static autoload rule");
        self.rules.insert(at, rule);
    }

    /// First existing candidate unit for `name`, in rule order
    pub fn resolve<M: TypeMatcher + ?Sized>(&self, name: &str, types: &mut M) -> Option<PathBuf> {
        self.find(name, types, |_, path| Some(path.to_path_buf()))
    }

    /// Walk the rules in order and hand every existing candidate to `load`.
    ///
    /// The search stops at the first candidate `load` accepts; a rejected
    /// candidate moves on to the next rule like a missing one does.
    pub fn find<M, T, F>(&self, name: &str, types: &mut M, mut load: F) -> Option<T>
    where
        M: TypeMatcher + ?Sized,
        F: FnMut(&mut M, &Path) -> Option<T>,
    {
        for rule in &self.rules {
            if !rule.matches(name, types) {
                continue;
            }

            let candidate = rule.candidate(name);
            if !candidate.is_file() {
                debug!(type_name = %name, matcher = %rule.matcher, path = %candidate.display(), "Rule matched, no unit");
                continue;
            }

            if let Some(found) = load(types, &candidate) {
                return Some(found);
            }
            debug!(type_name = %name, path = %candidate.display(), "Unit rejected, trying next rule");
        }
        None
    }

    pub fn iter(&self) -> impl Iterator<Item = &AutoloadRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    /// Type matchers answered from a fixed table, recording calls
    #[derive(Default)]
    struct FixedTypes {
        answers: HashMap<String, bool>,
        calls: Vec<(String, String)>,
    }

    impl TypeMatcher for FixedTypes {
        fn type_matches(&mut self, type_name: &str, candidate: &str) -> bool {
            self.calls.push((type_name.to_string(), candidate.to_string()));
            self.answers.get(type_name).copied().unwrap_or(false)
        }
    }

    fn unit(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "[unit]\n").unwrap();
    }

    #[test]
    fn test_structural_match_does_not_stop_search() {
        let dir = TempDir::new().unwrap();
        let x = dir.path().join("x");
        let y = dir.path().join("y");
        fs::create_dir_all(&x).unwrap();
        unit(&y, "UsersController.toml");

        let mut table = RuleTable::new();
        table.register(AutoloadRule::wildcard("*Controller", &x).unwrap());
        table.register(AutoloadRule::wildcard("Users*", &y).unwrap());

        let found = table.resolve("UsersController", &mut FixedTypes::default());
        assert_eq!(found, Some(y.join("UsersController.toml")));
    }

    #[test]
    fn test_first_existing_wins() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        unit(&a, "Widget.toml");
        unit(&b, "Widget.toml");

        let mut table = RuleTable::new();
        table.register(AutoloadRule::always(&a));
        table.register(AutoloadRule::always(&b));

        let found = table.resolve("Widget", &mut FixedTypes::default());
        assert_eq!(found, Some(a.join("Widget.toml")));
    }

    #[test]
    fn test_non_matching_rule_skipped() {
        let dir = TempDir::new().unwrap();
        unit(dir.path(), "Widget.toml");

        let mut table = RuleTable::new();
        table.register(AutoloadRule::wildcard("*Controller", dir.path()).unwrap());

        assert_eq!(table.resolve("Widget", &mut FixedTypes::default()), None);
    }

    #[test]
    fn test_namespaced_candidate() {
        let dir = TempDir::new().unwrap();
        unit(dir.path(), "App/Widget.toml");

        let mut table = RuleTable::new();
        table.register(AutoloadRule::always(dir.path()));

        let found = table.resolve("App::Widget", &mut FixedTypes::default());
        assert_eq!(found, Some(dir.path().join("App/Widget.toml")));
    }

    #[test]
    fn test_type_matcher_consulted() {
        let dir = TempDir::new().unwrap();
        unit(dir.path(), "PluginFoo.toml");

        let mut table = RuleTable::new();
        table.register(AutoloadRule::type_ref("Plugins", dir.path()).unwrap());

        let mut types = FixedTypes::default();
        assert_eq!(table.resolve("PluginFoo", &mut types), None);
        assert_eq!(types.calls, vec![("Plugins".to_string(), "PluginFoo".to_string())]);

        types.answers.insert("Plugins".to_string(), true);
        assert!(table.resolve("PluginFoo", &mut types).is_some());
    }

    #[test]
    fn test_static_rule_inserted_before_contributed() {
        let mut table = RuleTable::new();
        table.register(AutoloadRule::always("lib"));
        table.register(
            AutoloadRule::wildcard("*Helper", "helpers")
                .unwrap()
                .contributed_by("Helpers"),
        );
        table.insert_static(AutoloadRule::wildcard("*Helper", "static").unwrap());
        table.insert_static(AutoloadRule::always("vendor"));

        let origins: Vec<_> = table.iter().map(|r| r.origin.clone()).collect();
        assert_eq!(
            origins,
            vec![
                RuleOrigin::Static,
                RuleOrigin::Static,
                RuleOrigin::Static,
                RuleOrigin::Type("Helpers".to_string()),
            ]
        );
        let roots: Vec<_> = table.iter().map(|r| r.root.clone()).collect();
        assert_eq!(
            roots,
            vec![
                PathBuf::from("lib"),
                PathBuf::from("static"),
                PathBuf::from("vendor"),
                PathBuf::from("helpers"),
            ]
        );
    }

    #[test]
    fn test_insert_static_into_static_only_table_appends() {
        let mut table = RuleTable::new();
        table.insert_static(AutoloadRule::always("a"));
        table.insert_static(AutoloadRule::always("b"));
        let roots: Vec<_> = table.iter().map(|r| r.root.clone()).collect();
        assert_eq!(roots, vec![PathBuf::from("a"), PathBuf::from("b")]);
    }

    #[test]
    fn test_rejected_candidate_continues() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        unit(&a, "Widget.toml");
        unit(&b, "Widget.toml");

        let mut table = RuleTable::new();
        table.register(AutoloadRule::always(&a));
        table.register(AutoloadRule::always(&b));

        let found = table.find("Widget", &mut FixedTypes::default(), |_, path| {
            path.starts_with(&b).then(|| path.to_path_buf())
        });
        assert_eq!(found, Some(b.join("Widget.toml")));
    }

    #[test]
    fn test_invalid_rules() {
        assert!(matches!(
            AutoloadRule::wildcard("[unclosed", "lib"),
            Err(RuleError::InvalidPattern(_))
        ));
        assert!(matches!(
            AutoloadRule::type_ref("not a type", "lib"),
            Err(RuleError::InvalidTypeName(_))
        ));
    }

    #[test]
    fn test_contributed_origin() {
        let rule = AutoloadRule::always("lib").contributed_by("Plugins");
        assert_eq!(rule.origin, RuleOrigin::Type("Plugins".to_string()));
        assert_eq!(rule.matcher.to_string(), "*");
    }
}
