//! Built-in hooks

use serde_json::Value;
use tracing::{debug, warn};

use super::{HookError, HookResult, InitHook, MakeHook, MatchHook};
use crate::naming::{is_identifier, is_type_name, underscored};
use crate::resolver::Resolver;
use crate::scaffold::Substitutions;
use crate::unit::TypeDef;

/// Resolves every type listed under `requires` in the slice.
///
/// A dependency that cannot be resolved is logged and skipped; the type
/// itself still initializes.
#[derive(Debug, Clone, Copy)]
pub struct RequireHook;

impl InitHook for RequireHook {
    fn init(&self, resolver: &mut Resolver, slice: Option<&Value>, declared: &str) -> HookResult {
        let requires: Vec<String> = slice
            .and_then(|s| s.get("requires"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        for dependency in &requires {
            if let Err(e) = resolver.resolve(dependency) {
                warn!(
                    type_name = %declared,
                    dependency = %dependency,
                    error = %e,
                    "Dependency could not be satisfied"
                );
            }
        }
        Ok(true)
    }
}

/// Fails unless the type has a configuration slice
#[derive(Debug, Clone, Copy)]
pub struct ConfiguredHook;

impl InitHook for ConfiguredHook {
    fn init(&self, _resolver: &mut Resolver, slice: Option<&Value>, declared: &str) -> HookResult {
        match slice {
            Some(_) => Ok(true),
            None => Err(HookError::Failed(format!(
                "no configuration for '{}' (expected key '{}')",
                declared,
                underscored(declared)
            ))),
        }
    }
}

/// Matches names by the owner's `match_prefix` / `match_suffix` attributes
#[derive(Debug, Clone, Copy)]
pub struct PrefixMatch;

impl MatchHook for PrefixMatch {
    fn matches(&self, _resolver: &mut Resolver, owner: &TypeDef, candidate: &str) -> HookResult {
        let Some(prefix) = owner.attribute_str("match_prefix") else {
            return Ok(false);
        };
        let suffix = owner.attribute_str("match_suffix").unwrap_or("");
        Ok(candidate != owner.name && candidate.starts_with(prefix) && candidate.ends_with(suffix))
    }
}

/// Renders the owner's template for the missing type.
///
/// Reads `attributes.make` on the owner:
/// - `suffix`: only names ending with it are made; the rest is the stem
/// - `kind`: a configuration fragment of this kind named after the
///   underscored stem must exist; its identifier-safe string values become
///   substitutions
///
/// `class` (the target) and `name` (the underscored stem) are bound too.
/// Only variables the template declares are passed on.
#[derive(Debug, Clone, Copy)]
pub struct TemplateMake;

impl MakeHook for TemplateMake {
    fn make(&self, resolver: &mut Resolver, owner: &TypeDef, target: &str) -> HookResult {
        let settings = owner.attribute("make");
        let setting = |key: &str| settings.and_then(|s| s.get(key)).and_then(Value::as_str);

        let suffix = setting("suffix").unwrap_or("");
        let Some(stem) = target.strip_suffix(suffix) else {
            return Ok(false);
        };
        if stem.is_empty() || stem.ends_with(':') {
            return Ok(false);
        }
        let name = underscored(stem);

        let declared = resolver.scaffolder_mut().variables(&owner.name)?;

        let mut candidates = Substitutions::new();
        if let Some(kind) = setting("kind") {
            let fragments = resolver.config().get_by_kind(kind, &[]);
            let Some(fragment) = fragments.get(&name) else {
                debug!(type_name = %target, kind, fragment = %name, "No configuration to make type from");
                return Ok(false);
            };
            if let Some(map) = fragment.as_object() {
                for (key, value) in map {
                    if let Some(value) = value.as_str() {
                        if is_identifier(key) && is_type_name(value) {
                            candidates.insert(key.clone(), value.to_string());
                        }
                    }
                }
            }
        }
        candidates.insert("class".to_string(), target.to_string());
        candidates.insert("name".to_string(), name);

        let vars: Substitutions = candidates
            .into_iter()
            .filter(|(key, _)| declared.contains(key))
            .collect();

        resolver.build(target, &owner.name, &vars)?;
        Ok(true)
    }
}
