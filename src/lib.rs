//! Kiln - configuration-driven, lazily materializing type loader
//!
//! Types are declared in TOML units found through ordered autoload rules,
//! initialized once with their slice of a layered configuration tree, and,
//! when no unit exists, synthesized from templates by their base types.

pub mod app;
pub mod hooks;
pub mod naming;
pub mod registry;
pub mod resolver;
pub mod rules;
pub mod scaffold;
pub mod unit;

pub use app::{App, BootError, LoaderSettings, RuleSpec};
pub use hooks::{HookError, HookResult, HookSet, InitHook, MakeHook, MatchHook};
pub use kiln_config::{ConfigError, ConfigTree};
pub use registry::{Capability, TypeState};
pub use resolver::{BuildError, ResolveError, Resolver};
pub use rules::{AutoloadRule, Matcher, RuleTable};
pub use scaffold::{ScaffoldError, Scaffolder, Substitutions};
pub use unit::{TypeDef, UnitOrigin};
