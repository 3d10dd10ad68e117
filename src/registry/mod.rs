//! Type registry
//!
//! Per-name load and initialization state plus the capabilities discovered
//! on each loaded type. Entries are keyed by name; cycles are broken by the
//! marks recorded here, not by recursion depth.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use crate::unit::TypeDef;

/// Lifecycle of one type name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeState {
    /// Never requested, or a failed request was cleared
    Unknown,

    /// Rule search or materialization in progress
    Resolving,

    /// Unit loaded; initialization pending, running, or failed
    Loaded,

    /// Fully usable
    Initialized,
}

/// Capabilities a loaded type may expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Participates in the protocol (the marker, inherited)
    Loadable,

    /// Declares its own init hook
    Init,

    /// Has a match hook (own or inherited)
    Match,

    /// Has a make hook (own or inherited)
    Make,
}

/// Hook slots on a type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookSlot {
    Init,
    Match,
    Make,
}

impl HookSlot {
    pub fn capability(self) -> Capability {
        match self {
            HookSlot::Init => Capability::Init,
            HookSlot::Match => Capability::Match,
            HookSlot::Make => Capability::Make,
        }
    }

    /// Hook name declared directly on `def` for this slot
    pub fn declared_on(self, def: &TypeDef) -> Option<&str> {
        match self {
            HookSlot::Init => def.hooks.init.as_deref(),
            HookSlot::Match => def.hooks.matcher.as_deref(),
            HookSlot::Make => def.hooks.make.as_deref(),
        }
    }
}

/// Registry record for one name
#[derive(Debug, Clone, Serialize)]
pub struct RegistryEntry {
    pub state: TypeState,

    #[serde(skip)]
    pub def: Option<Arc<TypeDef>>,

    pub capabilities: BTreeSet<Capability>,

    /// Set once initialization has been attempted
    #[serde(skip)]
    pub init_started: bool,

    /// Why initialization failed, if it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_failure: Option<String>,
}

impl RegistryEntry {
    fn resolving() -> Self {
        Self {
            state: TypeState::Resolving,
            def: None,
            capabilities: BTreeSet::new(),
            init_started: false,
            init_failure: None,
        }
    }
}

/// All type entries of one resolver
#[derive(Debug, Default)]
pub struct Registry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, name: &str) -> TypeState {
        self.entries
            .get(name)
            .map(|e| e.state)
            .unwrap_or(TypeState::Unknown)
    }

    /// Loaded or initialized
    pub fn is_loaded(&self, name: &str) -> bool {
        matches!(self.state(name), TypeState::Loaded | TypeState::Initialized)
    }

    pub fn is_initialized(&self, name: &str) -> bool {
        self.state(name) == TypeState::Initialized
    }

    pub fn entry(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }

    /// Mark `name` as being resolved. Returns false if it is not unknown.
    pub fn begin(&mut self, name: &str) -> bool {
        if self.entries.contains_key(name) {
            return false;
        }
        self.entries.insert(name.to_string(), RegistryEntry::resolving());
        true
    }

    /// Drop a name whose resolution failed, so a later request may retry
    pub fn abandon(&mut self, name: &str) {
        if self.state(name) == TypeState::Resolving {
            self.entries.remove(name);
        }
    }

    /// Record a loaded type and derive its capabilities.
    ///
    /// The parent, if any, must already be loaded: the marker and the
    /// match/make hooks are inherited from it. The init capability is only
    /// granted for an init hook declared on this type itself.
    pub fn mark_loaded(&mut self, def: TypeDef) -> Arc<TypeDef> {
        let inherited = def
            .extends
            .as_deref()
            .and_then(|parent| self.entries.get(parent))
            .map(|e| e.capabilities.clone())
            .unwrap_or_default();

        let mut capabilities = BTreeSet::new();
        if def.loadable || inherited.contains(&Capability::Loadable) {
            capabilities.insert(Capability::Loadable);
            if def.hooks.init.is_some() {
                capabilities.insert(Capability::Init);
            }
            if def.hooks.matcher.is_some() || inherited.contains(&Capability::Match) {
                capabilities.insert(Capability::Match);
            }
            if def.hooks.make.is_some() || inherited.contains(&Capability::Make) {
                capabilities.insert(Capability::Make);
            }
        }

        let def = Arc::new(def);
        let entry = self
            .entries
            .entry(def.name.clone())
            .or_insert_with(RegistryEntry::resolving);
        entry.state = TypeState::Loaded;
        entry.def = Some(Arc::clone(&def));
        entry.capabilities = capabilities;
        def
    }

    /// Claim the single initialization attempt for `name`.
    ///
    /// Returns false when the type is not loaded or an attempt was already
    /// made.
    pub fn begin_init(&mut self, name: &str) -> bool {
        match self.entries.get_mut(name) {
            Some(entry) if entry.state == TypeState::Loaded && !entry.init_started => {
                entry.init_started = true;
                true
            }
            _ => false,
        }
    }

    pub fn mark_initialized(&mut self, name: &str) {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.init_started = true;
            entry.state = TypeState::Initialized;
        }
    }

    pub fn record_init_failure(&mut self, name: &str, reason: String) {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.init_failure = Some(reason);
        }
    }

    pub fn init_failure(&self, name: &str) -> Option<&str> {
        self.entries.get(name).and_then(|e| e.init_failure.as_deref())
    }

    pub fn def(&self, name: &str) -> Option<Arc<TypeDef>> {
        self.entries.get(name).and_then(|e| e.def.clone())
    }

    pub fn has_capability(&self, name: &str, capability: Capability) -> bool {
        self.entries
            .get(name)
            .map(|e| e.capabilities.contains(&capability))
            .unwrap_or(false)
    }

    /// The type that declares the hook `name` uses for `slot`.
    ///
    /// Init hooks are never inherited, so only `name` itself is checked for
    /// them; match and make hooks are looked up along the parent chain.
    pub fn hook_owner(&self, name: &str, slot: HookSlot) -> Option<Arc<TypeDef>> {
        if !self.has_capability(name, slot.capability()) {
            return None;
        }

        let mut seen = HashSet::new();
        let mut current = self.def(name)?;
        loop {
            if slot.declared_on(&current).is_some() {
                return Some(current);
            }
            if slot == HookSlot::Init || !seen.insert(current.name.clone()) {
                return None;
            }
            let parent = current.extends.as_deref()?;
            current = self.def(parent)?;
        }
    }

    /// Names with their entries, sorted by name
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RegistryEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
