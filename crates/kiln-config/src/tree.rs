//! The merged configuration tree
//!
//! Built by scanning a directory tree. Directory names carry no meaning:
//! fragments with the same name anywhere under the root merge into one
//! entry, in traversal order (parent before child, siblings sorted by name,
//! files before subdirectories).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::ConfigError;
use crate::fragment::{Fragment, FragmentFormat, FragmentSource};
use crate::merge::deep_merge;

/// Deep merge of every fragment, indexed by name and by kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigTree {
    /// Fragment name -> merged mapping
    fragments: BTreeMap<String, Value>,

    /// Fragment name -> kind
    fragment_kinds: BTreeMap<String, String>,

    /// Kind -> fragment names (sorted, unique)
    kinds: BTreeMap<String, Vec<String>>,

    /// Contributing files in traversal order
    sources: Vec<FragmentSource>,
}

impl ConfigTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `root` recursively and merge every fragment found.
    ///
    /// A missing or unreadable root is fatal.
    pub fn build(root: &Path) -> Result<Self, ConfigError> {
        let metadata = fs::metadata(root).map_err(|e| ConfigError::RootUnreadable {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !metadata.is_dir() {
            return Err(ConfigError::RootUnreadable {
                path: root.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        let mut tree = Self::new();

        let walker = WalkDir::new(root)
            .follow_links(true)
            .sort_by(traversal_order)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() || FragmentFormat::from_path(entry.path()).is_none() {
                continue;
            }

            let rel_path = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");

            let fragment = Fragment::from_file(entry.path(), &rel_path)?;
            debug!(fragment = %fragment.name, path = %rel_path, "Loaded configuration fragment");
            tree.insert(fragment);
        }

        Ok(tree)
    }

    /// Merge a fragment into the tree.
    ///
    /// An explicit kind overrides the kind recorded for an earlier fragment
    /// of the same name; a fragment without one keeps the recorded kind, or
    /// uses its own name when it is the first of its name.
    pub fn insert(&mut self, fragment: Fragment) {
        let Fragment {
            name,
            kind,
            values,
            source,
        } = fragment;

        let kind = match (kind, self.fragment_kinds.get(&name)) {
            (Some(kind), _) => kind,
            (None, Some(existing)) => existing.clone(),
            (None, None) => name.clone(),
        };

        if let Some(previous) = self.fragment_kinds.insert(name.clone(), kind.clone()) {
            if previous != kind {
                if let Some(names) = self.kinds.get_mut(&previous) {
                    names.retain(|n| n != &name);
                    if names.is_empty() {
                        self.kinds.remove(&previous);
                    }
                }
            }
        }

        let names = self.kinds.entry(kind).or_default();
        if let Err(pos) = names.binary_search(&name) {
            names.insert(pos, name.clone());
        }

        let merged = match self.fragments.remove(&name) {
            Some(existing) => deep_merge(existing, Value::Object(values)),
            None => Value::Object(values),
        };
        self.fragments.insert(name, merged);
        self.sources.push(source);
    }

    /// Look up a value by path.
    ///
    /// The first segment names a fragment and is matched case-insensitively
    /// (an exact match wins). Later segments index into tables by key and
    /// into arrays by position. Any missing segment yields `None`.
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.fragment(first)?;
        for segment in rest {
            current = descend(current, segment)?;
        }
        Some(current)
    }

    /// The requested sub-path of every fragment tagged with `kind`.
    ///
    /// Fragments lacking the sub-path are left out.
    pub fn get_by_kind(&self, kind: &str, subpath: &[&str]) -> BTreeMap<String, &Value> {
        let mut result = BTreeMap::new();
        let Some(names) = self.kinds.get(kind) else {
            return result;
        };

        for name in names {
            let Some(mut current) = self.fragments.get(name) else {
                continue;
            };
            let mut found = true;
            for segment in subpath {
                match descend(current, segment) {
                    Some(next) => current = next,
                    None => {
                        found = false;
                        break;
                    }
                }
            }
            if found {
                result.insert(name.clone(), current);
            }
        }
        result
    }

    /// A whole fragment by (case-insensitive) name
    pub fn fragment(&self, name: &str) -> Option<&Value> {
        if let Some(value) = self.fragments.get(name) {
            return Some(value);
        }
        self.fragments
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// The kind recorded for a fragment
    pub fn kind_of(&self, name: &str) -> Option<&str> {
        self.fragment_kinds.get(name).map(String::as_str)
    }

    /// Fragment names tagged with `kind`
    pub fn names_of_kind(&self, kind: &str) -> &[String] {
        self.kinds.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All fragment names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fragments.keys().map(String::as_str)
    }

    /// All known kinds, sorted
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    /// Contributing files in traversal order
    pub fn sources(&self) -> &[FragmentSource] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

fn descend<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Files before directories, then by file name
fn traversal_order(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}
