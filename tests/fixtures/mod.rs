//! Application fixtures for integration tests
//!
//! Builds a throwaway application tree (configuration, units, templates)
//! inside a temp directory.

#![allow(dead_code)]

use kiln::naming::unit_path;
use kiln::{App, HookSet, Resolver};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// An application directory under construction
pub struct AppFixture {
    dir: TempDir,
}

impl AppFixture {
    /// Empty application with an empty `config/` directory
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        fs::create_dir_all(dir.path().join("config")).expect("create config dir");
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write `config/<rel>`
    pub fn config(&self, rel: &str, contents: &str) -> &Self {
        self.write(&Path::new("config").join(rel), contents)
    }

    /// Write the unit for `name` under the source root `root`
    pub fn unit(&self, root: &str, name: &str, contents: &str) -> &Self {
        self.write(&Path::new(root).join(unit_path(name)), contents)
    }

    /// Write the template of `base` under `templates/`
    pub fn template(&self, base: &str, contents: &str) -> &Self {
        self.write(&Path::new("templates").join(unit_path(base)), contents)
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    pub fn app(&self) -> App {
        App::new(self.root())
    }

    /// Boot with the given hooks, panicking on bootstrap errors
    pub fn boot(&self, hooks: HookSet) -> Resolver {
        self.app().boot(hooks).expect("boot loader")
    }

    fn write(&self, rel: &Path, contents: &str) -> &Self {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(&path, contents).expect("write fixture file");
        self
    }
}

/// Minimal loadable unit with optional parent and hooks
pub fn loadable_unit(name: &str, extends: Option<&str>, hooks: &[(&str, &str)]) -> String {
    let mut out = format!("[unit]\nname = \"{}\"\nloadable = true\n", name);
    if let Some(parent) = extends {
        out.push_str(&format!("extends = \"{}\"\n", parent));
    }
    if !hooks.is_empty() {
        out.push_str("\n[hooks]\n");
        for (slot, hook) in hooks {
            out.push_str(&format!("{} = \"{}\"\n", slot, hook));
        }
    }
    out
}
