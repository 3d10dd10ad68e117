//! Configuration Store Tests
//!
//! Whole-directory builds: merge behavior across fragments, kind grouping
//! and snapshot reuse.

use kiln_config::{load_or_build, load_snapshot, write_snapshot, ConfigError, ConfigTree};
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn layered_config() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "app.toml", "name = \"shop\"\nplugins = [\"auth\", \"search\"]\n\n[db]\nhost = \"localhost\"\npool = 5\n");
    write(root, "local/app.json", r#"{"plugins": ["search", "billing"], "db": {"pool": 20}}"#);
    write(root, "models/order.toml", "kind = \"model\"\ntable = \"orders\"\n");
    write(root, "models/widget.toml", "kind = \"model\"\ntable = \"widgets\"\n\n[columns]\nid = \"integer\"\n");
    write(root, "README.md", "not configuration\n");
    dir
}

#[test]
fn test_build_twice_yields_equal_trees() {
    let dir = layered_config();
    let first = ConfigTree::build(dir.path()).unwrap();
    let second = ConfigTree::build(dir.path()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_same_name_fragments_merge_additively() {
    let dir = layered_config();
    let tree = ConfigTree::build(dir.path()).unwrap();

    assert_eq!(
        tree.get(&["app", "plugins"]),
        Some(&json!(["auth", "search", "billing"]))
    );
    assert_eq!(tree.get(&["app", "db", "pool"]), Some(&json!(20)));
    assert_eq!(tree.get(&["app", "db", "host"]), Some(&json!("localhost")));
    assert_eq!(tree.get(&["APP", "name"]), Some(&json!("shop")));
}

#[test]
fn test_non_fragment_files_ignored() {
    let dir = layered_config();
    let tree = ConfigTree::build(dir.path()).unwrap();
    assert!(tree.fragment("README").is_none());
    assert_eq!(tree.len(), 3);
    assert_eq!(tree.sources().len(), 4);
}

#[test]
fn test_kind_lookup_across_fragments() {
    let dir = layered_config();
    let tree = ConfigTree::build(dir.path()).unwrap();

    let tables = tree.get_by_kind("model", &["table"]);
    assert_eq!(tables.len(), 2);
    assert_eq!(tables["order"], &json!("orders"));
    assert_eq!(tables["widget"], &json!("widgets"));

    let columns = tree.get_by_kind("model", &["columns", "id"]);
    assert_eq!(columns.len(), 1);
    assert!(tree.get_by_kind("view", &[]).is_empty());
    assert!(tree.get(&["widget", "kind"]).is_none());
}

#[test]
fn test_invalid_fragment_is_fatal() {
    let dir = layered_config();
    write(dir.path(), "broken.toml", "this is = = not toml\n");
    assert!(matches!(
        ConfigTree::build(dir.path()),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn test_snapshot_reused_until_tampered() {
    let dir = layered_config();
    let snapshot_dir = TempDir::new().unwrap();
    let snapshot = snapshot_dir.path().join("cache/config.json");

    let tree = ConfigTree::build(dir.path()).unwrap();
    write_snapshot(&tree, &snapshot).unwrap();
    assert_eq!(load_snapshot(&snapshot), Some(tree.clone()));

    // Snapshot wins over the directory while it is intact
    write(dir.path(), "extra.toml", "enabled = true\n");
    let restored = load_or_build(dir.path(), Some(&snapshot)).unwrap();
    assert!(restored.fragment("extra").is_none());

    let text = fs::read_to_string(&snapshot).unwrap();
    fs::write(&snapshot, text.replace("widgets", "gadgets")).unwrap();
    assert!(load_snapshot(&snapshot).is_none());

    let rebuilt = load_or_build(dir.path(), Some(&snapshot)).unwrap();
    assert!(rebuilt.fragment("extra").is_some());
}
