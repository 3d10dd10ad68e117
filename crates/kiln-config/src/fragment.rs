//! Configuration fragments
//!
//! One fragment per file. TOML and JSON files share the JSON value model;
//! the reserved `kind` key tags the fragment and is stripped from its data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// Reserved key declaring a fragment's kind.
pub const KIND_KEY: &str = "kind";

/// Supported fragment file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentFormat {
    Toml,
    Json,
}

impl FragmentFormat {
    /// Detect the format from a file extension, `None` for anything else
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Some(Self::Toml),
            Some("json") => Some(Self::Json),
            _ => None,
        }
    }
}

/// Where a fragment was read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentSource {
    /// Path relative to the configuration root
    pub path: String,

    /// SHA-256 digest of the raw file bytes
    pub digest: String,
}

/// A single named configuration fragment
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// Fragment name (the file stem)
    pub name: String,

    /// Declared kind, if the fragment carries the reserved key
    pub kind: Option<String>,

    /// Option -> value mapping, without the reserved key
    pub values: Map<String, Value>,

    /// Provenance
    pub source: FragmentSource,
}

impl Fragment {
    /// Read a fragment file. `rel_path` is recorded as provenance.
    pub fn from_file(path: &Path, rel_path: &str) -> Result<Self, ConfigError> {
        let format = FragmentFormat::from_path(path).ok_or_else(|| ConfigError::InvalidFragment {
            path: path.to_path_buf(),
            reason: "unsupported file extension".to_string(),
        })?;

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ConfigError::InvalidFragment {
                path: path.to_path_buf(),
                reason: "file name is not valid UTF-8".to_string(),
            })?
            .to_string();

        let bytes = fs::read(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents = String::from_utf8(bytes).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: format!("Invalid UTF-8: {}", e),
        })?;

        let value = match format {
            FragmentFormat::Toml => {
                let toml_value: toml::Value =
                    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
                        path: path.to_path_buf(),
                        reason: format!("TOML parse error: {}", e),
                    })?;
                toml_to_json(toml_value)
            }
            FragmentFormat::Json => serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                reason: format!("JSON parse error: {}", e),
            })?,
        };

        let source = FragmentSource {
            path: rel_path.to_string(),
            digest,
        };
        Self::from_value(name, value, source).map_err(|reason| ConfigError::InvalidFragment {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Build a fragment from an already parsed value
    pub fn from_value(name: String, value: Value, source: FragmentSource) -> Result<Self, String> {
        let Value::Object(mut values) = value else {
            return Err("fragment root must be a table".to_string());
        };

        let kind = match values.remove(KIND_KEY) {
            None => None,
            Some(Value::String(kind)) => Some(kind),
            Some(other) => {
                return Err(format!("'{}' must be a string, got {}", KIND_KEY, other));
            }
        };

        Ok(Self {
            name,
            kind,
            values,
            source,
        })
    }

    /// The fragment's kind, falling back to its own name
    pub fn effective_kind(&self) -> &str {
        self.kind.as_deref().unwrap_or(&self.name)
    }
}

/// Convert TOML Value to JSON Value
pub fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => {
            let map: Map<String, Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            Value::Object(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_toml_fragment_with_kind() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "widget.toml", "kind = \"record\"\ntable = \"widgets\"\n");

        let fragment = Fragment::from_file(&path, "widget.toml").unwrap();
        assert_eq!(fragment.name, "widget");
        assert_eq!(fragment.kind.as_deref(), Some("record"));
        assert_eq!(fragment.effective_kind(), "record");
        assert_eq!(fragment.values.get("table"), Some(&json!("widgets")));
        assert!(!fragment.values.contains_key(KIND_KEY));
        assert_eq!(fragment.source.digest.len(), 64);
    }

    #[test]
    fn test_json_fragment_without_kind() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "routes.json", r#"{"paths": ["/"]}"#);

        let fragment = Fragment::from_file(&path, "routes.json").unwrap();
        assert_eq!(fragment.kind, None);
        assert_eq!(fragment.effective_kind(), "routes");
    }

    #[test]
    fn test_non_table_root_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "list.json", "[1, 2]");

        let err = Fragment::from_file(&path, "list.json").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFragment { .. }));
    }

    #[test]
    fn test_non_string_kind_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.toml", "kind = 3\n");

        let err = Fragment::from_file(&path, "bad.toml").unwrap_err();
        assert!(err.to_string().contains("kind"));
    }

    #[test]
    fn test_parse_error_reported() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "broken.toml", "this is = = not toml");

        let err = Fragment::from_file(&path, "broken.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_toml_to_json_nested() {
        let value: toml::Value = toml::from_str("[db]\nport = 5432\nratio = 0.5\n").unwrap();
        let json = toml_to_json(value);
        assert_eq!(json["db"]["port"], 5432);
        assert_eq!(json["db"]["ratio"], 0.5);
    }
}
