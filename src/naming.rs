//! Type naming rules
//!
//! Type names are `::`-joined identifier segments. The same names double as
//! unit paths (one directory per namespace segment) and, snake-cased, as
//! configuration keys.

use heck::ToSnakeCase;
use regex_lite::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;

/// File extension of unit and template files
pub const UNIT_EXTENSION: &str = "toml";

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"))
}

fn type_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(::[A-Za-z_][A-Za-z0-9_]*)*$").expect("type name pattern")
    })
}

/// A single identifier segment (`class`, `table_name`)
pub fn is_identifier(s: &str) -> bool {
    identifier_re().is_match(s)
}

/// A possibly namespaced type name (`Widget`, `App::Widget`)
pub fn is_type_name(s: &str) -> bool {
    type_name_re().is_match(s)
}

/// Spelling of a type name with `\` namespace separators replaced by `::`:
/// `App\Widget` -> `App::Widget`
pub fn canonical_name(name: &str) -> String {
    name.replace('\\', "::")
}

/// Configuration key for a type: `ActiveRecord` -> `active_record`,
/// `App::Widget` -> `app_widget`
pub fn underscored(name: &str) -> String {
    name.to_snake_case()
}

/// Relative unit path for a type name, namespace separators becoming
/// directories: `App::Widget` -> `App/Widget.toml`
pub fn unit_path(name: &str) -> PathBuf {
    let mut path: PathBuf = canonical_name(name)
        .split("::")
        .filter(|part| !part.is_empty())
        .collect();
    path.set_extension(UNIT_EXTENSION);
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_identifiers() {
        assert!(is_identifier("class"));
        assert!(is_identifier("_private9"));
        assert!(!is_identifier("9lives"));
        assert!(!is_identifier("DROP TABLE;"));
        assert!(!is_identifier("a::b"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_type_names() {
        assert!(is_type_name("Widget"));
        assert!(is_type_name("App::Models::Widget"));
        assert!(!is_type_name("App::"));
        assert!(!is_type_name("::Widget"));
        assert!(!is_type_name("../etc/passwd"));
        assert!(!is_type_name("DROP TABLE;"));
    }

    #[test]
    fn test_underscored() {
        assert_eq!(underscored("ActiveRecord"), "active_record");
        assert_eq!(underscored("Widget"), "widget");
        assert_eq!(underscored("App::Widget"), "app_widget");
        assert_eq!(underscored("UsersController"), "users_controller");
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name("App\\Models\\Widget"), "App::Models::Widget");
        assert_eq!(canonical_name("App::Widget"), "App::Widget");
        assert!(is_type_name(&canonical_name("App\\Widget")));
        assert!(!is_type_name("App\\Widget"));
    }

    #[test]
    fn test_unit_path() {
        assert_eq!(unit_path("Widget"), Path::new("Widget.toml"));
        assert_eq!(unit_path("App::Widget"), Path::new("App/Widget.toml"));
        assert_eq!(unit_path("App\\Widget"), Path::new("App/Widget.toml"));
    }
}
