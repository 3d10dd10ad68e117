//! `{{ placeholder }}` rendering
//!
//! Pure textual substitution: no expressions, no escaping, no conditionals.

use std::collections::{BTreeMap, BTreeSet};

use super::ScaffoldError;
use crate::naming::is_identifier;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

enum Segment<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

/// Split `source` into literal text and trimmed placeholder names
fn segments(source: &str) -> Result<Vec<Segment<'_>>, ScaffoldError> {
    let mut segments = Vec::new();
    let mut rest = source;
    while let Some(start) = rest.find(OPEN) {
        segments.push(Segment::Text(&rest[..start]));
        let after = &rest[start + OPEN.len()..];
        let Some(end) = after.find(CLOSE) else {
            return Err(ScaffoldError::Unterminated {
                offset: source.len() - rest.len() + start,
            });
        };
        let name = after[..end].trim();
        if !is_identifier(name) {
            return Err(ScaffoldError::InvalidPlaceholder(name.to_string()));
        }
        segments.push(Segment::Placeholder(name));
        rest = &after[end + CLOSE.len()..];
    }
    segments.push(Segment::Text(rest));
    Ok(segments)
}

/// Names referenced by placeholders in `source`
pub fn placeholders(source: &str) -> Result<BTreeSet<String>, ScaffoldError> {
    Ok(segments(source)?
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.to_string()),
            Segment::Text(_) => None,
        })
        .collect())
}

/// Substitute every placeholder with its binding
pub fn render(source: &str, bindings: &BTreeMap<String, String>) -> Result<String, ScaffoldError> {
    let mut out = String::with_capacity(source.len());
    for segment in segments(source)? {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Placeholder(name) => {
                let value = bindings
                    .get(name)
                    .ok_or_else(|| ScaffoldError::Unbound(name.to_string()))?;
                out.push_str(value);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_substitutes() {
        let out = render(
            "name = \"{{class}}\"\ntable = \"{{ table }}\"\n",
            &bindings(&[("class", "Widget"), ("table", "widgets")]),
        )
        .unwrap();
        assert_eq!(out, "name = \"Widget\"\ntable = \"widgets\"\n");
    }

    #[test]
    fn test_render_without_placeholders() {
        let out = render("plain text", &BTreeMap::new()).unwrap();
        assert_eq!(out, "plain text");
    }

    #[test]
    fn test_unbound_placeholder() {
        let err = render("{{missing}}", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, ScaffoldError::Unbound(name) if name == "missing"));
    }

    #[test]
    fn test_unterminated_placeholder() {
        let err = render("ok {{class", &bindings(&[("class", "A")])).unwrap_err();
        assert!(matches!(err, ScaffoldError::Unterminated { offset: 3 }));
    }

    #[test]
    fn test_expression_placeholder_rejected() {
        let err = placeholders("{{ class.upper() }}").unwrap_err();
        assert!(matches!(err, ScaffoldError::InvalidPlaceholder(_)));
    }

    #[test]
    fn test_placeholders_collected() {
        let names = placeholders("{{a}} {{ b }} {{a}}").unwrap();
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
