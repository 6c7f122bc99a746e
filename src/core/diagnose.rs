//! Diagnostics engine
//!
//! Compares a resolved mapping against the declared fields without
//! building the target type. The result feeds both the human-readable
//! report and the CI gate (`strata check`).

use crate::domain::errors::StrataError;
use crate::domain::result::Result;
use crate::schema::{FieldKind, FieldSpec, Schema};
use crate::secrets::{is_reference, MASK};
use crate::source::ResolvedMapping;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

/// Largest edit distance at which a suggestion is still offered
pub const SUGGESTION_THRESHOLD: usize = 2;

/// Closest candidate to `target` by Levenshtein distance
///
/// Only candidates within [`SUGGESTION_THRESHOLD`] qualify; ties go to the
/// lexicographically smallest candidate. `target` itself is never suggested.
pub fn nearest<'a, I>(target: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .filter(|candidate| *candidate != target)
        .map(|candidate| (strsim::levenshtein(target, candidate), candidate))
        .filter(|(distance, _)| *distance <= SUGGESTION_THRESHOLD)
        .min()
        .map(|(_, candidate)| candidate.to_string())
}

/// Keys from override files that the schema does not declare, sorted
///
/// Process environment variables are never unknown.
pub fn unknown_keys(mapping: &ResolvedMapping, schema: &Schema) -> Vec<String> {
    mapping
        .file_keys()
        .filter(|key| !schema.contains(key))
        .cloned()
        .collect()
}

/// Fails when override files define undeclared keys
///
/// # Errors
///
/// Returns [`StrataError::StrictModeViolation`] listing every unknown key
/// and the declared key each one most likely meant.
pub fn check_strict(mapping: &ResolvedMapping, schema: &Schema) -> Result<()> {
    let unknown = unknown_keys(mapping, schema);
    if unknown.is_empty() {
        return Ok(());
    }
    let suggestions = unknown
        .iter()
        .filter_map(|key| nearest(key, schema.field_names()).map(|s| (key.clone(), s)))
        .collect();
    Err(StrataError::StrictModeViolation {
        unknown,
        suggestions,
    })
}

/// Per-field status of a resolved mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnosis {
    /// Declared fields supplied by a source
    pub present: BTreeSet<String>,

    /// Declared fields absent from every source, filled by the schema default
    pub using_default: BTreeSet<String>,

    /// Required fields absent with no default
    pub missing: BTreeSet<String>,

    /// Optional fields absent with no default
    pub optional_unset: BTreeSet<String>,

    /// Undeclared keys from override files (strict mode only)
    pub unknown: BTreeSet<String>,

    /// Missing or unknown key to the closest known key
    pub suggestions: BTreeMap<String, String>,

    pub strict: bool,
}

impl Diagnosis {
    /// CI gate: nothing missing, and in strict mode nothing unknown
    pub fn passed(&self) -> bool {
        self.missing.is_empty() && (!self.strict || self.unknown.is_empty())
    }
}

/// Classifies every declared field; in strict mode also reports unknown keys
pub fn diagnose(mapping: &ResolvedMapping, schema: &Schema, strict: bool) -> Diagnosis {
    let mut diagnosis = Diagnosis {
        strict,
        ..Diagnosis::default()
    };

    for field in schema.fields() {
        let name = field.name.clone();
        if mapping.contains_key(&field.name) {
            diagnosis.present.insert(name);
        } else if field.has_default() {
            diagnosis.using_default.insert(name);
        } else if field.required {
            diagnosis.missing.insert(name);
        } else {
            diagnosis.optional_unset.insert(name);
        }
    }

    let undeclared = unknown_keys(mapping, schema);
    for key in &diagnosis.missing {
        if let Some(suggestion) = nearest(key, undeclared.iter().map(String::as_str)) {
            diagnosis.suggestions.insert(key.clone(), suggestion);
        }
    }

    if strict {
        for key in undeclared {
            if let Some(suggestion) = nearest(&key, schema.field_names()) {
                diagnosis.suggestions.insert(key.clone(), suggestion);
            }
            diagnosis.unknown.insert(key);
        }
    }

    tracing::debug!(
        present = diagnosis.present.len(),
        defaults = diagnosis.using_default.len(),
        missing = diagnosis.missing.len(),
        unknown = diagnosis.unknown.len(),
        "Diagnosis computed"
    );
    diagnosis
}

/// Value as shown to humans: secret literals masked, references shown
pub fn shown_value<'v>(field: &FieldSpec, value: &'v str) -> &'v str {
    if field.kind == FieldKind::Secret && !is_reference(value) {
        MASK
    } else {
        value
    }
}

fn shown_default(field: &FieldSpec) -> Option<&str> {
    field.default.as_deref().map(|default| shown_value(field, default))
}

fn group_of<'f>(field: &'f FieldSpec, delimiter: &str) -> Option<&'f str> {
    field.name.rfind(delimiter).map(|at| &field.name[..at])
}

/// Human-readable diagnosis report
pub fn render_diagnosis(diagnosis: &Diagnosis, schema: &Schema, delimiter: &str) -> String {
    let mut out = String::from("Configuration Diagnosis:\n\n");
    let mut current_group: Option<&str> = None;

    for field in schema.fields() {
        let group = group_of(field, delimiter);
        if group.is_some() && group != current_group {
            let _ = writeln!(out, "  {} (nested):", group.unwrap_or_default());
        }
        current_group = group;

        let name = &field.name;
        let suggestion = diagnosis
            .suggestions
            .get(name)
            .map(|s| format!(" - did you mean {s}?"))
            .unwrap_or_default();

        if diagnosis.present.contains(name) {
            let _ = writeln!(out, "  ✓ {name} present");
        } else if diagnosis.using_default.contains(name) {
            let _ = writeln!(
                out,
                "  ✓ {name} using default ({})",
                shown_default(field).unwrap_or_default()
            );
        } else if diagnosis.missing.contains(name) {
            let _ = writeln!(out, "  ✗ {name} missing (required){suggestion}");
        } else {
            let _ = writeln!(out, "  ⚠ {name} not set (optional)");
        }
    }

    for key in &diagnosis.unknown {
        let suggestion = diagnosis
            .suggestions
            .get(key)
            .map(|s| format!(" - did you mean {s}?"))
            .unwrap_or_default();
        let _ = writeln!(out, "  ✗ {key} is not a declared variable{suggestion}");
    }

    out.push('\n');
    if diagnosis.passed() {
        out.push_str("All required variables are present\n");
    } else if !diagnosis.missing.is_empty() {
        out.push_str("Some required variables are missing\n");
    } else {
        out.push_str("Unknown variables present in strict mode\n");
    }
    out
}

/// Which source supplied each declared field, secrets masked
pub fn render_sources(mapping: &ResolvedMapping, schema: &Schema) -> String {
    let mut out = String::from("Configuration Sources:\n\n");
    for field in schema.fields() {
        let (value, source) = match mapping.get(&field.name) {
            Some(resolved) => (
                shown_value(field, &resolved.value),
                resolved.source_id.as_str(),
            ),
            None => match shown_default(field) {
                Some(default) => (default, "default value"),
                None => ("", "unset"),
            },
        };
        let _ = writeln!(out, "  {} = {value}", field.name);
        let _ = writeln!(out, "    └─ loaded from {source}");
    }
    out
}

/// Describes one declared field, with its current source when a mapping is given
///
/// # Errors
///
/// Returns [`StrataError::Configuration`] for an undeclared name, suggesting
/// the closest declared one.
pub fn explain(schema: &Schema, name: &str, mapping: Option<&ResolvedMapping>) -> Result<String> {
    let Some(field) = schema.get(name) else {
        let upper = name.to_uppercase();
        let hint = nearest(&upper, schema.field_names())
            .map(|s| format!(" - did you mean {s}?"))
            .unwrap_or_default();
        return Err(StrataError::Configuration(format!(
            "Variable '{name}' not found in {}{hint}",
            schema.name
        )));
    };

    let mut out = format!("{}\n\n", field.name);
    if let Some(description) = &field.description {
        let _ = writeln!(out, "  Description: {description}");
    }
    let _ = writeln!(out, "  Type: {}", field.kind);
    let _ = writeln!(
        out,
        "  Required: {}",
        if field.required { "Yes" } else { "No" }
    );
    if let Some(default) = shown_default(field) {
        let _ = writeln!(out, "  Default: {default}");
    }
    if let Some(mapping) = mapping {
        let source = mapping.source_of(&field.name).unwrap_or(if field.has_default() {
            "default value"
        } else {
            "unset"
        });
        let _ = writeln!(out, "  Source: {source}");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{merge, RawEntry, ENVIRONMENT_SOURCE};
    use test_case::test_case;

    fn schema() -> Schema {
        Schema::new("App")
            .field(
                FieldSpec::new("DATABASE_URL", FieldKind::String)
                    .required()
                    .describe("PostgreSQL connection string"),
            )
            .field(FieldSpec::new("DEBUG", FieldKind::Boolean).default_value("false"))
            .field(FieldSpec::new("REDIS_HOST", FieldKind::String))
            .field(FieldSpec::new("API_KEY", FieldKind::Secret).default_value("s3cret"))
            .field(FieldSpec::new("DATABASE__PORT", FieldKind::Integer).default_value("5432"))
    }

    fn mapping(pairs: &[(&str, &str)]) -> ResolvedMapping {
        merge(vec![pairs
            .iter()
            .map(|(k, v)| RawEntry::new(k, *v, ".env"))
            .collect()])
    }

    #[test_case("DATABASE_URL", &["DATABSE_URL", "OTHER"], Some("DATABSE_URL") ; "one deletion")]
    #[test_case("PORT", &["PORTS", "PORX"], Some("PORTS") ; "tie picks smallest")]
    #[test_case("HOST", &["COMPLETELY_DIFFERENT"], None ; "too far")]
    #[test_case("HOST", &["HOST"], None ; "never itself")]
    fn test_nearest(target: &str, candidates: &[&str], expected: Option<&str>) {
        assert_eq!(
            nearest(target, candidates.iter().copied()).as_deref(),
            expected
        );
    }

    #[test]
    fn test_diagnose_classifies_fields() {
        let m = mapping(&[("DEBUG", "true"), ("DATABSE_URL", "postgres://x")]);
        let d = diagnose(&m, &schema(), false);

        assert!(d.present.contains("DEBUG"));
        assert!(d.using_default.contains("API_KEY"));
        assert!(d.using_default.contains("DATABASE__PORT"));
        assert!(d.missing.contains("DATABASE_URL"));
        assert!(d.optional_unset.contains("REDIS_HOST"));
        assert!(d.unknown.is_empty());
        assert_eq!(
            d.suggestions.get("DATABASE_URL").map(String::as_str),
            Some("DATABSE_URL")
        );
        assert!(!d.passed());
    }

    #[test]
    fn test_strict_reports_unknown_with_suggestion() {
        let m = mapping(&[("DATABASE_URL", "x"), ("DEBUGG", "1")]);
        let d = diagnose(&m, &schema(), true);
        assert!(d.unknown.contains("DEBUGG"));
        assert_eq!(d.suggestions.get("DEBUGG").map(String::as_str), Some("DEBUG"));
        assert!(!d.passed());

        let lenient = diagnose(&m, &schema(), false);
        assert!(lenient.unknown.is_empty());
        assert!(lenient.passed());
    }

    #[test]
    fn test_environment_keys_never_unknown() {
        let m = merge(vec![vec![
            RawEntry::new("DATABASE_URL", "x", ".env"),
            RawEntry::new("PATH", "/usr/bin", ENVIRONMENT_SOURCE),
        ]]);
        assert!(unknown_keys(&m, &schema()).is_empty());
        assert!(check_strict(&m, &schema()).is_ok());
    }

    #[test]
    fn test_check_strict_error() {
        let m = mapping(&[("FOO_BAR", "1")]);
        match check_strict(&m, &schema()) {
            Err(StrataError::StrictModeViolation { unknown, .. }) => {
                assert_eq!(unknown, vec!["FOO_BAR".to_string()]);
            }
            other => panic!("expected strict violation, got {other:?}"),
        }
    }

    #[test]
    fn test_render_diagnosis() {
        let m = mapping(&[("DATABSE_URL", "x")]);
        let d = diagnose(&m, &schema(), false);
        let text = render_diagnosis(&d, &schema(), "__");

        assert!(text.contains("✗ DATABASE_URL missing (required) - did you mean DATABSE_URL?"));
        assert!(text.contains("✓ DEBUG using default (false)"));
        assert!(text.contains("✓ API_KEY using default (***)"));
        assert!(text.contains("⚠ REDIS_HOST not set (optional)"));
        assert!(text.contains("  DATABASE (nested):\n  ✓ DATABASE__PORT using default (5432)"));
        assert!(text.ends_with("Some required variables are missing\n"));
    }

    #[test]
    fn test_render_sources_masks_secrets() {
        let m = mapping(&[("DATABASE_URL", "postgres://x"), ("API_KEY", "topsecret")]);
        let text = render_sources(&m, &schema());
        assert!(text.contains("  DATABASE_URL = postgres://x\n    └─ loaded from .env"));
        assert!(text.contains("  API_KEY = ***"));
        assert!(!text.contains("topsecret"));
        assert!(text.contains("  DEBUG = false\n    └─ loaded from default value"));
    }

    #[test]
    fn test_render_sources_shows_secret_references() {
        let m = mapping(&[("API_KEY", "secretref:vault:app/api?field=key")]);
        let text = render_sources(&m, &schema());
        assert!(text.contains("  API_KEY = secretref:vault:app/api?field=key\n"));
    }

    #[test]
    fn test_explain() {
        let text = explain(&schema(), "database_url", None).unwrap();
        assert!(text.starts_with("DATABASE_URL\n"));
        assert!(text.contains("Description: PostgreSQL connection string"));
        assert!(text.contains("Type: str"));
        assert!(text.contains("Required: Yes"));

        let err = explain(&schema(), "DEBUGG", None).unwrap_err();
        assert!(err.to_string().contains("did you mean DEBUG?"));
    }
}
