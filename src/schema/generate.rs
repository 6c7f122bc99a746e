//! Example file and Markdown documentation generation
//!
//! Both artifacts are pure projections of the schema: one entry per declared
//! field, in declaration order, with a header emitted the first time a
//! nesting group appears. No engine state is read.

use super::{FieldKind, FieldSpec, Schema};
use crate::core::keymap::{split_key, unflatten};
use crate::domain::errors::StrataError;
use crate::domain::result::Result;
use crate::secrets::is_reference;
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;
use std::path::Path;

/// Default written for a field in generated artifacts
///
/// Literal secret defaults are left blank; references are shown as written.
fn display_default(field: &FieldSpec) -> Option<&str> {
    let default = field.default.as_deref()?;
    if field.kind == FieldKind::Secret && !is_reference(default) {
        return None;
    }
    Some(default)
}

/// Group paths (as flat prefixes) that appear before `field` for the first time
fn new_groups(
    field: &FieldSpec,
    delimiter: &str,
    seen: &mut HashSet<String>,
) -> Result<Vec<(usize, String)>> {
    let segments = split_key(&field.name, delimiter)?;
    let mut opened = Vec::new();
    for depth in 1..segments.len() {
        let prefix = segments[..depth].join(delimiter);
        if seen.insert(prefix.clone()) {
            opened.push((depth, prefix));
        }
    }
    Ok(opened)
}

/// Rejects schemas whose field names cannot form a tree
fn check_shape(schema: &Schema, delimiter: &str) -> Result<()> {
    let names: BTreeMap<String, String> = schema
        .field_names()
        .map(|n| (n.to_string(), String::new()))
        .collect();
    unflatten(&names, delimiter).map(|_| ())
}

/// Renders an `.env.example` template
///
/// # Errors
///
/// Returns [`StrataError::KeyMapping`] when declared names collide after nesting.
pub fn render_example(schema: &Schema, delimiter: &str) -> Result<String> {
    check_shape(schema, delimiter)?;

    let mut out = String::from("# Environment Configuration Template\n\n");
    let mut seen = HashSet::new();

    for field in schema.fields() {
        for (_, group) in new_groups(field, delimiter, &mut seen)? {
            let _ = writeln!(out, "# {group} (nested)");
            if let Some(description) = schema.group_description(&group) {
                let _ = writeln!(out, "# {description}");
            }
            out.push('\n');
        }

        if let Some(description) = &field.description {
            let _ = writeln!(out, "# {description}");
        }
        let _ = writeln!(out, "# Type: {}", field.kind);
        let _ = writeln!(
            out,
            "{}={}",
            field.name,
            display_default(field).unwrap_or_default()
        );
        out.push('\n');
    }

    Ok(out)
}

/// Renders Markdown documentation, one section per field
///
/// Top-level fields are `##` sections; each nesting level adds one `#`.
///
/// # Errors
///
/// Returns [`StrataError::KeyMapping`] when declared names collide after nesting.
pub fn render_docs(schema: &Schema, delimiter: &str) -> Result<String> {
    check_shape(schema, delimiter)?;

    let mut out = String::from("# Configuration Documentation\n\n");
    out.push_str("This document describes all available configuration options.\n\n");
    let mut seen = HashSet::new();

    for field in schema.fields() {
        for (depth, group) in new_groups(field, delimiter, &mut seen)? {
            let _ = writeln!(out, "{} {group}\n", "#".repeat(depth + 1));
            if let Some(description) = schema.group_description(&group) {
                let _ = writeln!(out, "{description}\n");
            }
        }

        let depth = split_key(&field.name, delimiter)?.len();
        let _ = writeln!(out, "{} {}\n", "#".repeat(depth + 1), field.name);
        if let Some(description) = &field.description {
            let _ = writeln!(out, "{description}\n");
        }
        let _ = writeln!(out, "- **Type:** `{}`", field.kind);
        let _ = writeln!(
            out,
            "- **Required:** {}",
            if field.required { "Yes" } else { "No" }
        );
        if let Some(default) = display_default(field) {
            let _ = writeln!(out, "- **Default:** `{default}`");
        }
        out.push_str("\n**Example:**\n```bash\n");
        let _ = writeln!(
            out,
            "{}={}",
            field.name,
            display_default(field).unwrap_or("<value>")
        );
        out.push_str("```\n\n");
    }

    Ok(out)
}

fn write_artifact(path: &Path, contents: &str, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(StrataError::Io(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    std::fs::write(path, contents)?;
    tracing::info!(path = %path.display(), "Generated file");
    Ok(())
}

/// Writes the example template to `path`
///
/// # Errors
///
/// Refuses to overwrite an existing file unless `force` is set.
pub fn generate_example(schema: &Schema, path: &Path, delimiter: &str, force: bool) -> Result<()> {
    write_artifact(path, &render_example(schema, delimiter)?, force)
}

/// Writes the Markdown documentation to `path`
///
/// # Errors
///
/// Refuses to overwrite an existing file unless `force` is set.
pub fn generate_docs(schema: &Schema, path: &Path, delimiter: &str, force: bool) -> Result<()> {
    write_artifact(path, &render_docs(schema, delimiter)?, force)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::SecretReference;
    use tempfile::TempDir;

    fn schema() -> Schema {
        Schema::new("App")
            .field(
                FieldSpec::new("DATABASE_URL", FieldKind::String)
                    .required()
                    .describe("PostgreSQL connection string"),
            )
            .field(FieldSpec::new("DEBUG", FieldKind::Boolean).default_value("false"))
            .group("CACHE", "Cache settings")
            .field(FieldSpec::new("CACHE__HOST", FieldKind::String).default_value("localhost"))
            .field(FieldSpec::new("CACHE__TTL", FieldKind::Integer))
            .field(FieldSpec::secret(
                "API_KEY",
                SecretReference::new("vault-prod", "app/api"),
            ))
            .field(FieldSpec::new("TOKEN", FieldKind::Secret).default_value("literal"))
    }

    #[test]
    fn test_render_example() {
        let example = render_example(&schema(), "__").unwrap();
        let expected = "\
# Environment Configuration Template

# PostgreSQL connection string
# Type: str
DATABASE_URL=

# Type: bool
DEBUG=false

# CACHE (nested)
# Cache settings

# Type: str
CACHE__HOST=localhost

# Type: int
CACHE__TTL=

# Type: Secret
API_KEY=secretref:vault-prod:app/api

# Type: Secret
TOKEN=

";
        assert_eq!(example, expected);
    }

    #[test]
    fn test_render_docs_levels() {
        let docs = render_docs(&schema(), "__").unwrap();
        assert!(docs.starts_with("# Configuration Documentation\n"));
        assert!(docs.contains("## DATABASE_URL\n\nPostgreSQL connection string\n"));
        assert!(docs.contains("- **Required:** Yes"));
        assert!(docs.contains("## CACHE\n\nCache settings\n"));
        assert!(docs.contains("### CACHE__HOST\n"));
        assert!(docs.contains("- **Default:** `localhost`"));
        assert!(docs.contains("DATABASE_URL=<value>"));
        assert!(!docs.contains("literal"));
    }

    #[test]
    fn test_colliding_names_rejected() {
        let bad = Schema::new("Bad")
            .field(FieldSpec::new("DB", FieldKind::String))
            .field(FieldSpec::new("DB__HOST", FieldKind::String));
        assert!(matches!(
            render_example(&bad, "__"),
            Err(StrataError::KeyMapping(_))
        ));
    }

    #[test]
    fn test_generate_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env.example");

        generate_example(&schema(), &path, "__", false).unwrap();
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .contains("DATABASE_URL="));

        assert!(generate_example(&schema(), &path, "__", false).is_err());
        generate_example(&schema(), &path, "__", true).unwrap();
    }

    #[test]
    fn test_generate_docs_writes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("CONFIG.md");
        generate_docs(&schema(), &path, "__", false).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("### CACHE__TTL"));
    }
}
