//! Flat mapping to typed value
//!
//! Validation runs in two steps. [`check_fields`] inspects every declared
//! field against its kind and collects *all* failures, each enriched with
//! provenance and a typo suggestion. Only when that passes is the ConfigTree
//! handed to the `config` crate, which coerces the string leaves and
//! deserializes the target type.

use super::{FieldKind, FieldSpec, Schema};
use crate::core::diagnose::nearest;
use crate::core::keymap::{unflatten, ConfigTree};
use crate::domain::errors::{FieldError, StrataError};
use crate::domain::result::Result;
use crate::secrets::{is_reference, SecretReference};
use crate::source::ResolvedMapping;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// Provenance recorded for a value supplied by a schema default
pub const DEFAULT_SOURCE: &str = "default";

/// Values of the declared fields: mapping value if present, else default
///
/// Undeclared mapping keys never reach the schema.
pub fn field_values(mapping: &ResolvedMapping, schema: &Schema) -> BTreeMap<String, String> {
    schema
        .fields()
        .iter()
        .filter_map(|field| {
            mapping
                .value(&field.name)
                .map(str::to_string)
                .or_else(|| field.default.clone())
                .map(|value| (field.name.clone(), value))
        })
        .collect()
}

/// Accepted spellings for boolean fields
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn check_kind(field: &FieldSpec, raw: &str) -> std::result::Result<(), String> {
    match field.kind {
        FieldKind::String => Ok(()),
        FieldKind::Integer => raw
            .trim()
            .parse::<i64>()
            .map(|_| ())
            .map_err(|_| format!("expected an integer, got '{raw}'")),
        FieldKind::Float => raw
            .trim()
            .parse::<f64>()
            .map(|_| ())
            .map_err(|_| format!("expected a number, got '{raw}'")),
        FieldKind::Boolean => parse_bool(raw)
            .map(|_| ())
            .ok_or_else(|| format!("expected a boolean, got '{raw}'")),
        FieldKind::Secret if is_reference(raw) => raw
            .parse::<SecretReference>()
            .map(|_| ())
            .map_err(|e| e.to_string()),
        FieldKind::Secret => Ok(()),
    }
}

/// Checks every declared field and returns all failures
///
/// A missing required field is suggested the closest undeclared key found in
/// an override file, so `DATABSE_URL` in `.env` points at `DATABASE_URL`.
/// Failures on supplied values carry the source that supplied them. Secret
/// values never appear in messages.
pub fn check_fields(mapping: &ResolvedMapping, schema: &Schema) -> Vec<FieldError> {
    let undeclared: Vec<&str> = mapping
        .file_keys()
        .map(String::as_str)
        .filter(|key| !schema.contains(key))
        .collect();

    let mut errors = Vec::new();
    for field in schema.fields() {
        let supplied = mapping.get(&field.name);
        let raw = supplied
            .map(|v| v.value.as_str())
            .or(field.default.as_deref());

        let Some(raw) = raw else {
            if field.required {
                let mut error = FieldError::new(&field.name, "field required");
                if let Some(suggestion) = nearest(&field.name, undeclared.iter().copied()) {
                    error = error.with_suggestion(suggestion);
                }
                errors.push(error);
            }
            continue;
        };

        if let Err(message) = check_kind(field, raw) {
            let message = if field.kind == FieldKind::Secret {
                "invalid secret reference".to_string()
            } else {
                message
            };
            let source = supplied
                .map(|v| v.source_id.as_str())
                .unwrap_or(DEFAULT_SOURCE);
            errors.push(FieldError::new(&field.name, message).with_source(source));
        }
    }
    errors
}

/// Validates `mapping` against `schema` and builds the target type
///
/// # Errors
///
/// - [`StrataError::SchemaValidation`] with every field failure found
/// - [`StrataError::KeyMapping`] when declared keys collide after nesting
pub fn validate<T: DeserializeOwned>(
    mapping: &ResolvedMapping,
    schema: &Schema,
    delimiter: &str,
) -> Result<T> {
    let errors = check_fields(mapping, schema);
    if !errors.is_empty() {
        return Err(StrataError::SchemaValidation { errors });
    }

    let tree = unflatten(&field_values(mapping, schema), delimiter)?;
    deserialize_tree(&tree, mapping, schema, delimiter)
}

/// Deserializes a ConfigTree through the `config` crate
///
/// Keys are lowercased on the way in, so `DATABASE -> PORT` fills
/// `database.port`.
pub fn deserialize_tree<T: DeserializeOwned>(
    tree: &ConfigTree,
    mapping: &ResolvedMapping,
    schema: &Schema,
    delimiter: &str,
) -> Result<T> {
    let mut leaves: Vec<(String, String)> = Vec::new();
    tree.for_each_leaf(|path, value| {
        let dotted = path
            .iter()
            .map(|segment| segment.to_lowercase())
            .collect::<Vec<_>>()
            .join(".");
        leaves.push((dotted, value.to_string()));
    });

    let mut builder = config::Config::builder();
    for (path, value) in leaves {
        builder = builder
            .set_override(path.as_str(), value)
            .map_err(|e| StrataError::KeyMapping(e.to_string()))?;
    }

    let built = builder
        .build()
        .map_err(|e| StrataError::KeyMapping(e.to_string()))?;

    built
        .try_deserialize::<T>()
        .map_err(|e| schema_error(e, mapping, schema, delimiter))
}

fn flat_key(dotted: &str, delimiter: &str) -> String {
    dotted.to_uppercase().replace('.', delimiter)
}

fn schema_error(
    err: config::ConfigError,
    mapping: &ResolvedMapping,
    schema: &Schema,
    delimiter: &str,
) -> StrataError {
    let error = match err {
        config::ConfigError::NotFound(key) => {
            FieldError::new(flat_key(&key, delimiter), "field required")
        }
        config::ConfigError::Type {
            key: Some(key),
            unexpected,
            expected,
            ..
        } => {
            let field = flat_key(&key, delimiter);
            let source = mapping.source_of(&field).unwrap_or(DEFAULT_SOURCE).to_string();
            FieldError::new(field, format!("invalid type: {unexpected}, expected {expected}"))
                .with_source(source)
        }
        other => FieldError::new(&schema.name, other.to_string()),
    };
    StrataError::SchemaValidation {
        errors: vec![error],
    }
}
