//! Schema collaborator contract.
//!
//! The engine never looks inside the target type. It needs only the
//! declared field metadata ([`Schema`], [`FieldSpec`]) and a way to turn a
//! flat string mapping into a typed value ([`validate`]).
//!
//! # Declaring a schema
//!
//! ```rust
//! use serde::Deserialize;
//! use strata::schema::{ConfigSchema, FieldKind, FieldSpec, Schema};
//!
//! #[derive(Debug, Deserialize)]
//! struct AppConfig {
//!     database_url: String,
//!     debug: bool,
//!     database: DatabaseConfig,
//! }
//!
//! #[derive(Debug, Deserialize)]
//! struct DatabaseConfig {
//!     port: u16,
//! }
//!
//! impl ConfigSchema for AppConfig {
//!     fn schema() -> Schema {
//!         Schema::new("AppConfig")
//!             .field(
//!                 FieldSpec::new("DATABASE_URL", FieldKind::String)
//!                     .required()
//!                     .describe("PostgreSQL connection string"),
//!             )
//!             .field(FieldSpec::new("DEBUG", FieldKind::Boolean).default_value("false"))
//!             .group("DATABASE", "Database connection settings")
//!             .field(FieldSpec::new("DATABASE__PORT", FieldKind::Integer).default_value("5432"))
//!     }
//! }
//! ```
//!
//! # Modules
//!
//! - [`validate`] - feeds the flat mapping to the schema and collects field errors
//! - [`generate`] - `.env.example` and Markdown documentation rendering
//! - [`manifest`] - TOML schema manifest used by the command-line front end

pub mod generate;
pub mod manifest;
pub mod validate;

use crate::secrets::SecretReference;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// Value type of a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Integer,
    Float,
    Boolean,
    /// Masked value, literal or deferred to a secret backend
    Secret,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::String => "str",
            FieldKind::Integer => "int",
            FieldKind::Float => "float",
            FieldKind::Boolean => "bool",
            FieldKind::Secret => "Secret",
        };
        f.write_str(name)
    }
}

/// Metadata for one declared field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    /// Flat key, uppercase, nesting delimiter included
    pub name: String,

    pub kind: FieldKind,

    pub required: bool,

    /// Default applied when no source supplies the key
    pub default: Option<String>,

    pub description: Option<String>,
}

impl FieldSpec {
    /// Creates an optional field with no default
    pub fn new(name: impl AsRef<str>, kind: FieldKind) -> Self {
        Self {
            name: name.as_ref().to_uppercase(),
            kind,
            required: false,
            default: None,
            description: None,
        }
    }

    /// Marks the field as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the default value
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets the documentation string
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Secret field whose default is a deferred backend reference
    pub fn secret(name: impl AsRef<str>, reference: SecretReference) -> Self {
        Self::new(name, FieldKind::Secret).default_value(reference.to_string())
    }

    /// Whether the schema supplies a value when no source does
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// Description of a nested section, used only for generated artifacts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSpec {
    pub name: String,
    pub description: Option<String>,
}

/// Declared fields of one configuration type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schema {
    pub name: String,
    fields: Vec<FieldSpec>,
    groups: Vec<GroupSpec>,
}

impl Schema {
    /// Creates an empty schema
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Adds a field; a later field with the same name replaces the earlier one
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.retain(|f| f.name != spec.name);
        self.fields.push(spec);
        self
    }

    /// Describes a nested section
    pub fn group(mut self, name: impl AsRef<str>, description: impl Into<String>) -> Self {
        self.groups.push(GroupSpec {
            name: name.as_ref().to_uppercase(),
            description: Some(description.into()),
        });
        self
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn groups(&self) -> &[GroupSpec] {
        &self.groups
    }

    /// Looks up a field by flat key (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        let upper = name.to_uppercase();
        self.fields.iter().find(|f| f.name == upper)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn group_description(&self, name: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|g| g.name == name)
            .and_then(|g| g.description.as_deref())
    }

    /// Declared flat keys
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// A configuration type the engine can resolve
///
/// The type is built by deserializing the ConfigTree, with every leaf a
/// string the `config` crate coerces to the target field type. Keys are
/// lowercased before deserialization, so struct fields use snake_case names.
pub trait ConfigSchema: DeserializeOwned + Send + Sync + 'static {
    /// Declared fields of this type
    fn schema() -> Schema;
}
