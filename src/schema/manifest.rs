//! TOML schema manifest
//!
//! The command-line front end cannot see the application's Rust types, so it
//! reads the schema from a manifest instead:
//!
//! ```toml
//! name = "AppConfig"
//! delimiter = "__"
//!
//! [[fields]]
//! name = "DATABASE_URL"
//! type = "string"
//! required = true
//! description = "PostgreSQL connection string"
//!
//! [[groups]]
//! name = "DATABASE"
//! description = "Connection pool settings"
//!
//! [[fields]]
//! name = "DATABASE__PORT"
//! type = "integer"
//! default = 5432
//!
//! [[fields]]
//! name = "API_KEY"
//! type = "secret"
//! default = "secretref:vault-prod:app/api"
//!
//! [[backends]]
//! name = "vault-prod"
//! kind = "vault"
//! url = "https://vault.example.com"
//! ```

use super::{FieldKind, FieldSpec, Schema};
use crate::adapters::{
    AwsSecretsBackend, AzureKeyVaultBackend, EnvBackend, HashiCorpVaultBackend, SecretBackend,
};
use crate::domain::errors::StrataError;
use crate::domain::result::Result;
use crate::secrets::SecretRegistry;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// Parsed manifest file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default = "default_name")]
    pub name: String,

    /// Nesting delimiter override
    pub delimiter: Option<String>,

    #[serde(default)]
    pub fields: Vec<ManifestField>,

    #[serde(default)]
    pub groups: Vec<ManifestGroup>,

    #[serde(default)]
    pub backends: Vec<ManifestBackend>,
}

fn default_name() -> String {
    "Config".to_string()
}

fn default_kind() -> FieldKind {
    FieldKind::String
}

/// One `[[fields]]` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestField {
    pub name: String,

    #[serde(rename = "type", default = "default_kind")]
    pub kind: FieldKind,

    #[serde(default)]
    pub required: bool,

    /// Any TOML scalar; stored as its string form
    pub default: Option<toml::Value>,

    pub description: Option<String>,
}

/// One `[[groups]]` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestGroup {
    pub name: String,
    pub description: String,
}

/// One `[[backends]]` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendKind {
    Env,
    Aws {
        region: String,
        endpoint: Option<String>,
    },
    Azure {
        url: String,
    },
    Vault {
        url: String,
        /// Name of the environment variable holding the token
        token_env: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestBackend {
    pub name: String,

    #[serde(flatten)]
    pub kind: BackendKind,
}

fn scalar_to_string(field: &str, value: &toml::Value) -> Result<String> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        other => Err(StrataError::Configuration(format!(
            "default for {field} must be a scalar, got {}",
            other.type_str()
        ))),
    }
}

impl Manifest {
    /// Parses manifest text
    ///
    /// # Errors
    ///
    /// Returns a configuration error for malformed TOML or a non-scalar default.
    pub fn parse(contents: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(contents)?;
        for field in &manifest.fields {
            if let Some(default) = &field.default {
                scalar_to_string(&field.name, default)?;
            }
        }
        Ok(manifest)
    }

    /// Reads and parses a manifest file
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            StrataError::Configuration(format!(
                "Failed to read schema manifest {}: {e}",
                path.display()
            ))
        })?;
        Self::parse(&contents)
    }

    /// Builds the schema described by the manifest
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a non-scalar default.
    pub fn schema(&self) -> Result<Schema> {
        let mut schema = Schema::new(&self.name);
        for group in &self.groups {
            schema = schema.group(&group.name, &group.description);
        }
        for field in &self.fields {
            let mut spec = FieldSpec::new(&field.name, field.kind);
            if field.required {
                spec = spec.required();
            }
            if let Some(default) = &field.default {
                spec = spec.default_value(scalar_to_string(&field.name, default)?);
            }
            if let Some(description) = &field.description {
                spec = spec.describe(description);
            }
            schema = schema.field(spec);
        }
        Ok(schema)
    }

    /// Registers the declared backends with `registry`
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a Vault token variable is unset.
    pub fn register_backends(&self, registry: &SecretRegistry) -> Result<()> {
        for backend in &self.backends {
            let implementation: Arc<dyn SecretBackend> = match &backend.kind {
                BackendKind::Env => Arc::new(EnvBackend::new()),
                BackendKind::Aws { region, endpoint } => {
                    let aws = AwsSecretsBackend::new(region);
                    Arc::new(match endpoint {
                        Some(endpoint) => aws.with_endpoint(endpoint),
                        None => aws,
                    })
                }
                BackendKind::Azure { url } => Arc::new(AzureKeyVaultBackend::new(url)),
                BackendKind::Vault { url, token_env } => {
                    let token = match token_env {
                        Some(var) => Some(std::env::var(var).map_err(|_| {
                            StrataError::Configuration(format!(
                                "backend {}: environment variable {var} is not set",
                                backend.name
                            ))
                        })?),
                        None => None,
                    };
                    Arc::new(HashiCorpVaultBackend::new(url, token))
                }
            };
            registry.register(backend.name.clone(), implementation);
        }
        Ok(())
    }
}
