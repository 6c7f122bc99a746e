//! Deferred pointers to secrets held by a named backend
//!
//! Textual form: `secretref:<backend>:<key>[?param=value&...]`. The form is
//! accepted anywhere a secret field is read, so an override file can point
//! at a backend just like a schema default can.

use crate::adapters::{
    AwsSecretsBackend, AzureKeyVaultBackend, BackendParams, HashiCorpVaultBackend, SecretBackend,
};
use crate::domain::errors::StrataError;
use crate::domain::result::Result;
use crate::secrets::registry::{SecretRegistry, ENV_BACKEND};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Prefix that marks a value as a secret reference
pub const REFERENCE_PREFIX: &str = "secretref:";

/// Whether a raw value is written as a secret reference
pub fn is_reference(value: &str) -> bool {
    value.starts_with(REFERENCE_PREFIX)
}

/// Backend name, key, and backend-specific parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretReference {
    backend: String,
    key: String,
    params: BackendParams,
}

impl SecretReference {
    /// Creates a reference without parameters
    pub fn new(backend: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            key: key.into(),
            params: BackendParams::new(),
        }
    }

    /// Adds a backend parameter
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn params(&self) -> &BackendParams {
        &self.params
    }

    /// Stable digest of the parameters, part of the registry cache key
    pub fn params_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for (name, value) in &self.params {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
            hasher.update(value.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }

    /// Reference resolved by the default environment backend
    pub fn env(key: impl Into<String>) -> Self {
        Self::new(ENV_BACKEND, key)
    }

    /// AWS Secrets Manager reference; registers `aws-<region>` on first use
    pub fn aws(key: impl Into<String>, region: &str) -> Self {
        let name = format!("aws-{region}");
        ensure_registered(&name, || Arc::new(AwsSecretsBackend::new(region)));
        Self::new(name, key)
    }

    /// Azure Key Vault reference; registers `azure-<host>` on first use
    pub fn azure(key: impl Into<String>, vault_url: &str) -> Self {
        let name = format!("azure-{}", host_label(vault_url));
        ensure_registered(&name, || Arc::new(AzureKeyVaultBackend::new(vault_url)));
        Self::new(name, key)
    }

    /// HashiCorp Vault reference; registers `vault-<host>` on first use
    ///
    /// Without an explicit token the backend reads `VAULT_TOKEN` when a
    /// secret is first fetched.
    pub fn vault(key: impl Into<String>, url: &str, token: Option<String>) -> Self {
        let name = format!("vault-{}", host_label(url));
        ensure_registered(&name, || Arc::new(HashiCorpVaultBackend::new(url, token)));
        Self::new(name, key)
    }
}

fn ensure_registered<F>(name: &str, make: F)
where
    F: FnOnce() -> Arc<dyn SecretBackend>,
{
    if SecretRegistry::global().register_if_absent(name, make) {
        tracing::debug!(backend = %name, "Registered secret backend on first use");
    }
}

/// `host` or `host-port` of a URL, falling back to a sanitised form of the input
fn host_label(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(parsed) => match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{host}-{port}"),
            (Some(host), None) => host.to_string(),
            _ => sanitise(raw),
        },
        Err(_) => sanitise(raw),
    }
}

fn sanitise(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '-' })
        .collect()
}

impl fmt::Display for SecretReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{REFERENCE_PREFIX}{}:{}", self.backend, self.key)?;
        if !self.params.is_empty() {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.params.iter())
                .finish();
            write!(f, "?{query}")?;
        }
        Ok(())
    }
}

impl FromStr for SecretReference {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |why: &str| StrataError::InvalidSecretReference(format!("'{s}': {why}"));

        let body = s
            .strip_prefix(REFERENCE_PREFIX)
            .ok_or_else(|| invalid("missing 'secretref:' prefix"))?;
        let (backend, rest) = body
            .split_once(':')
            .ok_or_else(|| invalid("expected secretref:<backend>:<key>"))?;
        let (key, query) = match rest.split_once('?') {
            Some((key, query)) => (key, Some(query)),
            None => (rest, None),
        };

        if backend.is_empty() {
            return Err(invalid("backend name is empty"));
        }
        if key.is_empty() {
            return Err(invalid("secret key is empty"));
        }

        let params = query
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect::<BackendParams>()
            })
            .unwrap_or_default();

        Ok(Self {
            backend: backend.to_string(),
            key: key.to_string(),
            params,
        })
    }
}
