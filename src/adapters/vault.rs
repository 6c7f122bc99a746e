//! HashiCorp Vault KV v2 backend
//!
//! Reads `GET {url}/v1/{mount}/data/{key}` and returns one field of the
//! stored object.
//!
//! Reference parameters:
//! - `mount` - KV engine mount point (default `secret`)
//! - `field` - field inside the secret's data (default `value`)
//! - `version` - specific secret version

use super::traits::{BackendParams, SecretBackend};
use super::{http_client, status_error};
use crate::domain::errors::BackendError;
use crate::secrets::{secret_string, SecretString};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::collections::HashMap;

const DEFAULT_MOUNT: &str = "secret";
const DEFAULT_FIELD: &str = "value";

#[derive(Debug, Deserialize)]
struct KvResponse {
    data: KvData,
}

#[derive(Debug, Deserialize)]
struct KvData {
    data: HashMap<String, serde_json::Value>,
}

/// HashiCorp Vault backend
pub struct HashiCorpVaultBackend {
    url: String,
    token: Option<SecretString>,
}

impl HashiCorpVaultBackend {
    /// Creates a backend for the server at `url`
    ///
    /// When `token` is `None`, `VAULT_TOKEN` is read at fetch time.
    pub fn new(url: &str, token: Option<String>) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            token: token.map(secret_string),
        }
    }

    fn token(&self) -> Result<SecretString, BackendError> {
        if let Some(token) = &self.token {
            return Ok(token.clone());
        }
        std::env::var("VAULT_TOKEN").map(secret_string).map_err(|_| {
            BackendError::Authentication("no token given and VAULT_TOKEN is not set".to_string())
        })
    }
}

#[async_trait]
impl SecretBackend for HashiCorpVaultBackend {
    fn kind(&self) -> &'static str {
        "vault"
    }

    async fn resolve(&self, key: &str, params: &BackendParams) -> Result<String, BackendError> {
        let token = self.token()?;
        let mount = params.get("mount").map(String::as_str).unwrap_or(DEFAULT_MOUNT);
        let field = params.get("field").map(String::as_str).unwrap_or(DEFAULT_FIELD);

        let mut url = format!(
            "{}/v1/{}/data/{}",
            self.url,
            mount.trim_matches('/'),
            key.trim_start_matches('/')
        );
        if let Some(version) = params.get("version") {
            url.push_str(&format!("?version={version}"));
        }

        tracing::debug!(url = %url, "Reading secret from Vault");

        let response = http_client()?
            .get(&url)
            .header("X-Vault-Token", token.expose_secret().as_str())
            .send()
            .await
            .map_err(|e| BackendError::Transport(format!("Vault request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, key, &body));
        }

        let body: KvResponse = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(format!("Vault KV v2 body: {e}")))?;

        match body.data.data.get(field) {
            Some(serde_json::Value::String(value)) => Ok(value.clone()),
            Some(other) => Ok(other.to_string()),
            None => Err(BackendError::NotFound(format!(
                "field '{field}' not present in '{key}'"
            ))),
        }
    }
}
