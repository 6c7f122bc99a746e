//! Azure Key Vault backend
//!
//! Reads `GET {vault}/secrets/{name}[/{version}]?api-version=7.4` with an
//! Azure AD bearer token. The token comes from a service principal
//! (`azure_identity::ClientSecretCredential`) or, for tests and
//! pre-authenticated callers, a static token.

use super::traits::{BackendParams, SecretBackend};
use super::{http_client, status_error};
use crate::domain::errors::BackendError;
use crate::secrets::{secret_string, SecretString};
use async_trait::async_trait;
use azure_core::credentials::TokenCredential;
use azure_identity::ClientSecretCredential;
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::OnceCell;

const API_VERSION: &str = "7.4";
const KEY_VAULT_SCOPE: &str = "https://vault.azure.net/.default";

/// How the backend obtains its bearer token
#[derive(Clone)]
pub enum AzureAuth {
    /// Service principal from `AZURE_TENANT_ID`, `AZURE_CLIENT_ID` and
    /// `AZURE_CLIENT_SECRET`, read on first fetch
    Environment,

    /// Explicit service principal
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: SecretString,
    },

    /// Pre-acquired bearer token
    StaticToken(SecretString),
}

#[derive(Debug, Deserialize)]
struct SecretBundle {
    value: String,
}

/// Azure Key Vault backend
pub struct AzureKeyVaultBackend {
    vault_url: String,
    auth: AzureAuth,
    credential: OnceCell<Arc<ClientSecretCredential>>,
}

impl AzureKeyVaultBackend {
    /// Creates a backend authenticating from the environment
    pub fn new(vault_url: &str) -> Self {
        Self::with_auth(vault_url, AzureAuth::Environment)
    }

    /// Creates a backend with explicit authentication
    pub fn with_auth(vault_url: &str, auth: AzureAuth) -> Self {
        Self {
            vault_url: vault_url.trim_end_matches('/').to_string(),
            auth,
            credential: OnceCell::new(),
        }
    }

    async fn credential(&self) -> Result<Arc<ClientSecretCredential>, BackendError> {
        let credential = self
            .credential
            .get_or_try_init(|| async {
                let (tenant_id, client_id, client_secret) = match &self.auth {
                    AzureAuth::ClientSecret {
                        tenant_id,
                        client_id,
                        client_secret,
                    } => (
                        tenant_id.clone(),
                        client_id.clone(),
                        client_secret.expose_secret().as_str().to_string(),
                    ),
                    _ => (
                        required_env("AZURE_TENANT_ID")?,
                        required_env("AZURE_CLIENT_ID")?,
                        required_env("AZURE_CLIENT_SECRET")?,
                    ),
                };

                let secret = azure_core::credentials::Secret::new(client_secret);
                ClientSecretCredential::new(&tenant_id, client_id, secret, None).map_err(|e| {
                    BackendError::Configuration(format!(
                        "Failed to create Azure AD credential: {e}"
                    ))
                })
            })
            .await?;
        Ok(Arc::clone(credential))
    }

    async fn bearer_token(&self) -> Result<SecretString, BackendError> {
        if let AzureAuth::StaticToken(token) = &self.auth {
            return Ok(token.clone());
        }

        let credential = self.credential().await?;
        let token = TokenCredential::get_token(&*credential, &[KEY_VAULT_SCOPE], None)
            .await
            .map_err(|e| {
                BackendError::Authentication(format!("Failed to acquire Azure AD token: {e}"))
            })?;
        Ok(secret_string(token.token.secret().to_string()))
    }

    fn secret_url(&self, name: &str, version: Option<&str>) -> String {
        match version {
            Some(version) => format!(
                "{}/secrets/{name}/{version}?api-version={API_VERSION}",
                self.vault_url
            ),
            None => format!("{}/secrets/{name}?api-version={API_VERSION}", self.vault_url),
        }
    }
}

fn required_env(name: &str) -> Result<String, BackendError> {
    std::env::var(name)
        .map_err(|_| BackendError::Authentication(format!("{name} is not set")))
}

#[async_trait]
impl SecretBackend for AzureKeyVaultBackend {
    fn kind(&self) -> &'static str {
        "azure"
    }

    async fn resolve(&self, key: &str, params: &BackendParams) -> Result<String, BackendError> {
        let token = self.bearer_token().await?;
        let url = self.secret_url(key, params.get("version").map(String::as_str));

        tracing::debug!(url = %url, "Reading secret from Azure Key Vault");

        let response = http_client()?
            .get(&url)
            .header(
                "Authorization",
                format!("Bearer {}", token.expose_secret().as_str()),
            )
            .send()
            .await
            .map_err(|e| BackendError::Transport(format!("Key Vault request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, key, &body));
        }

        let bundle: SecretBundle = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(format!("Key Vault secret bundle: {e}")))?;
        Ok(bundle.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_url() {
        let backend = AzureKeyVaultBackend::new("https://myvault.vault.azure.net/");
        assert_eq!(
            backend.secret_url("db-password", None),
            "https://myvault.vault.azure.net/secrets/db-password?api-version=7.4"
        );
        assert_eq!(
            backend.secret_url("db-password", Some("abc123")),
            "https://myvault.vault.azure.net/secrets/db-password/abc123?api-version=7.4"
        );
    }

    #[tokio::test]
    async fn test_static_token_skips_credential() {
        let backend = AzureKeyVaultBackend::with_auth(
            "https://myvault.vault.azure.net",
            AzureAuth::StaticToken(secret_string("tok".to_string())),
        );
        let token = backend.bearer_token().await.unwrap();
        assert_eq!(token.expose_secret().as_str(), "tok");
    }
}
