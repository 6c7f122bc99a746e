//! Secret backend integrations for Strata.
//!
//! This module provides the backends a [`crate::secrets::SecretReference`]
//! can point at:
//!
//! - [`env`] - resolved configuration, then the process environment (default `env`)
//! - [`aws`] - AWS Secrets Manager, SigV4-signed HTTPS
//! - [`azure`] - Azure Key Vault with Azure AD tokens
//! - [`vault`] - HashiCorp Vault KV v2
//!
//! # Design Pattern
//!
//! Backends follow the **Adapter Pattern**: each one hides its HTTP API
//! behind the [`SecretBackend`] trait and reports only [`BackendError`], so
//! the registry and tests can substitute any implementation.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use strata::adapters::HashiCorpVaultBackend;
//! use strata::secrets::SecretRegistry;
//!
//! let registry = SecretRegistry::global();
//! registry.register(
//!     "vault-prod",
//!     Arc::new(HashiCorpVaultBackend::new("https://vault.example.com", None)),
//! );
//! ```

pub mod aws;
pub mod azure;
pub mod env;
pub mod traits;
pub mod vault;

pub use aws::{AwsCredentials, AwsSecretsBackend};
pub use azure::{AzureAuth, AzureKeyVaultBackend};
pub use env::{publish, EnvBackend};
pub use traits::{BackendParams, SecretBackend};
pub use vault::HashiCorpVaultBackend;

use crate::domain::errors::BackendError;

/// HTTP client shared by the remote backends
pub(crate) fn http_client() -> Result<reqwest::Client, BackendError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(|e| BackendError::Configuration(format!("Failed to create HTTP client: {e}")))
}

/// Maps a non-success HTTP status to a backend error
pub(crate) fn status_error(status: reqwest::StatusCode, key: &str, body: &str) -> BackendError {
    match status.as_u16() {
        401 | 403 => BackendError::Authentication(format!("HTTP {status}: {body}")),
        404 => BackendError::NotFound(format!("secret '{key}' not found")),
        _ => BackendError::Transport(format!("HTTP {status}: {body}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(401 ; "unauthorized")]
    #[test_case(403 ; "forbidden")]
    fn test_auth_statuses(code: u16) {
        let status = reqwest::StatusCode::from_u16(code).unwrap();
        assert!(matches!(
            status_error(status, "k", ""),
            BackendError::Authentication(_)
        ));
    }

    #[test]
    fn test_not_found_status() {
        assert!(matches!(
            status_error(reqwest::StatusCode::NOT_FOUND, "k", ""),
            BackendError::NotFound(_)
        ));
        assert!(matches!(
            status_error(reqwest::StatusCode::BAD_GATEWAY, "k", ""),
            BackendError::Transport(_)
        ));
    }
}
