//! Secret backend abstraction
//!
//! This module defines the trait that secret backends must implement to be
//! registered with a [`crate::secrets::SecretRegistry`].

use crate::domain::errors::BackendError;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Backend-specific parameters carried by a secret reference
/// (e.g. `version`, `field`, `mount`)
pub type BackendParams = BTreeMap<String, String>;

/// Secret backend trait
///
/// Implementations fetch one secret by key. They are shared across threads
/// behind an `Arc`, and are called at most once per distinct reference
/// while the registry cache holds the value.
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// Short backend type name used in logs (e.g. `"vault"`)
    fn kind(&self) -> &'static str;

    /// Fetch the secret stored under `key`
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] when the secret does not exist, the
    /// credentials are rejected, or the backend cannot be reached.
    async fn resolve(&self, key: &str, params: &BackendParams) -> Result<String, BackendError>;
}
