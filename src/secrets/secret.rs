//! The `Secret` field type
//!
//! A secret field holds either a literal value or a [`SecretReference`]
//! that is fetched the first time [`Secret::resolve`] is awaited. Every
//! clone shares the same slot, so a value resolved through one clone is
//! visible to all of them and the backend is asked only once.

use crate::domain::result::Result;
use crate::secrets::reference::{is_reference, SecretReference};
use crate::secrets::registry::SecretRegistry;
use crate::secrets::value::{secret_string, SecretString, MASK};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

enum SecretSlot {
    Literal(SecretString),
    Deferred {
        reference: SecretReference,
        value: OnceCell<SecretString>,
    },
}

/// Masked configuration value, possibly deferred to a secret backend
#[derive(Clone)]
pub struct Secret {
    inner: Arc<SecretSlot>,
}

impl Secret {
    /// Wraps a literal value
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SecretSlot::Literal(secret_string(value.into()))),
        }
    }

    /// Defers to a backend reference
    pub fn deferred(reference: SecretReference) -> Self {
        Self {
            inner: Arc::new(SecretSlot::Deferred {
                reference,
                value: OnceCell::new(),
            }),
        }
    }

    /// Reads a raw field value: `secretref:` text becomes a reference,
    /// anything else a literal
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::StrataError::InvalidSecretReference`] for a
    /// malformed reference.
    pub fn parse(raw: &str) -> Result<Self> {
        if is_reference(raw) {
            Ok(Self::deferred(raw.parse()?))
        } else {
            Ok(Self::literal(raw))
        }
    }

    /// Backend reference, if the value is deferred
    pub fn reference(&self) -> Option<&SecretReference> {
        match self.inner.as_ref() {
            SecretSlot::Literal(_) => None,
            SecretSlot::Deferred { reference, .. } => Some(reference),
        }
    }

    /// Whether the value is available without a backend call
    pub fn is_resolved(&self) -> bool {
        match self.inner.as_ref() {
            SecretSlot::Literal(_) => true,
            SecretSlot::Deferred { value, .. } => value.initialized(),
        }
    }

    /// Resolves against the process-wide registry
    ///
    /// # Errors
    ///
    /// Unknown backend or backend failure; a failed attempt can be retried.
    pub async fn resolve(&self) -> Result<SecretString> {
        self.resolve_with(SecretRegistry::global()).await
    }

    /// Resolves against an explicit registry
    ///
    /// # Errors
    ///
    /// Unknown backend or backend failure; a failed attempt can be retried.
    pub async fn resolve_with(&self, registry: &SecretRegistry) -> Result<SecretString> {
        match self.inner.as_ref() {
            SecretSlot::Literal(value) => Ok(value.clone()),
            SecretSlot::Deferred { reference, value } => value
                .get_or_try_init(|| registry.resolve(reference))
                .await
                .cloned(),
        }
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(MASK)
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Secret::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{BackendParams, SecretBackend};
    use crate::domain::errors::{BackendError, StrataError};
    use async_trait::async_trait;
    use secrecy::ExposeSecret;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SecretBackend for Fixed {
        fn kind(&self) -> &'static str {
            "fixed"
        }

        async fn resolve(
            &self,
            key: &str,
            _params: &BackendParams,
        ) -> std::result::Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("value-of-{key}"))
        }
    }

    #[test]
    fn test_masked_everywhere() {
        let secret = Secret::literal("hunter2");
        assert_eq!(secret.to_string(), "***");
        assert_eq!(format!("{secret:?}"), "***");
        assert_eq!(serde_json::to_string(&secret).unwrap(), "\"***\"");
    }

    #[test]
    fn test_parse_reference_is_deferred() {
        let secret = Secret::parse("secretref:vault-prod:app/db").unwrap();
        assert!(!secret.is_resolved());
        assert_eq!(secret.reference().map(|r| r.key()), Some("app/db"));

        let literal = Secret::parse("plain").unwrap();
        assert!(literal.is_resolved());
        assert!(literal.reference().is_none());
    }

    #[test]
    fn test_deserialize_rejects_malformed_reference() {
        let result: std::result::Result<Secret, _> = serde_json::from_str("\"secretref:env\"");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_clones_share_one_resolution() {
        let registry = SecretRegistry::new();
        let backend = Arc::new(Fixed {
            calls: AtomicUsize::new(0),
        });
        registry.register("fixed", backend.clone());

        let secret = Secret::deferred(SecretReference::new("fixed", "token"));
        let clone = secret.clone();

        let a = secret.resolve_with(&registry).await.unwrap();
        assert!(clone.is_resolved());
        let b = clone.resolve_with(&registry).await.unwrap();

        assert_eq!(a.expose_secret().as_str(), "value-of-token");
        assert_eq!(b.expose_secret().as_str(), "value-of-token");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_backend_error() {
        let registry = SecretRegistry::new();
        let secret = Secret::deferred(SecretReference::new("missing", "k"));
        let err = secret.resolve_with(&registry).await.unwrap_err();
        assert!(matches!(err, StrataError::UnknownBackend { .. }));
        assert!(!secret.is_resolved());
    }
}
