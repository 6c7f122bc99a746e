//! Named secret backends and the resolved-value cache
//!
//! The registry maps backend names to [`SecretBackend`] implementations and
//! memoizes every successful fetch by `(backend, key, params digest)`.
//! Concurrent resolutions of the same reference share one in-flight fetch,
//! so a backend sees at most one call per reference until the cache is
//! invalidated. Failures are never cached.

use crate::adapters::{EnvBackend, SecretBackend};
use crate::domain::errors::StrataError;
use crate::domain::result::Result;
use crate::secrets::reference::SecretReference;
use crate::secrets::value::{secret_string, SecretString};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock};
use tokio::sync::OnceCell;

/// Name of the default environment backend
pub const ENV_BACKEND: &str = "env";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    backend: String,
    key: String,
    params: String,
}

impl CacheKey {
    fn of(reference: &SecretReference) -> Self {
        Self {
            backend: reference.backend().to_string(),
            key: reference.key().to_string(),
            params: reference.params_hash(),
        }
    }
}

/// Backend table plus resolution cache
pub struct SecretRegistry {
    backends: RwLock<HashMap<String, Arc<dyn SecretBackend>>>,
    cache: Mutex<HashMap<CacheKey, Arc<OnceCell<SecretString>>>>,
}

impl Default for SecretRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretRegistry {
    /// Creates a registry with no backends
    pub fn new() -> Self {
        Self {
            backends: RwLock::new(HashMap::new()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a registry with the `env` backend registered
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(ENV_BACKEND, Arc::new(EnvBackend::new()));
        registry
    }

    /// Process-wide registry used by [`crate::secrets::Secret::resolve`]
    pub fn global() -> &'static SecretRegistry {
        static GLOBAL: OnceLock<SecretRegistry> = OnceLock::new();
        GLOBAL.get_or_init(SecretRegistry::with_defaults)
    }

    /// Registers (or replaces) a backend under `name`
    ///
    /// Cached values previously fetched from a backend of that name are dropped.
    pub fn register(&self, name: impl Into<String>, backend: Arc<dyn SecretBackend>) {
        let name = name.into();
        tracing::debug!(backend = %name, kind = backend.kind(), "Registering secret backend");
        self.backends
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), backend);
        self.invalidate(&name);
    }

    /// Registers a backend only when the name is free
    ///
    /// Returns `true` when `make` was called and the backend registered.
    pub fn register_if_absent<F>(&self, name: &str, make: F) -> bool
    where
        F: FnOnce() -> Arc<dyn SecretBackend>,
    {
        let mut backends = self.backends.write().unwrap_or_else(PoisonError::into_inner);
        if backends.contains_key(name) {
            return false;
        }
        backends.insert(name.to_string(), make());
        true
    }

    /// Looks up a backend by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn SecretBackend>> {
        self.backends
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Registered backend names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .backends
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Resolves a reference, fetching from the backend at most once
    ///
    /// # Errors
    ///
    /// - [`StrataError::UnknownBackend`] when the backend name is not registered
    /// - [`StrataError::SecretResolution`] wrapping the backend's failure
    pub async fn resolve(&self, reference: &SecretReference) -> Result<SecretString> {
        let backend = self
            .get(reference.backend())
            .ok_or_else(|| StrataError::UnknownBackend {
                name: reference.backend().to_string(),
                available: self.names(),
            })?;

        let cell = Arc::clone(
            self.lock_cache()
                .entry(CacheKey::of(reference))
                .or_default(),
        );

        let value = cell
            .get_or_try_init(|| async {
                crate::log_secret_fetch!(reference.backend(), reference.key());
                backend
                    .resolve(reference.key(), reference.params())
                    .await
                    .map(secret_string)
                    .map_err(|source| {
                        tracing::warn!(
                            backend = reference.backend(),
                            key = reference.key(),
                            error = %source,
                            "Secret fetch failed"
                        );
                        StrataError::SecretResolution {
                            backend: reference.backend().to_string(),
                            key: reference.key().to_string(),
                            source,
                        }
                    })
            })
            .await?;

        Ok(value.clone())
    }

    /// Drops cached values fetched from one backend
    pub fn invalidate(&self, backend: &str) {
        self.lock_cache().retain(|key, _| key.backend != backend);
    }

    /// Drops every cached value
    pub fn clear_cache(&self) {
        let mut cache = self.lock_cache();
        let dropped = cache.len();
        cache.clear();
        if dropped > 0 {
            tracing::debug!(entries = dropped, "Secret cache cleared");
        }
    }

    /// Number of successfully resolved values currently cached
    pub fn cached_len(&self) -> usize {
        self.lock_cache()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    fn lock_cache(&self) -> MutexGuard<'_, HashMap<CacheKey, Arc<OnceCell<SecretString>>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SecretRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretRegistry")
            .field("backends", &self.names())
            .field("cached", &self.cached_len())
            .finish()
    }
}
