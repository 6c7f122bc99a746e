//! Environment secret backend
//!
//! Looks a key up in the mapping published by the last successful load,
//! then in the process environment. This is the backend registered under
//! the name `env` by default.

use super::traits::{BackendParams, SecretBackend};
use crate::domain::errors::BackendError;
use crate::source::ResolvedMapping;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{OnceLock, PoisonError, RwLock};

fn published() -> &'static RwLock<BTreeMap<String, String>> {
    static PUBLISHED: OnceLock<RwLock<BTreeMap<String, String>>> = OnceLock::new();
    PUBLISHED.get_or_init(|| RwLock::new(BTreeMap::new()))
}

/// Makes a resolved mapping visible to every [`EnvBackend::new`] instance
///
/// Called by the loader after each successful load; the previous snapshot
/// is replaced wholesale.
pub fn publish(mapping: &ResolvedMapping) {
    *published().write().unwrap_or_else(PoisonError::into_inner) = mapping.values();
}

enum Lookup {
    Published,
    Fixed(BTreeMap<String, String>),
}

/// Secret backend over resolved configuration and the process environment
pub struct EnvBackend {
    lookup: Lookup,
}

impl Default for EnvBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvBackend {
    /// Backend reading the published mapping, then the process environment
    pub fn new() -> Self {
        Self {
            lookup: Lookup::Published,
        }
    }

    /// Backend reading a fixed map, then the process environment
    pub fn with_values(values: BTreeMap<String, String>) -> Self {
        Self {
            lookup: Lookup::Fixed(values),
        }
    }

    fn lookup(&self, key: &str) -> Option<String> {
        let upper = key.to_uppercase();
        let from_mapping = match &self.lookup {
            Lookup::Published => published()
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&upper)
                .cloned(),
            Lookup::Fixed(values) => values.get(key).or_else(|| values.get(&upper)).cloned(),
        };
        from_mapping.or_else(|| std::env::var(key).ok())
    }
}

#[async_trait]
impl SecretBackend for EnvBackend {
    fn kind(&self) -> &'static str {
        "env"
    }

    async fn resolve(&self, key: &str, _params: &BackendParams) -> Result<String, BackendError> {
        self.lookup(key).ok_or_else(|| {
            BackendError::NotFound(format!("environment variable '{key}' not found"))
        })
    }
}
