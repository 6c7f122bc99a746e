//! Logging and observability
//!
//! Structured logging with:
//! - Configurable log levels (`RUST_LOG` wins over the configured level)
//! - Console output on stderr, plain or JSON
//! - Optional JSON file logging with daily rotation
//!
//! # Example
//!
//! ```no_run
//! use strata::logging::{init_logging, LoggingOptions};
//!
//! let _guard = init_logging(&LoggingOptions::default()).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard, LoggingOptions};

/// Log a failed load together with the options that produced it
///
/// # Example
///
/// ```no_run
/// use strata::log_load_failure;
/// use strata::core::LoadOptions;
/// use strata::domain::StrataError;
///
/// let options = LoadOptions::default();
/// let error = StrataError::Configuration("nesting delimiter cannot be empty".to_string());
/// log_load_failure!(&error, &options);
/// ```
#[macro_export]
macro_rules! log_load_failure {
    ($error:expr, $options:expr) => {
        tracing::error!(
            error = %$error,
            base = %$options.base.display(),
            env = $options.env.as_deref().unwrap_or("-"),
            strict = $options.strict,
            "Configuration load failed"
        );
    };
}

/// Log a secret fetch; never logs the value
///
/// # Example
///
/// ```no_run
/// use strata::log_secret_fetch;
///
/// log_secret_fetch!("vault-prod", "app/db");
/// ```
#[macro_export]
macro_rules! log_secret_fetch {
    ($backend:expr, $key:expr) => {
        tracing::debug!(backend = %$backend, key = %$key, "Fetching secret");
    };
}
