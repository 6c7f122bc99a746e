//! Secret values, references and the backend registry.
//!
//! - [`value`] - zeroizing, masked storage for resolved values
//! - [`reference`] - `secretref:<backend>:<key>` pointers
//! - [`secret`] - the [`Secret`] field type, resolved lazily
//! - [`registry`] - named backends and the resolution cache
//!
//! ```rust,no_run
//! use secrecy::ExposeSecret;
//! use strata::secrets::{Secret, SecretReference};
//!
//! # async fn example() -> strata::domain::Result<()> {
//! let api_key = Secret::deferred(SecretReference::vault(
//!     "app/api",
//!     "https://vault.example.com",
//!     None,
//! ));
//! println!("{api_key}"); // ***
//! let value = api_key.resolve().await?;
//! assert!(!value.expose_secret().is_empty());
//! # Ok(())
//! # }
//! ```

pub mod reference;
pub mod registry;
pub mod secret;
pub mod value;

pub use reference::{is_reference, SecretReference, REFERENCE_PREFIX};
pub use registry::{SecretRegistry, ENV_BACKEND};
pub use secret::Secret;
pub use value::{secret_string, SecretString, SecretValue, MASK};
