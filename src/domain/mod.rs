//! Domain types shared by every layer of Strata.
//!
//! - **Error types** ([`StrataError`], [`BackendError`], [`FieldError`])
//! - **Result type alias** ([`Result`])
//!
//! All fallible operations return [`Result<T, StrataError>`]:
//!
//! ```rust
//! use strata::domain::{Result, StrataError};
//!
//! fn example() -> Result<()> {
//!     Err(StrataError::Configuration("delimiter cannot be empty".to_string()))
//! }
//! ```

pub mod errors;
pub mod result;

pub use errors::{BackendError, FieldError, StrataError};
pub use result::Result;
