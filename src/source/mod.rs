//! Override sources and precedence merging.
//!
//! - [`reader`] - parses one `KEY=value` override file into [`RawEntry`] values
//! - [`merger`] - discovers the canonical file set and merges it, under the
//!   process environment, into a [`ResolvedMapping`] with provenance
//!
//! ```rust,no_run
//! use strata::source::{merge_with_environment, SourceSet};
//!
//! # fn example() -> strata::domain::Result<()> {
//! let set = SourceSet::discover(".env", Some("production"));
//! let mapping = merge_with_environment(&set)?;
//! println!("HOST from {:?}", mapping.source_of("HOST"));
//! # Ok(())
//! # }
//! ```

pub mod merger;
pub mod reader;

pub use merger::{
    environment_entries, merge, merge_with_environment, ResolvedMapping, ResolvedValue, SourceSet,
};
pub use reader::{parse_source, read_source, RawEntry, ENVIRONMENT_SOURCE};
