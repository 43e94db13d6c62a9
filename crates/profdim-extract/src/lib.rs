//! JSON extraction and flattening for profdim.
//!
//! Converts a nested professionals document into [`profdim_core`] records, and
//! records into table-row candidates. Pure synchronous; no database
//! dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! use profdim_extract::{extract, flatten_batch};
//!
//! let json = r#"[{"email": "alice@example.com", "role": "Engineer"}]"#;
//! let batch = extract(json).unwrap();
//! let candidates = flatten_batch(&batch);
//! println!("{} dimension candidates", candidates.dimensions.len());
//! ```

pub mod error;
mod extract;
mod flatten;

pub use error::{Error, Result};
pub use extract::{extract, extract_file};
pub use flatten::{flatten, flatten_batch};
