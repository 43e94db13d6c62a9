//! Runtime configuration for the `profdim-etl` binary.

pub mod settings;

pub use settings::{EtlSettings, Overrides};
