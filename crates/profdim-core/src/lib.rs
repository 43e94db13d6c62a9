//! Core types and trait definitions for the profdim dimensional loader.
//!
//! This crate is free of JSON-parsing and database dependencies. The
//! extractor, the storage backend and the load pipeline all depend on it.

pub mod error;
pub mod record;
pub mod row;
pub mod run;
pub mod store;
pub mod table;

pub use error::{Error, Result};
