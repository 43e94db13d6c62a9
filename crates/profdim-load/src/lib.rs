//! Dimensional load pipeline for profdim.
//!
//! Resolves surrogate keys, detects changed dimension rows, merges dimensions
//! and loads facts against any [`WarehouseStore`] and [`KeyStore`].
//!
//! # Quick start
//!
//! ```no_run
//! # async fn demo(store: &profdim_store_sqlite::SqliteStore) -> profdim_load::Result<()> {
//! use profdim_load::Orchestrator;
//!
//! let summary = Orchestrator::new(store, store)
//!   .run_file("professionals_nested.json")
//!   .await?;
//! println!("{} records loaded in {} mode", summary.records, summary.mode);
//! # Ok(())
//! # }
//! ```
//!
//! [`WarehouseStore`]: profdim_core::store::WarehouseStore
//! [`KeyStore`]: profdim_core::store::KeyStore

pub mod detect;
pub mod error;
pub mod facts;
pub mod memory;
pub mod merge;
pub mod orchestrate;
pub mod resolve;

pub use error::{Error, Result};
pub use memory::MemoryKeyStore;
pub use orchestrate::Orchestrator;
pub use resolve::KeyResolver;

#[cfg(test)]
mod tests;
