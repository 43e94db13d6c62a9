//! Error type for `profdim-load`.

use profdim_core::{row::NaturalKey, table::DimensionTable};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The input could not be turned into a batch. Raised before any write.
  #[error("validation failed: {0}")]
  Validation(#[from] profdim_extract::Error),

  /// A fact references a dimension natural key that has no surrogate key.
  #[error("{dimension} has no row for natural key {natural_key}")]
  Referential {
    dimension:   DimensionTable,
    natural_key: NaturalKey,
  },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
