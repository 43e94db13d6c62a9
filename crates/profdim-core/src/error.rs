//! Error types for `profdim-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown load mode: {0:?}")]
  UnknownMode(String),

  #[error("malformed natural key")]
  InvalidNaturalKey,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
