//! Error types for the profdim extractor.
//!
//! Every variant fails the whole run before anything is written.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("record {index}: {reason}")]
  Validation { index: usize, reason: String },

  #[error("malformed document: {0}")]
  Document(String),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("cannot read {path:?}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
