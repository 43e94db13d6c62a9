//! Error type for `profdim-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] profdim_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("cannot decode column {column}: {reason}")]
  Decode { column: &'static str, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
