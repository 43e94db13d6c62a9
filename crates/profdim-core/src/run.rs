//! Load modes and per-run bookkeeping.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error,
  table::{DimensionTable, FactTable},
};

// ─── Modes ───────────────────────────────────────────────────────────────────

/// The strategy a run actually executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
  /// Truncate every target table, then load the batch.
  Full,
  /// Merge the batch into the existing tables.
  Incremental,
}

impl fmt::Display for LoadMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Full => "full",
      Self::Incremental => "incremental",
    })
  }
}

/// The operator's request; `Auto` defers to the presence of prior run state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeSelection {
  #[default]
  Auto,
  Full,
  Incremental,
}

impl ModeSelection {
  /// Resolve to a concrete mode given whether prior run state exists.
  pub fn resolve(self, has_prior_state: bool) -> LoadMode {
    match self {
      Self::Full => LoadMode::Full,
      Self::Incremental => LoadMode::Incremental,
      Self::Auto if has_prior_state => LoadMode::Incremental,
      Self::Auto => LoadMode::Full,
    }
  }
}

impl FromStr for ModeSelection {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "auto" => Ok(Self::Auto),
      "full" => Ok(Self::Full),
      "incremental" => Ok(Self::Incremental),
      _ => Err(Error::UnknownMode(s.to_owned())),
    }
  }
}

impl fmt::Display for ModeSelection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Auto => "auto",
      Self::Full => "full",
      Self::Incremental => "incremental",
    })
  }
}

// ─── Statistics ──────────────────────────────────────────────────────────────

/// Outcome of merging one dimension table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
  pub inserted:  usize,
  pub updated:   usize,
  pub unchanged: usize,
}

impl MergeStats {
  pub fn written(&self) -> usize { self.inserted + self.updated }
}

/// Outcome of loading one fact table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactStats {
  pub inserted: usize,
  pub updated:  usize,
  /// Rows already present (or repeated within the batch) and not written.
  pub skipped:  usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionOutcome {
  pub table: DimensionTable,
  pub stats: MergeStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactOutcome {
  pub table: FactTable,
  pub stats: FactStats,
}

/// What a completed run did. Persisted as the run watermark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
  pub run_id:      Uuid,
  pub mode:        LoadMode,
  pub started_at:  DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
  pub records:     usize,
  pub dimensions:  Vec<DimensionOutcome>,
  pub facts:       Vec<FactOutcome>,
}

impl RunSummary {
  pub fn dimension(&self, table: DimensionTable) -> MergeStats {
    self
      .dimensions
      .iter()
      .find(|o| o.table == table)
      .map(|o| o.stats)
      .unwrap_or_default()
  }

  pub fn fact(&self, table: FactTable) -> FactStats {
    self
      .facts
      .iter()
      .find(|o| o.table == table)
      .map(|o| o.stats)
      .unwrap_or_default()
  }

  /// Dimension rows overwritten because their fingerprint changed.
  pub fn dimension_overwrites(&self) -> usize {
    self.dimensions.iter().map(|o| o.stats.updated).sum()
  }
}
