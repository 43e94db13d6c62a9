//! The load orchestrator: one run, end to end.

use std::{collections::HashSet, path::Path};

use chrono::{DateTime, Utc};
use profdim_core::{
  record::Batch,
  row::{Candidates, NaturalKey},
  run::{DimensionOutcome, FactOutcome, LoadMode, ModeSelection, RunSummary},
  store::{KeyStore, WarehouseStore},
  table::{DimensionTable, FactTable, Table},
};
use uuid::Uuid;

use crate::{Error, Result, facts::load_facts, merge::merge_dimension, resolve::KeyResolver};

/// Drives a single load against a warehouse and its key mapping.
///
/// ```text
/// flatten → check references → select mode → [truncate] → dimensions → facts → record run
/// ```
///
/// Runs against the same store must be serialized by the caller.
pub struct Orchestrator<'s, S, K> {
  store: &'s S,
  keys:  &'s K,
  mode:  ModeSelection,
  clock: Option<DateTime<Utc>>,
}

impl<'s, S, K> Orchestrator<'s, S, K>
where
  S: WarehouseStore,
  K: KeyStore,
{
  pub fn new(store: &'s S, keys: &'s K) -> Self {
    Self { store, keys, mode: ModeSelection::Auto, clock: None }
  }

  pub fn with_mode(mut self, mode: ModeSelection) -> Self {
    self.mode = mode;
    self
  }

  /// Fix the run timestamp instead of reading the system clock.
  pub fn with_clock(mut self, run_at: DateTime<Utc>) -> Self {
    self.clock = Some(run_at);
    self
  }

  /// Extract `json` and load it. Invalid input fails before any write.
  pub async fn run_document(&self, json: &str) -> Result<RunSummary> {
    let batch = profdim_extract::extract(json)?;
    self.run(&batch).await
  }

  /// Read and extract the document at `path`, then load it.
  pub async fn run_file(&self, path: impl AsRef<Path>) -> Result<RunSummary> {
    let batch = profdim_extract::extract_file(path)?;
    self.run(&batch).await
  }

  pub async fn run(&self, batch: &Batch) -> Result<RunSummary> {
    let run_id = Uuid::new_v4();
    let started_at = self.clock.unwrap_or_else(Utc::now);

    let candidates = profdim_extract::flatten_batch(batch);
    check_references(&candidates)?;

    let has_state = self.keys.has_state().await.map_err(|e| Error::Store(Box::new(e)))?;
    let mode = self.mode.resolve(has_state);
    tracing::info!(%run_id, %mode, records = batch.len(), "starting load");

    if mode == LoadMode::Full {
      self.truncate_all().await?;
    }

    let mut resolver = KeyResolver::load(self.keys).await?;

    let mut dimensions = Vec::with_capacity(DimensionTable::ALL.len());
    for table in DimensionTable::ALL {
      let stats = merge_dimension(
        self.store,
        self.keys,
        &mut resolver,
        table,
        candidates.dimensions(table),
        started_at,
      )
      .await?;
      dimensions.push(DimensionOutcome { table, stats });
    }

    let mut facts = Vec::with_capacity(FactTable::ALL.len());
    for table in FactTable::ALL {
      let stats =
        load_facts(self.store, &resolver, table, candidates.facts(table), mode, started_at)
          .await?;
      facts.push(FactOutcome { table, stats });
    }

    let summary = RunSummary {
      run_id,
      mode,
      started_at,
      finished_at: self.clock.unwrap_or_else(Utc::now),
      records: batch.len(),
      dimensions,
      facts,
    };
    self
      .store
      .record_run(&summary)
      .await
      .map_err(|e| Error::Store(Box::new(e)))?;

    tracing::info!(
      %run_id,
      %mode,
      overwrites = summary.dimension_overwrites(),
      "load complete"
    );
    Ok(summary)
  }

  /// Facts first, so no dimension row is removed while still referenced. The
  /// key mapping is left intact.
  async fn truncate_all(&self) -> Result<()> {
    let facts = FactTable::ALL.into_iter().map(Table::Fact);
    let dimensions = DimensionTable::ALL.into_iter().map(Table::Dimension);
    for table in facts.chain(dimensions) {
      self
        .store
        .truncate(table)
        .await
        .map_err(|e| Error::Store(Box::new(e)))?;
    }
    tracing::info!("truncated target tables for full refresh");
    Ok(())
  }
}

/// Every natural key a fact refers to must belong to a dimension candidate of
/// the same batch.
fn check_references(candidates: &Candidates) -> Result<()> {
  let known: HashSet<(DimensionTable, &NaturalKey)> = candidates
    .dimensions
    .iter()
    .map(|d| (d.table, &d.natural_key))
    .collect();

  let missing = |dimension: DimensionTable, natural_key: &NaturalKey| Error::Referential {
    dimension,
    natural_key: natural_key.clone(),
  };

  for fact in &candidates.facts {
    if !known.contains(&(DimensionTable::Professional, &fact.professional)) {
      return Err(missing(DimensionTable::Professional, &fact.professional));
    }
    let Some(dimension) = fact.table.dimension() else {
      continue;
    };
    match &fact.dimension {
      Some(key) if known.contains(&(dimension, key)) => {}
      Some(key) => return Err(missing(dimension, key)),
      None => return Err(missing(dimension, &NaturalKey::new(Vec::<String>::new()))),
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use profdim_core::row::{Attributes, DimensionCandidate, FactCandidate};

  use super::*;

  fn professional(email: &str) -> DimensionCandidate {
    DimensionCandidate {
      table:       DimensionTable::Professional,
      natural_key: NaturalKey::new([email]),
      attributes:  Attributes::new(),
    }
  }

  fn cert_fact(email: &str, cert: Option<&str>) -> FactCandidate {
    FactCandidate {
      table:        FactTable::Certification,
      professional: NaturalKey::new([email]),
      dimension:    cert.map(|c| NaturalKey::new([c])),
      key:          Attributes::new(),
      attributes:   Attributes::new(),
    }
  }

  #[test]
  fn references_within_batch_pass() {
    let candidates = Candidates {
      dimensions: vec![professional("a@x.com"), DimensionCandidate {
        table:       DimensionTable::Certification,
        natural_key: NaturalKey::new(["aws"]),
        attributes:  Attributes::new(),
      }],
      facts:      vec![cert_fact("a@x.com", Some("aws"))],
    };
    assert!(check_references(&candidates).is_ok());
  }

  #[test]
  fn unknown_catalog_reference_is_referential_error() {
    let candidates = Candidates {
      dimensions: vec![professional("a@x.com")],
      facts:      vec![cert_fact("a@x.com", Some("aws"))],
    };
    let err = check_references(&candidates).unwrap_err();
    assert!(matches!(
      err,
      Error::Referential { dimension: DimensionTable::Certification, .. }
    ));
  }

  #[test]
  fn unknown_owner_is_referential_error() {
    let candidates = Candidates {
      dimensions: vec![professional("a@x.com")],
      facts:      vec![cert_fact("b@x.com", None)],
    };
    let err = check_references(&candidates).unwrap_err();
    assert!(matches!(
      err,
      Error::Referential { dimension: DimensionTable::Professional, .. }
    ));
  }
}
