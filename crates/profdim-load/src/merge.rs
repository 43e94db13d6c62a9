//! Type-1 dimension merge: insert new rows, overwrite changed ones, skip the
//! rest.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use profdim_core::{
  row::{DimensionCandidate, DimensionRow, NaturalKey},
  run::MergeStats,
  store::{KeyStore, WarehouseStore},
  table::DimensionTable,
};

use crate::{
  Error, Result,
  detect::{ChangeDetector, ChangeKind},
  resolve::KeyResolver,
};

/// Collapse candidates sharing a natural key. The last occurrence supplies the
/// attributes; the first occurrence fixes the position.
fn dedup<'a>(
  candidates: impl IntoIterator<Item = &'a DimensionCandidate>,
) -> Vec<&'a DimensionCandidate> {
  let mut order: Vec<&DimensionCandidate> = Vec::new();
  let mut index: HashMap<&NaturalKey, usize> = HashMap::new();
  for candidate in candidates {
    match index.get(&candidate.natural_key) {
      Some(&i) => order[i] = candidate,
      None => {
        index.insert(&candidate.natural_key, order.len());
        order.push(candidate);
      }
    }
  }
  order
}

/// Merge `candidates` into `table`.
///
/// Keys are resolved and any new reservations persisted before the rows are
/// written, so every stored row's surrogate key is in the key mapping. New and
/// changed rows are written in one transaction.
pub async fn merge_dimension<'a, S, K>(
  store: &S,
  keys: &K,
  resolver: &mut KeyResolver,
  table: DimensionTable,
  candidates: impl IntoIterator<Item = &'a DimensionCandidate>,
  run_at: DateTime<Utc>,
) -> Result<MergeStats>
where
  S: WarehouseStore,
  K: KeyStore,
{
  let candidates = dedup(candidates);
  let resolved: Vec<_> = candidates
    .into_iter()
    .map(|c| (resolver.resolve(table, &c.natural_key), c))
    .collect();
  resolver.flush(table, keys).await?;

  let stored = store
    .dimension_fingerprints(table)
    .await
    .map_err(|e| Error::Store(Box::new(e)))?;
  let detector = ChangeDetector::new(stored);

  let mut stats = MergeStats::default();
  let mut rows = Vec::new();
  for (id, candidate) in resolved {
    let verdict = detector.classify(id, &candidate.attributes);
    match verdict.kind {
      ChangeKind::Unchanged => {
        stats.unchanged += 1;
        continue;
      }
      ChangeKind::New => stats.inserted += 1,
      ChangeKind::Changed => {
        tracing::debug!(dimension = %table, %id, natural_key = %candidate.natural_key, "attributes changed");
        stats.updated += 1;
      }
    }
    rows.push(DimensionRow {
      id,
      natural_key: candidate.natural_key.clone(),
      attributes: candidate.attributes.clone(),
      fingerprint: verdict.fingerprint,
      last_updated: run_at,
    });
  }

  store
    .write_dimension(table, &rows)
    .await
    .map_err(|e| Error::Store(Box::new(e)))?;

  tracing::info!(
    dimension = %table,
    inserted = stats.inserted,
    updated = stats.updated,
    unchanged = stats.unchanged,
    "merged dimension"
  );
  Ok(stats)
}
