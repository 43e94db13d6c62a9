//! Fact loading.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use profdim_core::{
  row::{FactCandidate, FactKey, FactRow, NaturalKey, SurrogateKey},
  run::{FactStats, LoadMode},
  store::WarehouseStore,
  table::{ConflictPolicy, DimensionTable, FactTable},
};

use crate::{Error, Result, resolve::KeyResolver};

fn lookup(
  resolver: &KeyResolver,
  dimension: DimensionTable,
  natural_key: Option<&NaturalKey>,
) -> Result<SurrogateKey> {
  let missing = || Error::Referential {
    dimension,
    natural_key: natural_key.cloned().unwrap_or_else(|| NaturalKey::new(Vec::<String>::new())),
  };
  let natural_key = natural_key.ok_or_else(missing)?;
  resolver.lookup(dimension, natural_key).ok_or_else(missing)
}

fn to_row(
  resolver: &KeyResolver,
  table: FactTable,
  candidate: &FactCandidate,
  run_at: DateTime<Utc>,
) -> Result<FactRow> {
  let professional_id =
    lookup(resolver, DimensionTable::Professional, Some(&candidate.professional))?;
  let dimension_id = table
    .dimension()
    .map(|dim| lookup(resolver, dim, candidate.dimension.as_ref()))
    .transpose()?;
  Ok(FactRow {
    professional_id,
    dimension_id,
    key: candidate.key.clone(),
    attributes: candidate.attributes.clone(),
    loaded_at: run_at,
  })
}

/// Load `candidates` into `table`.
///
/// Every referenced dimension key must already be resolved. Candidates
/// repeating a fact-level key within the batch collapse to one row: the first
/// for immutable facts, the last for overwrite facts. In incremental mode rows
/// already stored are skipped, or updated in place when the table's policy is
/// [`ConflictPolicy::Overwrite`] and their attributes differ.
pub async fn load_facts<'a, S: WarehouseStore>(
  store: &S,
  resolver: &KeyResolver,
  table: FactTable,
  candidates: impl IntoIterator<Item = &'a FactCandidate>,
  mode: LoadMode,
  run_at: DateTime<Utc>,
) -> Result<FactStats> {
  let policy = table.conflict_policy();
  let mut stats = FactStats::default();

  let mut rows: Vec<FactRow> = Vec::new();
  let mut index: HashMap<FactKey, usize> = HashMap::new();
  for candidate in candidates {
    let row = to_row(resolver, table, candidate, run_at)?;
    let fact_key = row.fact_key(table);
    match index.get(&fact_key) {
      Some(&i) => {
        stats.skipped += 1;
        if policy == ConflictPolicy::Overwrite {
          rows[i] = row;
        }
      }
      None => {
        index.insert(fact_key, rows.len());
        rows.push(row);
      }
    }
  }

  let existing = match mode {
    LoadMode::Full => HashMap::new(),
    LoadMode::Incremental => store
      .existing_facts(table)
      .await
      .map_err(|e| Error::Store(Box::new(e)))?,
  };

  let mut inserts = Vec::new();
  let mut updates = Vec::new();
  for row in rows {
    match (existing.get(&row.fact_key(table)), policy) {
      (None, _) => inserts.push(row),
      (Some(stored), ConflictPolicy::Overwrite) if *stored != row.attributes => updates.push(row),
      (Some(_), _) => stats.skipped += 1,
    }
  }
  stats.inserted = inserts.len();
  stats.updated = updates.len();

  store
    .write_facts(table, &inserts, &updates)
    .await
    .map_err(|e| Error::Store(Box::new(e)))?;

  tracing::info!(
    fact = %table,
    inserted = stats.inserted,
    updated = stats.updated,
    skipped = stats.skipped,
    "loaded facts"
  );
  Ok(stats)
}
