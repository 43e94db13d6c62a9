//! Natural key → surrogate key resolution.

use std::collections::HashMap;

use profdim_core::{
  row::{NaturalKey, SurrogateKey},
  store::KeyStore,
  table::DimensionTable,
};

use crate::{Error, Result};

#[derive(Debug)]
struct TableKeys {
  known:   HashMap<NaturalKey, SurrogateKey>,
  /// Allocated this run, not yet persisted.
  pending: Vec<(NaturalKey, SurrogateKey)>,
  next:    i64,
}

impl TableKeys {
  fn from_entries(entries: Vec<(NaturalKey, SurrogateKey)>) -> Self {
    let next = entries.iter().map(|(_, id)| id.0).max().unwrap_or(0) + 1;
    Self { known: entries.into_iter().collect(), pending: Vec::new(), next }
  }

  fn resolve(&mut self, key: &NaturalKey) -> SurrogateKey {
    if let Some(id) = self.known.get(key) {
      return *id;
    }
    let id = SurrogateKey(self.next);
    self.next += 1;
    self.known.insert(key.clone(), id);
    self.pending.push((key.clone(), id));
    id
  }
}

/// Run-scoped view of the persisted key mapping.
///
/// Loaded once at the start of a run. New natural keys get `max + 1`
/// (starting at 1) and stay pending until [`flush`](Self::flush).
#[derive(Debug, Default)]
pub struct KeyResolver {
  tables: HashMap<DimensionTable, TableKeys>,
}

impl KeyResolver {
  pub async fn load<K: KeyStore>(keys: &K) -> Result<Self> {
    let mut tables = HashMap::new();
    for table in DimensionTable::ALL {
      let entries = keys.load_keys(table).await.map_err(|e| Error::Store(Box::new(e)))?;
      tables.insert(table, TableKeys::from_entries(entries));
    }
    Ok(Self { tables })
  }

  /// The surrogate key for `key`, allocating one if it has never been seen.
  pub fn resolve(&mut self, table: DimensionTable, key: &NaturalKey) -> SurrogateKey {
    self
      .tables
      .entry(table)
      .or_insert_with(|| TableKeys::from_entries(Vec::new()))
      .resolve(key)
  }

  /// The surrogate key for `key` if it is known. Never allocates.
  pub fn lookup(&self, table: DimensionTable, key: &NaturalKey) -> Option<SurrogateKey> {
    self.tables.get(&table)?.known.get(key).copied()
  }

  pub fn pending(&self, table: DimensionTable) -> &[(NaturalKey, SurrogateKey)] {
    self.tables.get(&table).map(|t| t.pending.as_slice()).unwrap_or_default()
  }

  /// Persist the pending reservations of `table`. Returns how many were
  /// written; on failure they stay pending.
  pub async fn flush<K: KeyStore>(&mut self, table: DimensionTable, keys: &K) -> Result<usize> {
    let Some(entry) = self.tables.get_mut(&table) else {
      return Ok(0);
    };
    if entry.pending.is_empty() {
      return Ok(0);
    }
    keys
      .reserve_keys(table, &entry.pending)
      .await
      .map_err(|e| Error::Store(Box::new(e)))?;
    let reserved = std::mem::take(&mut entry.pending).len();
    tracing::debug!(dimension = %table, reserved, "flushed key reservations");
    Ok(reserved)
  }
}
