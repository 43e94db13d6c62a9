//! In-memory [`KeyStore`], for tests and dry runs.

use std::{
  collections::HashMap,
  sync::{Mutex, PoisonError},
};

use profdim_core::{
  row::{NaturalKey, SurrogateKey},
  store::KeyStore,
  table::DimensionTable,
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{dimension}: natural key {natural_key} is already mapped")]
pub struct DuplicateKey {
  pub dimension:   DimensionTable,
  pub natural_key: NaturalKey,
}

#[derive(Debug, Default)]
pub struct MemoryKeyStore {
  keys: Mutex<HashMap<DimensionTable, Vec<(NaturalKey, SurrogateKey)>>>,
}

impl MemoryKeyStore {
  pub fn new() -> Self { Self::default() }

  fn with_keys<T>(
    &self,
    f: impl FnOnce(&mut HashMap<DimensionTable, Vec<(NaturalKey, SurrogateKey)>>) -> T,
  ) -> T {
    let mut guard = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard)
  }
}

impl KeyStore for MemoryKeyStore {
  type Error = DuplicateKey;

  async fn has_state(&self) -> Result<bool, DuplicateKey> {
    Ok(self.with_keys(|keys| keys.values().any(|v| !v.is_empty())))
  }

  async fn load_keys(
    &self,
    table: DimensionTable,
  ) -> Result<Vec<(NaturalKey, SurrogateKey)>, DuplicateKey> {
    Ok(self.with_keys(|keys| keys.get(&table).cloned().unwrap_or_default()))
  }

  async fn reserve_keys(
    &self,
    table: DimensionTable,
    new: &[(NaturalKey, SurrogateKey)],
  ) -> Result<(), DuplicateKey> {
    self.with_keys(|keys| {
      let entries = keys.entry(table).or_default();
      if let Some((nk, _)) = new.iter().find(|(nk, _)| entries.iter().any(|(e, _)| e == nk)) {
        return Err(DuplicateKey { dimension: table, natural_key: nk.clone() });
      }
      entries.extend_from_slice(new);
      Ok(())
    })
  }
}
