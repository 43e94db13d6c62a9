//! The `WarehouseStore` and `KeyStore` traits.
//!
//! Both are implemented by storage backends (e.g. `profdim-store-sqlite`).
//! The load pipeline depends on these abstractions, not on a concrete backend,
//! so tests can substitute an in-memory key mapping.

use std::{collections::HashMap, future::Future};

use crate::{
  row::{Attributes, DimensionRow, FactKey, FactRow, Fingerprint, NaturalKey, SurrogateKey},
  run::RunSummary,
  table::{DimensionTable, FactTable, Table},
};

// ─── Key mapping ─────────────────────────────────────────────────────────────

/// Persistent natural-key → surrogate-key mapping, one namespace per
/// dimension table.
///
/// Entries are append-only: once reserved, a mapping is never changed or
/// removed.
pub trait KeyStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Whether any key has ever been reserved. This is the prior-run state that
  /// selects incremental mode.
  fn has_state(&self) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Every mapping known for `table`.
  fn load_keys(
    &self,
    table: DimensionTable,
  ) -> impl Future<Output = Result<Vec<(NaturalKey, SurrogateKey)>, Self::Error>> + Send + '_;

  /// Persist newly allocated mappings. Re-reserving an existing natural key is
  /// an error.
  fn reserve_keys<'a>(
    &'a self,
    table: DimensionTable,
    keys: &'a [(NaturalKey, SurrogateKey)],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

// ─── Target tables ───────────────────────────────────────────────────────────

/// The physical target of a load.
///
/// Every write method covers exactly one table and is atomic: it either
/// commits all of its rows or none.
pub trait WarehouseStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Remove every row from `table`.
  fn truncate(&self, table: Table) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Dimensions ────────────────────────────────────────────────────────

  /// Stored fingerprint for every row of `table`.
  fn dimension_fingerprints(
    &self,
    table: DimensionTable,
  ) -> impl Future<Output = Result<HashMap<SurrogateKey, Fingerprint>, Self::Error>> + Send + '_;

  /// Insert or overwrite rows, keyed by surrogate key.
  fn write_dimension<'a>(
    &'a self,
    table: DimensionTable,
    rows: &'a [DimensionRow],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// All rows of `table`, ordered by surrogate key.
  fn dimension_rows(
    &self,
    table: DimensionTable,
  ) -> impl Future<Output = Result<Vec<DimensionRow>, Self::Error>> + Send + '_;

  // ── Facts ─────────────────────────────────────────────────────────────

  /// Fact-level key and current attributes of every row of `table`.
  fn existing_facts(
    &self,
    table: FactTable,
  ) -> impl Future<Output = Result<HashMap<FactKey, Attributes>, Self::Error>> + Send + '_;

  /// Insert new rows and overwrite the attribute columns of `updates`
  /// (matched on their fact-level key).
  fn write_facts<'a>(
    &'a self,
    table: FactTable,
    inserts: &'a [FactRow],
    updates: &'a [FactRow],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// All rows of `table`, in insertion order.
  fn fact_rows(
    &self,
    table: FactTable,
  ) -> impl Future<Output = Result<Vec<FactRow>, Self::Error>> + Send + '_;

  // ── Bookkeeping ───────────────────────────────────────────────────────

  fn count(&self, table: Table) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Record a completed run.
  fn record_run<'a>(
    &'a self,
    summary: &'a RunSummary,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// The most recently finished run, if any.
  fn last_run(&self) -> impl Future<Output = Result<Option<RunSummary>, Self::Error>> + Send + '_;
}
