//! [`SqliteStore`]: the SQLite implementation of [`WarehouseStore`] and
//! [`KeyStore`].

use std::{collections::HashMap, path::Path};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, types::Value};

use profdim_core::{
  row::{Attributes, DimensionRow, FactKey, FactRow, Fingerprint, NaturalKey, SurrogateKey},
  run::RunSummary,
  store::{KeyStore, WarehouseStore},
  table::{DimensionTable, FactTable, Table},
};

use crate::{
  Result,
  encode::{
    RawRow, dimension_params, encode_dt, encode_uuid, fact_insert_params,
    fact_update_params,
  },
  schema::{dimension_columns, fact_key_columns, fact_value_columns, schema},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A dimensional warehouse backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    let sql = schema();
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a parameterless query and collect every row as raw values.
  async fn select_all(&self, sql: String) -> Result<Vec<RawRow>> {
    let rows: Vec<Vec<Value>> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let width = stmt.column_count();
        let rows = stmt
          .query_map([], |row| {
            (0..width)
              .map(|i| row.get::<_, Value>(i))
              .collect::<rusqlite::Result<Vec<_>>>()
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(rows.into_iter().map(RawRow::new).collect())
  }
}

fn placeholders(n: usize) -> String { vec!["?"; n].join(", ") }

// ─── KeyStore impl ───────────────────────────────────────────────────────────

impl KeyStore for SqliteStore {
  type Error = crate::Error;

  async fn has_state(&self) -> Result<bool> {
    let exists = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT EXISTS(SELECT 1 FROM surrogate_keys)", [], |r| {
          r.get::<_, bool>(0)
        })?)
      })
      .await?;
    Ok(exists)
  }

  async fn load_keys(&self, table: DimensionTable) -> Result<Vec<(NaturalKey, SurrogateKey)>> {
    let raws: Vec<(String, i64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT natural_key, surrogate_id FROM surrogate_keys
           WHERE dimension = ?1 ORDER BY surrogate_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![table.name()], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(nk, id)| Ok((NaturalKey::decode(&nk)?, SurrogateKey(id))))
      .collect()
  }

  async fn reserve_keys(
    &self,
    table: DimensionTable,
    keys: &[(NaturalKey, SurrogateKey)],
  ) -> Result<()> {
    if keys.is_empty() {
      return Ok(());
    }

    let assigned_at = encode_dt(Utc::now());
    let encoded: Vec<(String, i64)> = keys.iter().map(|(nk, id)| (nk.encode(), id.0)).collect();
    let reserved = encoded.len();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO surrogate_keys (dimension, natural_key, surrogate_id, assigned_at)
             VALUES (?1, ?2, ?3, ?4)",
          )?;
          for (nk, id) in &encoded {
            stmt.execute(rusqlite::params![table.name(), nk, id, assigned_at])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::debug!(dimension = %table, reserved, "reserved surrogate keys");
    Ok(())
  }
}

// ─── WarehouseStore impl ─────────────────────────────────────────────────────

impl WarehouseStore for SqliteStore {
  type Error = crate::Error;

  async fn truncate(&self, table: Table) -> Result<()> {
    let sql = format!("DELETE FROM {}", table.name());
    let removed = self
      .conn
      .call(move |conn| Ok(conn.execute(&sql, [])?))
      .await?;
    tracing::debug!(table = table.name(), removed, "truncated table");
    Ok(())
  }

  // ── Dimensions ────────────────────────────────────────────────────────────

  async fn dimension_fingerprints(
    &self,
    table: DimensionTable,
  ) -> Result<HashMap<SurrogateKey, Fingerprint>> {
    let sql = format!("SELECT {}, fingerprint FROM {}", table.id_column(), table.name());
    let pairs: Vec<(i64, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      pairs
        .into_iter()
        .map(|(id, fp)| (SurrogateKey(id), Fingerprint(fp)))
        .collect(),
    )
  }

  async fn write_dimension(&self, table: DimensionTable, rows: &[DimensionRow]) -> Result<()> {
    if rows.is_empty() {
      return Ok(());
    }

    let columns = dimension_columns(table);
    let updates = columns[1..]
      .iter()
      .map(|c| format!("{c} = excluded.{c}"))
      .collect::<Vec<_>>()
      .join(", ");
    let sql = format!(
      "INSERT INTO {name} ({cols}) VALUES ({params})
       ON CONFLICT ({id}) DO UPDATE SET {updates}",
      name = table.name(),
      cols = columns.join(", "),
      params = placeholders(columns.len()),
      id = table.id_column(),
    );
    let params: Vec<Vec<Value>> = rows.iter().map(|r| dimension_params(table, r)).collect();
    let written = params.len();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(&sql)?;
          for row in params {
            stmt.execute(rusqlite::params_from_iter(row))?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::debug!(dimension = %table, written, "wrote dimension rows");
    Ok(())
  }

  async fn dimension_rows(&self, table: DimensionTable) -> Result<Vec<DimensionRow>> {
    let sql = format!(
      "SELECT {} FROM {} ORDER BY {}",
      dimension_columns(table).join(", "),
      table.name(),
      table.id_column(),
    );
    self
      .select_all(sql)
      .await?
      .into_iter()
      .map(|raw| raw.into_dimension(table))
      .collect()
  }

  // ── Facts ─────────────────────────────────────────────────────────────────

  async fn existing_facts(&self, table: FactTable) -> Result<HashMap<FactKey, Attributes>> {
    let sql = format!(
      "SELECT {} FROM {}",
      fact_value_columns(table).join(", "),
      table.name(),
    );
    self
      .select_all(sql)
      .await?
      .into_iter()
      .map(|raw| raw.into_fact_entry(table))
      .collect()
  }

  async fn write_facts(
    &self,
    table: FactTable,
    inserts: &[FactRow],
    updates: &[FactRow],
  ) -> Result<()> {
    if inserts.is_empty() && updates.is_empty() {
      return Ok(());
    }

    let mut insert_columns = fact_value_columns(table);
    insert_columns.push("loaded_at");
    let insert_sql = format!(
      "INSERT INTO {} ({}) VALUES ({})",
      table.name(),
      insert_columns.join(", "),
      placeholders(insert_columns.len()),
    );

    let set_list = table
      .attribute_columns()
      .iter()
      .map(|c| c.name)
      .chain(["loaded_at"])
      .map(|c| format!("{c} = ?"))
      .collect::<Vec<_>>()
      .join(", ");
    // `IS` so that NULL key components still match.
    let where_list = fact_key_columns(table)
      .iter()
      .map(|c| format!("{c} IS ?"))
      .collect::<Vec<_>>()
      .join(" AND ");
    let update_sql = format!("UPDATE {} SET {set_list} WHERE {where_list}", table.name());

    let insert_params: Vec<Vec<Value>> =
      inserts.iter().map(|r| fact_insert_params(table, r)).collect();
    let update_params: Vec<Vec<Value>> =
      updates.iter().map(|r| fact_update_params(table, r)).collect();
    let (inserted, updated) = (insert_params.len(), update_params.len());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut insert = tx.prepare(&insert_sql)?;
          for row in insert_params {
            insert.execute(rusqlite::params_from_iter(row))?;
          }
          let mut update = tx.prepare(&update_sql)?;
          for row in update_params {
            update.execute(rusqlite::params_from_iter(row))?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::debug!(fact = %table, inserted, updated, "wrote fact rows");
    Ok(())
  }

  async fn fact_rows(&self, table: FactTable) -> Result<Vec<FactRow>> {
    let sql = format!(
      "SELECT {}, loaded_at FROM {} ORDER BY rowid",
      fact_value_columns(table).join(", "),
      table.name(),
    );
    self
      .select_all(sql)
      .await?
      .into_iter()
      .map(|raw| raw.into_fact(table))
      .collect()
  }

  // ── Bookkeeping ───────────────────────────────────────────────────────────

  async fn count(&self, table: Table) -> Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", table.name());
    let n: i64 = self
      .conn
      .call(move |conn| Ok(conn.query_row(&sql, [], |r| r.get(0))?))
      .await?;
    Ok(u64::try_from(n).unwrap_or_default())
  }

  async fn record_run(&self, summary: &RunSummary) -> Result<()> {
    let run_id = encode_uuid(summary.run_id);
    let mode = summary.mode.to_string();
    let started_at = encode_dt(summary.started_at);
    let finished_at = encode_dt(summary.finished_at);
    let summary_json = serde_json::to_string(summary)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO load_runs (run_id, mode, started_at, finished_at, summary_json)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![run_id, mode, started_at, finished_at, summary_json],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn last_run(&self) -> Result<Option<RunSummary>> {
    let raw: Option<String> = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              "SELECT summary_json FROM load_runs
               ORDER BY finished_at DESC, rowid DESC LIMIT 1",
              [],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    let Some(json) = raw else {
      return Ok(None);
    };
    Ok(Some(serde_json::from_str(&json)?))
  }
}
