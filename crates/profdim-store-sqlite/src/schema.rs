//! SQL schema for the profdim SQLite store.
//!
//! The target tables are generated from the column catalog in
//! [`profdim_core::table`], so the DDL and the DML in `store.rs` can never
//! disagree about column order. Executed once at connection startup; every
//! statement is idempotent.

use profdim_core::table::{ColumnType, DimensionTable, FactTable};

const PRELUDE: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

const BOOKKEEPING: &str = "
-- Natural key -> surrogate key, per dimension. Append-only.
CREATE TABLE IF NOT EXISTS surrogate_keys (
    dimension    TEXT    NOT NULL,
    natural_key  TEXT    NOT NULL,   -- components joined with U+001F
    surrogate_id INTEGER NOT NULL,
    assigned_at  TEXT    NOT NULL,
    PRIMARY KEY (dimension, natural_key),
    UNIQUE (dimension, surrogate_id)
);

-- One row per completed run; the newest row is the watermark.
CREATE TABLE IF NOT EXISTS load_runs (
    run_id       TEXT PRIMARY KEY,
    mode         TEXT NOT NULL,      -- 'full' | 'incremental'
    started_at   TEXT NOT NULL,
    finished_at  TEXT NOT NULL,
    summary_json TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS load_runs_finished_idx ON load_runs(finished_at);

PRAGMA user_version = 1;
";

/// Full schema DDL.
pub fn schema() -> String {
  let mut sql = String::from(PRELUDE);
  for table in DimensionTable::ALL {
    sql.push_str(&dimension_ddl(table));
  }
  for table in FactTable::ALL {
    sql.push_str(&fact_ddl(table));
  }
  sql.push_str(BOOKKEEPING);
  sql
}

fn sql_type(ty: ColumnType) -> &'static str {
  match ty {
    ColumnType::Integer | ColumnType::Boolean => "INTEGER",
    ColumnType::Text | ColumnType::Date => "TEXT",
  }
}

fn dimension_ddl(table: DimensionTable) -> String {
  let attributes: String = table
    .attribute_columns()
    .iter()
    .map(|c| format!("    {} {},\n", c.name, sql_type(c.ty)))
    .collect();

  format!(
    "
CREATE TABLE IF NOT EXISTS {name} (
    {id} INTEGER PRIMARY KEY,
    natural_key TEXT NOT NULL UNIQUE,
{attributes}    fingerprint TEXT NOT NULL,
    last_updated TEXT NOT NULL
);
",
    name = table.name(),
    id = table.id_column(),
  )
}

fn fact_ddl(table: FactTable) -> String {
  let professional = DimensionTable::Professional;
  let mut lines = vec![format!(
    "{} INTEGER NOT NULL REFERENCES {}({})",
    professional.id_column(),
    professional.name(),
    professional.id_column(),
  )];
  if let Some(dim) = table.dimension() {
    lines.push(format!(
      "{} INTEGER NOT NULL REFERENCES {}({})",
      dim.id_column(),
      dim.name(),
      dim.id_column(),
    ));
  }
  for c in table.key_columns().iter().chain(table.attribute_columns()) {
    lines.push(format!("{} {}", c.name, sql_type(c.ty)));
  }
  lines.push("loaded_at TEXT NOT NULL".into());

  let unique = fact_key_columns(table).join(", ");
  lines.push(format!("UNIQUE ({unique})"));

  format!(
    "
CREATE TABLE IF NOT EXISTS {name} (
    {body}
);
CREATE INDEX IF NOT EXISTS {name}_professional_idx ON {name}({fk});
",
    name = table.name(),
    body = lines.join(",\n    "),
    fk = professional.id_column(),
  )
}

// ─── Column lists shared with the DML ────────────────────────────────────────

/// Dimension columns in storage order.
pub fn dimension_columns(table: DimensionTable) -> Vec<&'static str> {
  let mut cols = vec![table.id_column(), "natural_key"];
  cols.extend(table.attribute_columns().iter().map(|c| c.name));
  cols.extend(["fingerprint", "last_updated"]);
  cols
}

/// Foreign keys followed by key columns: the fact-level natural key.
pub fn fact_key_columns(table: FactTable) -> Vec<&'static str> {
  let mut cols = vec![DimensionTable::Professional.id_column()];
  cols.extend(table.dimension().map(DimensionTable::id_column));
  cols.extend(table.key_columns().iter().map(|c| c.name));
  cols
}

/// Every fact column except `loaded_at`, in storage order.
pub fn fact_value_columns(table: FactTable) -> Vec<&'static str> {
  let mut cols = fact_key_columns(table);
  cols.extend(table.attribute_columns().iter().map(|c| c.name));
  cols
}
