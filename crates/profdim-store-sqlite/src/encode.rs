//! Encoding and decoding helpers between profdim row types and SQLite values.
//!
//! Timestamps are stored as RFC 3339 strings, dates as `YYYY-MM-DD`, booleans
//! as 0/1 integers, natural keys in their joined single-string form.

use chrono::{DateTime, NaiveDate, Utc};
use profdim_core::{
  row::{
    AttrValue, Attributes, DimensionRow, FactKey, FactRow, Fingerprint, NaturalKey,
    SurrogateKey, project,
  },
  table::{Column, ColumnType, DimensionTable, FactTable},
};
use rusqlite::types::Value;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_value(v: &AttrValue) -> Value {
  match v {
    AttrValue::Null => Value::Null,
    AttrValue::Integer(i) => Value::Integer(*i),
    AttrValue::Text(s) => Value::Text(s.clone()),
    AttrValue::Date(d) => Value::Text(encode_date(*d)),
    AttrValue::Boolean(b) => Value::Integer(i64::from(*b)),
  }
}

pub fn decode_value(column: &Column, v: Value) -> Result<AttrValue> {
  match (column.ty, v) {
    (_, Value::Null) => Ok(AttrValue::Null),
    (ColumnType::Integer, Value::Integer(i)) => Ok(AttrValue::Integer(i)),
    (ColumnType::Text, Value::Text(s)) => Ok(AttrValue::Text(s)),
    (ColumnType::Date, Value::Text(s)) => decode_date(&s).map(AttrValue::Date),
    (ColumnType::Boolean, Value::Integer(i)) => Ok(AttrValue::Boolean(i != 0)),
    (_, other) => Err(Error::Decode {
      column: column.name,
      reason: format!("unexpected {} value", other.data_type()),
    }),
  }
}

fn encode_projection(attributes: &Attributes, columns: &[Column]) -> Vec<Value> {
  project(attributes, columns).iter().map(encode_value).collect()
}

// ─── Parameter rows ──────────────────────────────────────────────────────────

/// Parameters in `schema::dimension_columns` order.
pub fn dimension_params(table: DimensionTable, row: &DimensionRow) -> Vec<Value> {
  let mut params = vec![Value::Integer(row.id.0), Value::Text(row.natural_key.encode())];
  params.extend(encode_projection(&row.attributes, table.attribute_columns()));
  params.push(Value::Text(row.fingerprint.0.clone()));
  params.push(Value::Text(encode_dt(row.last_updated)));
  params
}

/// Parameters in `schema::fact_key_columns` order.
pub fn fact_key_params(table: FactTable, row: &FactRow) -> Vec<Value> {
  let mut params = vec![Value::Integer(row.professional_id.0)];
  params.extend(row.dimension_id.map(|id| Value::Integer(id.0)));
  params.extend(encode_projection(&row.key, table.key_columns()));
  params
}

/// Parameters in `schema::fact_value_columns` order, then `loaded_at`.
pub fn fact_insert_params(table: FactTable, row: &FactRow) -> Vec<Value> {
  let mut params = fact_key_params(table, row);
  params.extend(encode_projection(&row.attributes, table.attribute_columns()));
  params.push(Value::Text(encode_dt(row.loaded_at)));
  params
}

/// Attribute values and `loaded_at` (the SET list) followed by the key (the
/// WHERE list).
pub fn fact_update_params(table: FactTable, row: &FactRow) -> Vec<Value> {
  let mut params = encode_projection(&row.attributes, table.attribute_columns());
  params.push(Value::Text(encode_dt(row.loaded_at)));
  params.extend(fact_key_params(table, row));
  params
}

// ─── Row decoding ────────────────────────────────────────────────────────────

/// Raw values read directly from one SQLite row, consumed left to right.
pub struct RawRow {
  values: std::vec::IntoIter<Value>,
}

impl RawRow {
  pub fn new(values: Vec<Value>) -> Self { Self { values: values.into_iter() } }

  fn next(&mut self, column: &'static str) -> Result<Value> {
    self.values.next().ok_or_else(|| Error::Decode {
      column,
      reason: "missing from result row".into(),
    })
  }

  fn integer(&mut self, column: &'static str) -> Result<i64> {
    match self.next(column)? {
      Value::Integer(i) => Ok(i),
      other => Err(Error::Decode {
        column,
        reason: format!("expected integer, found {}", other.data_type()),
      }),
    }
  }

  fn text(&mut self, column: &'static str) -> Result<String> {
    match self.next(column)? {
      Value::Text(s) => Ok(s),
      other => Err(Error::Decode {
        column,
        reason: format!("expected text, found {}", other.data_type()),
      }),
    }
  }

  fn attributes(&mut self, columns: &'static [Column]) -> Result<Attributes> {
    columns
      .iter()
      .map(|c| -> Result<(&'static str, AttrValue)> {
        Ok((c.name, decode_value(c, self.next(c.name)?)?))
      })
      .collect()
  }

  /// Decode a row selected with `schema::dimension_columns`.
  pub fn into_dimension(mut self, table: DimensionTable) -> Result<DimensionRow> {
    Ok(DimensionRow {
      id:           SurrogateKey(self.integer(table.id_column())?),
      natural_key:  NaturalKey::decode(&self.text("natural_key")?)?,
      attributes:   self.attributes(table.attribute_columns())?,
      fingerprint:  Fingerprint(self.text("fingerprint")?),
      last_updated: decode_dt(&self.text("last_updated")?)?,
    })
  }

  /// Decode the `schema::fact_value_columns` prefix of a fact row.
  fn fact_parts(&mut self, table: FactTable) -> Result<(FactKey, Attributes, Attributes)> {
    let professional_id = SurrogateKey(self.integer(DimensionTable::Professional.id_column())?);
    let dimension_id = match table.dimension() {
      Some(dim) => Some(SurrogateKey(self.integer(dim.id_column())?)),
      None => None,
    };
    let key = self.attributes(table.key_columns())?;
    let attributes = self.attributes(table.attribute_columns())?;
    let fact_key = FactKey {
      professional_id,
      dimension_id,
      values: project(&key, table.key_columns()),
    };
    Ok((fact_key, key, attributes))
  }

  /// Decode a row selected with `schema::fact_value_columns`.
  pub fn into_fact_entry(mut self, table: FactTable) -> Result<(FactKey, Attributes)> {
    let (fact_key, _, attributes) = self.fact_parts(table)?;
    Ok((fact_key, attributes))
  }

  /// Decode a row selected with `schema::fact_value_columns` plus `loaded_at`.
  pub fn into_fact(mut self, table: FactTable) -> Result<FactRow> {
    let (fact_key, key, attributes) = self.fact_parts(table)?;
    Ok(FactRow {
      professional_id: fact_key.professional_id,
      dimension_id: fact_key.dimension_id,
      key,
      attributes,
      loaded_at: decode_dt(&self.text("loaded_at")?)?,
    })
  }
}
