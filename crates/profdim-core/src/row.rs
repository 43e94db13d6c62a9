//! Row-level types: keys, attribute values, candidates and stored rows.
//!
//! Candidates are what the flattener emits; they carry natural keys only.
//! Rows are what the store persists; they carry surrogate keys.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  table::{Column, DimensionTable, FactTable},
};

// ─── Keys ────────────────────────────────────────────────────────────────────

/// System-assigned identifier of a dimension row. Immutable once assigned.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SurrogateKey(pub i64);

impl fmt::Display for SurrogateKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

const KEY_SEPARATOR: char = '\u{1f}';
const KEY_ESCAPE: char = '\\';

/// The real-world identity of an entity, as an ordered tuple of normalized
/// text components.
///
/// Components are trimmed, whitespace-collapsed and lower-cased, so
/// `" AWS  Certified"` and `"aws certified"` are the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NaturalKey(Vec<String>);

impl NaturalKey {
  pub fn new<I, S>(parts: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    Self(parts.into_iter().map(|p| normalize(p.as_ref())).collect())
  }

  /// Build a key whose absent components normalize to the empty string.
  pub fn from_optional<'a>(parts: impl IntoIterator<Item = Option<&'a str>>) -> Self {
    Self::new(parts.into_iter().map(Option::unwrap_or_default))
  }

  pub fn parts(&self) -> &[String] { &self.0 }

  /// Single-string form used for persistence.
  ///
  /// Components are joined with U+001F. A separator or backslash inside a
  /// component is escaped, so distinct keys never share an encoding.
  pub fn encode(&self) -> String {
    let mut out = String::new();
    for (i, part) in self.0.iter().enumerate() {
      if i > 0 {
        out.push(KEY_SEPARATOR);
      }
      for c in part.chars() {
        match c {
          KEY_ESCAPE => out.push_str("\\\\"),
          KEY_SEPARATOR => out.push_str("\\u"),
          c => out.push(c),
        }
      }
    }
    out
  }

  /// Inverse of [`encode`](Self::encode). Components are taken as stored and
  /// not re-normalized.
  pub fn decode(encoded: &str) -> Result<Self> {
    if encoded.is_empty() {
      return Err(Error::InvalidNaturalKey);
    }
    encoded.split(KEY_SEPARATOR).map(unescape).collect::<Result<Vec<_>>>().map(Self)
  }
}

impl fmt::Display for NaturalKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "({})", self.0.join(", "))
  }
}

fn unescape(part: &str) -> Result<String> {
  let mut out = String::with_capacity(part.len());
  let mut chars = part.chars();
  while let Some(c) = chars.next() {
    if c != KEY_ESCAPE {
      out.push(c);
      continue;
    }
    match chars.next() {
      Some(KEY_ESCAPE) => out.push(KEY_ESCAPE),
      Some('u') => out.push(KEY_SEPARATOR),
      _ => return Err(Error::InvalidNaturalKey),
    }
  }
  Ok(out)
}

fn normalize(part: &str) -> String {
  part.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Content digest of a row's attribute values (hex-encoded).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

// ─── Values ──────────────────────────────────────────────────────────────────

/// A single typed column value.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttrValue {
  #[default]
  Null,
  Integer(i64),
  Text(String),
  Date(NaiveDate),
  Boolean(bool),
}

impl From<String> for AttrValue {
  fn from(v: String) -> Self { Self::Text(v) }
}

impl From<&str> for AttrValue {
  fn from(v: &str) -> Self { Self::Text(v.to_owned()) }
}

impl From<i64> for AttrValue {
  fn from(v: i64) -> Self { Self::Integer(v) }
}

impl From<NaiveDate> for AttrValue {
  fn from(v: NaiveDate) -> Self { Self::Date(v) }
}

impl From<bool> for AttrValue {
  fn from(v: bool) -> Self { Self::Boolean(v) }
}

impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
  fn from(v: Option<T>) -> Self { v.map_or(Self::Null, Into::into) }
}

/// Column name → value. Ordered by name, which makes fingerprints
/// independent of the order fields were produced in.
pub type Attributes = BTreeMap<&'static str, AttrValue>;

/// Values of `columns` in column order; absent columns project to `Null`.
pub fn project(attributes: &Attributes, columns: &[Column]) -> Vec<AttrValue> {
  columns
    .iter()
    .map(|c| attributes.get(c.name).cloned().unwrap_or_default())
    .collect()
}

// ─── Candidates ──────────────────────────────────────────────────────────────

/// A dimension row before key resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionCandidate {
  pub table:       DimensionTable,
  pub natural_key: NaturalKey,
  pub attributes:  Attributes,
}

/// A fact row before key resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactCandidate {
  pub table:        FactTable,
  /// Natural key of the owning professional.
  pub professional: NaturalKey,
  /// Natural key of the referenced catalog entry, for tables that have one.
  pub dimension:    Option<NaturalKey>,
  /// Fact-level key columns (excluding foreign keys).
  pub key:          Attributes,
  pub attributes:   Attributes,
}

/// Everything the flattener produced for a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidates {
  pub dimensions: Vec<DimensionCandidate>,
  pub facts:      Vec<FactCandidate>,
}

impl Candidates {
  pub fn dimensions(
    &self,
    table: DimensionTable,
  ) -> impl Iterator<Item = &DimensionCandidate> + '_ {
    self.dimensions.iter().filter(move |c| c.table == table)
  }

  pub fn facts(&self, table: FactTable) -> impl Iterator<Item = &FactCandidate> + '_ {
    self.facts.iter().filter(move |c| c.table == table)
  }

  pub fn extend(&mut self, other: Candidates) {
    self.dimensions.extend(other.dimensions);
    self.facts.extend(other.facts);
  }
}

// ─── Stored rows ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionRow {
  pub id:           SurrogateKey,
  pub natural_key:  NaturalKey,
  pub attributes:   Attributes,
  pub fingerprint:  Fingerprint,
  pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactRow {
  pub professional_id: SurrogateKey,
  pub dimension_id:    Option<SurrogateKey>,
  pub key:             Attributes,
  pub attributes:      Attributes,
  pub loaded_at:       DateTime<Utc>,
}

impl FactRow {
  pub fn fact_key(&self, table: FactTable) -> FactKey {
    FactKey {
      professional_id: self.professional_id,
      dimension_id:    self.dimension_id,
      values:          project(&self.key, table.key_columns()),
    }
  }
}

/// The fact-level natural key tuple: foreign keys plus key columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FactKey {
  pub professional_id: SurrogateKey,
  pub dimension_id:    Option<SurrogateKey>,
  pub values:          Vec<AttrValue>,
}
