//! Table catalog: the shape of every target table.
//!
//! The three dimension tables and four fact tables share one merge path and
//! one load path; they differ only in the columns declared here.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─── Columns ─────────────────────────────────────────────────────────────────

/// Logical column type. The storage backend chooses the physical type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
  Integer,
  Text,
  /// A calendar date without time component.
  Date,
  Boolean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
  pub name: &'static str,
  pub ty:   ColumnType,
}

const fn col(name: &'static str, ty: ColumnType) -> Column { Column { name, ty } }

// ─── Dimensions ──────────────────────────────────────────────────────────────

/// A reference dimension with surrogate keys.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DimensionTable {
  Professional,
  Certification,
  Education,
}

const PROFESSIONAL_COLUMNS: &[Column] = &[
  col("email", ColumnType::Text),
  col("name", ColumnType::Text),
  col("total_experience", ColumnType::Integer),
  col("role", ColumnType::Text),
  col("industry", ColumnType::Text),
  col("education_level", ColumnType::Text),
];

const CERTIFICATION_COLUMNS: &[Column] = &[
  col("certification_name", ColumnType::Text),
  col("issuing_body", ColumnType::Text),
];

const EDUCATION_COLUMNS: &[Column] = &[
  col("institution", ColumnType::Text),
  col("degree", ColumnType::Text),
  col("field_of_study", ColumnType::Text),
];

impl DimensionTable {
  /// Load order. Professional comes first; order among catalogs is
  /// irrelevant but fixed.
  pub const ALL: [Self; 3] = [Self::Professional, Self::Certification, Self::Education];

  pub fn name(self) -> &'static str {
    match self {
      Self::Professional => "dim_professional",
      Self::Certification => "dim_certification",
      Self::Education => "dim_education",
    }
  }

  /// Name of the surrogate key column, also used as the foreign key column in
  /// fact tables.
  pub fn id_column(self) -> &'static str {
    match self {
      Self::Professional => "professional_id",
      Self::Certification => "certification_id",
      Self::Education => "education_id",
    }
  }

  /// Descriptive (non-key) columns, in table order.
  pub fn attribute_columns(self) -> &'static [Column] {
    match self {
      Self::Professional => PROFESSIONAL_COLUMNS,
      Self::Certification => CERTIFICATION_COLUMNS,
      Self::Education => EDUCATION_COLUMNS,
    }
  }
}

impl fmt::Display for DimensionTable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

// ─── Facts ───────────────────────────────────────────────────────────────────

/// What a fact load does when a row with the same fact-level key exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
  /// Facts are immutable; the incoming row is skipped.
  Skip,
  /// The existing row's attribute columns are overwritten.
  Overwrite,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FactTable {
  Job,
  Skill,
  Certification,
  Education,
}

const JOB_KEY: &[Column] = &[
  col("employer", ColumnType::Text),
  col("title", ColumnType::Text),
  col("start_date", ColumnType::Date),
];
const JOB_ATTRIBUTES: &[Column] = &[
  col("end_date", ColumnType::Date),
  col("is_current", ColumnType::Boolean),
];

const SKILL_KEY: &[Column] = &[col("skill_name", ColumnType::Text)];
const SKILL_ATTRIBUTES: &[Column] = &[col("proficiency", ColumnType::Text)];

const CERTIFICATION_KEY: &[Column] = &[col("earned_date", ColumnType::Date)];

const EDUCATION_KEY: &[Column] = &[col("start_date", ColumnType::Date)];
const EDUCATION_ATTRIBUTES: &[Column] = &[col("end_date", ColumnType::Date)];

impl FactTable {
  pub const ALL: [Self; 4] = [Self::Job, Self::Skill, Self::Certification, Self::Education];

  pub fn name(self) -> &'static str {
    match self {
      Self::Job => "fact_professional_job",
      Self::Skill => "fact_professional_skill",
      Self::Certification => "fact_professional_certification",
      Self::Education => "fact_professional_education",
    }
  }

  /// The catalog dimension this fact references besides the professional.
  pub fn dimension(self) -> Option<DimensionTable> {
    match self {
      Self::Job | Self::Skill => None,
      Self::Certification => Some(DimensionTable::Certification),
      Self::Education => Some(DimensionTable::Education),
    }
  }

  /// Columns that, together with the foreign keys, form the fact-level
  /// natural key.
  pub fn key_columns(self) -> &'static [Column] {
    match self {
      Self::Job => JOB_KEY,
      Self::Skill => SKILL_KEY,
      Self::Certification => CERTIFICATION_KEY,
      Self::Education => EDUCATION_KEY,
    }
  }

  pub fn attribute_columns(self) -> &'static [Column] {
    match self {
      Self::Job => JOB_ATTRIBUTES,
      Self::Skill => SKILL_ATTRIBUTES,
      Self::Certification => &[],
      Self::Education => EDUCATION_ATTRIBUTES,
    }
  }

  pub fn conflict_policy(self) -> ConflictPolicy {
    match self {
      Self::Skill => ConflictPolicy::Overwrite,
      Self::Job | Self::Certification | Self::Education => ConflictPolicy::Skip,
    }
  }
}

impl fmt::Display for FactTable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

// ─── Any table ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
  Dimension(DimensionTable),
  Fact(FactTable),
}

impl Table {
  /// Every target table, dimensions first.
  pub fn all() -> impl Iterator<Item = Table> {
    DimensionTable::ALL
      .into_iter()
      .map(Table::Dimension)
      .chain(FactTable::ALL.into_iter().map(Table::Fact))
  }

  pub fn name(self) -> &'static str {
    match self {
      Self::Dimension(d) => d.name(),
      Self::Fact(f) => f.name(),
    }
  }
}

impl fmt::Display for Table {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl From<DimensionTable> for Table {
  fn from(table: DimensionTable) -> Self { Self::Dimension(table) }
}

impl From<FactTable> for Table {
  fn from(table: FactTable) -> Self { Self::Fact(table) }
}
