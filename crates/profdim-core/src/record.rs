//! Validated professional records, as produced by the extractor.
//!
//! A record keeps the nested shape of the source document. The flattener is
//! the only consumer that looks at this shape; everything downstream works on
//! row candidates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ─── Nested entries ──────────────────────────────────────────────────────────

/// One position held by a professional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
  pub employer:   Option<String>,
  pub title:      Option<String>,
  pub start_date: Option<NaiveDate>,
  /// `None` means the job is current.
  pub end_date:   Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
  pub name:        String,
  pub proficiency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certification {
  pub name:         String,
  pub issuing_body: Option<String>,
  pub earned_date:  Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Education {
  pub institution: String,
  pub degree:      Option<String>,
  pub field:       Option<String>,
  pub start_date:  Option<NaiveDate>,
  pub end_date:    Option<NaiveDate>,
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// A single professional as it appeared in the source document, after
/// validation. `email` is guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfessionalRecord {
  pub email:            String,
  pub name:             Option<String>,
  pub total_experience: Option<i64>,
  pub role:             Option<String>,
  pub industry:         Option<String>,
  pub education_level:  Option<String>,
  pub jobs:             Vec<Job>,
  pub skills:           Vec<Skill>,
  pub certifications:   Vec<Certification>,
  pub education:        Vec<Education>,
}

impl ProfessionalRecord {
  /// A record with only its natural key set.
  pub fn new(email: impl Into<String>) -> Self {
    Self {
      email:            email.into(),
      name:             None,
      total_experience: None,
      role:             None,
      industry:         None,
      education_level:  None,
      jobs:             vec![],
      skills:           vec![],
      certifications:   vec![],
      education:        vec![],
    }
  }
}

// ─── Batch ───────────────────────────────────────────────────────────────────

/// The validated records of one input document, in source order.
///
/// A batch can be iterated any number of times; the load pipeline walks it
/// once for dimensions and again for facts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
  records: Vec<ProfessionalRecord>,
}

impl Batch {
  pub fn new(records: Vec<ProfessionalRecord>) -> Self { Self { records } }

  pub fn iter(&self) -> std::slice::Iter<'_, ProfessionalRecord> {
    self.records.iter()
  }

  pub fn len(&self) -> usize { self.records.len() }

  pub fn is_empty(&self) -> bool { self.records.is_empty() }
}

impl<'a> IntoIterator for &'a Batch {
  type Item = &'a ProfessionalRecord;
  type IntoIter = std::slice::Iter<'a, ProfessionalRecord>;

  fn into_iter(self) -> Self::IntoIter { self.records.iter() }
}

impl FromIterator<ProfessionalRecord> for Batch {
  fn from_iter<I: IntoIterator<Item = ProfessionalRecord>>(iter: I) -> Self {
    Self::new(iter.into_iter().collect())
  }
}
