//! Document → validated [`Batch`].
//!
//! Pipeline:
//!   raw &str
//!     └─ serde_json::Value      → top-level array (bare or `professionals`)
//!          └─ RawProfessional   → lenient serde shape, one per element
//!               └─ Validator     → ProfessionalRecord

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use profdim_core::record::{
  Batch, Certification, Education, Job, ProfessionalRecord, Skill,
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

// ─── Raw shapes ──────────────────────────────────────────────────────────────

// Scalars are kept as `Value` so type mismatches surface as validation errors
// with a record index rather than as an opaque serde failure.

#[derive(Deserialize)]
struct RawProfessional {
  #[serde(default)]
  email:            Option<Value>,
  #[serde(default)]
  name:             Option<Value>,
  #[serde(default, alias = "years_experience")]
  total_experience: Option<Value>,
  #[serde(default, alias = "current_role")]
  role:             Option<Value>,
  #[serde(default, alias = "current_industry")]
  industry:         Option<Value>,
  #[serde(default)]
  education_level:  Option<Value>,
  #[serde(default)]
  jobs:             Option<Vec<RawJob>>,
  #[serde(default)]
  skills:           Option<Vec<RawSkill>>,
  #[serde(default)]
  certifications:   Option<Vec<RawCertification>>,
  #[serde(default)]
  education:        Option<Vec<RawEducation>>,
}

#[derive(Deserialize)]
struct RawJob {
  #[serde(default, alias = "company")]
  employer:   Option<Value>,
  #[serde(default, alias = "role")]
  title:      Option<Value>,
  #[serde(default)]
  start_date: Option<Value>,
  #[serde(default)]
  end_date:   Option<Value>,
}

#[derive(Deserialize)]
struct RawSkill {
  #[serde(default, alias = "skill_name")]
  name:        Option<Value>,
  #[serde(default, alias = "proficiency_level")]
  proficiency: Option<Value>,
}

#[derive(Deserialize)]
struct RawCertification {
  #[serde(default, alias = "certification_name")]
  name:         Option<Value>,
  #[serde(default, alias = "issuing_organization")]
  issuing_body: Option<Value>,
  #[serde(default, alias = "date_earned")]
  earned_date:  Option<Value>,
}

#[derive(Deserialize)]
struct RawEducation {
  #[serde(default)]
  institution: Option<Value>,
  #[serde(default)]
  degree:      Option<Value>,
  #[serde(default, alias = "field_of_study")]
  field:       Option<Value>,
  #[serde(default)]
  start_date:  Option<Value>,
  #[serde(default, alias = "graduation_date")]
  end_date:    Option<Value>,
}

// ─── Public API ──────────────────────────────────────────────────────────────

/// Parse and validate a professionals document.
///
/// Accepts either a top-level array of professional objects or an object with
/// a `professionals` array. Fails on the first record without a usable
/// `email`; nothing from a failing document is returned.
pub fn extract(input: &str) -> Result<Batch> {
  let document: Value = serde_json::from_str(input)?;

  let items = match document {
    Value::Array(items) => items,
    Value::Object(mut map) => match map.remove("professionals") {
      Some(Value::Array(items)) => items,
      Some(_) => {
        return Err(Error::Document("`professionals` must be an array".into()));
      }
      None => {
        return Err(Error::Document("missing `professionals` array".into()));
      }
    },
    _ => {
      return Err(Error::Document(
        "expected an array of professionals or an object with `professionals`".into(),
      ));
    }
  };

  let mut records = Vec::with_capacity(items.len());
  let mut inverted_jobs = 0usize;

  for (index, item) in items.into_iter().enumerate() {
    let raw: RawProfessional = serde_json::from_value(item)
      .map_err(|e| Error::Validation { index, reason: e.to_string() })?;
    let record = Validator { index }.professional(raw)?;

    inverted_jobs += record
      .jobs
      .iter()
      .filter(|j| matches!((j.start_date, j.end_date), (Some(s), Some(e)) if e < s))
      .count();

    records.push(record);
  }

  if inverted_jobs > 0 {
    tracing::warn!(count = inverted_jobs, "jobs with end date before start date");
  }

  tracing::debug!(records = records.len(), "extracted professionals");
  Ok(Batch::new(records))
}

/// Read `path` and [`extract`] its contents.
pub fn extract_file(path: impl AsRef<Path>) -> Result<Batch> {
  let path = path.as_ref();
  let input = std::fs::read_to_string(path).map_err(|source| Error::Io {
    path: path.to_path_buf(),
    source,
  })?;
  extract(&input)
}

// ─── Validation ──────────────────────────────────────────────────────────────

struct Validator {
  index: usize,
}

impl Validator {
  fn invalid(&self, reason: impl Into<String>) -> Error {
    Error::Validation { index: self.index, reason: reason.into() }
  }

  fn professional(&self, raw: RawProfessional) -> Result<ProfessionalRecord> {
    let email = match raw.email {
      Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_owned(),
      Some(Value::String(_)) => return Err(self.invalid("`email` is empty")),
      None | Some(Value::Null) => {
        return Err(self.invalid("missing required field `email`"));
      }
      Some(_) => return Err(self.invalid("`email` must be a string")),
    };

    let jobs: Vec<Job> = raw
      .jobs
      .unwrap_or_default()
      .into_iter()
      .map(|j| self.job(j))
      .collect::<Result<_>>()?;
    let skills: Vec<Skill> = raw
      .skills
      .unwrap_or_default()
      .into_iter()
      .enumerate()
      .map(|(i, s)| self.skill(i, s))
      .collect::<Result<_>>()?;
    let certifications: Vec<Certification> = raw
      .certifications
      .unwrap_or_default()
      .into_iter()
      .enumerate()
      .map(|(i, c)| self.certification(i, c))
      .collect::<Result<_>>()?;
    let education: Vec<Education> = raw
      .education
      .unwrap_or_default()
      .into_iter()
      .enumerate()
      .map(|(i, e)| self.education(i, e))
      .collect::<Result<_>>()?;

    Ok(ProfessionalRecord {
      email,
      name: self.text("name", raw.name)?,
      total_experience: self.integer("total_experience", raw.total_experience)?,
      role: self.text("role", raw.role)?,
      industry: self.text("industry", raw.industry)?,
      education_level: self.text("education_level", raw.education_level)?,
      jobs,
      skills,
      certifications,
      education,
    })
  }

  fn job(&self, raw: RawJob) -> Result<Job> {
    Ok(Job {
      employer:   self.text("jobs.employer", raw.employer)?,
      title:      self.text("jobs.title", raw.title)?,
      start_date: self.date("jobs.start_date", raw.start_date)?,
      end_date:   self.date("jobs.end_date", raw.end_date)?,
    })
  }

  fn skill(&self, i: usize, raw: RawSkill) -> Result<Skill> {
    let name = self
      .text("skills.name", raw.name)?
      .ok_or_else(|| self.invalid(format!("skills[{i}]: missing `name`")))?;
    Ok(Skill {
      name,
      proficiency: self.text("skills.proficiency", raw.proficiency)?,
    })
  }

  fn certification(&self, i: usize, raw: RawCertification) -> Result<Certification> {
    let name = self
      .text("certifications.name", raw.name)?
      .ok_or_else(|| self.invalid(format!("certifications[{i}]: missing `name`")))?;
    Ok(Certification {
      name,
      issuing_body: self.text("certifications.issuing_body", raw.issuing_body)?,
      earned_date: self.date("certifications.earned_date", raw.earned_date)?,
    })
  }

  fn education(&self, i: usize, raw: RawEducation) -> Result<Education> {
    let institution = self
      .text("education.institution", raw.institution)?
      .ok_or_else(|| self.invalid(format!("education[{i}]: missing `institution`")))?;
    Ok(Education {
      institution,
      degree: self.text("education.degree", raw.degree)?,
      field: self.text("education.field", raw.field)?,
      start_date: self.date("education.start_date", raw.start_date)?,
      end_date: self.date("education.end_date", raw.end_date)?,
    })
  }

  // ── Scalars ───────────────────────────────────────────────────────────────

  /// Strings are trimmed; blank becomes `None`. Numbers and booleans are
  /// rendered as text.
  fn text(&self, field: &str, value: Option<Value>) -> Result<Option<String>> {
    match value {
      None | Some(Value::Null) => Ok(None),
      Some(Value::String(s)) => Ok(opt_str(&s)),
      Some(Value::Number(n)) => Ok(Some(n.to_string())),
      Some(Value::Bool(b)) => Ok(Some(b.to_string())),
      Some(_) => Err(self.invalid(format!("`{field}` must be a scalar"))),
    }
  }

  /// Whole numbers, numeric strings, and floats (rounded).
  fn integer(&self, field: &str, value: Option<Value>) -> Result<Option<i64>> {
    match value {
      None | Some(Value::Null) => Ok(None),
      Some(Value::Number(n)) => n
        .as_i64()
        .or_else(|| n.as_f64().map(f64::round).and_then(float_to_i64))
        .map(Some)
        .ok_or_else(|| self.invalid(format!("`{field}` is out of range"))),
      Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
      Some(Value::String(s)) => s
        .trim()
        .parse::<i64>()
        .map(Some)
        .map_err(|_| self.invalid(format!("`{field}` is not a number: {s:?}"))),
      Some(_) => Err(self.invalid(format!("`{field}` must be a number"))),
    }
  }

  /// Unparseable dates are treated as absent, with a warning.
  fn date(&self, field: &str, value: Option<Value>) -> Result<Option<NaiveDate>> {
    let Some(raw) = self.text(field, value)? else {
      return Ok(None);
    };
    let parsed = parse_date(&raw);
    if parsed.is_none() {
      tracing::warn!(record = self.index, field, value = %raw, "unparseable date; treating as absent");
    }
    Ok(parsed)
  }
}

/// Return `Some(trimmed)` when non-empty, `None` otherwise.
/// `None` outside the `i64` range. `i64::MAX as f64` rounds up to 2^63, so
/// the upper bound is exclusive.
fn float_to_i64(f: f64) -> Option<i64> {
  (f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
}

fn opt_str(s: &str) -> Option<String> {
  let s = s.trim();
  if s.is_empty() { None } else { Some(s.to_string()) }
}

/// Accepts `YYYY-MM-DD`, RFC 3339 and naive ISO timestamps, `YYYY-MM`
/// (first of month) and `YYYY` (first of year).
fn parse_date(s: &str) -> Option<NaiveDate> {
  let s = s.trim();
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .ok()
    .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
    .or_else(|| {
      NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|dt| dt.date())
    })
    .or_else(|| NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").ok())
    .or_else(|| {
      s.parse::<i32>()
        .ok()
        .filter(|y| (1000..=9999).contains(y))
        .and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1))
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
