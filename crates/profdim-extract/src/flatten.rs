//! Record → table-row candidates.
//!
//! This is the normalization boundary: after flattening, nothing looks at the
//! nested record shape again. Every candidate carries the natural keys needed
//! to resolve surrogate keys later.

use std::collections::HashSet;

use profdim_core::{
  record::{Batch, Certification, Education, ProfessionalRecord},
  row::{Attributes, Candidates, DimensionCandidate, FactCandidate, NaturalKey},
  table::{DimensionTable, FactTable},
};

/// Flatten every record of `batch`, in source order.
pub fn flatten_batch(batch: &Batch) -> Candidates {
  let mut out = Candidates::default();
  for record in batch {
    out.extend(flatten(record));
  }
  out
}

/// Decompose one record into one professional candidate, one candidate per
/// distinct catalog entry it references, and one fact candidate per nested
/// entry.
pub fn flatten(record: &ProfessionalRecord) -> Candidates {
  let professional = professional_key(record);
  let mut out = Candidates::default();

  out.dimensions.push(DimensionCandidate {
    table:       DimensionTable::Professional,
    natural_key: professional.clone(),
    attributes:  Attributes::from([
      ("email", record.email.as_str().into()),
      ("name", record.name.clone().into()),
      ("total_experience", record.total_experience.into()),
      ("role", record.role.clone().into()),
      ("industry", record.industry.clone().into()),
      ("education_level", record.education_level.clone().into()),
    ]),
  });

  for job in &record.jobs {
    out.facts.push(FactCandidate {
      table:        FactTable::Job,
      professional: professional.clone(),
      dimension:    None,
      key:          Attributes::from([
        ("employer", job.employer.clone().into()),
        ("title", job.title.clone().into()),
        ("start_date", job.start_date.into()),
      ]),
      attributes:   Attributes::from([
        ("end_date", job.end_date.into()),
        ("is_current", job.end_date.is_none().into()),
      ]),
    });
  }

  for skill in &record.skills {
    out.facts.push(FactCandidate {
      table:        FactTable::Skill,
      professional: professional.clone(),
      dimension:    None,
      key:          Attributes::from([("skill_name", skill.name.as_str().into())]),
      attributes:   Attributes::from([("proficiency", skill.proficiency.clone().into())]),
    });
  }

  let mut seen_certifications: HashSet<NaturalKey> = HashSet::new();
  for cert in &record.certifications {
    let key = certification_key(cert);
    if seen_certifications.insert(key.clone()) {
      out.dimensions.push(DimensionCandidate {
        table:       DimensionTable::Certification,
        natural_key: key.clone(),
        attributes:  Attributes::from([
          ("certification_name", cert.name.as_str().into()),
          ("issuing_body", cert.issuing_body.clone().into()),
        ]),
      });
    }
    out.facts.push(FactCandidate {
      table:        FactTable::Certification,
      professional: professional.clone(),
      dimension:    Some(key),
      key:          Attributes::from([("earned_date", cert.earned_date.into())]),
      attributes:   Attributes::new(),
    });
  }

  let mut seen_education: HashSet<NaturalKey> = HashSet::new();
  for edu in &record.education {
    let key = education_key(edu);
    if seen_education.insert(key.clone()) {
      out.dimensions.push(DimensionCandidate {
        table:       DimensionTable::Education,
        natural_key: key.clone(),
        attributes:  Attributes::from([
          ("institution", edu.institution.as_str().into()),
          ("degree", edu.degree.clone().into()),
          ("field_of_study", edu.field.clone().into()),
        ]),
      });
    }
    out.facts.push(FactCandidate {
      table:        FactTable::Education,
      professional: professional.clone(),
      dimension:    Some(key),
      key:          Attributes::from([("start_date", edu.start_date.into())]),
      attributes:   Attributes::from([("end_date", edu.end_date.into())]),
    });
  }

  out
}

// ─── Natural keys ────────────────────────────────────────────────────────────

fn professional_key(record: &ProfessionalRecord) -> NaturalKey {
  NaturalKey::new([record.email.as_str()])
}

fn certification_key(cert: &Certification) -> NaturalKey {
  NaturalKey::from_optional([Some(cert.name.as_str()), cert.issuing_body.as_deref()])
}

fn education_key(edu: &Education) -> NaturalKey {
  NaturalKey::from_optional([
    Some(edu.institution.as_str()),
    edu.degree.as_deref(),
    edu.field.as_deref(),
  ])
}

// ─── Tests ───────────────────────────────────────────────────────────────────
