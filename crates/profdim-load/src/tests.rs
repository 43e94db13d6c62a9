//! End-to-end pipeline tests against an in-memory SQLite warehouse.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, TimeZone, Utc};
use profdim_core::{
  row::{AttrValue, DimensionRow, FactRow, NaturalKey, SurrogateKey},
  run::{LoadMode, ModeSelection, RunSummary},
  store::{KeyStore, WarehouseStore},
  table::{DimensionTable, FactTable, Table},
};
use profdim_store_sqlite::SqliteStore;

use crate::{
  Error, KeyResolver, MemoryKeyStore, Orchestrator, Result, facts::load_facts,
  merge::merge_dimension,
};

const ROSTER: &str = r#"{"professionals": [
  {
    "email": "alice@x.com",
    "name": "Alice",
    "total_experience": 8,
    "role": "Engineer",
    "industry": "Tech",
    "education_level": "Masters",
    "jobs": [
      {"employer": "Acme", "title": "Engineer", "start_date": "2018-01-01", "end_date": null},
      {"employer": "Initech", "title": "Intern", "start_date": "2016-06-01", "end_date": "2017-12-31"}
    ],
    "skills": [
      {"name": "Rust", "proficiency": "Expert"},
      {"name": "SQL", "proficiency": "Advanced"}
    ],
    "certifications": [
      {"name": "AWS Certified", "issuing_body": "Amazon", "earned_date": "2020-05-01"}
    ],
    "education": [
      {"institution": "MIT", "degree": "MSc", "field": "CS", "start_date": "2014-09-01", "end_date": "2016-06-01"}
    ]
  },
  {
    "email": "bob@x.com",
    "name": "Bob",
    "role": "Analyst",
    "skills": [{"name": "Excel", "proficiency": "Intermediate"}],
    "certifications": [
      {"name": "AWS Certified", "issuing_body": "Amazon", "earned_date": "2021-03-15"}
    ]
  }
]}"#;

const CAROL: &str = r#"[
  {
    "email": "carol@x.com",
    "role": "Designer",
    "skills": [{"name": "Figma", "proficiency": "Expert"}]
  }
]"#;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn at(hour: u32) -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap() }

async fn load(s: &SqliteStore, json: &str, mode: ModeSelection, hour: u32) -> Result<RunSummary> {
  Orchestrator::new(s, s)
    .with_mode(mode)
    .with_clock(at(hour))
    .run_document(json)
    .await
}

fn alice_as(role: &str) -> String {
  format!(r#"[{{"email": "alice@x.com", "name": "Alice", "role": "{role}"}}]"#)
}

#[derive(Debug, PartialEq)]
struct Snapshot {
  dimensions: Vec<Vec<DimensionRow>>,
  facts:      Vec<Vec<FactRow>>,
}

async fn snapshot(s: &SqliteStore) -> Snapshot {
  let mut dimensions = Vec::new();
  for table in DimensionTable::ALL {
    dimensions.push(s.dimension_rows(table).await.unwrap());
  }
  let mut facts = Vec::new();
  for table in FactTable::ALL {
    facts.push(s.fact_rows(table).await.unwrap());
  }
  Snapshot { dimensions, facts }
}

async fn ids(s: &SqliteStore, table: DimensionTable) -> HashMap<NaturalKey, SurrogateKey> {
  s.dimension_rows(table)
    .await
    .unwrap()
    .into_iter()
    .map(|r| (r.natural_key, r.id))
    .collect()
}

async fn count(s: &SqliteStore, table: impl Into<Table>) -> u64 {
  s.count(table.into()).await.unwrap()
}

// ─── Idempotence ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn identical_rerun_changes_nothing() {
  let s = store().await;
  let first = load(&s, ROSTER, ModeSelection::Auto, 9).await.unwrap();
  let before = snapshot(&s).await;

  let second = load(&s, ROSTER, ModeSelection::Auto, 10).await.unwrap();
  assert_eq!(snapshot(&s).await, before);

  assert_eq!(first.mode, LoadMode::Full);
  assert_eq!(second.mode, LoadMode::Incremental);
  assert_eq!(second.dimension_overwrites(), 0);
  for table in DimensionTable::ALL {
    let stats = second.dimension(table);
    assert_eq!(stats.written(), 0, "{table}");
    assert_eq!(stats.unchanged, first.dimension(table).inserted, "{table}");
  }
  for table in FactTable::ALL {
    assert_eq!(second.fact(table).inserted, 0, "{table}");
    assert_eq!(second.fact(table).updated, 0, "{table}");
  }
}

#[tokio::test]
async fn roster_loads_expected_row_counts() {
  let s = store().await;
  load(&s, ROSTER, ModeSelection::Auto, 9).await.unwrap();

  assert_eq!(count(&s, DimensionTable::Professional).await, 2);
  assert_eq!(count(&s, DimensionTable::Certification).await, 1);
  assert_eq!(count(&s, DimensionTable::Education).await, 1);
  assert_eq!(count(&s, FactTable::Job).await, 2);
  assert_eq!(count(&s, FactTable::Skill).await, 3);
  assert_eq!(count(&s, FactTable::Certification).await, 2);
  assert_eq!(count(&s, FactTable::Education).await, 1);
}

// ─── Key stability ───────────────────────────────────────────────────────────

#[tokio::test]
async fn surrogate_keys_survive_incremental_and_full_runs() {
  let s = store().await;
  load(&s, ROSTER, ModeSelection::Auto, 9).await.unwrap();
  let original = ids(&s, DimensionTable::Professional).await;
  let alice = NaturalKey::new(["alice@x.com"]);

  // New professional listed first, existing one with different casing.
  let mixed = r#"[{"email": "carol@x.com"}, {"email": "  Alice@X.com "}]"#;
  load(&s, mixed, ModeSelection::Incremental, 10).await.unwrap();
  let after = ids(&s, DimensionTable::Professional).await;
  assert_eq!(after[&alice], original[&alice]);
  assert_eq!(after[&NaturalKey::new(["carol@x.com"])], SurrogateKey(3));

  load(&s, ROSTER, ModeSelection::Full, 11).await.unwrap();
  let refreshed = ids(&s, DimensionTable::Professional).await;
  assert_eq!(refreshed, original);
}

#[tokio::test]
async fn catalog_keys_are_stable_across_runs() {
  let s = store().await;
  load(&s, ROSTER, ModeSelection::Auto, 9).await.unwrap();
  let before = ids(&s, DimensionTable::Certification).await;

  load(&s, ROSTER, ModeSelection::Full, 10).await.unwrap();
  assert_eq!(ids(&s, DimensionTable::Certification).await, before);
}

#[tokio::test]
async fn separator_characters_in_keys_survive_reruns() {
  let s = store().await;
  let odd = r#"[{"email": "a\u001fb@x.com", "role": "Engineer"}]"#;
  load(&s, odd, ModeSelection::Auto, 9).await.unwrap();
  let before = ids(&s, DimensionTable::Professional).await;

  let second = load(&s, odd, ModeSelection::Auto, 10).await.unwrap();
  assert_eq!(second.mode, LoadMode::Incremental);
  assert_eq!(second.dimension(DimensionTable::Professional).unchanged, 1);
  assert_eq!(ids(&s, DimensionTable::Professional).await, before);
  assert!(before.contains_key(&NaturalKey::new(["a\u{1f}b@x.com"])));
}

#[tokio::test]
async fn catalog_keys_split_differently_stay_distinct() {
  let s = store().await;
  let split = r#"[{"email": "alice@x.com", "certifications": [
    {"name": "a", "issuing_body": "b\u001fc"},
    {"name": "a\u001fb", "issuing_body": "c"}
  ]}]"#;
  load(&s, split, ModeSelection::Auto, 9).await.unwrap();
  assert_eq!(count(&s, DimensionTable::Certification).await, 2);
  assert_eq!(count(&s, FactTable::Certification).await, 2);

  let rerun = load(&s, split, ModeSelection::Auto, 10).await.unwrap();
  assert_eq!(rerun.dimension(DimensionTable::Certification).unchanged, 2);
  assert_eq!(count(&s, DimensionTable::Certification).await, 2);
}

// ─── Referential integrity ───────────────────────────────────────────────────

#[tokio::test]
async fn every_fact_references_an_existing_dimension_row() {
  let s = store().await;
  load(&s, ROSTER, ModeSelection::Auto, 9).await.unwrap();
  load(&s, CAROL, ModeSelection::Auto, 10).await.unwrap();

  let mut existing: HashMap<DimensionTable, HashSet<SurrogateKey>> = HashMap::new();
  for table in DimensionTable::ALL {
    existing.insert(table, ids(&s, table).await.into_values().collect());
  }

  for table in FactTable::ALL {
    for row in s.fact_rows(table).await.unwrap() {
      assert!(existing[&DimensionTable::Professional].contains(&row.professional_id));
      if let Some(dim) = table.dimension() {
        let id = row.dimension_id.expect("catalog fact has a dimension key");
        assert!(existing[&dim].contains(&id), "{table} -> {dim} {id}");
      }
    }
  }
}

#[tokio::test]
async fn facts_with_unresolved_keys_are_rejected_before_writing() {
  let s = store().await;
  let batch = profdim_extract::extract(CAROL).unwrap();
  let candidates = profdim_extract::flatten_batch(&batch);

  let result = load_facts(
    &s,
    &KeyResolver::default(),
    FactTable::Skill,
    candidates.facts(FactTable::Skill),
    LoadMode::Incremental,
    at(9),
  )
  .await;

  assert!(matches!(
    result,
    Err(Error::Referential { dimension: DimensionTable::Professional, .. })
  ));
  assert_eq!(count(&s, FactTable::Skill).await, 0);
}

// ─── Catalog dedup ───────────────────────────────────────────────────────────

#[tokio::test]
async fn shared_certification_resolves_to_one_row() {
  let s = store().await;
  let summary = load(&s, ROSTER, ModeSelection::Auto, 9).await.unwrap();
  assert_eq!(summary.dimension(DimensionTable::Certification).inserted, 1);

  let certs = s.dimension_rows(DimensionTable::Certification).await.unwrap();
  assert_eq!(certs.len(), 1);
  assert_eq!(certs[0].natural_key, NaturalKey::new(["AWS Certified", "Amazon"]));

  let facts = s.fact_rows(FactTable::Certification).await.unwrap();
  assert_eq!(facts.len(), 2);
  assert!(facts.iter().all(|f| f.dimension_id == Some(certs[0].id)));
  assert_ne!(facts[0].professional_id, facts[1].professional_id);
}

// ─── Change propagation ──────────────────────────────────────────────────────

#[tokio::test]
async fn changed_attribute_overwrites_in_place() {
  let s = store().await;
  load(&s, &alice_as("Engineer"), ModeSelection::Auto, 9).await.unwrap();
  let before = s.dimension_rows(DimensionTable::Professional).await.unwrap();

  let summary = load(&s, &alice_as("Senior Engineer"), ModeSelection::Auto, 10)
    .await
    .unwrap();
  assert_eq!(summary.dimension(DimensionTable::Professional).updated, 1);
  assert_eq!(summary.dimension_overwrites(), 1);

  let after = s.dimension_rows(DimensionTable::Professional).await.unwrap();
  assert_eq!(after.len(), 1);
  assert_eq!(after[0].id, before[0].id);
  assert_eq!(after[0].attributes["role"], AttrValue::Text("Senior Engineer".into()));
  assert_ne!(after[0].fingerprint, before[0].fingerprint);
  assert_eq!(after[0].last_updated, at(10));
}

#[tokio::test]
async fn unchanged_rows_keep_their_timestamp() {
  let s = store().await;
  load(&s, ROSTER, ModeSelection::Auto, 9).await.unwrap();
  load(&s, &alice_as("Staff Engineer"), ModeSelection::Auto, 10).await.unwrap();

  let rows = s.dimension_rows(DimensionTable::Professional).await.unwrap();
  let bob = rows
    .iter()
    .find(|r| r.natural_key == NaturalKey::new(["bob@x.com"]))
    .unwrap();
  assert_eq!(bob.last_updated, at(9));
}

#[tokio::test]
async fn last_occurrence_in_batch_wins() {
  let s = store().await;
  let twice = r#"[
    {"email": "alice@x.com", "role": "First"},
    {"email": "ALICE@x.com", "role": "Second"}
  ]"#;
  let summary = load(&s, twice, ModeSelection::Auto, 9).await.unwrap();
  assert_eq!(summary.dimension(DimensionTable::Professional).inserted, 1);

  let rows = s.dimension_rows(DimensionTable::Professional).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].attributes["role"], AttrValue::Text("Second".into()));
}

// ─── Facts ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn skill_proficiency_is_overwritten_in_place() {
  let s = store().await;
  load(&s, ROSTER, ModeSelection::Auto, 9).await.unwrap();

  let upgraded = r#"[{"email": "bob@x.com", "skills": [{"name": "Excel", "proficiency": "Expert"}]}]"#;
  let summary = load(&s, upgraded, ModeSelection::Auto, 10).await.unwrap();
  assert_eq!(summary.fact(FactTable::Skill).updated, 1);
  assert_eq!(summary.fact(FactTable::Skill).inserted, 0);

  let skills = s.fact_rows(FactTable::Skill).await.unwrap();
  assert_eq!(skills.len(), 3);
  let excel = skills
    .iter()
    .find(|f| f.key["skill_name"] == AttrValue::Text("Excel".into()))
    .unwrap();
  assert_eq!(excel.attributes["proficiency"], AttrValue::Text("Expert".into()));
  assert_eq!(excel.loaded_at, at(10));
}

#[tokio::test]
async fn existing_job_facts_are_immutable() {
  let s = store().await;
  load(&s, ROSTER, ModeSelection::Auto, 9).await.unwrap();

  let ended = r#"[{"email": "alice@x.com", "jobs": [
    {"employer": "Acme", "title": "Engineer", "start_date": "2018-01-01", "end_date": "2024-01-31"},
    {"employer": "Globex", "title": "Lead", "start_date": "2024-02-01"}
  ]}]"#;
  let summary = load(&s, ended, ModeSelection::Auto, 10).await.unwrap();
  assert_eq!(summary.fact(FactTable::Job).inserted, 1);
  assert_eq!(summary.fact(FactTable::Job).skipped, 1);

  let jobs = s.fact_rows(FactTable::Job).await.unwrap();
  assert_eq!(jobs.len(), 3);
  let acme = jobs
    .iter()
    .find(|f| f.key["employer"] == AttrValue::Text("Acme".into()))
    .unwrap();
  assert_eq!(acme.attributes["is_current"], AttrValue::Boolean(true));
  assert_eq!(acme.loaded_at, at(9));
}

#[tokio::test]
async fn skill_names_are_matched_case_sensitively() {
  let s = store().await;
  let cased = r#"[{"email": "alice@x.com", "skills": [
    {"name": "Rust", "proficiency": "Expert"},
    {"name": "rust", "proficiency": "Beginner"}
  ]}]"#;
  let summary = load(&s, cased, ModeSelection::Auto, 9).await.unwrap();
  assert_eq!(summary.fact(FactTable::Skill).inserted, 2);

  let names: HashSet<_> = s
    .fact_rows(FactTable::Skill)
    .await
    .unwrap()
    .into_iter()
    .map(|f| f.key["skill_name"].clone())
    .collect();
  assert_eq!(names, HashSet::from([AttrValue::from("Rust"), AttrValue::from("rust")]));
}

#[tokio::test]
async fn duplicate_fact_in_one_batch_is_loaded_once() {
  let s = store().await;
  let doubled = r#"[{"email": "alice@x.com", "skills": [
    {"name": "Rust", "proficiency": "Beginner"},
    {"name": "Rust", "proficiency": "Expert"}
  ]}]"#;
  let summary = load(&s, doubled, ModeSelection::Auto, 9).await.unwrap();
  assert_eq!(summary.fact(FactTable::Skill).inserted, 1);
  assert_eq!(summary.fact(FactTable::Skill).skipped, 1);

  let skills = s.fact_rows(FactTable::Skill).await.unwrap();
  assert_eq!(skills.len(), 1);
  assert_eq!(skills[0].attributes["proficiency"], AttrValue::Text("Expert".into()));
}

// ─── Full refresh ────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_refresh_keeps_only_current_batch() {
  let s = store().await;
  load(&s, ROSTER, ModeSelection::Auto, 9).await.unwrap();

  let summary = load(&s, CAROL, ModeSelection::Full, 10).await.unwrap();
  assert_eq!(summary.mode, LoadMode::Full);

  let carol = ids(&s, DimensionTable::Professional).await;
  assert_eq!(carol.len(), 1);
  let carol_id = carol[&NaturalKey::new(["carol@x.com"])];

  for table in FactTable::ALL {
    let rows = s.fact_rows(table).await.unwrap();
    assert!(rows.iter().all(|r| r.professional_id == carol_id), "{table}");
  }
  assert_eq!(count(&s, FactTable::Skill).await, 1);
  assert_eq!(count(&s, FactTable::Job).await, 0);
  assert_eq!(count(&s, DimensionTable::Certification).await, 0);
}

#[tokio::test]
async fn incremental_run_keeps_rows_absent_from_batch() {
  let s = store().await;
  load(&s, ROSTER, ModeSelection::Auto, 9).await.unwrap();
  load(&s, CAROL, ModeSelection::Auto, 10).await.unwrap();

  assert_eq!(count(&s, DimensionTable::Professional).await, 3);
  assert_eq!(count(&s, FactTable::Skill).await, 4);
}

// ─── Resume ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn interrupted_load_resumes_to_the_same_state() {
  let clean = store().await;
  load(&clean, ROSTER, ModeSelection::Auto, 9).await.unwrap();

  // Dimensions and one fact table commit, then the run stops.
  let s = store().await;
  let batch = profdim_extract::extract(ROSTER).unwrap();
  let candidates = profdim_extract::flatten_batch(&batch);
  let mut resolver = KeyResolver::load(&s).await.unwrap();
  for table in DimensionTable::ALL {
    merge_dimension(&s, &s, &mut resolver, table, candidates.dimensions(table), at(9))
      .await
      .unwrap();
  }
  load_facts(
    &s,
    &resolver,
    FactTable::Job,
    candidates.facts(FactTable::Job),
    LoadMode::Full,
    at(9),
  )
  .await
  .unwrap();
  assert!(s.last_run().await.unwrap().is_none());

  let resumed = load(&s, ROSTER, ModeSelection::Auto, 9).await.unwrap();
  assert_eq!(resumed.mode, LoadMode::Incremental);
  assert_eq!(resumed.dimension_overwrites(), 0);
  for table in DimensionTable::ALL {
    assert_eq!(resumed.dimension(table).written(), 0, "{table}");
  }
  assert_eq!(resumed.fact(FactTable::Job).inserted, 0);
  assert_eq!(resumed.fact(FactTable::Job).skipped, 2);
  assert_eq!(resumed.fact(FactTable::Skill).inserted, 3);

  assert_eq!(snapshot(&s).await, snapshot(&clean).await);
  assert_eq!(s.last_run().await.unwrap(), Some(resumed));
}

// ─── Validation ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_email_fails_with_zero_writes() {
  let s = store().await;
  let broken = r#"[{"email": "alice@x.com", "role": "Engineer"}, {"name": "No Email"}]"#;

  let result = load(&s, broken, ModeSelection::Auto, 9).await;
  assert!(matches!(result, Err(Error::Validation(_))));

  for table in Table::all() {
    assert_eq!(s.count(table).await.unwrap(), 0, "{table}");
  }
  assert!(!s.has_state().await.unwrap());
  assert!(s.last_run().await.unwrap().is_none());
}

#[tokio::test]
async fn failed_validation_leaves_prior_load_untouched() {
  let s = store().await;
  load(&s, ROSTER, ModeSelection::Auto, 9).await.unwrap();
  let before = snapshot(&s).await;

  let result = load(&s, r#"[{"email": ""}]"#, ModeSelection::Full, 10).await;
  assert!(matches!(result, Err(Error::Validation(_))));
  assert_eq!(snapshot(&s).await, before);
}

// ─── Mode selection and run log ──────────────────────────────────────────────

#[tokio::test]
async fn explicit_full_overrides_prior_state() {
  let s = store().await;
  load(&s, ROSTER, ModeSelection::Auto, 9).await.unwrap();
  let summary = load(&s, ROSTER, ModeSelection::Full, 10).await.unwrap();
  assert_eq!(summary.mode, LoadMode::Full);
  assert_eq!(summary.dimension(DimensionTable::Professional).inserted, 2);
}

#[tokio::test]
async fn completed_run_is_recorded() {
  let s = store().await;
  let summary = load(&s, ROSTER, ModeSelection::Auto, 9).await.unwrap();
  assert_eq!(summary.records, 2);
  assert_eq!(s.last_run().await.unwrap(), Some(summary));
}

#[tokio::test]
async fn memory_key_store_drives_mode_selection() {
  let s = store().await;
  let keys = MemoryKeyStore::new();

  let first = Orchestrator::new(&s, &keys).with_clock(at(9)).run_document(ROSTER).await.unwrap();
  assert_eq!(first.mode, LoadMode::Full);
  assert!(keys.has_state().await.unwrap());
  // The warehouse's own mapping is untouched.
  assert!(!s.has_state().await.unwrap());

  let second = Orchestrator::new(&s, &keys).with_clock(at(10)).run_document(ROSTER).await.unwrap();
  assert_eq!(second.mode, LoadMode::Incremental);
  assert_eq!(second.dimension_overwrites(), 0);
}

#[tokio::test]
async fn run_file_reads_document_from_disk() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("professionals_nested.json");
  std::fs::write(&path, ROSTER).unwrap();

  let s = store().await;
  let summary = Orchestrator::new(&s, &s).run_file(&path).await.unwrap();
  assert_eq!(summary.records, 2);
  assert_eq!(count(&s, FactTable::Skill).await, 3);
}
