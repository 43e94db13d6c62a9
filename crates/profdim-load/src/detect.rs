//! Change detection for dimension rows.
//!
//! Fingerprints are SHA-256 hashes over a canonical encoding of the attribute
//! map. The map is ordered by column name, so field order in the source never
//! affects the result.

use std::collections::HashMap;

use profdim_core::row::{AttrValue, Attributes, Fingerprint, SurrogateKey};
use sha2::{Digest, Sha256};

/// Compute the fingerprint of a row's non-key attributes.
pub fn fingerprint(attributes: &Attributes) -> Fingerprint {
  let mut hasher = Sha256::new();
  for (name, value) in attributes {
    hasher.update(name.as_bytes());
    hasher.update([0u8]);
    match value {
      AttrValue::Null => hasher.update(b"n"),
      AttrValue::Integer(i) => {
        hasher.update(b"i");
        hasher.update(i.to_le_bytes());
      }
      AttrValue::Text(s) => {
        hasher.update(b"t");
        hasher.update((s.len() as u64).to_le_bytes());
        hasher.update(s.as_bytes());
      }
      AttrValue::Date(d) => {
        hasher.update(b"d");
        hasher.update(d.format("%Y-%m-%d").to_string().as_bytes());
      }
      AttrValue::Boolean(b) => {
        hasher.update(b"b");
        hasher.update([u8::from(*b)]);
      }
    }
  }
  Fingerprint(hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
  /// No stored row.
  New,
  /// Stored fingerprint matches; skip the write.
  Unchanged,
  /// Stored fingerprint differs; overwrite.
  Changed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
  pub kind:        ChangeKind,
  pub fingerprint: Fingerprint,
}

/// Classifies candidate rows against the fingerprints already stored for one
/// dimension table.
#[derive(Debug, Default)]
pub struct ChangeDetector {
  stored: HashMap<SurrogateKey, Fingerprint>,
}

impl ChangeDetector {
  pub fn new(stored: HashMap<SurrogateKey, Fingerprint>) -> Self { Self { stored } }

  pub fn classify(&self, key: SurrogateKey, attributes: &Attributes) -> Verdict {
    let fingerprint = fingerprint(attributes);
    let kind = match self.stored.get(&key) {
      None => ChangeKind::New,
      Some(stored) if *stored == fingerprint => ChangeKind::Unchanged,
      Some(_) => ChangeKind::Changed,
    };
    Verdict { kind, fingerprint }
  }
}
