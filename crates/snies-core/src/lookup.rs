//! Natural-key → surrogate-id snapshots.
//!
//! A [`KeyLookup`] is built from what a backend has just persisted, never from
//! an in-memory counter, and is immutable afterwards. The fact resolver only
//! ever sees a finished [`LookupSet`].

use std::collections::{BTreeMap, HashMap};

use crate::dimension::{DimensionKind, NaturalKey};

/// The finalized key map of one dimension.
#[derive(Debug, Clone)]
pub struct KeyLookup {
  kind: DimensionKind,
  ids:  HashMap<NaturalKey, i64>,
}

impl KeyLookup {
  /// Build a lookup from `(natural key, surrogate id)` pairs read back from
  /// storage.
  pub fn from_persisted(
    kind: DimensionKind,
    rows: impl IntoIterator<Item = (NaturalKey, i64)>,
  ) -> Self {
    Self { kind, ids: rows.into_iter().collect() }
  }

  pub fn empty(kind: DimensionKind) -> Self { Self { kind, ids: HashMap::new() } }

  pub fn kind(&self) -> DimensionKind { self.kind }

  pub fn get(&self, key: &NaturalKey) -> Option<i64> { self.ids.get(key).copied() }

  /// Resolve a single-column natural key.
  pub fn get_one(&self, code: i64) -> Option<i64> { self.get(&NaturalKey::one(code)) }

  /// Resolve a two-column natural key.
  pub fn get_pair(&self, a: i64, b: i64) -> Option<i64> { self.get(&NaturalKey::pair(a, b)) }

  pub fn len(&self) -> usize { self.ids.len() }

  pub fn is_empty(&self) -> bool { self.ids.is_empty() }
}

/// Lookups for every dimension of one rebuild.
#[derive(Debug, Clone, Default)]
pub struct LookupSet {
  lookups: BTreeMap<DimensionKind, KeyLookup>,
}

impl LookupSet {
  pub fn new() -> Self { Self::default() }

  pub fn insert(&mut self, lookup: KeyLookup) { self.lookups.insert(lookup.kind, lookup); }

  /// The lookup for `kind`. A dimension that was never loaded resolves
  /// nothing.
  pub fn get(&self, kind: DimensionKind) -> Option<&KeyLookup> { self.lookups.get(&kind) }

  pub fn resolve(&self, kind: DimensionKind, key: &NaturalKey) -> Option<i64> {
    self.get(kind).and_then(|l| l.get(key))
  }

  /// `true` once all seven dimensions have a lookup.
  pub fn is_complete(&self) -> bool { DimensionKind::ALL.iter().all(|k| self.lookups.contains_key(k)) }
}

impl FromIterator<KeyLookup> for LookupSet {
  fn from_iter<I: IntoIterator<Item = KeyLookup>>(iter: I) -> Self {
    let mut set = Self::new();
    for lookup in iter {
      set.insert(lookup);
    }
    set
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn resolves_single_and_composite_keys() {
    let inst = KeyLookup::from_persisted(DimensionKind::Institution, [(NaturalKey::one(101), 1)]);
    let time = KeyLookup::from_persisted(
      DimensionKind::TimePeriod,
      [(NaturalKey::pair(2020, 1), 1), (NaturalKey::pair(2020, 2), 2)],
    );

    assert_eq!(inst.get_one(101), Some(1));
    assert_eq!(inst.get_one(999), None);
    assert_eq!(time.get_pair(2020, 2), Some(2));
    assert_eq!(time.get_pair(2, 2020), None);
  }

  #[test]
  fn set_completeness() {
    let mut set: LookupSet = [KeyLookup::empty(DimensionKind::Sex)].into_iter().collect();
    assert!(!set.is_complete());
    assert_eq!(set.resolve(DimensionKind::Program, &NaturalKey::one(1)), None);

    for kind in DimensionKind::ALL {
      set.insert(KeyLookup::empty(kind));
    }
    assert!(set.is_complete());
  }
}
