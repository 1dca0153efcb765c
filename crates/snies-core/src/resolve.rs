//! Fact resolver.
//!
//! Turns the rows of one source relation into [`FactRow`]s for one
//! [`FactCategory`]. Every row ends up in exactly one bucket:
//!
//! - `filtered`: a required natural-key cell or the metric is empty;
//! - `skipped`: a key does not resolve through its lookup, or the measure is
//!   unparsable, zero or negative;
//! - `inserted`: all keys resolved and the measure is positive.
//!
//! A category whose relation is absent, or whose relation lacks a required
//! column entirely, is skipped wholesale with a warning.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
  alias::Candidates,
  dimension::NaturalKey,
  fact::{FactCategory, FactRow, ForeignKey},
  lookup::LookupSet,
  source::{SourceRelation, SourceSet},
  value::Value,
};

// ─── Outcome ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum CategoryStatus {
  Loaded,
  Skipped(String),
}

impl fmt::Display for CategoryStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Loaded => f.write_str("loaded"),
      Self::Skipped(reason) => write!(f, "skipped ({reason})"),
    }
  }
}

/// Row accounting for one fact category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryOutcome {
  pub category: String,
  pub table:    String,
  pub read:     usize,
  pub filtered: usize,
  pub skipped:  usize,
  pub inserted: usize,
  pub status:   CategoryStatus,
}

impl CategoryOutcome {
  fn new(category: &FactCategory) -> Self {
    Self {
      category: category.name.to_owned(),
      table:    category.spec.table.to_owned(),
      read:     0,
      filtered: 0,
      skipped:  0,
      inserted: 0,
      status:   CategoryStatus::Loaded,
    }
  }

  fn skip(mut self, reason: String) -> Self {
    self.status = CategoryStatus::Skipped(reason);
    self
  }
}

/// Rows ready for persistence plus their accounting.
#[derive(Debug, Clone)]
pub struct Resolution {
  pub outcome: CategoryOutcome,
  pub rows:    Vec<FactRow>,
}

// ─── Binding ─────────────────────────────────────────────────────────────────

/// A foreign key bound to column indices of one relation.
struct BoundKey<'a> {
  fk:    &'a ForeignKey,
  parts: Vec<Candidates>,
}

impl BoundKey<'_> {
  fn bind<'a>(fk: &'a ForeignKey, relation: &SourceRelation) -> Option<BoundKey<'a>> {
    let mut parts: Vec<Candidates> =
      fk.key.iter().map(|names| Candidates::bind_first(relation, names)).collect();

    if let Some(fallback) = fk.fallback
      && let [only] = parts.as_mut_slice()
    {
      *only = std::mem::take(only).or(&Candidates::bind_first(relation, fallback));
    }

    parts.iter().all(Candidates::is_bound).then_some(BoundKey { fk, parts })
  }

  fn present(&self, row: &[Value]) -> bool { self.parts.iter().all(|p| p.value(row).is_some()) }

  fn resolve(&self, row: &[Value], lookups: &LookupSet) -> Option<i64> {
    let key = self.parts.iter().map(|p| p.int(row)).collect::<Option<Vec<_>>>()?;
    lookups.get(self.fk.dimension)?.get(&NaturalKey(key))
  }
}

// ─── Resolver ────────────────────────────────────────────────────────────────

/// Resolve `category` against `sources` using the finished `lookups`.
pub fn resolve(category: &FactCategory, sources: &SourceSet, lookups: &LookupSet) -> Resolution {
  let outcome = CategoryOutcome::new(category);

  let relation = match sources.require(category.source) {
    Ok(relation) => relation,
    Err(err) => {
      warn!(category = category.name, "{err}");
      return Resolution { outcome: outcome.skip(err.to_string()), rows: Vec::new() };
    }
  };

  match resolve_relation(category, relation, lookups, outcome) {
    Ok(resolution) => resolution,
    Err(outcome) => {
      warn!(category = category.name, source = %relation.name, status = %outcome.status, "category skipped");
      Resolution { outcome, rows: Vec::new() }
    }
  }
}

fn resolve_relation(
  category: &FactCategory,
  relation: &SourceRelation,
  lookups: &LookupSet,
  mut outcome: CategoryOutcome,
) -> Result<Resolution, CategoryOutcome> {
  let spec = category.spec;

  let mut keys = Vec::with_capacity(spec.foreign_keys.len());
  for fk in spec.foreign_keys {
    match BoundKey::bind(fk, relation) {
      Some(bound) => keys.push(bound),
      None => return Err(outcome.skip(format!("no source column for {}", fk.column))),
    }
  }

  let metric = Candidates::bind(relation, category.metrics);
  if !metric.is_bound() {
    return Err(outcome.skip(format!("none of the metric columns {:?} present", category.metrics)));
  }

  let supplements: Vec<Candidates> = spec
    .supplements
    .iter()
    .map(|s| Candidates::bind_first(relation, s.source))
    .collect();

  let mut rows = Vec::new();
  for raw in &relation.rows {
    outcome.read += 1;

    if !keys.iter().all(|k| k.present(raw)) || metric.value(raw).is_none() {
      outcome.filtered += 1;
      continue;
    }

    let measure = match metric.int(raw) {
      Some(m) if m > 0 => m,
      _ => {
        outcome.skipped += 1;
        continue;
      }
    };

    let Some(resolved) = keys.iter().map(|k| k.resolve(raw, lookups)).collect::<Option<Vec<_>>>()
    else {
      outcome.skipped += 1;
      continue;
    };

    rows.push(FactRow {
      event_type: category.event_type,
      keys: resolved,
      measure,
      supplements: supplements.iter().map(|s| s.int(raw).unwrap_or(0).max(0)).collect(),
    });
  }

  outcome.inserted = rows.len();
  debug!(
    category = category.name,
    read = outcome.read,
    filtered = outcome.filtered,
    skipped = outcome.skipped,
    resolved = outcome.inserted,
    "resolved category"
  );

  Ok(Resolution { outcome, rows })
}
