//! Source relations: the already-materialised "unified" survey extracts the
//! engine consumes, one per survey category.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{Error, Result, value::Value};

// ─── Source names ────────────────────────────────────────────────────────────

pub const ADMITTED:          &str = "admitidos_unified";
pub const GRADUATED:         &str = "graduados_unified";
pub const APPLIED:           &str = "inscritos_unified";
pub const ENROLLED:          &str = "matriculados_unified";
pub const FIRST_TERM:        &str = "matriculados_primer_curso_unified";
pub const TEACHERS:          &str = "docentes_unified";
pub const ADMINISTRATIVE:    &str = "administrativos_unified";

/// Student relations, in source-priority order.
pub const STUDENT_SOURCES: &[&str] = &[ADMITTED, GRADUATED, APPLIED, ENROLLED, FIRST_TERM];

/// Every relation the engine reads, in source-priority order. Position in this
/// list decides which candidate wins a completeness tie during deduplication.
pub const ALL_SOURCES: &[&str] = &[
  ADMITTED,
  GRADUATED,
  APPLIED,
  ENROLLED,
  FIRST_TERM,
  TEACHERS,
  ADMINISTRATIVE,
];

/// Deduplication priority of a source; unknown names sort last.
pub fn priority(name: &str) -> usize {
  ALL_SOURCES
    .iter()
    .position(|s| *s == name)
    .unwrap_or(ALL_SOURCES.len())
}

// ─── Column set ──────────────────────────────────────────────────────────────

/// The normalised column names of one relation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSet(BTreeSet<String>);

impl ColumnSet {
  pub fn contains(&self, column: &str) -> bool { self.0.contains(column) }

  pub fn iter(&self) -> impl Iterator<Item = &str> { self.0.iter().map(String::as_str) }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl<S: Into<String>> FromIterator<S> for ColumnSet {
  fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
    Self(iter.into_iter().map(Into::into).collect())
  }
}

// ─── Relation ────────────────────────────────────────────────────────────────

/// A fully-read source relation. Rows are positional and always as wide as
/// `columns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRelation {
  pub name:    String,
  pub columns: Vec<String>,
  pub rows:    Vec<Vec<Value>>,
}

impl SourceRelation {
  pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
    Self { name: name.into(), columns, rows: Vec::new() }
  }

  /// Build a relation from string column names and rows; mostly for tests and
  /// staging.
  pub fn from_rows<C, R>(name: &str, columns: C, rows: R) -> Self
  where
    C: IntoIterator,
    C::Item: Into<String>,
    R: IntoIterator<Item = Vec<Value>>,
  {
    let mut relation = Self::new(name, columns.into_iter().map(Into::into).collect());
    for row in rows {
      relation.push_row(row);
    }
    relation
  }

  /// Append a row, padding or truncating it to the relation's width.
  pub fn push_row(&mut self, mut row: Vec<Value>) {
    row.resize(self.columns.len(), Value::Null);
    self.rows.push(row);
  }

  pub fn schema(&self) -> ColumnSet { self.columns.iter().cloned().collect() }

  pub fn column_index(&self, column: &str) -> Option<usize> {
    self.columns.iter().position(|c| c == column)
  }

  pub fn len(&self) -> usize { self.rows.len() }

  pub fn is_empty(&self) -> bool { self.rows.is_empty() }
}

// ─── Source set ──────────────────────────────────────────────────────────────

/// All source relations available to one rebuild, keyed by name.
///
/// Read once at the start of a rebuild and shared by reference with every
/// extractor and resolver; never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
  relations: BTreeMap<String, SourceRelation>,
}

impl SourceSet {
  pub fn new() -> Self { Self::default() }

  pub fn insert(&mut self, relation: SourceRelation) {
    self.relations.insert(relation.name.clone(), relation);
  }

  pub fn get(&self, name: &str) -> Option<&SourceRelation> { self.relations.get(name) }

  /// Like [`get`](Self::get), but absence is an [`Error::MissingSource`].
  pub fn require(&self, name: &str) -> Result<&SourceRelation> {
    self.get(name).ok_or_else(|| Error::MissingSource(name.to_owned()))
  }

  pub fn contains(&self, name: &str) -> bool { self.relations.contains_key(name) }

  pub fn len(&self) -> usize { self.relations.len() }

  pub fn is_empty(&self) -> bool { self.relations.is_empty() }

  /// Relations present among `names`, in the order given.
  pub fn select<'a>(&'a self, names: &'a [&'a str]) -> impl Iterator<Item = &'a SourceRelation> {
    names.iter().filter_map(|n| self.relations.get(*n))
  }

  /// Names among `names` that are not present.
  pub fn missing(&self, names: &[&str]) -> Vec<String> {
    names
      .iter()
      .filter(|n| !self.relations.contains_key(**n))
      .map(|n| (*n).to_owned())
      .collect()
  }
}

impl FromIterator<SourceRelation> for SourceSet {
  fn from_iter<I: IntoIterator<Item = SourceRelation>>(iter: I) -> Self {
    let mut set = Self::new();
    for relation in iter {
      set.insert(relation);
    }
    set
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn priority_follows_declared_order() {
    assert!(priority(ADMITTED) < priority(ENROLLED));
    assert!(priority(ENROLLED) < priority(TEACHERS));
    assert_eq!(priority("something_else"), ALL_SOURCES.len());
  }

  #[test]
  fn rows_are_padded_to_width() {
    let rel = SourceRelation::from_rows("t", ["a", "b", "c"], [vec![Value::Integer(1)]]);
    assert_eq!(rel.rows[0].len(), 3);
    assert_eq!(rel.rows[0][2], Value::Null);
  }

  #[test]
  fn missing_reports_absent_names() {
    let set: SourceSet = [SourceRelation::new(ENROLLED, vec![])].into_iter().collect();
    assert_eq!(set.missing(&[ENROLLED, TEACHERS]), vec![TEACHERS.to_owned()]);
    assert_eq!(set.select(ALL_SOURCES).count(), 1);
    assert!(matches!(set.require(TEACHERS), Err(Error::MissingSource(name)) if name == TEACHERS));
  }
}
