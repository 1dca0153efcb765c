//! Column alias resolution across heterogeneous source schemas.
//!
//! Upstream renamed fields between survey years (`id_caracter` became
//! `id_caracter_ies`, `inscripciones_2018` became `inscritos`, …). Instead of
//! probing columns while processing rows, every canonical attribute carries a
//! static, ordered list of acceptable source names which is resolved once per
//! relation into a column index.

use crate::{
  source::{ColumnSet, SourceRelation},
  value::Value,
};

/// Locate the best available column for `canonical` in `schema`.
///
/// The canonical name itself wins, then each alias in order. Returns the
/// matching column name as spelled in the schema.
pub fn resolve_column<'a>(
  schema: &'a ColumnSet,
  canonical: &str,
  aliases: &[&str],
) -> Option<&'a str> {
  std::iter::once(canonical)
    .chain(aliases.iter().copied())
    .find_map(|name| schema.iter().find(|c| *c == name))
}

/// First present value in an ordered list of candidates.
pub fn coalesce<T, I>(candidates: I) -> Option<T>
where
  I: IntoIterator<Item = Option<T>>,
{
  candidates.into_iter().flatten().next()
}

// ─── Bound columns ───────────────────────────────────────────────────────────

/// An ordered list of column indices in one relation. Reading it for a row
/// yields the first non-missing cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidates(Vec<usize>);

impl Candidates {
  /// Bind every name in `names` that exists in `relation`, preserving order.
  pub fn bind(relation: &SourceRelation, names: &[&str]) -> Self {
    Self(names.iter().filter_map(|n| relation.column_index(n)).collect())
  }

  /// Bind the first of `names` present in `relation` (alias semantics: one
  /// physical column per attribute). `names[0]` is the preferred spelling.
  pub fn bind_first(relation: &SourceRelation, names: &[&str]) -> Self {
    let schema = relation.schema();
    Self(
      names
        .split_first()
        .and_then(|(canonical, aliases)| resolve_column(&schema, canonical, aliases))
        .and_then(|name| relation.column_index(name))
        .into_iter()
        .collect(),
    )
  }

  /// Append the columns of `fallback` after this binding's own columns.
  pub fn or(mut self, fallback: &Candidates) -> Self {
    for idx in &fallback.0 {
      if !self.0.contains(idx) {
        self.0.push(*idx);
      }
    }
    self
  }

  pub fn is_bound(&self) -> bool { !self.0.is_empty() }

  /// The first non-missing cell among the bound columns.
  pub fn value<'r>(&self, row: &'r [Value]) -> Option<&'r Value> {
    coalesce(
      self
        .0
        .iter()
        .map(|i| row.get(*i).filter(|v| !v.is_missing())),
    )
  }

  /// The first bound cell that parses as an integer; unparsable cells fall
  /// through to the next column.
  pub fn int(&self, row: &[Value]) -> Option<i64> {
    coalesce(self.0.iter().map(|i| row.get(*i).and_then(Value::as_int)))
  }

  pub fn text(&self, row: &[Value]) -> Option<String> {
    coalesce(self.0.iter().map(|i| row.get(*i).and_then(Value::as_text)))
  }
}
