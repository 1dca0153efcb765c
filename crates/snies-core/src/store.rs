//! The `Warehouse` trait.
//!
//! Implemented by storage backends (`snies-store-sqlite`,
//! `snies-store-postgres`). The rebuild orchestrator depends on this
//! abstraction only; it never issues SQL itself.

use std::future::Future;

use crate::{
  dimension::{DimensionRow, DimensionSpec},
  fact::{FactRow, FactSpec},
  lookup::KeyLookup,
  source::SourceSet,
  validate::ValidationReport,
};

/// Abstraction over a star-schema storage backend.
///
/// Every write replaces a whole table: there is no incremental path. Where the
/// backend supports it, each replacement runs in a single transaction so a
/// failed rebuild never leaves a half-loaded table behind.
pub trait Warehouse: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Sources ───────────────────────────────────────────────────────────

  /// Read every relation among `names` that exists. Absent relations are
  /// simply not part of the returned set.
  fn load_sources<'a>(
    &'a self,
    names: &'a [&'static str],
  ) -> impl Future<Output = Result<SourceSet, Self::Error>> + Send + 'a;

  // ── Star model ────────────────────────────────────────────────────────

  /// Create the ten star tables if they do not exist yet.
  fn ensure_schema(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Atomically replace the contents of a dimension table.
  ///
  /// Fact rows referencing the dimension are removed first, existing rows are
  /// deleted, `rows` are inserted in order (so surrogate ids follow natural
  /// key order) and secondary indexes are rebuilt. The returned lookup is read
  /// back from the table after the insert.
  fn replace_dimension(
    &self,
    spec: &'static DimensionSpec,
    rows: Vec<DimensionRow>,
    batch_size: usize,
  ) -> impl Future<Output = Result<KeyLookup, Self::Error>> + Send + '_;

  /// Atomically replace the contents of a fact table, returning the number of
  /// rows written.
  fn replace_facts(
    &self,
    spec: &'static FactSpec,
    rows: Vec<FactRow>,
    batch_size: usize,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Validation ────────────────────────────────────────────────────────

  /// Count rows and orphaned foreign keys and compute the descriptive
  /// aggregates. `top_n` bounds the top-institutions list.
  fn validate(
    &self,
    top_n: usize,
  ) -> impl Future<Output = Result<ValidationReport, Self::Error>> + Send + '_;
}
