//! Integrity validation report.
//!
//! Backends compute the figures with SQL; this module owns the catalog of
//! foreign-key triples to check and the report shape. Orphans should never
//! occur because the resolver only emits fully resolved rows, so a non-zero
//! count is logged as a regression but never rolls anything back.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{
  dimension::DimensionKind,
  fact::{EventType, FactKind},
};

/// One `(fact table, foreign-key column, dimension table)` combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKeyTriple {
  pub fact_table:      &'static str,
  pub column:          &'static str,
  pub dimension_table: &'static str,
}

/// Every foreign key of every fact table, in catalog order.
pub fn foreign_key_triples() -> Vec<ForeignKeyTriple> {
  FactKind::ALL
    .iter()
    .flat_map(|kind| {
      let spec = kind.spec();
      spec.foreign_keys.iter().map(move |fk| ForeignKeyTriple {
        fact_table:      spec.table,
        column:          fk.column,
        dimension_table: fk.dimension.table(),
      })
    })
    .collect()
}

/// Every table of the star model: dimensions first, then facts.
pub fn star_tables() -> Vec<&'static str> {
  DimensionKind::ALL
    .iter()
    .map(|k| k.table())
    .chain(FactKind::ALL.iter().map(|k| k.table()))
    .collect()
}

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCount {
  pub table: String,
  pub rows:  u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanCheck {
  pub fact_table:      String,
  pub column:          String,
  pub dimension_table: String,
  pub orphans:         u64,
}

impl OrphanCheck {
  pub fn new(triple: &ForeignKeyTriple, orphans: u64) -> Self {
    Self {
      fact_table: triple.fact_table.to_owned(),
      column: triple.column.to_owned(),
      dimension_table: triple.dimension_table.to_owned(),
      orphans,
    }
  }
}

/// Student-event totals for one event type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTotal {
  pub event_type: EventType,
  pub rows:       u64,
  pub quantity:   i64,
}

/// An institution ranked by enrolled quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstitutionTotal {
  pub institution_code: i64,
  pub institution_name: String,
  pub quantity:         i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
  pub tables:           Vec<TableCount>,
  pub orphans:          Vec<OrphanCheck>,
  pub event_totals:     Vec<EventTotal>,
  pub top_institutions: Vec<InstitutionTotal>,
}

impl ValidationReport {
  /// `true` when no fact row references a missing dimension row.
  pub fn is_clean(&self) -> bool { self.total_orphans() == 0 }

  pub fn total_orphans(&self) -> u64 { self.orphans.iter().map(|c| c.orphans).sum() }

  pub fn rows(&self, table: &str) -> Option<u64> {
    self.tables.iter().find(|t| t.table == table).map(|t| t.rows)
  }

  /// Emit the report through `tracing`.
  pub fn log(&self) {
    for t in &self.tables {
      info!(table = %t.table, rows = t.rows, "table row count");
    }
    for check in &self.orphans {
      if check.orphans > 0 {
        error!(
          fact_table = %check.fact_table,
          column = %check.column,
          dimension_table = %check.dimension_table,
          orphans = check.orphans,
          "orphaned foreign keys"
        );
      }
    }
    for total in &self.event_totals {
      info!(event_type = %total.event_type, rows = total.rows, quantity = total.quantity, "student events");
    }
    for (rank, inst) in self.top_institutions.iter().enumerate() {
      info!(
        rank = rank + 1,
        institution_code = inst.institution_code,
        institution = %inst.institution_name,
        enrolled = inst.quantity,
        "top institution"
      );
    }
    if self.is_clean() {
      info!(checks = self.orphans.len(), "referential integrity verified");
    } else {
      error!(orphans = self.total_orphans(), "referential integrity violated");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fifteen_foreign_keys_are_checked() {
    let triples = foreign_key_triples();
    assert_eq!(triples.len(), 15);
    assert!(triples.contains(&ForeignKeyTriple {
      fact_table:      "fact_student_event",
      column:          "program_geography_id",
      dimension_table: "dim_geography",
    }));
    assert!(triples.contains(&ForeignKeyTriple {
      fact_table:      "fact_teacher",
      column:          "workload_id",
      dimension_table: "dim_teacher_workload",
    }));
  }

  #[test]
  fn ten_tables_in_the_star() {
    let tables = star_tables();
    assert_eq!(tables.len(), 10);
    assert_eq!(tables[0], "dim_institution");
    assert_eq!(tables[9], "fact_administrative_staff");
  }

  #[test]
  fn any_orphan_makes_the_report_dirty() {
    let triples = foreign_key_triples();
    let mut report = ValidationReport {
      orphans: triples.iter().map(|t| OrphanCheck::new(t, 0)).collect(),
      ..Default::default()
    };
    assert!(report.is_clean());

    report.orphans[3].orphans = 2;
    assert!(!report.is_clean());
    assert_eq!(report.total_orphans(), 2);
  }
}
