//! The three fact tables of the star model and the static category catalog
//! that feeds them.
//!
//! A [`FactSpec`] describes a target table: its foreign keys (each naming the
//! dimension it resolves through and the source aliases of every natural-key
//! component), its measure, and any supplementary counts. A [`FactCategory`]
//! binds one source relation to a [`FactSpec`] together with its metric
//! candidates.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
  dimension::{
    CONTRACT_CODE, DEDICATION_CODE, DimensionKind, EDUCATION_LEVEL, IES_MUNICIPALITY,
    INSTITUTION_CODE, IndexSpec, PROGRAM_MUNICIPALITY, SEMESTER, SEX_CODE, SNIES_CODE, YEAR,
  },
  source,
  value::Value,
};

// ─── Kinds ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
  StudentEvent,
  Teacher,
  AdministrativeStaff,
}

impl FactKind {
  pub const ALL: [Self; 3] = [Self::StudentEvent, Self::Teacher, Self::AdministrativeStaff];

  pub fn spec(self) -> &'static FactSpec {
    match self {
      Self::StudentEvent => &STUDENT_EVENT,
      Self::Teacher => &TEACHER,
      Self::AdministrativeStaff => &ADMINISTRATIVE_STAFF,
    }
  }

  pub fn table(self) -> &'static str { self.spec().table }

  /// Fact tables holding at least one foreign key into `dimension`.
  pub fn referencing(dimension: DimensionKind) -> Vec<&'static str> {
    Self::ALL
      .iter()
      .map(|k| k.spec())
      .filter(|f| f.foreign_keys.iter().any(|fk| fk.dimension == dimension))
      .map(|f| f.table)
      .collect()
  }
}

impl fmt::Display for FactKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.table()) }
}

/// Discriminator stored on every `fact_student_event` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
  Applied,
  Admitted,
  Enrolled,
  RegisteredFirstTerm,
  Graduated,
}

impl EventType {
  pub const ALL: [Self; 5] = [
    Self::Applied,
    Self::Admitted,
    Self::Enrolled,
    Self::RegisteredFirstTerm,
    Self::Graduated,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Applied => "applied",
      Self::Admitted => "admitted",
      Self::Enrolled => "enrolled",
      Self::RegisteredFirstTerm => "registered_first_term",
      Self::Graduated => "graduated",
    }
  }

  pub fn parse(s: &str) -> Option<Self> { Self::ALL.into_iter().find(|e| e.as_str() == s) }
}

impl fmt::Display for EventType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

// ─── Catalog types ───────────────────────────────────────────────────────────

/// A foreign-key column of a fact table.
#[derive(Debug)]
pub struct ForeignKey {
  pub column:    &'static str,
  pub dimension: DimensionKind,
  /// Source aliases for each natural-key component, in key order.
  pub key:       &'static [&'static [&'static str]],
  /// Read per row when the key column is absent or empty. Only valid for
  /// single-component keys.
  pub fallback:  Option<&'static [&'static str]>,
}

/// A supplementary count copied from the source; missing or negative values
/// become 0.
#[derive(Debug)]
pub struct Supplement {
  pub column: &'static str,
  pub source: &'static [&'static str],
}

#[derive(Debug)]
pub struct FactSpec {
  pub kind:         FactKind,
  pub table:        &'static str,
  pub has_event:    bool,
  pub foreign_keys: &'static [ForeignKey],
  pub measure:      &'static str,
  pub supplements:  &'static [Supplement],
  pub indexes:      &'static [IndexSpec],
}

impl FactSpec {
  /// Insert columns in row order, excluding `id` and `created_at`.
  pub fn columns(&self) -> Vec<&'static str> {
    let mut cols = Vec::with_capacity(self.width());
    if self.has_event {
      cols.push("event_type");
    }
    cols.extend(self.foreign_keys.iter().map(|fk| fk.column));
    cols.push(self.measure);
    cols.extend(self.supplements.iter().map(|s| s.column));
    cols
  }

  pub fn width(&self) -> usize {
    usize::from(self.has_event) + self.foreign_keys.len() + 1 + self.supplements.len()
  }

  pub fn categories(&self) -> impl Iterator<Item = &'static FactCategory> + '_ {
    CATEGORIES.iter().filter(move |c| c.spec.kind == self.kind)
  }
}

/// One source relation feeding one fact table.
#[derive(Debug)]
pub struct FactCategory {
  pub name:       &'static str,
  pub spec:       &'static FactSpec,
  pub source:     &'static str,
  pub event_type: Option<EventType>,
  /// Measure columns, current name first; later entries are legacy names.
  pub metrics:    &'static [&'static str],
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// A resolved fact row: every foreign key already a surrogate id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactRow {
  pub event_type:  Option<EventType>,
  pub keys:        Vec<i64>,
  pub measure:     i64,
  pub supplements: Vec<i64>,
}

impl FactRow {
  /// Cell values aligned with [`FactSpec::columns`].
  pub fn values(&self) -> Vec<Value> {
    let mut out = Vec::with_capacity(self.keys.len() + self.supplements.len() + 2);
    if let Some(event) = self.event_type {
      out.push(Value::from(event.as_str()));
    }
    out.extend(self.keys.iter().copied().map(Value::Integer));
    out.push(Value::Integer(self.measure));
    out.extend(self.supplements.iter().copied().map(Value::Integer));
    out
  }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

const INSTITUTION_FK: ForeignKey = ForeignKey {
  column:    "institution_id",
  dimension: DimensionKind::Institution,
  key:       &[INSTITUTION_CODE],
  fallback:  None,
};

const INSTITUTION_GEOGRAPHY_FK: ForeignKey = ForeignKey {
  column:    "institution_geography_id",
  dimension: DimensionKind::Geography,
  key:       &[IES_MUNICIPALITY],
  fallback:  None,
};

const SEX_FK: ForeignKey = ForeignKey {
  column:    "sex_id",
  dimension: DimensionKind::Sex,
  key:       &[SEX_CODE],
  fallback:  None,
};

const TIME_FK: ForeignKey = ForeignKey {
  column:    "time_id",
  dimension: DimensionKind::TimePeriod,
  key:       &[YEAR, SEMESTER],
  fallback:  None,
};

pub static STUDENT_EVENT: FactSpec = FactSpec {
  kind:         FactKind::StudentEvent,
  table:        "fact_student_event",
  has_event:    true,
  foreign_keys: &[
    INSTITUTION_FK,
    ForeignKey {
      column:    "program_id",
      dimension: DimensionKind::Program,
      key:       &[SNIES_CODE],
      fallback:  None,
    },
    INSTITUTION_GEOGRAPHY_FK,
    ForeignKey {
      column:    "program_geography_id",
      dimension: DimensionKind::Geography,
      key:       &[PROGRAM_MUNICIPALITY],
      fallback:  Some(IES_MUNICIPALITY),
    },
    SEX_FK,
    TIME_FK,
  ],
  measure:      "quantity",
  supplements:  &[],
  indexes:      &[
    IndexSpec { name: "idx_fact_student_event_institution", columns: &["institution_id"] },
    IndexSpec { name: "idx_fact_student_event_program", columns: &["program_id"] },
    IndexSpec {
      name:    "idx_fact_student_event_institution_geography",
      columns: &["institution_geography_id"],
    },
    IndexSpec {
      name:    "idx_fact_student_event_program_geography",
      columns: &["program_geography_id"],
    },
    IndexSpec { name: "idx_fact_student_event_sex", columns: &["sex_id"] },
    IndexSpec { name: "idx_fact_student_event_time", columns: &["time_id"] },
    IndexSpec { name: "idx_fact_student_event_type_time", columns: &["event_type", "time_id"] },
    IndexSpec {
      name:    "idx_fact_student_event_type_institution_time",
      columns: &["event_type", "institution_id", "time_id"],
    },
  ],
};

pub static TEACHER: FactSpec = FactSpec {
  kind:         FactKind::Teacher,
  table:        "fact_teacher",
  has_event:    false,
  foreign_keys: &[
    INSTITUTION_FK,
    INSTITUTION_GEOGRAPHY_FK,
    SEX_FK,
    ForeignKey {
      column:    "education_level_id",
      dimension: DimensionKind::TeacherEducationLevel,
      key:       &[EDUCATION_LEVEL],
      fallback:  None,
    },
    ForeignKey {
      column:    "workload_id",
      dimension: DimensionKind::TeacherWorkload,
      key:       &[DEDICATION_CODE, CONTRACT_CODE],
      fallback:  None,
    },
    TIME_FK,
  ],
  measure:      "teacher_count",
  supplements:  &[],
  indexes:      &[
    IndexSpec { name: "idx_fact_teacher_institution", columns: &["institution_id"] },
    IndexSpec {
      name:    "idx_fact_teacher_institution_geography",
      columns: &["institution_geography_id"],
    },
    IndexSpec { name: "idx_fact_teacher_sex", columns: &["sex_id"] },
    IndexSpec { name: "idx_fact_teacher_education_level", columns: &["education_level_id"] },
    IndexSpec { name: "idx_fact_teacher_workload", columns: &["workload_id"] },
    IndexSpec { name: "idx_fact_teacher_time", columns: &["time_id"] },
    IndexSpec {
      name:    "idx_fact_teacher_institution_time",
      columns: &["institution_id", "time_id"],
    },
  ],
};

pub static ADMINISTRATIVE_STAFF: FactSpec = FactSpec {
  kind:         FactKind::AdministrativeStaff,
  table:        "fact_administrative_staff",
  has_event:    false,
  foreign_keys: &[INSTITUTION_FK, INSTITUTION_GEOGRAPHY_FK, TIME_FK],
  measure:      "total",
  supplements:  &[
    Supplement { column: "auxiliary", source: &["auxiliar"] },
    Supplement { column: "technical", source: &["tecnico"] },
    Supplement { column: "professional", source: &["profesional"] },
    Supplement { column: "executive", source: &["directivo"] },
  ],
  indexes:      &[
    IndexSpec { name: "idx_fact_administrative_staff_institution", columns: &["institution_id"] },
    IndexSpec {
      name:    "idx_fact_administrative_staff_institution_geography",
      columns: &["institution_geography_id"],
    },
    IndexSpec { name: "idx_fact_administrative_staff_time", columns: &["time_id"] },
    IndexSpec {
      name:    "idx_fact_administrative_staff_institution_time",
      columns: &["institution_id", "time_id"],
    },
  ],
};

/// Every category, in load order.
pub static CATEGORIES: &[FactCategory] = &[
  FactCategory {
    name:       "applied",
    spec:       &STUDENT_EVENT,
    source:     source::APPLIED,
    event_type: Some(EventType::Applied),
    metrics:    &["inscritos", "inscripciones_2018"],
  },
  FactCategory {
    name:       "admitted",
    spec:       &STUDENT_EVENT,
    source:     source::ADMITTED,
    event_type: Some(EventType::Admitted),
    metrics:    &["admitidos", "admisiones_2018"],
  },
  FactCategory {
    name:       "enrolled",
    spec:       &STUDENT_EVENT,
    source:     source::ENROLLED,
    event_type: Some(EventType::Enrolled),
    metrics:    &["matriculados", "matriculados_2018"],
  },
  FactCategory {
    name:       "registered_first_term",
    spec:       &STUDENT_EVENT,
    source:     source::FIRST_TERM,
    event_type: Some(EventType::RegisteredFirstTerm),
    metrics:    &[
      "matriculados_primer_curso",
      "primer_curso",
      "primer_curso_2018",
      "primer_curso_2019",
    ],
  },
  FactCategory {
    name:       "graduated",
    spec:       &STUDENT_EVENT,
    source:     source::GRADUATED,
    event_type: Some(EventType::Graduated),
    metrics:    &["graduados"],
  },
  FactCategory {
    name:       "teachers",
    spec:       &TEACHER,
    source:     source::TEACHERS,
    event_type: None,
    metrics:    &["no_de_docentes", "docentes"],
  },
  FactCategory {
    name:       "administrative_staff",
    spec:       &ADMINISTRATIVE_STAFF,
    source:     source::ADMINISTRATIVE,
    event_type: None,
    metrics:    &["total"],
  },
];
