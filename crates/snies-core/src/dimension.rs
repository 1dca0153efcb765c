//! The seven dimensions of the star model and their static source catalogs.
//!
//! Each [`DimensionSpec`] names the target table, its attributes (natural key
//! first), and one or more extraction *roles*: a set of source relations plus,
//! for every attribute, the ordered source-column aliases that may carry it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
  canonical::{self, LabelTable},
  source::{self, ALL_SOURCES, STUDENT_SOURCES},
  value::Value,
};

// ─── Kind ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionKind {
  Institution,
  Geography,
  Program,
  TimePeriod,
  Sex,
  TeacherEducationLevel,
  TeacherWorkload,
}

impl DimensionKind {
  pub const ALL: [Self; 7] = [
    Self::Institution,
    Self::Geography,
    Self::Program,
    Self::TimePeriod,
    Self::Sex,
    Self::TeacherEducationLevel,
    Self::TeacherWorkload,
  ];

  pub fn spec(self) -> &'static DimensionSpec {
    match self {
      Self::Institution => &INSTITUTION,
      Self::Geography => &GEOGRAPHY,
      Self::Program => &PROGRAM,
      Self::TimePeriod => &TIME_PERIOD,
      Self::Sex => &SEX,
      Self::TeacherEducationLevel => &TEACHER_EDUCATION_LEVEL,
      Self::TeacherWorkload => &TEACHER_WORKLOAD,
    }
  }

  pub fn table(self) -> &'static str { self.spec().table }
}

impl fmt::Display for DimensionKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.table()) }
}

// ─── Catalog types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub enum AttrType {
  Integer,
  /// Free text; only the all-caps title-case heuristic is applied.
  Text,
  /// Categorical text canonicalised through a [`LabelTable`].
  Label(&'static LabelTable),
}

#[derive(Debug)]
pub struct Attribute {
  pub name:     &'static str,
  pub ty:       AttrType,
  /// Candidates missing this attribute never reach the deduplicator.
  pub required: bool,
  /// Blanks are replaced by [`DimensionSpec::fill`] once a winner is chosen.
  pub filled:   bool,
}

impl Attribute {
  /// Whether every stored row holds a value for this attribute.
  pub fn not_null(&self) -> bool { self.required || self.filled }
}

const fn int(name: &'static str) -> Attribute {
  Attribute { name, ty: AttrType::Integer, required: false, filled: false }
}

const fn required_int(name: &'static str) -> Attribute {
  Attribute { name, ty: AttrType::Integer, required: true, filled: false }
}

const fn text(name: &'static str) -> Attribute {
  Attribute { name, ty: AttrType::Text, required: false, filled: false }
}

const fn required_text(name: &'static str) -> Attribute {
  Attribute { name, ty: AttrType::Text, required: true, filled: false }
}

const fn label(name: &'static str, table: &'static LabelTable) -> Attribute {
  Attribute { name, ty: AttrType::Label(table), required: true, filled: false }
}

const fn filled_label(name: &'static str, table: &'static LabelTable) -> Attribute {
  Attribute { name, ty: AttrType::Label(table), required: false, filled: true }
}

/// One way of extracting candidates: which relations to scan and, per
/// attribute, which source columns may hold it (first present wins). An empty
/// alias list means the attribute is derived or never sourced by this role.
#[derive(Debug)]
pub struct Role {
  pub name:    &'static str,
  pub sources: &'static [&'static str],
  pub columns: &'static [&'static [&'static str]],
}

/// A secondary index rebuilt after every reload.
#[derive(Debug)]
pub struct IndexSpec {
  pub name:    &'static str,
  pub columns: &'static [&'static str],
}

#[derive(Debug)]
pub struct DimensionSpec {
  pub kind:       DimensionKind,
  pub table:      &'static str,
  /// Natural-key attributes come first, in key order.
  pub attributes: &'static [Attribute],
  pub key_len:    usize,
  pub roles:      &'static [Role],
  pub indexes:    &'static [IndexSpec],
  /// Post-extraction hook: derive attributes or reject the candidate.
  pub refine:     Option<fn(&mut [Value]) -> bool>,
  /// Applied to the winning row only, so fillers never count towards
  /// completeness.
  pub fill:       Option<fn(&mut [Value])>,
}

impl DimensionSpec {
  pub fn key_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.attributes[..self.key_len].iter().map(|a| a.name)
  }

  pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.attributes.iter().map(|a| a.name)
  }

  /// Name of the unique index over the natural key.
  pub fn unique_index(&self) -> String { format!("uq_{}_natural_key", self.table) }

  /// Every relation any role of this dimension reads.
  pub fn sources(&self) -> Vec<&'static str> {
    ALL_SOURCES
      .iter()
      .copied()
      .filter(|s| self.roles.iter().any(|r| r.sources.contains(s)))
      .collect()
  }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// The business identifier of a dimension entity: one or more integer codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NaturalKey(pub Vec<i64>);

impl NaturalKey {
  pub fn one(code: i64) -> Self { Self(vec![code]) }

  pub fn pair(a: i64, b: i64) -> Self { Self(vec![a, b]) }
}

impl fmt::Display for NaturalKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, part) in self.0.iter().enumerate() {
      if i > 0 {
        f.write_str("-")?;
      }
      write!(f, "{part}")?;
    }
    Ok(())
  }
}

/// A canonical dimension row, values aligned with [`DimensionSpec::attributes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionRow {
  pub key:    NaturalKey,
  pub values: Vec<Value>,
}

impl DimensionRow {
  /// Number of non-missing attributes.
  pub fn completeness(&self) -> usize { self.values.iter().filter(|v| !v.is_missing()).count() }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

// Source-column aliases for natural-key attributes; the fact catalog reuses
// them so a fact row is keyed exactly the way its dimension was.
pub const INSTITUTION_CODE:     &[&str] = &["codigo_de_la_institucion"];
pub const IES_MUNICIPALITY:     &[&str] = &["codigo_del_municipio_ies", "codigo_del_municipio"];
pub const PROGRAM_MUNICIPALITY: &[&str] =
  &["codigo_del_municipio_programa", "cdigo_del_municipio_programa"];
pub const SNIES_CODE:           &[&str] = &["codigo_snies_del_programa"];
pub const SEX_CODE:             &[&str] = &["id_sexo"];
pub const YEAR:                 &[&str] = &["ano"];
pub const SEMESTER:             &[&str] = &["semestre"];
pub const EDUCATION_LEVEL:      &[&str] = &["id_maximo_nivel_de_formacion_del_docente"];
pub const DEDICATION_CODE:      &[&str] = &["id_tiempo_de_dedicacion"];
pub const CONTRACT_CODE:        &[&str] = &["id_tipo_de_contrato"];

pub static INSTITUTION: DimensionSpec = DimensionSpec {
  kind:       DimensionKind::Institution,
  table:      "dim_institution",
  attributes: &[
    required_int("institution_code"),
    int("parent_institution_code"),
    required_text("institution_name"),
    text("campus_type"),
    int("sector_id"),
    text("sector"),
    int("character_id"),
    text("character"),
  ],
  key_len:    1,
  roles:      &[Role {
    name:    "institution",
    sources: ALL_SOURCES,
    columns: &[
      INSTITUTION_CODE,
      &["ies_padre"],
      &["institucion_de_educacion_superior_ies"],
      &["principal_o_seccional"],
      &["id_sector_ies"],
      &["sector_ies"],
      &["id_caracter", "id_caracter_ies"],
      &["caracter_ies"],
    ],
  }],
  indexes:    &[
    IndexSpec { name: "idx_dim_institution_sector", columns: &["sector_id"] },
    IndexSpec { name: "idx_dim_institution_character", columns: &["character_id"] },
  ],
  refine:     None,
  fill:       None,
};

pub static GEOGRAPHY: DimensionSpec = DimensionSpec {
  kind:       DimensionKind::Geography,
  table:      "dim_geography",
  attributes: &[
    required_int("municipality_code"),
    required_int("department_code"),
    required_text("department_name"),
    required_text("municipality_name"),
  ],
  key_len:    1,
  roles:      &[
    Role {
      name:    "institution_location",
      sources: ALL_SOURCES,
      columns: &[
        IES_MUNICIPALITY,
        &["codigo_del_departamento_ies"],
        &["departamento_de_domicilio_de_la_ies"],
        &["municipio_de_domicilio_de_la_ies"],
      ],
    },
    Role {
      name:    "program_location",
      sources: STUDENT_SOURCES,
      columns: &[
        PROGRAM_MUNICIPALITY,
        &["codigo_del_departamento_programa"],
        &["departamento_de_oferta_del_programa"],
        &["municipio_de_oferta_del_programa"],
      ],
    },
  ],
  indexes:    &[IndexSpec { name: "idx_dim_geography_department", columns: &["department_code"] }],
  refine:     None,
  fill:       None,
};

pub static PROGRAM: DimensionSpec = DimensionSpec {
  kind:       DimensionKind::Program,
  table:      "dim_program",
  attributes: &[
    required_int("snies_program_code"),
    required_text("program_name"),
    int("academic_level_id"),
    text("academic_level"),
    int("formation_level_id"),
    text("formation_level"),
    int("methodology_id"),
    text("methodology"),
    int("area_id"),
    text("knowledge_area"),
    int("knowledge_core_id"),
    text("knowledge_core"),
  ],
  key_len:    1,
  roles:      &[Role {
    name:    "program",
    sources: STUDENT_SOURCES,
    columns: &[
      SNIES_CODE,
      &["programa_academico"],
      &["id_nivel_academico"],
      &["nivel_academico"],
      &["id_nivel_de_formacion"],
      &["nivel_de_formacion"],
      &["id_metodologia"],
      &["metodologia"],
      &["id_area"],
      &["area_de_conocimiento"],
      &["id_nucleo"],
      &["nucleo_basico_del_conocimiento_nbc"],
    ],
  }],
  indexes:    &[
    IndexSpec { name: "idx_dim_program_academic_level", columns: &["academic_level_id"] },
    IndexSpec { name: "idx_dim_program_area", columns: &["area_id"] },
    IndexSpec { name: "idx_dim_program_methodology", columns: &["methodology_id"] },
  ],
  refine:     None,
  fill:       None,
};

pub static TIME_PERIOD: DimensionSpec = DimensionSpec {
  kind:       DimensionKind::TimePeriod,
  table:      "dim_time",
  attributes: &[required_int("year"), required_int("semester"), required_text("period_label")],
  key_len:    2,
  roles:      &[Role { name: "period", sources: ALL_SOURCES, columns: &[YEAR, SEMESTER, &[]] }],
  indexes:    &[],
  refine:     Some(refine_period),
  fill:       None,
};

pub static SEX: DimensionSpec = DimensionSpec {
  kind:       DimensionKind::Sex,
  table:      "dim_sex",
  attributes: &[required_int("sex_code"), label("sex", &canonical::SEX)],
  key_len:    1,
  roles:      &[Role {
    name:    "sex",
    sources: ALL_SOURCES,
    columns: &[SEX_CODE, &["sexo", "sexo_del_docente"]],
  }],
  indexes:    &[],
  refine:     None,
  fill:       None,
};

pub static TEACHER_EDUCATION_LEVEL: DimensionSpec = DimensionSpec {
  kind:       DimensionKind::TeacherEducationLevel,
  table:      "dim_teacher_education_level",
  attributes: &[
    required_int("education_level_code"),
    label("education_level", &canonical::TEACHER_EDUCATION_LEVEL),
  ],
  key_len:    1,
  roles:      &[Role {
    name:    "education_level",
    sources: &[source::TEACHERS],
    columns: &[EDUCATION_LEVEL, &["maximo_nivel_de_formacion_del_docente"]],
  }],
  indexes:    &[],
  refine:     None,
  fill:       None,
};

pub static TEACHER_WORKLOAD: DimensionSpec = DimensionSpec {
  kind:       DimensionKind::TeacherWorkload,
  table:      "dim_teacher_workload",
  attributes: &[
    required_int("dedication_code"),
    required_int("contract_type_code"),
    filled_label("dedication", &canonical::DEDICATION),
    filled_label("contract_type", &canonical::CONTRACT_TYPE),
  ],
  key_len:    2,
  roles:      &[Role {
    name:    "workload",
    sources: &[source::TEACHERS],
    columns: &[
      DEDICATION_CODE,
      CONTRACT_CODE,
      &["tiempo_de_dedicacion_del_docente"],
      &["tipo_de_contrato_del_docente", "tipo_de_contrato"],
    ],
  }],
  indexes:    &[],
  refine:     None,
  fill:       Some(fill_workload),
};

/// Reject semesters other than 1 and 2 and derive `period_label`.
fn refine_period(values: &mut [Value]) -> bool {
  let (Some(year), Some(semester)) = (values[0].as_int(), values[1].as_int()) else {
    return false;
  };
  if !matches!(semester, 1 | 2) {
    return false;
  }
  values[2] = Value::Text(format!("{year}-{semester}"));
  true
}

/// Workload labels are optional in the source; fill the gaps so the target
/// NOT NULL columns always hold a value.
fn fill_workload(values: &mut [Value]) {
  for label in &mut values[2..4] {
    if label.is_missing() {
      *label = Value::Text(canonical::NO_INFORMATION.to_owned());
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn roles_align_with_attributes() {
    for kind in DimensionKind::ALL {
      let spec = kind.spec();
      assert_eq!(spec.kind, kind);
      assert!(spec.key_len >= 1 && spec.key_len <= spec.attributes.len());
      for attr in &spec.attributes[..spec.key_len] {
        assert!(matches!(attr.ty, AttrType::Integer) && attr.required, "{}", attr.name);
      }
      for role in spec.roles {
        assert_eq!(role.columns.len(), spec.attributes.len(), "{} / {}", spec.table, role.name);
      }
    }
  }

  #[test]
  fn period_refinement() {
    let mut ok = vec![Value::Integer(2020), Value::from("2"), Value::Null];
    assert!(refine_period(&mut ok));
    assert_eq!(ok[2], Value::from("2020-2"));

    let mut bad = vec![Value::Integer(2020), Value::Integer(3), Value::Null];
    assert!(!refine_period(&mut bad));
  }

  #[test]
  fn fill_hooks_cover_filled_attributes() {
    for kind in DimensionKind::ALL {
      let spec = kind.spec();
      let mut values = vec![Value::Null; spec.attributes.len()];
      if let Some(fill) = spec.fill {
        fill(&mut values);
      }
      for (attr, value) in spec.attributes.iter().zip(&values) {
        assert_eq!(attr.filled, !value.is_missing(), "{}.{}", spec.table, attr.name);
      }
    }
  }

  #[test]
  fn natural_key_display() {
    assert_eq!(NaturalKey::pair(2021, 1).to_string(), "2021-1");
    assert_eq!(NaturalKey::one(1101).to_string(), "1101");
  }

  #[test]
  fn sources_follow_priority_order() {
    assert_eq!(PROGRAM.sources(), STUDENT_SOURCES.to_vec());
    assert_eq!(TEACHER_WORKLOAD.sources(), vec![source::TEACHERS]);
  }
}
