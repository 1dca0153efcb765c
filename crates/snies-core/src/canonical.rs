//! Label canonicalisation for categorical dimensions.
//!
//! The tables are deliberately incomplete: a raw label that is not listed
//! passes through with only the all-caps title-case heuristic applied, so
//! variants such as trailing punctuation survive uncanonicalised.

use crate::value::title_case_if_upper;

/// Lower-cased raw label → canonical display label.
#[derive(Debug)]
pub struct LabelTable {
  pub name:    &'static str,
  pub entries: &'static [(&'static str, &'static str)],
}

impl LabelTable {
  /// Canonical label for `raw`, or `raw` with the title-case heuristic.
  pub fn canonicalize(&self, raw: &str) -> String {
    let raw = raw.trim();
    let lowered = raw.to_lowercase();
    self
      .entries
      .iter()
      .find(|(k, _)| *k == lowered)
      .map(|(_, v)| (*v).to_owned())
      .unwrap_or_else(|| title_case_if_upper(raw))
  }
}

/// Label used when a workload description is absent.
pub const NO_INFORMATION: &str = "Sin información";

pub static SEX: LabelTable = LabelTable {
  name:    "sex",
  entries: &[
    ("hombre", "Masculino"),
    ("masculino", "Masculino"),
    ("mujer", "Femenino"),
    ("femenino", "Femenino"),
    ("no binario", "No binario"),
    ("trans", "Trans"),
    ("no informa", "No informa"),
    ("sin información", "Sin información"),
    ("sin informacion", "Sin información"),
  ],
};

pub static TEACHER_EDUCATION_LEVEL: LabelTable = LabelTable {
  name:    "teacher_education_level",
  entries: &[
    ("posdoctorado", "Posdoctorado"),
    ("doctorado", "Doctorado"),
    ("maestría", "Maestría"),
    ("maestria", "Maestría"),
    ("especialización universitaria", "Especialización Universitaria"),
    ("especializacion universitaria", "Especialización Universitaria"),
    ("especialización técnico profesional", "Especialización Técnico Profesional"),
    ("especializacion tecnico profesional", "Especialización Técnico Profesional"),
    ("especialización tecnológica", "Especialización Tecnológica"),
    ("especializacion tecnologica", "Especialización Tecnológica"),
    ("especialización médico quirúrgica", "Especialización Médico Quirúrgica"),
    ("especializacion medico quirurgica", "Especialización Médico Quirúrgica"),
    ("universitaria", "Universitaria"),
    ("universitario", "Universitaria"),
    ("tecnológica", "Tecnológica"),
    ("tecnologica", "Tecnológica"),
    ("tecnológico", "Tecnológica"),
    ("tecnologico", "Tecnológica"),
    ("formación técnica profesional", "Formación Técnica Profesional"),
    ("formacion tecnica profesional", "Formación Técnica Profesional"),
    ("docente sin título", "Docente sin título"),
    ("docente sin titulo", "Docente sin título"),
  ],
};

pub static DEDICATION: LabelTable = LabelTable {
  name:    "dedication",
  entries: &[
    ("tiempo completo o exclusiva", "Tiempo Completo o Exclusiva"),
    ("medio tiempo", "Medio Tiempo"),
    ("catedra", "Cátedra"),
    ("cátedra", "Cátedra"),
    ("sin información", "Sin información"),
    ("sin informacion", "Sin información"),
  ],
};

pub static CONTRACT_TYPE: LabelTable = LabelTable {
  name:    "contract_type",
  entries: &[
    ("término indefinido", "Término Indefinido"),
    ("termino indefinido", "Término Indefinido"),
    ("término fijo", "Término Fijo"),
    ("termino fijo", "Término Fijo"),
    ("horas (profesores de catedra)", "Horas (profesores de cátedra)"),
    ("horas (profesores de cátedra)", "Horas (profesores de cátedra)"),
    ("ocasional", "Ocasional"),
    ("ad honorem", "Ad honorem"),
    ("sin información", "Sin información"),
    ("sin informacion", "Sin información"),
  ],
};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accent_and_case_variants_share_a_label() {
    assert_eq!(TEACHER_EDUCATION_LEVEL.canonicalize("Maestría"), "Maestría");
    assert_eq!(TEACHER_EDUCATION_LEVEL.canonicalize("MAESTRIA"), "Maestría");
    assert_eq!(TEACHER_EDUCATION_LEVEL.canonicalize(" maestria "), "Maestría");
  }

  #[test]
  fn upper_case_lookup_handles_accents() {
    assert_eq!(TEACHER_EDUCATION_LEVEL.canonicalize("MAESTRÍA"), "Maestría");
    assert_eq!(CONTRACT_TYPE.canonicalize("TÉRMINO FIJO"), "Término Fijo");
  }

  #[test]
  fn sex_synonyms_collapse() {
    assert_eq!(SEX.canonicalize("HOMBRE"), "Masculino");
    assert_eq!(SEX.canonicalize("Masculino"), "Masculino");
    assert_eq!(SEX.canonicalize("mujer"), "Femenino");
  }

  #[test]
  fn unmapped_labels_pass_through() {
    assert_eq!(DEDICATION.canonicalize("MEDIO TIEMPO."), "Medio Tiempo.");
    assert_eq!(DEDICATION.canonicalize("Por horas"), "Por horas");
  }
}
