//! Natural-key extractor.
//!
//! Projects every source relation a dimension reads onto the dimension's
//! canonical attribute list. Columns are bound once per relation through the
//! alias catalog; an attribute with no matching column reads as missing for
//! every row. Candidates lacking their natural key (or any other required
//! attribute) are dropped here and never reach the deduplicator.

use tracing::debug;

use crate::{
  alias::Candidates,
  dedup::compact,
  dimension::{AttrType, DimensionRow, DimensionSpec, NaturalKey, Role},
  source::{self, SourceRelation, SourceSet},
  value::Value,
};

/// Candidates extracted from one relation through one role, identical in
/// shape across relations regardless of source-specific column naming.
#[derive(Debug, Clone)]
pub struct AttributeFrame {
  pub source:   String,
  pub role:     &'static str,
  /// Position of `source` in the source-priority order.
  pub priority: usize,
  /// Rows read from the relation.
  pub scanned:  usize,
  /// Rows rejected for a missing key or required attribute.
  pub excluded: usize,
  /// Best candidate per natural key within this relation.
  pub rows:     Vec<DimensionRow>,
}

/// Extract one frame per (role, relation) pair for `spec`. Relations absent
/// from `sources` are skipped silently; callers report them.
pub fn extract(spec: &DimensionSpec, sources: &SourceSet) -> Vec<AttributeFrame> {
  spec
    .roles
    .iter()
    .flat_map(|role| sources.select(role.sources).map(move |rel| extract_role(spec, role, rel)))
    .collect()
}

/// Project a single relation through a single role.
pub fn extract_role(spec: &DimensionSpec, role: &Role, relation: &SourceRelation) -> AttributeFrame {
  let bindings: Vec<Candidates> = role
    .columns
    .iter()
    .map(|names| Candidates::bind_first(relation, names))
    .collect();

  let mut excluded = 0;
  let mut rows = Vec::new();

  for raw in &relation.rows {
    match project(spec, &bindings, raw) {
      Some(row) => rows.push(row),
      None => excluded += 1,
    }
  }

  let scanned = relation.rows.len();
  let rows = compact(rows);

  debug!(
    dimension = spec.table,
    role = role.name,
    source = %relation.name,
    scanned,
    excluded,
    candidates = rows.len(),
    "extracted candidates"
  );

  AttributeFrame {
    source: relation.name.clone(),
    role: role.name,
    priority: source::priority(&relation.name),
    scanned,
    excluded,
    rows,
  }
}

fn project(spec: &DimensionSpec, bindings: &[Candidates], raw: &[Value]) -> Option<DimensionRow> {
  let mut values: Vec<Value> = spec
    .attributes
    .iter()
    .zip(bindings)
    .map(|(attr, binding)| {
      let value = match attr.ty {
        AttrType::Integer => binding.int(raw).map(Value::Integer),
        AttrType::Text | AttrType::Label(_) => binding.text(raw).map(Value::Text),
      };
      value.unwrap_or(Value::Null)
    })
    .collect();

  if let Some(refine) = spec.refine
    && !refine(&mut values)
  {
    return None;
  }

  let complete = spec
    .attributes
    .iter()
    .zip(&values)
    .all(|(attr, v)| !attr.required || !v.is_missing());
  if !complete {
    return None;
  }

  let key = values[..spec.key_len]
    .iter()
    .map(Value::as_int)
    .collect::<Option<Vec<_>>>()?;

  Some(DimensionRow { key: NaturalKey(key), values })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    dimension::{GEOGRAPHY, INSTITUTION, TEACHER_WORKLOAD, TIME_PERIOD},
    source::{ENROLLED, TEACHERS},
  };

  fn institutions(name: &str, columns: &[&str], rows: Vec<Vec<Value>>) -> SourceRelation {
    SourceRelation::from_rows(name, columns.iter().copied(), rows)
  }

  #[test]
  fn absent_columns_read_as_missing() {
    let rel = institutions(
      ENROLLED,
      &["codigo_de_la_institucion", "institucion_de_educacion_superior_ies"],
      vec![vec![Value::from("101"), Value::from("UNIV X")]],
    );
    let frame = extract_role(&INSTITUTION, &INSTITUTION.roles[0], &rel);

    assert_eq!(frame.rows.len(), 1);
    let row = &frame.rows[0];
    assert_eq!(row.key, NaturalKey::one(101));
    assert_eq!(row.values.len(), INSTITUTION.attributes.len());
    assert_eq!(row.values[2], Value::from("UNIV X"));
    assert!(row.values[4].is_missing());
    assert_eq!(row.completeness(), 2);
  }

  #[test]
  fn aliased_column_is_found() {
    let rel = institutions(
      ENROLLED,
      &[
        "codigo_de_la_institucion",
        "institucion_de_educacion_superior_ies",
        "id_caracter_ies",
      ],
      vec![vec![Value::Integer(7), Value::from("Univ"), Value::Integer(4)]],
    );
    let frame = extract_role(&INSTITUTION, &INSTITUTION.roles[0], &rel);
    assert_eq!(frame.rows[0].values[6], Value::Integer(4));
  }

  #[test]
  fn rows_without_key_or_required_attribute_are_excluded() {
    let rel = institutions(
      ENROLLED,
      &["codigo_de_la_institucion", "institucion_de_educacion_superior_ies"],
      vec![
        vec![Value::Null, Value::from("No code")],
        vec![Value::from("nan"), Value::from("No code either")],
        vec![Value::Integer(5), Value::Null],
        vec![Value::Integer(6), Value::from("Kept")],
      ],
    );
    let frame = extract_role(&INSTITUTION, &INSTITUTION.roles[0], &rel);
    assert_eq!(frame.scanned, 4);
    assert_eq!(frame.excluded, 3);
    assert_eq!(frame.rows.len(), 1);
  }

  #[test]
  fn geography_has_one_frame_per_role() {
    let rel = institutions(
      ENROLLED,
      &[
        "codigo_del_departamento_ies",
        "departamento_de_domicilio_de_la_ies",
        "codigo_del_municipio",
        "municipio_de_domicilio_de_la_ies",
        "codigo_del_departamento_programa",
        "departamento_de_oferta_del_programa",
        "cdigo_del_municipio_programa",
        "municipio_de_oferta_del_programa",
      ],
      vec![vec![
        Value::Integer(11),
        Value::from("BOGOTA D.C."),
        Value::Integer(11001),
        Value::from("BOGOTA D.C."),
        Value::Integer(5),
        Value::from("ANTIOQUIA"),
        Value::Integer(5001),
        Value::from("MEDELLIN"),
      ]],
    );
    let sources: SourceSet = [rel].into_iter().collect();
    let frames = extract(&GEOGRAPHY, &sources);

    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].rows[0].key, NaturalKey::one(11001));
    assert_eq!(frames[1].role, "program_location");
    assert_eq!(frames[1].rows[0].key, NaturalKey::one(5001));
  }

  #[test]
  fn time_rejects_unknown_semesters() {
    let rel = institutions(
      ENROLLED,
      &["ano", "semestre"],
      vec![
        vec![Value::Integer(2020), Value::Integer(1)],
        vec![Value::Integer(2020), Value::Integer(3)],
        vec![Value::from("2021.0"), Value::from("2")],
      ],
    );
    let frame = extract_role(&TIME_PERIOD, &TIME_PERIOD.roles[0], &rel);
    let keys: Vec<_> = frame.rows.iter().map(|r| r.key.clone()).collect();
    assert_eq!(keys, vec![NaturalKey::pair(2020, 1), NaturalKey::pair(2021, 2)]);
    assert_eq!(frame.excluded, 1);
  }

  #[test]
  fn absent_workload_labels_stay_missing() {
    let rel = institutions(
      TEACHERS,
      &["id_tiempo_de_dedicacion", "id_tipo_de_contrato", "tipo_de_contrato"],
      vec![vec![Value::Integer(1), Value::Integer(2), Value::from("TERMINO FIJO")]],
    );
    let frame = extract_role(&TEACHER_WORKLOAD, &TEACHER_WORKLOAD.roles[0], &rel);
    let row = &frame.rows[0];
    assert_eq!(row.key, NaturalKey::pair(1, 2));
    assert!(row.values[2].is_missing());
    assert_eq!(row.values[3], Value::from("TERMINO FIJO"));
    assert_eq!(row.completeness(), 3);
  }
}
