//! DDL and statement text for the star model in PostgreSQL.
//!
//! Unlike the SQLite backend, the tables are generated from the dimension and
//! fact catalogs so they can be placed in any target schema.

use snies_core::{
  dimension::{AttrType, DimensionSpec, IndexSpec},
  fact::{EventType, FactSpec},
};

/// Double-quote an identifier.
pub fn quote(ident: &str) -> String { format!("\"{}\"", ident.replace('"', "\"\"")) }

/// `"schema"."name"`.
pub fn qualified(schema: &str, name: &str) -> String { format!("{}.{}", quote(schema), quote(name)) }

/// Comma-separated quoted column list.
pub fn column_list<'a>(columns: impl IntoIterator<Item = &'a str>) -> String {
  columns.into_iter().map(quote).collect::<Vec<_>>().join(", ")
}

/// Schema names come from configuration; only plain lower-case identifiers
/// are accepted.
pub fn is_plain_identifier(name: &str) -> bool {
  !name.is_empty()
    && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn column_type(ty: AttrType) -> &'static str {
  match ty {
    AttrType::Integer => "BIGINT",
    AttrType::Text | AttrType::Label(_) => "TEXT",
  }
}

// ─── DDL ─────────────────────────────────────────────────────────────────────

pub fn create_dimension(schema: &str, spec: &DimensionSpec) -> Vec<String> {
  let mut columns = vec!["id BIGSERIAL PRIMARY KEY".to_owned()];
  for attr in spec.attributes {
    let null = if attr.not_null() { " NOT NULL" } else { "" };
    columns.push(format!("{} {}{null}", quote(attr.name), column_type(attr.ty)));
  }
  columns.push("created_at TIMESTAMPTZ NOT NULL DEFAULT now()".to_owned());
  columns.push("updated_at TIMESTAMPTZ NOT NULL DEFAULT now()".to_owned());

  vec![
    format!(
      "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
      qualified(schema, spec.table),
      columns.join(",\n  ")
    ),
    format!(
      "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
      quote(&spec.unique_index()),
      qualified(schema, spec.table),
      column_list(spec.key_columns())
    ),
  ]
}

pub fn create_fact(schema: &str, spec: &FactSpec) -> String {
  let mut columns = vec!["id BIGSERIAL PRIMARY KEY".to_owned()];
  if spec.has_event {
    let allowed = EventType::ALL
      .iter()
      .map(|e| format!("'{}'", e.as_str()))
      .collect::<Vec<_>>()
      .join(", ");
    columns.push(format!("event_type TEXT NOT NULL CHECK (event_type IN ({allowed}))"));
  }
  for fk in spec.foreign_keys {
    columns.push(format!(
      "{} BIGINT NOT NULL REFERENCES {}(id)",
      quote(fk.column),
      qualified(schema, fk.dimension.table())
    ));
  }
  let measure = quote(spec.measure);
  columns.push(format!("{measure} BIGINT NOT NULL CHECK ({measure} > 0)"));
  for supplement in spec.supplements {
    let column = quote(supplement.column);
    columns.push(format!("{column} BIGINT NOT NULL DEFAULT 0 CHECK ({column} >= 0)"));
  }
  columns.push("created_at TIMESTAMPTZ NOT NULL DEFAULT now()".to_owned());

  format!(
    "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
    qualified(schema, spec.table),
    columns.join(",\n  ")
  )
}

pub fn create_index(schema: &str, table: &str, index: &IndexSpec) -> String {
  format!(
    "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
    quote(index.name),
    qualified(schema, table),
    column_list(index.columns.iter().copied())
  )
}

pub fn drop_index(schema: &str, index: &IndexSpec) -> String {
  format!("DROP INDEX IF EXISTS {}", qualified(schema, index.name))
}

// ─── Statements ──────────────────────────────────────────────────────────────

/// `TRUNCATE` every listed table and restart their id sequences.
pub fn truncate(schema: &str, tables: &[&str]) -> String {
  let tables = tables.iter().map(|t| qualified(schema, t)).collect::<Vec<_>>().join(", ");
  format!("TRUNCATE TABLE {tables} RESTART IDENTITY")
}

/// The `INSERT INTO … (…) ` prefix handed to `QueryBuilder::push_values`.
pub fn insert_prefix(schema: &str, table: &str, columns: &[&str]) -> String {
  format!(
    "INSERT INTO {} ({}) ",
    qualified(schema, table),
    column_list(columns.iter().copied())
  )
}

/// Read a source relation with every column cast to text; the core's lenient
/// conversions take it from there.
pub fn select_source(schema: &str, name: &str, columns: &[String]) -> String {
  let cols = columns
    .iter()
    .map(|c| format!("{}::text", quote(c)))
    .collect::<Vec<_>>()
    .join(", ");
  format!("SELECT {cols} FROM {}", qualified(schema, name))
}

pub fn orphan_count(schema: &str, fact_table: &str, column: &str, dimension_table: &str) -> String {
  format!(
    "SELECT COUNT(*) FROM {} AS f LEFT JOIN {} AS d ON f.{} = d.id WHERE d.id IS NULL",
    qualified(schema, fact_table),
    qualified(schema, dimension_table),
    quote(column)
  )
}
