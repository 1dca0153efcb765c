//! SQL schema for the SNIES star model in SQLite.
//!
//! Dimension tables keep their natural-key uniqueness index permanently;
//! secondary indexes are dropped before every reload and recreated afterwards
//! (see [`create_index`]).

use snies_core::dimension::IndexSpec;

/// Full star DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- ── Dimensions ─────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS dim_institution (
    id                      INTEGER PRIMARY KEY AUTOINCREMENT,
    institution_code        INTEGER NOT NULL,
    parent_institution_code INTEGER,
    institution_name        TEXT    NOT NULL,
    campus_type             TEXT,
    sector_id               INTEGER,
    sector                  TEXT,
    character_id            INTEGER,
    "character"             TEXT,
    created_at              TEXT    NOT NULL,
    updated_at              TEXT    NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS uq_dim_institution_natural_key
    ON dim_institution (institution_code);

CREATE TABLE IF NOT EXISTS dim_geography (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    municipality_code INTEGER NOT NULL,
    department_code   INTEGER NOT NULL,
    department_name   TEXT    NOT NULL,
    municipality_name TEXT    NOT NULL,
    created_at        TEXT    NOT NULL,
    updated_at        TEXT    NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS uq_dim_geography_natural_key
    ON dim_geography (municipality_code);

CREATE TABLE IF NOT EXISTS dim_program (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    snies_program_code INTEGER NOT NULL,
    program_name       TEXT    NOT NULL,
    academic_level_id  INTEGER,
    academic_level     TEXT,
    formation_level_id INTEGER,
    formation_level    TEXT,
    methodology_id     INTEGER,
    methodology        TEXT,
    area_id            INTEGER,
    knowledge_area     TEXT,
    knowledge_core_id  INTEGER,
    knowledge_core     TEXT,
    created_at         TEXT    NOT NULL,
    updated_at         TEXT    NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS uq_dim_program_natural_key
    ON dim_program (snies_program_code);

CREATE TABLE IF NOT EXISTS dim_time (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    year         INTEGER NOT NULL,
    semester     INTEGER NOT NULL CHECK (semester IN (1, 2)),
    period_label TEXT    NOT NULL,
    created_at   TEXT    NOT NULL,
    updated_at   TEXT    NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS uq_dim_time_natural_key
    ON dim_time (year, semester);

CREATE TABLE IF NOT EXISTS dim_sex (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    sex_code   INTEGER NOT NULL,
    sex        TEXT    NOT NULL,
    created_at TEXT    NOT NULL,
    updated_at TEXT    NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS uq_dim_sex_natural_key
    ON dim_sex (sex_code);

CREATE TABLE IF NOT EXISTS dim_teacher_education_level (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    education_level_code INTEGER NOT NULL,
    education_level      TEXT    NOT NULL,
    created_at           TEXT    NOT NULL,
    updated_at           TEXT    NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS uq_dim_teacher_education_level_natural_key
    ON dim_teacher_education_level (education_level_code);

CREATE TABLE IF NOT EXISTS dim_teacher_workload (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    dedication_code    INTEGER NOT NULL,
    contract_type_code INTEGER NOT NULL,
    dedication         TEXT    NOT NULL,
    contract_type      TEXT    NOT NULL,
    created_at         TEXT    NOT NULL,
    updated_at         TEXT    NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS uq_dim_teacher_workload_natural_key
    ON dim_teacher_workload (dedication_code, contract_type_code);

-- ── Facts ──────────────────────────────────────────────────────────────────
-- Rebuilt wholesale on every run; no UPDATE is ever issued.

CREATE TABLE IF NOT EXISTS fact_student_event (
    id                       INTEGER PRIMARY KEY AUTOINCREMENT,
    event_type               TEXT    NOT NULL CHECK (event_type IN
        ('applied', 'admitted', 'enrolled', 'registered_first_term', 'graduated')),
    institution_id           INTEGER NOT NULL REFERENCES dim_institution(id),
    program_id               INTEGER NOT NULL REFERENCES dim_program(id),
    institution_geography_id INTEGER NOT NULL REFERENCES dim_geography(id),
    program_geography_id     INTEGER NOT NULL REFERENCES dim_geography(id),
    sex_id                   INTEGER NOT NULL REFERENCES dim_sex(id),
    time_id                  INTEGER NOT NULL REFERENCES dim_time(id),
    quantity                 INTEGER NOT NULL CHECK (quantity > 0),
    created_at               TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS fact_teacher (
    id                       INTEGER PRIMARY KEY AUTOINCREMENT,
    institution_id           INTEGER NOT NULL REFERENCES dim_institution(id),
    institution_geography_id INTEGER NOT NULL REFERENCES dim_geography(id),
    sex_id                   INTEGER NOT NULL REFERENCES dim_sex(id),
    education_level_id       INTEGER NOT NULL REFERENCES dim_teacher_education_level(id),
    workload_id              INTEGER NOT NULL REFERENCES dim_teacher_workload(id),
    time_id                  INTEGER NOT NULL REFERENCES dim_time(id),
    teacher_count            INTEGER NOT NULL CHECK (teacher_count > 0),
    created_at               TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS fact_administrative_staff (
    id                       INTEGER PRIMARY KEY AUTOINCREMENT,
    institution_id           INTEGER NOT NULL REFERENCES dim_institution(id),
    institution_geography_id INTEGER NOT NULL REFERENCES dim_geography(id),
    time_id                  INTEGER NOT NULL REFERENCES dim_time(id),
    auxiliary                INTEGER NOT NULL DEFAULT 0 CHECK (auxiliary >= 0),
    technical                INTEGER NOT NULL DEFAULT 0 CHECK (technical >= 0),
    professional             INTEGER NOT NULL DEFAULT 0 CHECK (professional >= 0),
    executive                INTEGER NOT NULL DEFAULT 0 CHECK (executive >= 0),
    total                    INTEGER NOT NULL CHECK (total > 0),
    created_at               TEXT    NOT NULL
);
"#;

/// Double-quote an identifier.
pub fn quote(ident: &str) -> String { format!("\"{}\"", ident.replace('"', "\"\"")) }

/// Comma-separated quoted column list.
pub fn column_list<'a>(columns: impl IntoIterator<Item = &'a str>) -> String {
  columns.into_iter().map(quote).collect::<Vec<_>>().join(", ")
}

pub fn create_index(table: &str, index: &IndexSpec) -> String {
  format!(
    "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
    quote(index.name),
    quote(table),
    column_list(index.columns.iter().copied())
  )
}

pub fn drop_index(index: &IndexSpec) -> String {
  format!("DROP INDEX IF EXISTS {}", quote(index.name))
}

/// `INSERT INTO table (cols) VALUES (?, …), (?, …)` for `rows` rows.
pub fn insert_statement(table: &str, columns: &[&str], rows: usize) -> String {
  let tuple = format!("({})", vec!["?"; columns.len()].join(", "));
  format!(
    "INSERT INTO {} ({}) VALUES {}",
    quote(table),
    column_list(columns.iter().copied()),
    vec![tuple.as_str(); rows].join(", ")
  )
}

/// Source relation names come from outside the catalog; only plain
/// lower-case identifiers are accepted.
pub fn is_plain_identifier(name: &str) -> bool {
  !name.is_empty()
    && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn quoting_escapes_embedded_quotes() {
    assert_eq!(quote("character"), r#""character""#);
    assert_eq!(quote(r#"a"b"#), r#""a""b""#);
  }

  #[test]
  fn multi_row_insert() {
    assert_eq!(
      insert_statement("dim_sex", &["sex_code", "sex"], 2),
      r#"INSERT INTO "dim_sex" ("sex_code", "sex") VALUES (?, ?), (?, ?)"#
    );
  }

  #[test]
  fn index_ddl() {
    let idx = IndexSpec { name: "idx_x", columns: &["a", "b"] };
    assert_eq!(create_index("t", &idx), r#"CREATE INDEX IF NOT EXISTS "idx_x" ON "t" ("a", "b")"#);
    assert_eq!(drop_index(&idx), r#"DROP INDEX IF EXISTS "idx_x""#);
  }

  #[test]
  fn identifiers() {
    assert!(is_plain_identifier("matriculados_unified"));
    assert!(!is_plain_identifier("x; DROP TABLE y"));
    assert!(!is_plain_identifier(""));
  }
}
