//! [`PgWarehouse`]: the PostgreSQL implementation of [`Warehouse`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Row as _, Transaction, postgres::PgPoolOptions};
use tracing::{debug, info};

use snies_core::{
  dimension::{AttrType, DimensionKind, DimensionRow, DimensionSpec, IndexSpec, NaturalKey},
  fact::{EventType, FactKind, FactRow, FactSpec, STUDENT_EVENT},
  lookup::KeyLookup,
  source::{SourceRelation, SourceSet},
  store::Warehouse,
  validate::{
    EventTotal, InstitutionTotal, OrphanCheck, TableCount, ValidationReport, foreign_key_triples,
    star_tables,
  },
  value::Value,
};

use crate::{
  Error, Result,
  schema::{
    column_list, create_dimension, create_fact, create_index, drop_index, insert_prefix,
    is_plain_identifier, orphan_count, qualified, quote, select_source, truncate,
  },
};

/// Bind parameters allowed in one statement by the wire protocol.
const MAX_PARAMS: usize = 65_535;

/// A typed cell bound into an `INSERT`. Postgres needs the parameter type to
/// match the column even for `NULL`.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
  Int(Option<i64>),
  Text(Option<String>),
  Time(DateTime<Utc>),
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A star-model warehouse backed by a Postgres connection pool.
#[derive(Clone)]
pub struct PgWarehouse {
  pool:          PgPool,
  source_schema: String,
  target_schema: String,
}

impl PgWarehouse {
  /// Connect a pool to `url`.
  pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
    let pool = PgPoolOptions::new()
      .max_connections(max_connections)
      .acquire_timeout(Duration::from_secs(30))
      .connect(url)
      .await?;
    info!(max_connections, "postgres pool ready");
    Ok(Self::from_pool(pool))
  }

  /// Wrap an existing pool; both schemas default to `public`.
  pub fn from_pool(pool: PgPool) -> Self {
    Self { pool, source_schema: "public".to_owned(), target_schema: "public".to_owned() }
  }

  /// Read sources from `source` and write the star model into `target`.
  pub fn with_schemas(mut self, source: &str, target: &str) -> Result<Self> {
    for name in [source, target] {
      if !is_plain_identifier(name) {
        return Err(Error::InvalidIdentifier(name.to_owned()));
      }
    }
    self.source_schema = source.to_owned();
    self.target_schema = target.to_owned();
    Ok(self)
  }

  pub fn pool(&self) -> &PgPool { &self.pool }

  pub fn source_schema(&self) -> &str { &self.source_schema }

  pub fn target_schema(&self) -> &str { &self.target_schema }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn rows_per_statement(batch_size: usize, columns: usize) -> usize {
  batch_size.min(MAX_PARAMS / columns.max(1)).max(1)
}

/// Cells for one dimension row followed by `created_at` and `updated_at`.
fn dimension_cells(spec: &DimensionSpec, row: &DimensionRow, now: DateTime<Utc>) -> Vec<Cell> {
  spec
    .attributes
    .iter()
    .zip(&row.values)
    .map(|(attr, value)| match attr.ty {
      AttrType::Integer => Cell::Int(value.as_int()),
      AttrType::Text | AttrType::Label(_) => Cell::Text(value.as_text()),
    })
    .chain([Cell::Time(now), Cell::Time(now)])
    .collect()
}

/// Cells aligned with [`FactSpec::columns`] followed by `created_at`.
fn fact_cells(row: &FactRow, now: DateTime<Utc>) -> Vec<Cell> {
  let mut cells = Vec::with_capacity(row.keys.len() + row.supplements.len() + 3);
  if let Some(event) = row.event_type {
    cells.push(Cell::Text(Some(event.as_str().to_owned())));
  }
  cells.extend(row.keys.iter().map(|id| Cell::Int(Some(*id))));
  cells.push(Cell::Int(Some(row.measure)));
  cells.extend(row.supplements.iter().map(|n| Cell::Int(Some(*n))));
  cells.push(Cell::Time(now));
  cells
}

/// Insert `rows` with multi-row `INSERT` statements of at most `batch_size`
/// rows each. Returns the number of rows written.
async fn insert_rows(
  tx: &mut Transaction<'_, Postgres>,
  schema: &str,
  table: &str,
  columns: &[&str],
  rows: Vec<Vec<Cell>>,
  batch_size: usize,
) -> sqlx::Result<usize> {
  let per_statement = rows_per_statement(batch_size, columns.len());
  let prefix = insert_prefix(schema, table, columns);
  let mut rows = rows.into_iter().peekable();
  let mut written = 0;

  while rows.peek().is_some() {
    let chunk: Vec<Vec<Cell>> = rows.by_ref().take(per_statement).collect();
    let n = chunk.len();
    let mut query = QueryBuilder::<Postgres>::new(&prefix);
    query.push_values(chunk, |mut b, row| {
      for cell in row {
        match cell {
          Cell::Int(v) => b.push_bind(v),
          Cell::Text(v) => b.push_bind(v),
          Cell::Time(v) => b.push_bind(v),
        };
      }
    });
    query.build().execute(&mut **tx).await?;
    written += n;
  }
  Ok(written)
}

/// `(natural key, id)` for every row of a dimension table.
async fn read_keys(
  tx: &mut Transaction<'_, Postgres>,
  schema: &str,
  spec: &DimensionSpec,
) -> sqlx::Result<Vec<(NaturalKey, i64)>> {
  let sql = format!(
    "SELECT id, {} FROM {} ORDER BY id",
    column_list(spec.key_columns()),
    qualified(schema, spec.table)
  );
  let rows = sqlx::query(&sql).fetch_all(&mut **tx).await?;
  rows
    .iter()
    .map(|row| {
      let id: i64 = row.try_get(0)?;
      let key = (1..=spec.key_len)
        .map(|i| row.try_get::<i64, _>(i))
        .collect::<sqlx::Result<Vec<_>>>()?;
      Ok((NaturalKey(key), id))
    })
    .collect()
}

async fn rebuild_indexes(
  tx: &mut Transaction<'_, Postgres>,
  schema: &str,
  table: &str,
  indexes: &[IndexSpec],
) -> sqlx::Result<()> {
  for index in indexes {
    sqlx::query(&create_index(schema, table, index)).execute(&mut **tx).await?;
  }
  Ok(())
}

// ─── Warehouse impl ──────────────────────────────────────────────────────────

impl Warehouse for PgWarehouse {
  type Error = Error;

  async fn load_sources<'a>(&'a self, names: &'a [&'static str]) -> Result<SourceSet> {
    let mut set = SourceSet::new();

    for &name in names {
      let columns: Vec<String> = sqlx::query_scalar(
        "SELECT column_name::text FROM information_schema.columns
         WHERE table_schema = $1 AND table_name = $2
         ORDER BY ordinal_position",
      )
      .bind(&self.source_schema)
      .bind(name)
      .fetch_all(&self.pool)
      .await?;
      if columns.is_empty() {
        continue;
      }

      let rows = sqlx::query(&select_source(&self.source_schema, name, &columns))
        .fetch_all(&self.pool)
        .await?;

      let mut relation =
        SourceRelation::new(name, columns.iter().map(|c| c.to_lowercase()).collect());
      for row in &rows {
        let values = (0..columns.len())
          .map(|i| row.try_get::<Option<String>, _>(i).map(Value::from))
          .collect::<sqlx::Result<Vec<_>>>()?;
        relation.push_row(values);
      }

      debug!(
        relation = %relation.name,
        columns = relation.columns.len(),
        rows = relation.len(),
        "source relation read"
      );
      set.insert(relation);
    }
    Ok(set)
  }

  async fn ensure_schema(&self) -> Result<()> {
    let schema = &self.target_schema;
    let mut tx = self.pool.begin().await?;

    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quote(schema)))
      .execute(&mut *tx)
      .await?;
    for kind in DimensionKind::ALL {
      for statement in create_dimension(schema, kind.spec()) {
        sqlx::query(&statement).execute(&mut *tx).await?;
      }
    }
    for kind in FactKind::ALL {
      sqlx::query(&create_fact(schema, kind.spec())).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    Ok(())
  }

  async fn replace_dimension(
    &self,
    spec: &'static DimensionSpec,
    rows: Vec<DimensionRow>,
    batch_size: usize,
  ) -> Result<KeyLookup> {
    let schema = self.target_schema.as_str();
    let now = Utc::now();
    let mut tables = FactKind::referencing(spec.kind);
    tables.push(spec.table);

    let mut tx = self.pool.begin().await?;
    sqlx::query(&truncate(schema, &tables)).execute(&mut *tx).await?;
    for index in spec.indexes {
      sqlx::query(&drop_index(schema, index)).execute(&mut *tx).await?;
    }

    let mut columns: Vec<&str> = spec.columns().collect();
    columns.extend(["created_at", "updated_at"]);
    let cells = rows.iter().map(|row| dimension_cells(spec, row, now)).collect();
    insert_rows(&mut tx, schema, spec.table, &columns, cells, batch_size).await?;

    rebuild_indexes(&mut tx, schema, spec.table, spec.indexes).await?;
    let keys = read_keys(&mut tx, schema, spec).await?;
    tx.commit().await?;

    Ok(KeyLookup::from_persisted(spec.kind, keys))
  }

  async fn replace_facts(
    &self,
    spec: &'static FactSpec,
    rows: Vec<FactRow>,
    batch_size: usize,
  ) -> Result<usize> {
    let schema = self.target_schema.as_str();
    let now = Utc::now();

    let mut tx = self.pool.begin().await?;
    sqlx::query(&truncate(schema, &[spec.table])).execute(&mut *tx).await?;
    for index in spec.indexes {
      sqlx::query(&drop_index(schema, index)).execute(&mut *tx).await?;
    }

    let mut columns = spec.columns();
    columns.push("created_at");
    let cells = rows.iter().map(|row| fact_cells(row, now)).collect();
    let written = insert_rows(&mut tx, schema, spec.table, &columns, cells, batch_size).await?;

    rebuild_indexes(&mut tx, schema, spec.table, spec.indexes).await?;
    tx.commit().await?;
    Ok(written)
  }

  async fn validate(&self, top_n: usize) -> Result<ValidationReport> {
    let schema = self.target_schema.as_str();
    let limit = i64::try_from(top_n).unwrap_or(i64::MAX);
    let mut report = ValidationReport::default();

    for table in star_tables() {
      let rows: i64 =
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", qualified(schema, table)))
          .fetch_one(&self.pool)
          .await?;
      report.tables.push(TableCount {
        table: table.to_owned(),
        rows:  u64::try_from(rows).unwrap_or_default(),
      });
    }

    for triple in &foreign_key_triples() {
      let orphans: i64 = sqlx::query_scalar(&orphan_count(
        schema,
        triple.fact_table,
        triple.column,
        triple.dimension_table,
      ))
      .fetch_one(&self.pool)
      .await?;
      report.orphans.push(OrphanCheck::new(triple, u64::try_from(orphans).unwrap_or_default()));
    }

    let events = qualified(schema, STUDENT_EVENT.table);
    let rows = sqlx::query(&format!(
      "SELECT event_type, COUNT(*), COALESCE(SUM(quantity), 0)::bigint
       FROM {events}
       GROUP BY event_type
       ORDER BY event_type"
    ))
    .fetch_all(&self.pool)
    .await?;
    for row in &rows {
      let event_type: String = row.try_get(0)?;
      let count: i64 = row.try_get(1)?;
      let parsed = EventType::parse(&event_type).ok_or(Error::UnknownEventType(event_type))?;
      report.event_totals.push(EventTotal {
        event_type: parsed,
        rows:       u64::try_from(count).unwrap_or_default(),
        quantity:   row.try_get(2)?,
      });
    }

    let rows = sqlx::query(&format!(
      "SELECT i.institution_code, i.institution_name, SUM(f.quantity)::bigint AS total
       FROM {events} AS f
       JOIN {} AS i ON i.id = f.institution_id
       WHERE f.event_type = $1
       GROUP BY i.id, i.institution_code, i.institution_name
       ORDER BY total DESC, i.institution_code
       LIMIT $2",
      qualified(schema, DimensionKind::Institution.table())
    ))
    .bind(EventType::Enrolled.as_str())
    .bind(limit)
    .fetch_all(&self.pool)
    .await?;
    for row in &rows {
      report.top_institutions.push(InstitutionTotal {
        institution_code: row.try_get(0)?,
        institution_name: row.try_get(1)?,
        quantity:         row.try_get(2)?,
      });
    }

    Ok(report)
  }
}

#[cfg(test)]
mod tests {
  use snies_core::dimension::{SEX, TIME_PERIOD};

  use super::*;

  #[test]
  fn batches_respect_the_parameter_limit() {
    assert_eq!(rows_per_statement(5_000, 10), 5_000);
    assert_eq!(rows_per_statement(50_000, 10), 6_553);
    assert_eq!(rows_per_statement(0, 10), 1);
  }

  #[test]
  fn dimension_cells_follow_attribute_types() {
    let now = Utc::now();
    let row = DimensionRow {
      key:    NaturalKey::pair(2021, 1),
      values: vec![Value::Integer(2021), Value::from("1"), Value::from("2021-1")],
    };
    assert_eq!(
      dimension_cells(&TIME_PERIOD, &row, now),
      vec![
        Cell::Int(Some(2021)),
        Cell::Int(Some(1)),
        Cell::Text(Some("2021-1".to_owned())),
        Cell::Time(now),
        Cell::Time(now),
      ]
    );

    let sex = DimensionRow { key: NaturalKey::one(9), values: vec![Value::Integer(9), Value::Null] };
    assert_eq!(dimension_cells(&SEX, &sex, now)[1], Cell::Text(None));
  }

  #[test]
  fn fact_cells_align_with_columns() {
    let now = Utc::now();
    let row = FactRow {
      event_type:  Some(EventType::Graduated),
      keys:        vec![1, 2, 3, 4, 5, 6],
      measure:     12,
      supplements: vec![],
    };
    let cells = fact_cells(&row, now);
    assert_eq!(cells.len(), STUDENT_EVENT.width() + 1);
    assert_eq!(cells[0], Cell::Text(Some("graduated".to_owned())));
    assert_eq!(cells[7], Cell::Int(Some(12)));
  }
}
