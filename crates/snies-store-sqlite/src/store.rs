//! [`SqliteWarehouse`]: the SQLite implementation of [`Warehouse`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, Transaction, types::Value as SqlValue};
use tracing::debug;

use snies_core::{
  dimension::{DimensionRow, DimensionSpec, NaturalKey},
  fact::{EventType, FactKind, FactRow, FactSpec},
  lookup::KeyLookup,
  source::{SourceRelation, SourceSet},
  store::Warehouse,
  validate::{
    EventTotal, InstitutionTotal, OrphanCheck, TableCount, ValidationReport, foreign_key_triples,
    star_tables,
  },
};

use crate::{
  Error, Result,
  encode::{decode_value, encode_timestamp, encode_value},
  schema::{
    SCHEMA, column_list, create_index, drop_index, insert_statement, is_plain_identifier, quote,
  },
};

/// Upper bound on bound parameters per statement (`SQLITE_MAX_VARIABLE_NUMBER`
/// of the bundled library).
const MAX_PARAMS: usize = 32_766;

/// Rows per statement when staging source relations.
const STAGE_BATCH: usize = 1_000;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A star-model warehouse backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteWarehouse {
  pub(crate) conn: tokio_rusqlite::Connection,
  source_schema:   &'static str,
}

impl SqliteWarehouse {
  /// Open (or create) a warehouse at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, source_schema: "main" };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory warehouse, used by the tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, source_schema: "main" };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Read source relations from a separate database file, attached as `src`,
  /// instead of from the target database.
  pub async fn attach_sources(mut self, path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref().to_string_lossy().into_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute("ATTACH DATABASE ?1 AS src", [path])?;
        Ok(())
      })
      .await?;
    self.source_schema = "src";
    Ok(self)
  }

  /// Write `relation` into the target database as a plain table, replacing
  /// any table of the same name. Columns are untyped so cells keep the
  /// storage class they arrive with.
  pub async fn stage_source(&self, relation: SourceRelation) -> Result<()> {
    if !is_plain_identifier(&relation.name) {
      return Err(Error::InvalidRelationName(relation.name));
    }
    if relation.columns.is_empty() {
      return Err(Error::InvalidRelationName(format!("{} (no columns)", relation.name)));
    }
    if let Some(bad) = relation.columns.iter().find(|c| !is_plain_identifier(c)) {
      return Err(Error::InvalidRelationName(format!("{}.{bad}", relation.name)));
    }

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let columns: Vec<&str> = relation.columns.iter().map(String::as_str).collect();
        tx.execute(&format!("DROP TABLE IF EXISTS {}", quote(&relation.name)), [])?;
        tx.execute(
          &format!("CREATE TABLE {} ({})", quote(&relation.name), column_list(columns.iter().copied())),
          [],
        )?;
        insert_rows(
          &tx,
          &relation.name,
          &columns,
          relation.rows.iter().map(|row| row.iter().map(encode_value)),
          STAGE_BATCH,
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Insert `rows` with multi-row `INSERT` statements of at most `batch_size`
/// rows each. Returns the number of rows written.
fn insert_rows<I, R>(
  tx: &Transaction<'_>,
  table: &str,
  columns: &[&str],
  rows: I,
  batch_size: usize,
) -> rusqlite::Result<usize>
where
  I: IntoIterator<Item = R>,
  R: IntoIterator<Item = SqlValue>,
{
  let per_statement = batch_size.min(MAX_PARAMS / columns.len().max(1)).max(1);
  let mut params: Vec<SqlValue> = Vec::with_capacity(per_statement * columns.len());
  let mut pending = 0;
  let mut written = 0;

  for row in rows {
    params.extend(row);
    pending += 1;
    if pending == per_statement {
      flush(tx, table, columns, pending, &mut params)?;
      written += pending;
      pending = 0;
    }
  }
  if pending > 0 {
    flush(tx, table, columns, pending, &mut params)?;
    written += pending;
  }
  Ok(written)
}

fn flush(
  tx: &Transaction<'_>,
  table: &str,
  columns: &[&str],
  rows: usize,
  params: &mut Vec<SqlValue>,
) -> rusqlite::Result<()> {
  let sql = insert_statement(table, columns, rows);
  tx.prepare_cached(&sql)?.execute(rusqlite::params_from_iter(params.drain(..)))?;
  Ok(())
}

/// Empty `table` and restart its id sequence.
fn truncate(tx: &Transaction<'_>, table: &str) -> rusqlite::Result<()> {
  tx.execute(&format!("DELETE FROM {}", quote(table)), [])?;
  tx.execute("DELETE FROM sqlite_sequence WHERE name = ?1", [table])?;
  Ok(())
}

/// `(natural key, id)` for every row of a dimension table.
fn read_keys(tx: &Transaction<'_>, spec: &DimensionSpec) -> rusqlite::Result<Vec<(NaturalKey, i64)>> {
  let sql = format!(
    "SELECT id, {} FROM {} ORDER BY id",
    column_list(spec.key_columns()),
    quote(spec.table)
  );
  let key_len = spec.key_len;
  let mut stmt = tx.prepare(&sql)?;
  let keys = stmt
    .query_map([], |row| {
      let id: i64 = row.get(0)?;
      let key = (1..=key_len).map(|i| row.get::<_, i64>(i)).collect::<rusqlite::Result<Vec<_>>>()?;
      Ok((NaturalKey(key), id))
    })?
    .collect::<rusqlite::Result<Vec<_>>>();
  keys
}

fn count(conn: &rusqlite::Connection, sql: &str) -> rusqlite::Result<u64> {
  let n: i64 = conn.query_row(sql, [], |r| r.get(0))?;
  Ok(u64::try_from(n).unwrap_or_default())
}

// ─── Warehouse impl ──────────────────────────────────────────────────────────

impl Warehouse for SqliteWarehouse {
  type Error = Error;

  async fn load_sources<'a>(&'a self, names: &'a [&'static str]) -> Result<SourceSet> {
    let schema = self.source_schema;
    let names = names.to_vec();

    let relations: Vec<SourceRelation> = self
      .conn
      .call(move |conn| {
        let mut out = Vec::new();
        for name in names {
          let exists = conn
            .query_row(
              &format!(
                "SELECT 1 FROM {}.sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
                quote(schema)
              ),
              [name],
              |_| Ok(()),
            )
            .optional()?
            .is_some();
          if !exists {
            continue;
          }

          let mut stmt = conn.prepare(&format!("SELECT * FROM {}.{}", quote(schema), quote(name)))?;
          let columns: Vec<String> =
            stmt.column_names().into_iter().map(str::to_lowercase).collect();
          let width = columns.len();
          let mut relation = SourceRelation::new(name, columns);

          let mut rows = stmt.query([])?;
          while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
              values.push(decode_value(row.get_ref(i)?));
            }
            relation.push_row(values);
          }
          out.push(relation);
        }
        Ok(out)
      })
      .await?;

    for relation in &relations {
      debug!(
        relation = %relation.name,
        columns = relation.columns.len(),
        rows = relation.len(),
        "source relation read"
      );
    }
    Ok(relations.into_iter().collect())
  }

  async fn ensure_schema(&self) -> Result<()> { self.init_schema().await }

  async fn replace_dimension(
    &self,
    spec: &'static DimensionSpec,
    rows: Vec<DimensionRow>,
    batch_size: usize,
  ) -> Result<KeyLookup> {
    let now = encode_timestamp(Utc::now());
    let dependents = FactKind::referencing(spec.kind);

    let keys = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for table in &dependents {
          truncate(&tx, table)?;
        }
        truncate(&tx, spec.table)?;
        for index in spec.indexes {
          tx.execute(&drop_index(index), [])?;
        }

        let mut columns: Vec<&str> = spec.columns().collect();
        columns.extend(["created_at", "updated_at"]);
        insert_rows(
          &tx,
          spec.table,
          &columns,
          rows.iter().map(|row| {
            row
              .values
              .iter()
              .map(encode_value)
              .chain([SqlValue::Text(now.clone()), SqlValue::Text(now.clone())])
          }),
          batch_size,
        )?;

        for index in spec.indexes {
          tx.execute(&create_index(spec.table, index), [])?;
        }
        let keys = read_keys(&tx, spec)?;
        tx.commit()?;
        Ok(keys)
      })
      .await?;

    Ok(KeyLookup::from_persisted(spec.kind, keys))
  }

  async fn replace_facts(
    &self,
    spec: &'static FactSpec,
    rows: Vec<FactRow>,
    batch_size: usize,
  ) -> Result<usize> {
    let now = encode_timestamp(Utc::now());

    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        truncate(&tx, spec.table)?;
        for index in spec.indexes {
          tx.execute(&drop_index(index), [])?;
        }

        let mut columns = spec.columns();
        columns.push("created_at");
        let written = insert_rows(
          &tx,
          spec.table,
          &columns,
          rows.iter().map(|row| {
            row
              .values()
              .iter()
              .map(encode_value)
              .chain([SqlValue::Text(now.clone())])
              .collect::<Vec<_>>()
          }),
          batch_size,
        )?;

        for index in spec.indexes {
          tx.execute(&create_index(spec.table, index), [])?;
        }
        tx.commit()?;
        Ok(written)
      })
      .await?;

    Ok(written)
  }

  async fn validate(&self, top_n: usize) -> Result<ValidationReport> {
    let triples = foreign_key_triples();
    let tables = star_tables();
    let limit = i64::try_from(top_n).unwrap_or(i64::MAX);

    let (mut report, events) = self
      .conn
      .call(move |conn| {
        let mut report = ValidationReport::default();

        for table in tables {
          let rows = count(conn, &format!("SELECT COUNT(*) FROM {}", quote(table)))?;
          report.tables.push(TableCount { table: table.to_owned(), rows });
        }

        for triple in &triples {
          let orphans = count(
            conn,
            &format!(
              "SELECT COUNT(*) FROM {} AS f LEFT JOIN {} AS d ON f.{} = d.id WHERE d.id IS NULL",
              quote(triple.fact_table),
              quote(triple.dimension_table),
              quote(triple.column)
            ),
          )?;
          report.orphans.push(OrphanCheck::new(triple, orphans));
        }

        let mut stmt = conn.prepare(
          "SELECT event_type, COUNT(*), COALESCE(SUM(quantity), 0)
           FROM fact_student_event
           GROUP BY event_type
           ORDER BY event_type",
        )?;
        let events = stmt
          .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?, r.get::<_, i64>(2)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
          "SELECT i.institution_code, i.institution_name, SUM(f.quantity) AS total
           FROM fact_student_event AS f
           JOIN dim_institution AS i ON i.id = f.institution_id
           WHERE f.event_type = 'enrolled'
           GROUP BY i.id, i.institution_code, i.institution_name
           ORDER BY total DESC, i.institution_code
           LIMIT ?1",
        )?;
        report.top_institutions = stmt
          .query_map([limit], |r| {
            Ok(InstitutionTotal {
              institution_code: r.get(0)?,
              institution_name: r.get(1)?,
              quantity:         r.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((report, events))
      })
      .await?;

    for (event_type, rows, quantity) in events {
      let parsed = EventType::parse(&event_type).ok_or(Error::UnknownEventType(event_type))?;
      report.event_totals.push(EventTotal {
        event_type: parsed,
        rows: u64::try_from(rows).unwrap_or_default(),
        quantity,
      });
    }
    Ok(report)
  }
}
