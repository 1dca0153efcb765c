//! Rebuild orchestrator.
//!
//! One rebuild recomputes the whole star model from the current source
//! relations:
//!
//! ```text
//! Idle → DimensionsBuilding → FactsBuilding → Validating → Done
//!   └──────────────┴─────────────────┴─────────────┴──→ Failed
//! ```
//!
//! Dimension rows for all seven kinds are computed first (in parallel, they
//! share nothing but the read-only source set) and persisted one table at a
//! time. Facts are resolved only once every lookup exists. The orchestrator
//! is not reentrant; callers must make sure only one rebuild targets a store
//! at a time.

use std::{fmt, thread};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  config::RebuildConfig,
  dedup::deduplicate,
  dimension::{DimensionKind, DimensionRow, DimensionSpec},
  extract::extract,
  fact::FactKind,
  lookup::LookupSet,
  resolve::{CategoryOutcome, resolve},
  source::{ALL_SOURCES, SourceSet},
  store::Warehouse,
  validate::ValidationReport,
};

// ─── Stage ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
  Idle,
  DimensionsBuilding,
  FactsBuilding,
  Validating,
  Done,
  Failed,
}

impl Stage {
  /// Whether `next` is a legal successor of `self`.
  pub fn can_advance_to(self, next: Stage) -> bool {
    use Stage::*;
    matches!(
      (self, next),
      (Idle, DimensionsBuilding)
        | (DimensionsBuilding, FactsBuilding)
        | (FactsBuilding, Validating)
        | (Validating, Done)
        | (Idle | DimensionsBuilding | FactsBuilding | Validating, Failed)
    )
  }

  pub fn is_terminal(self) -> bool { matches!(self, Self::Done | Self::Failed) }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Idle => "idle",
      Self::DimensionsBuilding => "dimensions_building",
      Self::FactsBuilding => "facts_building",
      Self::Validating => "validating",
      Self::Done => "done",
      Self::Failed => "failed",
    })
  }
}

// ─── Summary ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionOutcome {
  pub table:      String,
  /// Number of (role, relation) frames that contributed.
  pub frames:     usize,
  /// Candidates entering deduplication.
  pub candidates: usize,
  /// Rows persisted.
  pub rows:       usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebuildSummary {
  pub run_id:          Uuid,
  pub started_at:      DateTime<Utc>,
  pub finished_at:     Option<DateTime<Utc>>,
  pub stage:           Stage,
  pub dimensions:      Vec<DimensionOutcome>,
  pub categories:      Vec<CategoryOutcome>,
  pub missing_sources: Vec<String>,
  pub validation:      Option<ValidationReport>,
  pub error:           Option<String>,
}

impl RebuildSummary {
  fn new() -> Self {
    Self {
      run_id:          Uuid::new_v4(),
      started_at:      Utc::now(),
      finished_at:     None,
      stage:           Stage::Idle,
      dimensions:      Vec::new(),
      categories:      Vec::new(),
      missing_sources: Vec::new(),
      validation:      None,
      error:           None,
    }
  }

  pub fn inserted(&self) -> usize { self.categories.iter().map(|c| c.inserted).sum() }

  pub fn skipped(&self) -> usize { self.categories.iter().map(|c| c.skipped).sum() }

  pub fn to_json_pretty(&self) -> Result<String> { Ok(serde_json::to_string_pretty(self)?) }
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

/// A dimension computed in memory, ready to persist.
struct BuiltDimension {
  spec:       &'static DimensionSpec,
  frames:     usize,
  candidates: usize,
  rows:       Vec<DimensionRow>,
}

fn build_dimension(spec: &'static DimensionSpec, sources: &SourceSet) -> BuiltDimension {
  let frames = extract(spec, sources);
  let candidates = frames.iter().map(|f| f.rows.len()).sum();
  let rows = deduplicate(spec, &frames);
  BuiltDimension { spec, frames: frames.len(), candidates, rows }
}

/// Compute every dimension concurrently. Output follows [`DimensionKind::ALL`].
fn build_dimensions(sources: &SourceSet) -> Vec<BuiltDimension> {
  thread::scope(|scope| {
    let handles: Vec<_> = DimensionKind::ALL
      .into_iter()
      .map(|kind| scope.spawn(move || build_dimension(kind.spec(), sources)))
      .collect();
    handles
      .into_iter()
      .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
      .collect()
  })
}

pub struct Rebuild<'w, W> {
  warehouse: &'w W,
  config:    RebuildConfig,
  summary:   RebuildSummary,
}

impl<'w, W: Warehouse> Rebuild<'w, W> {
  pub fn new(warehouse: &'w W, config: RebuildConfig) -> Self {
    Self { warehouse, config, summary: RebuildSummary::new() }
  }

  pub fn stage(&self) -> Stage { self.summary.stage }

  pub fn summary(&self) -> &RebuildSummary { &self.summary }

  pub fn into_summary(self) -> RebuildSummary { self.summary }

  fn advance(&mut self, next: Stage) {
    debug_assert!(self.summary.stage.can_advance_to(next), "{} -> {next}", self.summary.stage);
    info!(from = %self.summary.stage, to = %next, "stage transition");
    self.summary.stage = next;
  }

  /// Run the rebuild to completion. On error the summary is left in
  /// [`Stage::Failed`] with the error message recorded.
  #[instrument(name = "rebuild", skip(self), fields(run_id = %self.summary.run_id))]
  pub async fn run(&mut self) -> Result<&RebuildSummary> {
    if self.summary.stage != Stage::Idle {
      return Err(Error::InvalidConfig(format!("rebuild already {}", self.summary.stage)));
    }

    match self.execute().await {
      Ok(()) => {
        self.summary.finished_at = Some(Utc::now());
        info!(
          inserted = self.summary.inserted(),
          skipped = self.summary.skipped(),
          missing_sources = self.summary.missing_sources.len(),
          "rebuild finished"
        );
        Ok(&self.summary)
      }
      Err(err) => {
        error!(stage = %self.summary.stage, "rebuild failed: {err}");
        self.advance(Stage::Failed);
        self.summary.finished_at = Some(Utc::now());
        self.summary.error = Some(err.to_string());
        Err(err)
      }
    }
  }

  async fn execute(&mut self) -> Result<()> {
    self.config.validate()?;
    let batch_size = self.config.batch_size;

    // ── Dimensions ──────────────────────────────────────────────────────
    self.advance(Stage::DimensionsBuilding);
    self.warehouse.ensure_schema().await.map_err(Error::storage)?;

    let sources = self.warehouse.load_sources(ALL_SOURCES).await.map_err(Error::storage)?;
    for name in sources.missing(ALL_SOURCES) {
      warn!("{}", Error::MissingSource(name.clone()));
      self.summary.missing_sources.push(name);
    }
    if sources.is_empty() {
      return Err(Error::NoSources);
    }
    info!(relations = sources.len(), "source relations loaded");

    let mut lookups = LookupSet::new();
    for built in build_dimensions(&sources) {
      let BuiltDimension { spec, frames, candidates, rows } = built;
      let lookup = self
        .warehouse
        .replace_dimension(spec, rows, batch_size)
        .await
        .map_err(Error::storage)?;

      info!(table = spec.table, frames, candidates, rows = lookup.len(), "dimension loaded");
      self.summary.dimensions.push(DimensionOutcome {
        table: spec.table.to_owned(),
        frames,
        candidates,
        rows: lookup.len(),
      });
      lookups.insert(lookup);
    }

    // ── Facts ───────────────────────────────────────────────────────────
    self.advance(Stage::FactsBuilding);
    for kind in FactKind::ALL {
      let spec = kind.spec();
      let mut rows = Vec::new();
      for category in spec.categories() {
        let resolution = resolve(category, &sources, &lookups);
        let outcome = resolution.outcome;
        info!(
          table = spec.table,
          category = category.name,
          read = outcome.read,
          filtered = outcome.filtered,
          skipped = outcome.skipped,
          inserted = outcome.inserted,
          status = %outcome.status,
          "fact category resolved"
        );
        rows.extend(resolution.rows);
        self.summary.categories.push(outcome);
      }

      let inserted =
        self.warehouse.replace_facts(spec, rows, batch_size).await.map_err(Error::storage)?;
      info!(table = spec.table, rows = inserted, "fact table loaded");
    }

    // ── Validation ──────────────────────────────────────────────────────
    self.advance(Stage::Validating);
    let report = self.warehouse.validate(self.config.top_n).await.map_err(Error::storage)?;
    report.log();
    if !report.is_clean() {
      warn!("integrity validation found orphaned foreign keys; completed loads are kept");
    }
    self.summary.validation = Some(report);

    self.advance(Stage::Done);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;
  use crate::{
    dimension::NaturalKey,
    fact::{FactRow, FactSpec},
    lookup::KeyLookup,
    source::{ENROLLED, SourceRelation},
    value::Value,
    validate::{OrphanCheck, foreign_key_triples},
  };

  #[derive(Debug, thiserror::Error)]
  #[error("fake failure")]
  struct FakeError;

  /// Keeps everything in memory; ids are assigned in insertion order.
  #[derive(Default)]
  struct MemoryWarehouse {
    sources:    Vec<SourceRelation>,
    dimensions: Mutex<Vec<(&'static str, Vec<DimensionRow>)>>,
    facts:      Mutex<Vec<(&'static str, Vec<FactRow>)>>,
    fail_facts: bool,
  }

  impl Warehouse for MemoryWarehouse {
    type Error = FakeError;

    async fn load_sources<'a>(&'a self, names: &'a [&'static str]) -> Result<SourceSet, FakeError> {
      Ok(self.sources.iter().filter(|r| names.contains(&r.name.as_str())).cloned().collect())
    }

    async fn ensure_schema(&self) -> Result<(), FakeError> { Ok(()) }

    async fn replace_dimension(
      &self,
      spec: &'static DimensionSpec,
      rows: Vec<DimensionRow>,
      _batch_size: usize,
    ) -> Result<KeyLookup, FakeError> {
      let lookup = KeyLookup::from_persisted(
        spec.kind,
        rows.iter().enumerate().map(|(i, r)| (r.key.clone(), i as i64 + 1)),
      );
      let mut dims = self.dimensions.lock().unwrap();
      dims.retain(|(t, _)| *t != spec.table);
      dims.push((spec.table, rows));
      Ok(lookup)
    }

    async fn replace_facts(
      &self,
      spec: &'static FactSpec,
      rows: Vec<FactRow>,
      _batch_size: usize,
    ) -> Result<usize, FakeError> {
      if self.fail_facts {
        return Err(FakeError);
      }
      let n = rows.len();
      let mut facts = self.facts.lock().unwrap();
      facts.retain(|(t, _)| *t != spec.table);
      facts.push((spec.table, rows));
      Ok(n)
    }

    async fn validate(&self, _top_n: usize) -> Result<ValidationReport, FakeError> {
      Ok(ValidationReport {
        orphans: foreign_key_triples().iter().map(|t| OrphanCheck::new(t, 0)).collect(),
        ..Default::default()
      })
    }
  }

  fn enrolled() -> SourceRelation {
    SourceRelation::from_rows(
      ENROLLED,
      [
        "codigo_de_la_institucion",
        "institucion_de_educacion_superior_ies",
        "codigo_snies_del_programa",
        "programa_academico",
        "codigo_del_departamento_ies",
        "departamento_de_domicilio_de_la_ies",
        "codigo_del_municipio_ies",
        "municipio_de_domicilio_de_la_ies",
        "id_sexo",
        "sexo",
        "ano",
        "semestre",
        "matriculados",
      ],
      [
        vec![
          Value::Integer(101),
          Value::from("UNIV X"),
          Value::Integer(5000),
          Value::from("DERECHO"),
          Value::Integer(11),
          Value::from("BOGOTA D.C."),
          Value::Integer(11001),
          Value::from("BOGOTA D.C."),
          Value::Integer(1),
          Value::from("HOMBRE"),
          Value::Integer(2020),
          Value::Integer(1),
          Value::Integer(25),
        ],
        vec![
          Value::Integer(999),
          Value::Null,
          Value::Integer(5000),
          Value::from("DERECHO"),
          Value::Integer(11),
          Value::from("BOGOTA D.C."),
          Value::Integer(11001),
          Value::from("BOGOTA D.C."),
          Value::Integer(1),
          Value::from("HOMBRE"),
          Value::Integer(2020),
          Value::Integer(1),
          Value::Integer(3),
        ],
      ],
    )
  }

  #[test]
  fn legal_transitions() {
    assert!(Stage::Idle.can_advance_to(Stage::DimensionsBuilding));
    assert!(Stage::FactsBuilding.can_advance_to(Stage::Failed));
    assert!(!Stage::Idle.can_advance_to(Stage::FactsBuilding));
    assert!(!Stage::Done.can_advance_to(Stage::Failed));
    assert!(Stage::Failed.is_terminal());
  }

  #[tokio::test]
  async fn full_run_reaches_done() {
    let store = MemoryWarehouse { sources: vec![enrolled()], ..Default::default() };
    let mut rebuild = Rebuild::new(&store, RebuildConfig::default());
    let summary = rebuild.run().await.unwrap().clone();

    assert_eq!(summary.stage, Stage::Done);
    assert_eq!(summary.missing_sources.len(), 6);
    assert_eq!(summary.dimensions.len(), 7);
    assert!(summary.validation.as_ref().unwrap().is_clean());

    let enrolled = summary.categories.iter().find(|c| c.category == "enrolled").unwrap();
    assert_eq!(enrolled.inserted, 1);
    // institution 999 has no name, so it never became a dimension row
    assert_eq!(enrolled.skipped, 1);

    let dims = store.dimensions.lock().unwrap();
    let (_, institutions) = dims.iter().find(|(t, _)| *t == "dim_institution").unwrap();
    assert_eq!(institutions.len(), 1);
    assert_eq!(institutions[0].key, NaturalKey::one(101));
    assert_eq!(institutions[0].values[2], Value::from("Univ X"));
  }

  #[tokio::test]
  async fn no_sources_fails_the_rebuild() {
    let store = MemoryWarehouse::default();
    let mut rebuild = Rebuild::new(&store, RebuildConfig::default());

    assert!(matches!(rebuild.run().await, Err(Error::NoSources)));
    assert_eq!(rebuild.stage(), Stage::Failed);
    assert!(rebuild.summary().error.is_some());
    assert!(rebuild.summary().finished_at.is_some());
  }

  #[tokio::test]
  async fn storage_errors_are_fatal() {
    let store =
      MemoryWarehouse { sources: vec![enrolled()], fail_facts: true, ..Default::default() };
    let mut rebuild = Rebuild::new(&store, RebuildConfig::default());

    assert!(matches!(rebuild.run().await, Err(Error::Storage(_))));
    assert_eq!(rebuild.stage(), Stage::Failed);
    assert_eq!(rebuild.summary().dimensions.len(), 7);
  }

  #[tokio::test]
  async fn invalid_config_fails_before_touching_storage() {
    let store = MemoryWarehouse { sources: vec![enrolled()], ..Default::default() };
    let config = RebuildConfig { batch_size: 0, ..Default::default() };
    let mut rebuild = Rebuild::new(&store, config);

    assert!(matches!(rebuild.run().await, Err(Error::InvalidConfig(_))));
    assert!(store.dimensions.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn rebuilds_are_repeatable() {
    let store = MemoryWarehouse { sources: vec![enrolled()], ..Default::default() };

    Rebuild::new(&store, RebuildConfig::default()).run().await.unwrap();
    let first = store.dimensions.lock().unwrap().clone();
    let first_facts = store.facts.lock().unwrap().clone();

    Rebuild::new(&store, RebuildConfig::default()).run().await.unwrap();
    assert_eq!(*store.dimensions.lock().unwrap(), first);
    assert_eq!(*store.facts.lock().unwrap(), first_facts);
  }
}
