//! `snies-star` binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the
//! configured warehouse and either rebuilds the star model or validates the
//! one already stored.
//!
//! ```
//! cargo run -p snies-cli --bin snies-star -- rebuild --json
//! ```

mod settings;

use std::{path::PathBuf, process::ExitCode};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use snies_core::{config::RebuildConfig, rebuild::Rebuild, store::Warehouse};
use snies_store_postgres::PgWarehouse;
use snies_store_sqlite::SqliteWarehouse;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::{Settings, StoreConfig};

#[derive(Parser)]
#[command(author, version, about = "SNIES star-schema builder")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the summary or report as JSON on stdout.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
  /// Replace every dimension and fact table from the source relations.
  Rebuild,
  /// Check referential integrity of the stored star model.
  Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;

  match settings.store {
    StoreConfig::Sqlite { path, source_path } => {
      let mut store = SqliteWarehouse::open(&path)
        .await
        .with_context(|| format!("failed to open warehouse at {path:?}"))?;
      if let Some(source_path) = source_path {
        store = store
          .attach_sources(&source_path)
          .await
          .with_context(|| format!("failed to attach sources at {source_path:?}"))?;
      }
      run(&store, cli.command, settings.rebuild, cli.json).await
    }
    StoreConfig::Postgres { url, source_schema, target_schema, max_connections } => {
      let store = PgWarehouse::connect(&url, max_connections)
        .await
        .context("failed to connect to postgres")?
        .with_schemas(&source_schema, &target_schema)?;
      run(&store, cli.command, settings.rebuild, cli.json).await
    }
  }
}

async fn run<W: Warehouse>(
  warehouse: &W,
  command: Command,
  config: RebuildConfig,
  json: bool,
) -> anyhow::Result<ExitCode> {
  match command {
    Command::Rebuild => {
      let mut rebuild = Rebuild::new(warehouse, config);
      let outcome = rebuild.run().await.map(|_| ());
      let summary = rebuild.into_summary();
      if json {
        println!("{}", summary.to_json_pretty()?);
      }
      match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
          tracing::error!(run_id = %summary.run_id, error = %e, "rebuild failed");
          Ok(ExitCode::FAILURE)
        }
      }
    }
    Command::Validate => {
      warehouse.ensure_schema().await.context("failed to prepare schema")?;
      let report = warehouse.validate(config.top_n).await.context("validation failed")?;
      if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
      } else {
        report.log();
      }
      Ok(if report.is_clean() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
    }
  }
}
