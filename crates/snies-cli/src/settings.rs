//! Layered configuration: `config.toml` overridden by `SNIES_*` variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;
use snies_core::config::RebuildConfig;

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Settings {
  #[serde(default)]
  pub store:   StoreConfig,
  #[serde(default)]
  pub rebuild: RebuildConfig,
}

/// Which warehouse backend to open, and where.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
  Sqlite {
    path:        PathBuf,
    /// Separate database holding the source relations, attached read-side.
    #[serde(default)]
    source_path: Option<PathBuf>,
  },
  Postgres {
    url:             String,
    #[serde(default = "public")]
    source_schema:   String,
    #[serde(default = "public")]
    target_schema:   String,
    #[serde(default = "max_connections")]
    max_connections: u32,
  },
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self::Sqlite { path: PathBuf::from("data/seminario_facts.db"), source_path: None }
  }
}

fn public() -> String { "public".to_owned() }

fn max_connections() -> u32 { 5 }

impl Settings {
  /// Read `path` (optional) and the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("SNIES")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read config file")?;

    let mut settings: Self = settings
      .try_deserialize()
      .context("failed to deserialise settings")?;
    settings.store.expand_home();
    Ok(settings)
  }
}

impl StoreConfig {
  /// Resolve a leading `~` component in file paths against `$HOME`.
  fn expand_home(&mut self) {
    let Ok(home) = std::env::var("HOME") else { return };
    let Self::Sqlite { path, source_path } = self else { return };
    for p in std::iter::once(path).chain(source_path.as_mut()) {
      let Ok(rest) = p.strip_prefix("~") else { continue };
      let expanded = Path::new(&home).join(rest);
      *p = expanded;
    }
  }
}

#[cfg(test)]
mod tests {
  use config::{Config, File, FileFormat};

  use super::*;

  fn parse(toml: &str) -> Settings {
    Config::builder()
      .add_source(File::from_str(toml, FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn sqlite_with_attached_sources() {
    let settings = parse(
      r#"
      [store]
      backend = "sqlite"
      path = "facts.db"
      source_path = "unified.db"

      [rebuild]
      top_n = 10
      "#,
    );
    assert_eq!(
      settings.store,
      StoreConfig::Sqlite {
        path:        PathBuf::from("facts.db"),
        source_path: Some(PathBuf::from("unified.db")),
      }
    );
    assert_eq!(settings.rebuild, RebuildConfig { batch_size: 5000, top_n: 10 });
  }

  #[test]
  fn postgres_schemas_default_to_public() {
    let settings = parse(
      r#"
      [store]
      backend = "postgres"
      url = "postgres://localhost/seminario"
      target_schema = "star"
      "#,
    );
    assert_eq!(
      settings.store,
      StoreConfig::Postgres {
        url:             "postgres://localhost/seminario".to_owned(),
        source_schema:   "public".to_owned(),
        target_schema:   "star".to_owned(),
        max_connections: 5,
      }
    );
  }

  #[test]
  fn empty_config_uses_defaults() {
    assert_eq!(parse(""), Settings::default());
  }

  #[test]
  fn home_relative_paths_are_expanded() {
    let Ok(home) = std::env::var("HOME") else { return };
    let mut store = StoreConfig::Sqlite {
      path:        PathBuf::from("~/facts.db"),
      source_path: Some(PathBuf::from("~snies/unified.db")),
    };
    store.expand_home();
    assert_eq!(
      store,
      StoreConfig::Sqlite {
        path:        Path::new(&home).join("facts.db"),
        source_path: Some(PathBuf::from("~snies/unified.db")),
      }
    );
  }
}
