//! Error types for `snies-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A source relation is absent. Fatal only to the dimension role or fact
  /// category that reads it.
  #[error("source relation not found: {0}")]
  MissingSource(String),

  #[error("no source relation is available; nothing to rebuild")]
  NoSources,

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("invalid configuration: {0}")]
  InvalidConfig(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Wrap a backend error.
  pub fn storage<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Storage(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
