//! Error type for `snies-store-postgres`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("invalid schema name: {0:?}")]
  InvalidIdentifier(String),

  #[error("unknown event type stored in fact_student_event: {0:?}")]
  UnknownEventType(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
