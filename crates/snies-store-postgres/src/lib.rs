//! PostgreSQL backend for the SNIES star model.
//!
//! Uses a [`sqlx::PgPool`]. Source relations are read from `source_schema`
//! and the ten star tables live in `target_schema`; both default to
//! `public`.

mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::PgWarehouse;
