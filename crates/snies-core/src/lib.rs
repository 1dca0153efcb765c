//! Storage-agnostic star-schema assembly engine for the SNIES higher
//! education survey extracts.
//!
//! Source relations go in, seven dimensions and three fact tables come out.
//! This crate owns the catalogs and every transformation step; persistence is
//! delegated to a [`store::Warehouse`] backend (`snies-store-sqlite`,
//! `snies-store-postgres`).

// Native `async fn` in traits; the `Warehouse` trait spells out `Send` bounds
// on its futures explicitly.
#![allow(async_fn_in_trait)]

pub mod alias;
pub mod canonical;
pub mod config;
pub mod dedup;
pub mod dimension;
pub mod error;
pub mod extract;
pub mod fact;
pub mod lookup;
pub mod rebuild;
pub mod resolve;
pub mod source;
pub mod store;
pub mod validate;
pub mod value;

pub use error::{Error, Result};
