//! # Parallel Text Core
//!
//! Shared logic for Parallel Text: data models, the fixed-size chunker,
//! the weighted regex rule engine, token-overlap search ranking, the
//! chunk/score aggregator, and the store abstraction.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! runtime-specific dependencies. Everything that touches persistence goes
//! through the [`store::Store`] trait.

pub mod aggregate;
pub mod chunk;
pub mod error;
pub mod models;
pub mod rules;
pub mod search;
pub mod store;

pub use error::{Error, Result};
