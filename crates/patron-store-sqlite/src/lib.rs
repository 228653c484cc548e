//! SQLite backend for the Patron sponsorship store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Lifecycle transactions run as
//! `BEGIN IMMEDIATE`, and a partial unique index keeps at most one active
//! sponsorship per child.

mod encode;
mod queries;
mod schema;
mod store;
mod tx;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
