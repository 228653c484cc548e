//! Core types and the lifecycle engine for the Patron sponsorship ledger.
//!
//! This crate has no HTTP or database dependencies.
//! All other crates depend on it; storage and delivery are reached through
//! the [`store::SponsorshipStore`] and [`mail::Mailer`] traits.

pub mod audit;
pub mod child;
pub mod conflict;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod fanout;
pub mod lifecycle;
pub mod mail;
pub mod notification;
pub mod outbox;
pub mod request;
pub mod sponsor;
pub mod sponsorship;
pub mod store;

pub use engine::{LifecycleEngine, Outcome};
pub use error::{Error, Result};
