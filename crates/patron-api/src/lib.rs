//! JSON REST API for Patron.
//!
//! Exposes an axum [`Router`] over a [`LifecycleEngine`] backed by any
//! [`SponsorshipStore`]. Service authentication, TLS and transport concerns
//! are the caller's responsibility; the acting user is named per request in
//! the `X-Actor-Id` header.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", patron_api::api_router(engine.clone()))
//! ```

pub mod actor;
pub mod assignments;
pub mod children;
pub mod error;
pub mod inbox;
pub mod requests;
pub mod sponsors;
pub mod sponsorships;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use patron_core::{
  LifecycleEngine, Outcome, dispatch::NotificationDeliveryFailure, mail::Mailer,
  store::SponsorshipStore,
};
use serde::Serialize;

pub use actor::Actor;
pub use error::ApiError;

/// Router state: the engine, which also hands out its store.
pub type Engine<S, M> = Arc<LifecycleEngine<S, M>>;

/// Response body of every lifecycle write: the committed value plus any
/// notification deliveries that did not go out.
#[derive(Debug, Serialize)]
pub struct Written<T> {
  pub data:     T,
  pub warnings: Vec<NotificationDeliveryFailure>,
}

impl<T> From<Outcome<T>> for Written<T> {
  fn from(outcome: Outcome<T>) -> Self {
    Self { data: outcome.value, warnings: outcome.warnings }
  }
}

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, M>(engine: Engine<S, M>) -> Router<()>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  Router::new()
    // Children
    .route("/children", get(children::list::<S, M>).post(children::create::<S, M>))
    .route("/children/{id}", get(children::get_one::<S, M>))
    .route("/children/{id}/activity", get(children::activity::<S, M>))
    // Sponsors
    .route("/sponsors", get(sponsors::list::<S, M>).post(sponsors::create::<S, M>))
    .route("/sponsors/{id}", get(sponsors::get_one::<S, M>))
    // Sponsorship requests
    .route(
      "/sponsorship-requests",
      get(requests::list::<S, M>).post(requests::submit::<S, M>),
    )
    .route("/sponsorship-requests/{id}", get(requests::get_one::<S, M>))
    .route("/sponsorship-requests/{id}/approve", post(requests::approve::<S, M>))
    .route("/sponsorship-requests/{id}/reject", post(requests::reject::<S, M>))
    // Assignment requests
    .route(
      "/assignment-requests",
      get(assignments::list::<S, M>).post(assignments::submit::<S, M>),
    )
    .route("/assignment-requests/{id}/approve", post(assignments::approve::<S, M>))
    .route("/assignment-requests/{id}/reject", post(assignments::reject::<S, M>))
    // Ledger
    .route(
      "/sponsorships",
      get(sponsorships::list::<S, M>).post(sponsorships::create::<S, M>),
    )
    .route("/sponsorships/transfer", post(sponsorships::transfer::<S, M>))
    .route("/sponsorships/{id}", get(sponsorships::get_one::<S, M>))
    .route("/sponsorships/{id}/terminate", post(sponsorships::terminate::<S, M>))
    // Inbox
    .route("/notifications", get(inbox::list_notifications::<S, M>))
    .route(
      "/notifications/{id}",
      axum::routing::delete(inbox::delete_notification::<S, M>),
    )
    .route("/notifications/{id}/read", post(inbox::mark_read::<S, M>))
    .route("/notifications/{id}/unread", post(inbox::mark_unread::<S, M>))
    .route("/messages", get(inbox::list_messages::<S, M>))
    .route("/messages/{id}/read", post(inbox::mark_message_read::<S, M>))
    .with_state(engine)
}
