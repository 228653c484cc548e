//! Handlers for `/sponsorships` endpoints: ledger queries and the direct
//! staff actions (link, transfer, terminate).
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/sponsorships` | Optional `?child_id=&sponsor_id=&status=` |
//! | `POST` | `/sponsorships` | Body: `{"child_id":…,"sponsor_id":…}`; 409 if the child is taken |
//! | `GET`  | `/sponsorships/{id}` | |
//! | `POST` | `/sponsorships/transfer` | Body: `{"child_id":…,"from_sponsor_id":…,"to_sponsor_id":…}` |
//! | `POST` | `/sponsorships/{id}/terminate` | Body: `{"reason":…,"termination_date":"YYYY-MM-DD"}` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::NaiveDate;
use patron_core::{
  error::Entity,
  lifecycle::Transfer,
  mail::Mailer,
  sponsorship::{Sponsorship, SponsorshipQuery},
  store::SponsorshipStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{Engine, Written, actor::Actor, error::Result};

/// `GET /sponsorships`
pub async fn list<S, M>(
  State(engine): State<Engine<S, M>>,
  Query(query): Query<SponsorshipQuery>,
) -> Result<Json<Vec<Sponsorship>>>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  Ok(Json(engine.store().list_sponsorships(&query).await?))
}

/// `GET /sponsorships/{id}`
pub async fn get_one<S, M>(
  State(engine): State<Engine<S, M>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Sponsorship>>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  let row = engine
    .store()
    .get_sponsorship(id)
    .await?
    .ok_or_else(|| patron_core::Error::not_found(Entity::Sponsorship, id))?;
  Ok(Json(row))
}

// ─── Create association ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub child_id:   Uuid,
  pub sponsor_id: Uuid,
}

/// `POST /sponsorships`
pub async fn create<S, M>(
  State(engine): State<Engine<S, M>>,
  Actor(actor_id): Actor,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  let outcome = engine
    .create_association(body.child_id, body.sponsor_id, actor_id)
    .await?;
  Ok((StatusCode::CREATED, Json(Written::from(outcome))))
}

// ─── Transfer ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TransferBody {
  pub child_id:        Uuid,
  pub from_sponsor_id: Uuid,
  pub to_sponsor_id:   Uuid,
}

/// `POST /sponsorships/transfer`
pub async fn transfer<S, M>(
  State(engine): State<Engine<S, M>>,
  Actor(actor_id): Actor,
  Json(body): Json<TransferBody>,
) -> Result<Json<Written<Transfer>>>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  let outcome = engine
    .transfer_child(body.child_id, body.from_sponsor_id, body.to_sponsor_id, actor_id)
    .await?;
  Ok(Json(outcome.into()))
}

// ─── Terminate ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TerminateBody {
  pub reason:           String,
  pub termination_date: NaiveDate,
}

/// `POST /sponsorships/{id}/terminate`
pub async fn terminate<S, M>(
  State(engine): State<Engine<S, M>>,
  Actor(actor_id): Actor,
  Path(id): Path<Uuid>,
  Json(body): Json<TerminateBody>,
) -> Result<Json<Written<Sponsorship>>>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  let outcome = engine
    .terminate_sponsorship(id, body.reason, body.termination_date, actor_id)
    .await?;
  Ok(Json(outcome.into()))
}
