//! Handlers for `/sponsorship-requests` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/sponsorship-requests` | Optional `?status=pending\|approved\|rejected` |
//! | `POST` | `/sponsorship-requests` | Public intake form |
//! | `GET`  | `/sponsorship-requests/{id}` | |
//! | `POST` | `/sponsorship-requests/{id}/approve` | Optional `?child_id=` for open requests |
//! | `POST` | `/sponsorship-requests/{id}/reject` | |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use patron_core::{
  error::Entity,
  lifecycle::Approval,
  mail::Mailer,
  request::{NewSponsorshipRequest, RequestStatus, SponsorshipRequest},
  store::SponsorshipStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{Engine, Written, actor::Actor, error::Result};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status: Option<RequestStatus>,
}

/// `GET /sponsorship-requests[?status=<status>]`
pub async fn list<S, M>(
  State(engine): State<Engine<S, M>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<SponsorshipRequest>>>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  Ok(Json(engine.store().list_sponsorship_requests(params.status).await?))
}

/// `POST /sponsorship-requests`
pub async fn submit<S, M>(
  State(engine): State<Engine<S, M>>,
  Json(body): Json<NewSponsorshipRequest>,
) -> Result<impl IntoResponse>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  let request = engine.store().submit_sponsorship_request(body).await?;
  Ok((StatusCode::CREATED, Json(request)))
}

/// `GET /sponsorship-requests/{id}`
pub async fn get_one<S, M>(
  State(engine): State<Engine<S, M>>,
  Path(id): Path<Uuid>,
) -> Result<Json<SponsorshipRequest>>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  let request = engine
    .store()
    .get_sponsorship_request(id)
    .await?
    .ok_or_else(|| patron_core::Error::not_found(Entity::SponsorshipRequest, id))?;
  Ok(Json(request))
}

#[derive(Debug, Deserialize)]
pub struct ApproveParams {
  /// Child chosen by the reviewer when the request names none.
  pub child_id: Option<Uuid>,
}

/// `POST /sponsorship-requests/{id}/approve[?child_id=<uuid>]`
pub async fn approve<S, M>(
  State(engine): State<Engine<S, M>>,
  Actor(reviewer_id): Actor,
  Path(id): Path<Uuid>,
  Query(params): Query<ApproveParams>,
) -> Result<Json<Written<Approval<SponsorshipRequest>>>>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  let outcome = engine
    .approve_sponsorship_request(id, reviewer_id, params.child_id)
    .await?;
  Ok(Json(outcome.into()))
}

/// `POST /sponsorship-requests/{id}/reject`
pub async fn reject<S, M>(
  State(engine): State<Engine<S, M>>,
  Actor(reviewer_id): Actor,
  Path(id): Path<Uuid>,
) -> Result<Json<Written<SponsorshipRequest>>>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  let outcome = engine.reject_sponsorship_request(id, reviewer_id).await?;
  Ok(Json(outcome.into()))
}
