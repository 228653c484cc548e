//! Handlers for `/assignment-requests` endpoints.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use patron_core::{
  lifecycle::Approval,
  mail::Mailer,
  request::{ChildAssignmentRequest, NewChildAssignmentRequest, RequestStatus},
  store::SponsorshipStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{Engine, Written, actor::Actor, error::Result};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status: Option<RequestStatus>,
}

/// `GET /assignment-requests[?status=<status>]`
pub async fn list<S, M>(
  State(engine): State<Engine<S, M>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<ChildAssignmentRequest>>>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  Ok(Json(engine.store().list_assignment_requests(params.status).await?))
}

/// `POST /assignment-requests`
pub async fn submit<S, M>(
  State(engine): State<Engine<S, M>>,
  Json(body): Json<NewChildAssignmentRequest>,
) -> Result<impl IntoResponse>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  let request = engine.store().submit_assignment_request(body).await?;
  Ok((StatusCode::CREATED, Json(request)))
}

/// `POST /assignment-requests/{id}/approve`
pub async fn approve<S, M>(
  State(engine): State<Engine<S, M>>,
  Actor(reviewer_id): Actor,
  Path(id): Path<Uuid>,
) -> Result<Json<Written<Approval<ChildAssignmentRequest>>>>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  let outcome = engine.approve_child_assignment_request(id, reviewer_id).await?;
  Ok(Json(outcome.into()))
}

/// `POST /assignment-requests/{id}/reject`
pub async fn reject<S, M>(
  State(engine): State<Engine<S, M>>,
  Actor(reviewer_id): Actor,
  Path(id): Path<Uuid>,
) -> Result<Json<Written<ChildAssignmentRequest>>>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  let outcome = engine.reject_child_assignment_request(id, reviewer_id).await?;
  Ok(Json(outcome.into()))
}
