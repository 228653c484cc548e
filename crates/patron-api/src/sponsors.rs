//! Handlers for `/sponsors` endpoints.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use patron_core::{
  error::Entity,
  mail::Mailer,
  sponsor::{NewSponsor, Role, Sponsor},
  store::SponsorshipStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{Engine, error::Result};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub role: Option<Role>,
}

/// `GET /sponsors[?role=sponsor|assistant|admin]`
pub async fn list<S, M>(
  State(engine): State<Engine<S, M>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Sponsor>>>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  Ok(Json(engine.store().list_sponsors(params.role).await?))
}

/// `POST /sponsors`; 422 if the email is already registered.
pub async fn create<S, M>(
  State(engine): State<Engine<S, M>>,
  Json(body): Json<NewSponsor>,
) -> Result<impl IntoResponse>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  let sponsor = engine.store().add_sponsor(body).await?;
  Ok((StatusCode::CREATED, Json(sponsor)))
}

/// `GET /sponsors/{id}`
pub async fn get_one<S, M>(
  State(engine): State<Engine<S, M>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Sponsor>>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  let sponsor = engine
    .store()
    .get_sponsor(id)
    .await?
    .ok_or_else(|| patron_core::Error::not_found(Entity::Sponsor, id))?;
  Ok(Json(sponsor))
}
