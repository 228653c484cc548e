//! Handlers for `/children` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/children` | Optional `?sponsored=true\|false` |
//! | `POST` | `/children` | Body: `{"name":"Mia"}` |
//! | `GET`  | `/children/{id}` | Child, active sponsorship and history |
//! | `GET`  | `/children/{id}/activity` | Audit trail, oldest first |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use patron_core::{
  audit::AuditEntry,
  child::{Child, ChildView, NewChild},
  error::Entity,
  mail::Mailer,
  store::SponsorshipStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{Engine, error::Result};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub sponsored: Option<bool>,
}

/// `GET /children[?sponsored=<bool>]`
pub async fn list<S, M>(
  State(engine): State<Engine<S, M>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Child>>>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  Ok(Json(engine.store().list_children(params.sponsored).await?))
}

/// `POST /children`
pub async fn create<S, M>(
  State(engine): State<Engine<S, M>>,
  Json(body): Json<NewChild>,
) -> Result<impl IntoResponse>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  let child = engine.store().add_child(body).await?;
  Ok((StatusCode::CREATED, Json(child)))
}

/// `GET /children/{id}`
pub async fn get_one<S, M>(
  State(engine): State<Engine<S, M>>,
  Path(id): Path<Uuid>,
) -> Result<Json<ChildView>>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  let view = engine
    .store()
    .materialize_child(id)
    .await?
    .ok_or_else(|| patron_core::Error::not_found(Entity::Child, id))?;
  Ok(Json(view))
}

/// `GET /children/{id}/activity`
pub async fn activity<S, M>(
  State(engine): State<Engine<S, M>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<AuditEntry>>>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  let store = engine.store();
  if store.get_child(id).await?.is_none() {
    return Err(patron_core::Error::not_found(Entity::Child, id).into());
  }
  Ok(Json(store.audit_trail(id).await?))
}
