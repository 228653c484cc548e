//! The acting user's notifications and messages.
//!
//! Every route here is scoped to the `X-Actor-Id` recipient; ids that belong
//! to someone else answer 404.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use patron_core::{
  mail::Mailer,
  notification::{Message, Notification},
  store::SponsorshipStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{Engine, actor::Actor, error::Result};

// ─── Notifications ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct NotificationParams {
  #[serde(default)]
  pub unread_only: bool,
}

/// `GET /notifications[?unread_only=true]`, newest first.
pub async fn list_notifications<S, M>(
  State(engine): State<Engine<S, M>>,
  Actor(recipient_id): Actor,
  Query(params): Query<NotificationParams>,
) -> Result<Json<Vec<Notification>>>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  let notifications = engine
    .store()
    .list_notifications(recipient_id, params.unread_only)
    .await?;
  Ok(Json(notifications))
}

/// `POST /notifications/{id}/read`
pub async fn mark_read<S, M>(
  State(engine): State<Engine<S, M>>,
  Actor(recipient_id): Actor,
  Path(id): Path<Uuid>,
) -> Result<StatusCode>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  engine.store().set_notification_read(id, recipient_id, true).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /notifications/{id}/unread`
pub async fn mark_unread<S, M>(
  State(engine): State<Engine<S, M>>,
  Actor(recipient_id): Actor,
  Path(id): Path<Uuid>,
) -> Result<StatusCode>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  engine.store().set_notification_read(id, recipient_id, false).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /notifications/{id}`
pub async fn delete_notification<S, M>(
  State(engine): State<Engine<S, M>>,
  Actor(recipient_id): Actor,
  Path(id): Path<Uuid>,
) -> Result<StatusCode>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  engine.store().delete_notification(id, recipient_id).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Messages ─────────────────────────────────────────────────────────────────

/// `GET /messages`, newest first.
pub async fn list_messages<S, M>(
  State(engine): State<Engine<S, M>>,
  Actor(recipient_id): Actor,
) -> Result<Json<Vec<Message>>>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  Ok(Json(engine.store().list_messages(recipient_id).await?))
}

/// `POST /messages/{id}/read`
pub async fn mark_message_read<S, M>(
  State(engine): State<Engine<S, M>>,
  Actor(recipient_id): Actor,
  Path(id): Path<Uuid>,
) -> Result<StatusCode>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  engine.store().mark_message_read(id, recipient_id).await?;
  Ok(StatusCode::NO_CONTENT)
}
