//! Error types for `patron-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::request::RequestStatus;

/// The kind of record a [`Error::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Entity {
  Child,
  Sponsor,
  Sponsorship,
  SponsorshipRequest,
  AssignmentRequest,
  Notification,
  Message,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("{entity} not found: {id}")]
  NotFound { entity: Entity, id: Uuid },

  /// The request was already approved or rejected. Callers treat this as a
  /// benign, idempotent outcome.
  #[error("request {request_id} is already {status}")]
  AlreadyResolved {
    request_id: Uuid,
    status:     RequestStatus,
  },

  /// The child already has an active sponsorship. Carries the current sponsor
  /// so the caller can offer an explicit transfer.
  #[error("child {child_id} is already sponsored by {current_sponsor_id}")]
  ConflictNeedsTransfer {
    child_id:             Uuid,
    sponsorship_id:       Uuid,
    current_sponsor_id:   Uuid,
    current_sponsor_name: String,
  },

  /// The active sponsorship a transfer expected no longer exists.
  #[error("transfer of child {child_id} is stale; refetch and retry")]
  StaleTransfer { child_id: Uuid },

  /// More than one active sponsorship exists for a child. Requires manual
  /// reconciliation.
  #[error("child {child_id} has {active_rows} active sponsorships")]
  DataIntegrity { child_id: Uuid, active_rows: usize },

  #[error("sponsorship {0} is not active")]
  NotActive(Uuid),

  #[error("invalid input: {0}")]
  Validation(String),

  #[error("actor {actor_id} is not allowed to perform this action")]
  Forbidden { actor_id: Uuid },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn not_found(entity: Entity, id: Uuid) -> Self {
    Self::NotFound { entity, id }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
