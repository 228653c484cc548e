//! In-app notifications and inter-party messages.
//!
//! Both are produced by the outbox dispatcher after a lifecycle transition
//! commits, and afterwards mutated only by their recipient.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tag identifying which lifecycle event produced an artifact.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::AsRefStr,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
  SponsorshipApproved,
  SponsorshipRejected,
  AssignmentApproved,
  AssignmentRejected,
  SponsorshipCreated,
  SponsorshipTransferred,
  SponsorshipTerminated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
  pub notification_id: Uuid,
  pub recipient_id:    Uuid,
  pub kind:            NotificationKind,
  pub title:           String,
  pub content:         String,
  /// Structured payload; diff-style events carry `previous` and `new`.
  pub metadata:        serde_json::Value,
  pub is_read:         bool,
  pub created_at:      DateTime<Utc>,
}

/// A notification waiting in the outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
  pub recipient_id: Uuid,
  pub kind:         NotificationKind,
  pub title:        String,
  pub content:      String,
  pub metadata:     serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
  pub message_id:   Uuid,
  /// `None` for system-generated messages.
  pub sender_id:    Option<Uuid>,
  pub recipient_id: Uuid,
  pub subject:      String,
  pub body:         String,
  pub is_read:      bool,
  pub created_at:   DateTime<Utc>,
}

/// A message waiting in the outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
  pub sender_id:    Option<Uuid>,
  pub recipient_id: Uuid,
  pub subject:      String,
  pub body:         String,
}
