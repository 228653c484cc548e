//! Outbox entries written by lifecycle transactions and drained by the
//! [`crate::dispatch::Dispatcher`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  mail::OutboundEmail,
  notification::{NewMessage, NewNotification, NotificationKind},
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::AsRefStr,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutboxStatus {
  Pending,
  Delivered,
  /// Gave up after the retry policy's last attempt.
  Dead,
}

/// A single recipient-facing artifact. Each is delivered independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "payload", rename_all = "snake_case")]
pub enum Delivery {
  Notification(NewNotification),
  Message(NewMessage),
  Email(OutboundEmail),
}

impl Delivery {
  pub fn channel(&self) -> &'static str {
    match self {
      Self::Notification(_) => "notification",
      Self::Message(_) => "message",
      Self::Email(_) => "email",
    }
  }

  /// Human-readable recipient: an account id or an email address.
  pub fn recipient(&self) -> String {
    match self {
      Self::Notification(n) => n.recipient_id.to_string(),
      Self::Message(m) => m.recipient_id.to_string(),
      Self::Email(e) => e.to.clone(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
  pub outbox_id:       Uuid,
  pub event:           NotificationKind,
  pub delivery:        Delivery,
  pub status:          OutboxStatus,
  pub attempts:        u32,
  /// Earliest moment a dispatcher may claim the entry. Claiming pushes it
  /// forward by the lease so no two dispatchers deliver the same entry.
  pub next_attempt_at: DateTime<Utc>,
  pub last_error:      Option<String>,
  pub created_at:      DateTime<Utc>,
  pub delivered_at:    Option<DateTime<Utc>>,
}

impl OutboxEntry {
  /// A fresh entry, due immediately.
  pub fn new(event: NotificationKind, delivery: Delivery, now: DateTime<Utc>) -> Self {
    Self {
      outbox_id: Uuid::new_v4(),
      event,
      delivery,
      status: OutboxStatus::Pending,
      attempts: 0,
      next_attempt_at: now,
      last_error: None,
      created_at: now,
      delivered_at: None,
    }
  }
}

/// The outcome of a failed attempt, recorded by
/// [`crate::store::SponsorshipStore::record_outbox_failure`].
#[derive(Debug, Clone)]
pub struct AttemptFailure {
  pub error:           String,
  /// `None` marks the entry dead.
  pub next_attempt_at: Option<DateTime<Utc>>,
}

// ─── Retry policy ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RetryPolicy {
  pub max_attempts:    u32,
  pub initial_backoff: Duration,
  pub max_backoff:     Duration,
  /// How long a claimed entry is hidden from other dispatchers.
  pub lease:           Duration,
  /// Upper bound on entries claimed per drain.
  pub batch_size:      usize,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts:    5,
      initial_backoff: Duration::from_secs(30),
      max_backoff:     Duration::from_secs(3600),
      lease:           Duration::from_secs(60),
      batch_size:      50,
    }
  }
}

impl RetryPolicy {
  /// Delay before the next attempt after `attempts` failures:
  /// `initial * 2^(attempts - 1)`, capped at `max_backoff`.
  pub fn backoff(&self, attempts: u32) -> Duration {
    let exp = attempts.saturating_sub(1).min(31);
    self
      .initial_backoff
      .checked_mul(1u32 << exp)
      .map_or(self.max_backoff, |d| d.min(self.max_backoff))
  }

  /// What to record after the `attempts`-th failed attempt.
  pub fn after_failure(
    &self,
    attempts: u32,
    error: String,
    now: DateTime<Utc>,
  ) -> AttemptFailure {
    let next_attempt_at = (attempts < self.max_attempts).then(|| {
      let delay = chrono::Duration::from_std(self.backoff(attempts))
        .unwrap_or(chrono::Duration::MAX);
      now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC)
    });
    AttemptFailure { error, next_attempt_at }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn backoff_doubles_and_caps() {
    let policy = RetryPolicy {
      initial_backoff: Duration::from_secs(1),
      max_backoff: Duration::from_secs(5),
      ..RetryPolicy::default()
    };
    assert_eq!(policy.backoff(1), Duration::from_secs(1));
    assert_eq!(policy.backoff(2), Duration::from_secs(2));
    assert_eq!(policy.backoff(3), Duration::from_secs(4));
    assert_eq!(policy.backoff(4), Duration::from_secs(5));
    assert_eq!(policy.backoff(40), Duration::from_secs(5));
  }

  #[test]
  fn last_attempt_marks_dead() {
    let policy = RetryPolicy { max_attempts: 2, ..RetryPolicy::default() };
    let now = Utc::now();
    assert!(policy.after_failure(1, "x".into(), now).next_attempt_at.is_some());
    assert!(policy.after_failure(2, "x".into(), now).next_attempt_at.is_none());
  }

  #[test]
  fn delivery_serializes_with_channel_tag() {
    let d = Delivery::Email(OutboundEmail {
      to:        "a@b.org".into(),
      subject:   "s".into(),
      html_body: "<p>b</p>".into(),
    });
    let json = serde_json::to_value(&d).unwrap();
    assert_eq!(json["channel"], "email");
    assert_eq!(json["payload"]["to"], "a@b.org");
  }
}
