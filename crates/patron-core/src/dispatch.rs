//! Outbox dispatcher: performs planned deliveries after commit.
//!
//! Every entry is delivered on its own task, so one recipient's failure never
//! blocks another's. Failures are recorded for retry with backoff and
//! reported back as [`NotificationDeliveryFailure`] warnings; they never touch
//! the lifecycle change that produced them.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Result,
  mail::Mailer,
  notification::NotificationKind,
  outbox::{Delivery, OutboxEntry, RetryPolicy},
  store::SponsorshipStore,
};

/// A soft failure: the lifecycle change is committed, but this artifact was
/// not delivered (yet).
#[derive(Debug, Clone, Serialize)]
pub struct NotificationDeliveryFailure {
  pub outbox_id:  Uuid,
  pub event:      NotificationKind,
  pub channel:    &'static str,
  pub recipient:  String,
  pub error:      String,
  /// `false` once the retry policy is exhausted.
  pub will_retry: bool,
}

/// Counts from one [`Dispatcher::drain_due`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
  pub attempted: usize,
  pub failed:    usize,
}

pub struct Dispatcher<S, M> {
  store:  Arc<S>,
  mailer: Arc<M>,
  policy: Arc<RetryPolicy>,
}

impl<S, M> Clone for Dispatcher<S, M> {
  fn clone(&self) -> Self {
    Self {
      store:  Arc::clone(&self.store),
      mailer: Arc::clone(&self.mailer),
      policy: Arc::clone(&self.policy),
    }
  }
}

impl<S, M> Dispatcher<S, M>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  pub fn new(store: Arc<S>, mailer: Arc<M>, policy: RetryPolicy) -> Self {
    Self { store, mailer, policy: Arc::new(policy) }
  }

  pub fn policy(&self) -> &RetryPolicy { &self.policy }

  /// Deliver the given entries now, if no other dispatcher holds them.
  pub async fn deliver(&self, outbox_ids: Vec<Uuid>) -> Vec<NotificationDeliveryFailure> {
    if outbox_ids.is_empty() {
      return Vec::new();
    }
    let now = Utc::now();
    match self.store.claim_outbox(outbox_ids, now, self.lease_until(now)).await {
      Ok(entries) => self.attempt_all(entries).await,
      Err(e) => {
        warn!(error = %e, "could not claim outbox entries; leaving them for the background dispatcher");
        Vec::new()
      }
    }
  }

  /// Claim and deliver one batch of due entries.
  pub async fn drain_due(&self) -> Result<DrainReport> {
    let now = Utc::now();
    let entries = self
      .store
      .claim_due_outbox(now, self.lease_until(now), self.policy.batch_size)
      .await?;
    let attempted = entries.len();
    let failed = self.attempt_all(entries).await.len();
    Ok(DrainReport { attempted, failed })
  }

  /// Drain due entries every `poll_interval`, forever.
  pub async fn run(self, poll_interval: Duration) {
    let mut ticker = tokio::time::interval(poll_interval);
    loop {
      ticker.tick().await;
      match self.drain_due().await {
        Ok(report) if report.attempted > 0 => {
          info!(attempted = report.attempted, failed = report.failed, "outbox drained");
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "outbox drain failed"),
      }
    }
  }

  fn lease_until(&self, now: DateTime<Utc>) -> DateTime<Utc> {
    let lease = chrono::Duration::from_std(self.policy.lease).unwrap_or(chrono::Duration::MAX);
    now.checked_add_signed(lease).unwrap_or(DateTime::<Utc>::MAX_UTC)
  }

  async fn attempt_all(&self, entries: Vec<OutboxEntry>) -> Vec<NotificationDeliveryFailure> {
    let mut tasks = JoinSet::new();
    for entry in entries {
      let this = self.clone();
      tasks.spawn(async move { this.attempt(entry).await });
    }

    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
      match joined {
        Ok(Some(failure)) => failures.push(failure),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "delivery task aborted"),
      }
    }
    failures
  }

  async fn attempt(&self, entry: OutboxEntry) -> Option<NotificationDeliveryFailure> {
    let now = Utc::now();
    let result = match &entry.delivery {
      Delivery::Notification(n) => self
        .store
        .insert_notification(entry.outbox_id, n.clone(), now)
        .await
        .map_err(|e| e.to_string()),
      Delivery::Message(m) => self
        .store
        .insert_message(entry.outbox_id, m.clone(), now)
        .await
        .map_err(|e| e.to_string()),
      Delivery::Email(email) => self.mailer.send(email).await.map_err(|e| e.to_string()),
    };

    match result {
      Ok(()) => {
        debug!(outbox_id = %entry.outbox_id, channel = entry.delivery.channel(), "delivered");
        if let Err(e) = self.store.mark_outbox_delivered(entry.outbox_id, now).await {
          warn!(outbox_id = %entry.outbox_id, error = %e, "delivered but could not mark outbox entry");
        }
        None
      }
      Err(error) => {
        let attempts = entry.attempts + 1;
        let failure = self.policy.after_failure(attempts, error.clone(), now);
        let will_retry = failure.next_attempt_at.is_some();
        warn!(
          outbox_id = %entry.outbox_id,
          event = %entry.event,
          channel = entry.delivery.channel(),
          recipient = %entry.delivery.recipient(),
          attempts,
          will_retry,
          error = %error,
          "notification delivery failed"
        );
        if let Err(e) = self.store.record_outbox_failure(entry.outbox_id, failure).await {
          warn!(outbox_id = %entry.outbox_id, error = %e, "could not record delivery failure");
        }
        Some(NotificationDeliveryFailure {
          outbox_id: entry.outbox_id,
          event: entry.event,
          channel: entry.delivery.channel(),
          recipient: entry.delivery.recipient(),
          error,
          will_retry,
        })
      }
    }
  }
}
