//! [`LifecycleEngine`]: the sole authority over the sponsorship ledger.
//!
//! Each operation runs its transition from [`crate::lifecycle`] inside one
//! store transaction, then hands the committed outbox entries to the
//! [`Dispatcher`]. Delivery problems come back as warnings on the
//! [`Outcome`], never as errors.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::{
  Result,
  dispatch::{Dispatcher, NotificationDeliveryFailure},
  lifecycle::{self, Approval, Committed, Transfer},
  mail::Mailer,
  outbox::RetryPolicy,
  request::{ChildAssignmentRequest, SponsorshipRequest},
  sponsorship::Sponsorship,
  store::{LedgerTx, SponsorshipStore},
};

/// A committed lifecycle change and any notification problems it caused.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
  pub value:    T,
  pub warnings: Vec<NotificationDeliveryFailure>,
}

impl<T> Outcome<T> {
  /// `true` when every notification was delivered.
  pub fn is_clean(&self) -> bool { self.warnings.is_empty() }
}

pub struct LifecycleEngine<S, M> {
  store:      Arc<S>,
  dispatcher: Dispatcher<S, M>,
}

impl<S, M> LifecycleEngine<S, M>
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  pub fn new(store: Arc<S>, mailer: Arc<M>, policy: RetryPolicy) -> Self {
    let dispatcher = Dispatcher::new(Arc::clone(&store), mailer, policy);
    Self { store, dispatcher }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn dispatcher(&self) -> &Dispatcher<S, M> { &self.dispatcher }

  pub async fn approve_sponsorship_request(
    &self,
    request_id: Uuid,
    reviewer_id: Uuid,
    child_override: Option<Uuid>,
  ) -> Result<Outcome<Approval<SponsorshipRequest>>> {
    let now = Utc::now();
    let outcome = self
      .commit(move |tx| {
        lifecycle::approve_sponsorship_request(tx, request_id, reviewer_id, child_override, now)
      })
      .await?;
    let a = &outcome.value;
    info!(
      %request_id,
      %reviewer_id,
      child_id = %a.sponsorship.child_id,
      sponsor_id = %a.sponsor.sponsor_id,
      sponsorship_id = %a.sponsorship.sponsorship_id,
      account_created = a.account_created,
      "sponsorship request approved"
    );
    Ok(outcome)
  }

  pub async fn reject_sponsorship_request(
    &self,
    request_id: Uuid,
    reviewer_id: Uuid,
  ) -> Result<Outcome<SponsorshipRequest>> {
    let now = Utc::now();
    let outcome = self
      .commit(move |tx| lifecycle::reject_sponsorship_request(tx, request_id, reviewer_id, now))
      .await?;
    info!(%request_id, %reviewer_id, "sponsorship request rejected");
    Ok(outcome)
  }

  pub async fn approve_child_assignment_request(
    &self,
    request_id: Uuid,
    reviewer_id: Uuid,
  ) -> Result<Outcome<Approval<ChildAssignmentRequest>>> {
    let now = Utc::now();
    let outcome = self
      .commit(move |tx| lifecycle::approve_assignment_request(tx, request_id, reviewer_id, now))
      .await?;
    info!(
      %request_id,
      %reviewer_id,
      child_id = %outcome.value.sponsorship.child_id,
      sponsor_id = %outcome.value.sponsor.sponsor_id,
      "assignment request approved"
    );
    Ok(outcome)
  }

  pub async fn reject_child_assignment_request(
    &self,
    request_id: Uuid,
    reviewer_id: Uuid,
  ) -> Result<Outcome<ChildAssignmentRequest>> {
    let now = Utc::now();
    let outcome = self
      .commit(move |tx| lifecycle::reject_assignment_request(tx, request_id, reviewer_id, now))
      .await?;
    info!(%request_id, %reviewer_id, "assignment request rejected");
    Ok(outcome)
  }

  pub async fn create_association(
    &self,
    child_id: Uuid,
    sponsor_id: Uuid,
    actor_id: Uuid,
  ) -> Result<Outcome<Sponsorship>> {
    let now = Utc::now();
    let outcome = self
      .commit(move |tx| lifecycle::create_association(tx, child_id, sponsor_id, actor_id, now))
      .await?;
    info!(
      %child_id,
      %sponsor_id,
      %actor_id,
      sponsorship_id = %outcome.value.sponsorship_id,
      "association created"
    );
    Ok(outcome)
  }

  pub async fn transfer_child(
    &self,
    child_id: Uuid,
    from_sponsor_id: Uuid,
    to_sponsor_id: Uuid,
    actor_id: Uuid,
  ) -> Result<Outcome<Transfer>> {
    let now = Utc::now();
    let outcome = self
      .commit(move |tx| {
        lifecycle::transfer_child(tx, child_id, from_sponsor_id, to_sponsor_id, actor_id, now)
      })
      .await?;
    info!(
      %child_id,
      from = %from_sponsor_id,
      to = %to_sponsor_id,
      %actor_id,
      "child transferred"
    );
    Ok(outcome)
  }

  pub async fn terminate_sponsorship(
    &self,
    sponsorship_id: Uuid,
    reason: String,
    termination_date: NaiveDate,
    performed_by: Uuid,
  ) -> Result<Outcome<Sponsorship>> {
    let now = Utc::now();
    let outcome = self
      .commit(move |tx| {
        lifecycle::terminate_sponsorship(tx, sponsorship_id, &reason, termination_date, performed_by, now)
      })
      .await?;
    info!(
      %sponsorship_id,
      child_id = %outcome.value.child_id,
      %termination_date,
      %performed_by,
      "sponsorship terminated"
    );
    Ok(outcome)
  }

  /// Commit `transition`, then deliver what it wrote to the outbox.
  async fn commit<T, F>(&self, transition: F) -> Result<Outcome<T>>
  where
    F: FnOnce(&mut dyn LedgerTx) -> Result<Committed<T>> + Send + 'static,
    T: Send + 'static,
  {
    let committed = self.store.transact(transition).await?;
    let warnings = self.dispatcher.deliver(committed.outbox).await;
    Ok(Outcome { value: committed.value, warnings })
  }
}
