//! Lifecycle transitions.
//!
//! Each function here runs inside one store transaction and performs the full
//! write set of a transition: ledger rows, the child's denormalised fields,
//! request status, audit entries and outbox deliveries. Returning `Err` from
//! any of them rolls every write back.
//!
//! Child-level states are derived from the ledger: a child is unsponsored
//! with zero active rows and sponsored with exactly one. There is no pending
//! state on the child or the ledger; pendingness lives on requests only.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
  Error, Result,
  audit::diff_summary,
  child::{Child, SponsorshipSummary},
  conflict::{Resolution, resolve},
  error::Entity,
  fanout::{self, LifecycleEvent},
  outbox::OutboxEntry,
  request::{ChildAssignmentRequest, RequestStatus, Review, SponsorshipRequest},
  sponsor::{Role, Sponsor, normalize_email},
  sponsorship::{Ending, Sponsorship, SponsorshipStatus, SponsorshipType},
  store::LedgerTx,
};

/// The value of a committed transition plus the outbox entries it wrote.
#[derive(Debug)]
pub struct Committed<T> {
  pub value:  T,
  pub outbox: Vec<Uuid>,
}

/// Result of approving a sponsorship or assignment request.
#[derive(Debug, Clone, Serialize)]
pub struct Approval<R> {
  pub request:         R,
  pub sponsorship:     Sponsorship,
  pub sponsor:         Sponsor,
  /// Whether the sponsor account was created by this approval.
  pub account_created: bool,
}

/// Result of a transfer.
#[derive(Debug, Clone, Serialize)]
pub struct Transfer {
  pub ended:   Sponsorship,
  pub started: Sponsorship,
  pub child:   Child,
}

// ─── Request approval ────────────────────────────────────────────────────────

/// Approve a pending sponsorship request.
///
/// `child_override` supplies the child for "let us choose" requests; it is
/// ignored when the request names a child.
pub fn approve_sponsorship_request(
  tx: &mut dyn LedgerTx,
  request_id: Uuid,
  reviewer_id: Uuid,
  child_override: Option<Uuid>,
  now: DateTime<Utc>,
) -> Result<Committed<Approval<SponsorshipRequest>>> {
  let reviewer = authorize(tx, reviewer_id)?;
  let mut request = tx
    .get_sponsorship_request(request_id)?
    .ok_or_else(|| Error::not_found(Entity::SponsorshipRequest, request_id))?;
  ensure_pending(request_id, request.status)?;

  let child_id = request.child_id.or(child_override).ok_or_else(|| {
    Error::Validation("request does not name a child; choose one to approve".into())
  })?;
  let child = claim_vacant(tx, child_id)?;

  let (sponsor, account_created) = find_or_create_sponsor(
    tx,
    &request.full_name,
    &request.email,
    request.phone.clone(),
    now,
  )?;
  let sponsorship =
    open_sponsorship(tx, child_id, &sponsor, request.sponsorship_type, now)?;
  let child = sync_child(tx, &child, SponsorshipSummary::sponsored_by(&sponsor), reviewer_id, now)?;

  let review = Review {
    status:      RequestStatus::Approved,
    reviewed_by: reviewer_id,
    reviewed_at: now,
  };
  if !tx.resolve_sponsorship_request(request_id, &review)? {
    return Err(Error::AlreadyResolved { request_id, status: RequestStatus::Approved });
  }
  request.child_id = Some(child_id);
  request.status = RequestStatus::Approved;
  request.reviewed_by = Some(reviewer_id);
  request.reviewed_at = Some(now);
  request.updated_at = now;

  let event = LifecycleEvent::SponsorshipApproved {
    child,
    sponsor: sponsor.clone(),
    account_created,
  };
  let outbox = emit(tx, &event, &reviewer, now)?;

  Ok(Committed {
    value: Approval { request, sponsorship, sponsor, account_created },
    outbox,
  })
}

pub fn reject_sponsorship_request(
  tx: &mut dyn LedgerTx,
  request_id: Uuid,
  reviewer_id: Uuid,
  now: DateTime<Utc>,
) -> Result<Committed<SponsorshipRequest>> {
  let reviewer = authorize(tx, reviewer_id)?;
  let mut request = tx
    .get_sponsorship_request(request_id)?
    .ok_or_else(|| Error::not_found(Entity::SponsorshipRequest, request_id))?;
  ensure_pending(request_id, request.status)?;

  let review = Review {
    status:      RequestStatus::Rejected,
    reviewed_by: reviewer_id,
    reviewed_at: now,
  };
  if !tx.resolve_sponsorship_request(request_id, &review)? {
    return Err(Error::AlreadyResolved { request_id, status: RequestStatus::Rejected });
  }
  request.status = RequestStatus::Rejected;
  request.reviewed_by = Some(reviewer_id);
  request.reviewed_at = Some(now);
  request.updated_at = now;

  let account = tx.find_sponsor_by_email(&request.email)?;
  let event = LifecycleEvent::SponsorshipRejected { request: request.clone(), account };
  let outbox = emit(tx, &event, &reviewer, now)?;

  Ok(Committed { value: request, outbox })
}

pub fn approve_assignment_request(
  tx: &mut dyn LedgerTx,
  request_id: Uuid,
  reviewer_id: Uuid,
  now: DateTime<Utc>,
) -> Result<Committed<Approval<ChildAssignmentRequest>>> {
  let reviewer = authorize(tx, reviewer_id)?;
  let mut request = tx
    .get_assignment_request(request_id)?
    .ok_or_else(|| Error::not_found(Entity::AssignmentRequest, request_id))?;
  ensure_pending(request_id, request.status)?;

  let child = claim_vacant(tx, request.child_id)?;
  let (sponsor, account_created) =
    find_or_create_sponsor(tx, &request.name, &request.requester_email, None, now)?;
  let sponsorship = open_sponsorship(
    tx,
    request.child_id,
    &sponsor,
    SponsorshipType::LongTerm,
    now,
  )?;
  let child = sync_child(tx, &child, SponsorshipSummary::sponsored_by(&sponsor), reviewer_id, now)?;

  let review = Review {
    status:      RequestStatus::Approved,
    reviewed_by: reviewer_id,
    reviewed_at: now,
  };
  if !tx.resolve_assignment_request(request_id, &review)? {
    return Err(Error::AlreadyResolved { request_id, status: RequestStatus::Approved });
  }
  request.status = RequestStatus::Approved;
  request.reviewed_by = Some(reviewer_id);
  request.reviewed_at = Some(now);

  let event = LifecycleEvent::AssignmentApproved {
    child,
    sponsor: sponsor.clone(),
    account_created,
  };
  let outbox = emit(tx, &event, &reviewer, now)?;

  Ok(Committed {
    value: Approval { request, sponsorship, sponsor, account_created },
    outbox,
  })
}

pub fn reject_assignment_request(
  tx: &mut dyn LedgerTx,
  request_id: Uuid,
  reviewer_id: Uuid,
  now: DateTime<Utc>,
) -> Result<Committed<ChildAssignmentRequest>> {
  let reviewer = authorize(tx, reviewer_id)?;
  let mut request = tx
    .get_assignment_request(request_id)?
    .ok_or_else(|| Error::not_found(Entity::AssignmentRequest, request_id))?;
  ensure_pending(request_id, request.status)?;

  let review = Review {
    status:      RequestStatus::Rejected,
    reviewed_by: reviewer_id,
    reviewed_at: now,
  };
  if !tx.resolve_assignment_request(request_id, &review)? {
    return Err(Error::AlreadyResolved { request_id, status: RequestStatus::Rejected });
  }
  request.status = RequestStatus::Rejected;
  request.reviewed_by = Some(reviewer_id);
  request.reviewed_at = Some(now);

  let account = tx.find_sponsor_by_email(&request.requester_email)?;
  let event = LifecycleEvent::AssignmentRejected { request: request.clone(), account };
  let outbox = emit(tx, &event, &reviewer, now)?;

  Ok(Committed { value: request, outbox })
}

// ─── Direct staff actions ────────────────────────────────────────────────────

/// Link a child to an existing sponsor without a prior request.
pub fn create_association(
  tx: &mut dyn LedgerTx,
  child_id: Uuid,
  sponsor_id: Uuid,
  actor_id: Uuid,
  now: DateTime<Utc>,
) -> Result<Committed<Sponsorship>> {
  let actor = authorize(tx, actor_id)?;
  let child = claim_vacant(tx, child_id)?;
  let sponsor = tx
    .get_sponsor(sponsor_id)?
    .ok_or_else(|| Error::not_found(Entity::Sponsor, sponsor_id))?;

  let sponsorship = open_sponsorship(tx, child_id, &sponsor, SponsorshipType::LongTerm, now)?;
  let child = sync_child(tx, &child, SponsorshipSummary::sponsored_by(&sponsor), actor_id, now)?;

  let event = LifecycleEvent::SponsorshipCreated { child, sponsor };
  let outbox = emit(tx, &event, &actor, now)?;

  Ok(Committed { value: sponsorship, outbox })
}

/// End `from`'s active row for `child_id` and open one for `to`.
///
/// Fails with [`Error::StaleTransfer`] if `from` no longer holds the child;
/// the caller must refetch before retrying.
pub fn transfer_child(
  tx: &mut dyn LedgerTx,
  child_id: Uuid,
  from_sponsor_id: Uuid,
  to_sponsor_id: Uuid,
  actor_id: Uuid,
  now: DateTime<Utc>,
) -> Result<Committed<Transfer>> {
  let actor = authorize(tx, actor_id)?;
  if from_sponsor_id == to_sponsor_id {
    return Err(Error::Validation("cannot transfer a child to its current sponsor".into()));
  }
  let child = tx
    .get_child(child_id)?
    .ok_or_else(|| Error::not_found(Entity::Child, child_id))?;
  let to = tx
    .get_sponsor(to_sponsor_id)?
    .ok_or_else(|| Error::not_found(Entity::Sponsor, to_sponsor_id))?;

  let held = match resolve(child_id, tx.active_sponsorships(child_id)?)? {
    Resolution::Held(row) if row.sponsor_id == from_sponsor_id => row,
    Resolution::Held(row) => {
      warn!(%child_id, expected = %from_sponsor_id, actual = %row.sponsor_id, "stale transfer");
      return Err(Error::StaleTransfer { child_id });
    }
    Resolution::Vacant => {
      warn!(%child_id, expected = %from_sponsor_id, "stale transfer: child has no active sponsorship");
      return Err(Error::StaleTransfer { child_id });
    }
  };
  let from = tx
    .get_sponsor(from_sponsor_id)?
    .ok_or_else(|| Error::not_found(Entity::Sponsor, from_sponsor_id))?;

  let today = now.date_naive();
  let ending = Ending { end_date: today, reason: None, ended_by: actor_id, at: now };
  if !tx.end_sponsorship(held.sponsorship_id, &ending)? {
    return Err(Error::StaleTransfer { child_id });
  }
  let ended = Sponsorship {
    status: SponsorshipStatus::Ended,
    end_date: Some(today),
    ended_by: Some(actor_id),
    updated_at: now,
    ..held
  };

  let started = open_sponsorship(tx, child_id, &to, ended.kind, now)?;
  let child = sync_child(tx, &child, SponsorshipSummary::sponsored_by(&to), actor_id, now)?;

  let event = LifecycleEvent::SponsorshipTransferred { child: child.clone(), from, to };
  let outbox = emit(tx, &event, &actor, now)?;

  Ok(Committed { value: Transfer { ended, started, child }, outbox })
}

/// End an active sponsorship on `termination_date`, which may not be in the
/// past. Input is validated before anything is read or written.
pub fn terminate_sponsorship(
  tx: &mut dyn LedgerTx,
  sponsorship_id: Uuid,
  reason: &str,
  termination_date: NaiveDate,
  performed_by: Uuid,
  now: DateTime<Utc>,
) -> Result<Committed<Sponsorship>> {
  let reason = reason.trim();
  if reason.is_empty() {
    return Err(Error::Validation("a termination reason is required".into()));
  }
  let today = now.date_naive();
  if termination_date < today {
    return Err(Error::Validation(format!(
      "termination date {termination_date} is in the past"
    )));
  }

  let actor = authorize(tx, performed_by)?;
  let row = tx
    .get_sponsorship(sponsorship_id)?
    .ok_or_else(|| Error::not_found(Entity::Sponsorship, sponsorship_id))?;
  if !row.is_active() {
    return Err(Error::NotActive(sponsorship_id));
  }
  // Refuse to act on a child whose ledger is already inconsistent.
  resolve(row.child_id, tx.active_sponsorships(row.child_id)?)?;

  let child = tx
    .get_child(row.child_id)?
    .ok_or_else(|| Error::not_found(Entity::Child, row.child_id))?;
  let sponsor = tx
    .get_sponsor(row.sponsor_id)?
    .ok_or_else(|| Error::not_found(Entity::Sponsor, row.sponsor_id))?;

  let ending = Ending {
    end_date: termination_date,
    reason:   Some(reason.to_owned()),
    ended_by: performed_by,
    at:       now,
  };
  if !tx.end_sponsorship(sponsorship_id, &ending)? {
    return Err(Error::NotActive(sponsorship_id));
  }

  let summary = match resolve(row.child_id, tx.active_sponsorships(row.child_id)?)? {
    Resolution::Vacant => SponsorshipSummary::unsponsored(),
    Resolution::Held(other) => {
      let holder = tx
        .get_sponsor(other.sponsor_id)?
        .ok_or_else(|| Error::not_found(Entity::Sponsor, other.sponsor_id))?;
      SponsorshipSummary::sponsored_by(&holder)
    }
  };
  let child = sync_child(tx, &child, summary, performed_by, now)?;

  let ended = tx
    .get_sponsorship(sponsorship_id)?
    .ok_or_else(|| Error::not_found(Entity::Sponsorship, sponsorship_id))?;

  let event = LifecycleEvent::SponsorshipTerminated {
    child,
    sponsor,
    end_date: termination_date,
    reason: reason.to_owned(),
  };
  let outbox = emit(tx, &event, &actor, now)?;

  Ok(Committed { value: ended, outbox })
}

// ─── Shared steps ────────────────────────────────────────────────────────────

/// Load the actor and require a staff role.
fn authorize(tx: &mut dyn LedgerTx, actor_id: Uuid) -> Result<Sponsor> {
  match tx.get_sponsor(actor_id)? {
    Some(actor) if actor.role.is_staff() => Ok(actor),
    _ => Err(Error::Forbidden { actor_id }),
  }
}

fn ensure_pending(request_id: Uuid, status: RequestStatus) -> Result<()> {
  if status.is_pending() {
    Ok(())
  } else {
    Err(Error::AlreadyResolved { request_id, status })
  }
}

/// Load the child and require that it has no active sponsorship.
fn claim_vacant(tx: &mut dyn LedgerTx, child_id: Uuid) -> Result<Child> {
  let child = tx
    .get_child(child_id)?
    .ok_or_else(|| Error::not_found(Entity::Child, child_id))?;

  match resolve(child_id, tx.active_sponsorships(child_id)?)? {
    Resolution::Vacant => Ok(child),
    Resolution::Held(row) => {
      let current_sponsor_name = match tx.get_sponsor(row.sponsor_id)? {
        Some(s) => s.full_name,
        None => child.sponsor_name.clone().unwrap_or_default(),
      };
      Err(Error::ConflictNeedsTransfer {
        child_id,
        sponsorship_id: row.sponsorship_id,
        current_sponsor_id: row.sponsor_id,
        current_sponsor_name,
      })
    }
  }
}

fn find_or_create_sponsor(
  tx: &mut dyn LedgerTx,
  full_name: &str,
  email: &str,
  phone: Option<String>,
  now: DateTime<Utc>,
) -> Result<(Sponsor, bool)> {
  let email = normalize_email(email)?;
  if let Some(existing) = tx.find_sponsor_by_email(&email)? {
    return Ok((existing, false));
  }
  let sponsor = Sponsor {
    sponsor_id: Uuid::new_v4(),
    full_name: full_name.to_owned(),
    email,
    phone,
    role: Role::Sponsor,
    created_at: now,
  };
  tx.insert_sponsor(&sponsor)?;
  Ok((sponsor, true))
}

fn open_sponsorship(
  tx: &mut dyn LedgerTx,
  child_id: Uuid,
  sponsor: &Sponsor,
  kind: SponsorshipType,
  now: DateTime<Utc>,
) -> Result<Sponsorship> {
  let row = Sponsorship::activate(child_id, sponsor.sponsor_id, kind, now.date_naive(), now);
  tx.insert_sponsorship(&row)?;
  Ok(row)
}

/// Write the child's denormalised fields and audit every changed field.
fn sync_child(
  tx: &mut dyn LedgerTx,
  child: &Child,
  summary: SponsorshipSummary,
  performed_by: Uuid,
  now: DateTime<Utc>,
) -> Result<Child> {
  let before = child.summary();
  if before == summary {
    return Ok(child.clone());
  }
  tx.set_child_sponsorship(child.child_id, &summary, now)?;
  for entry in diff_summary(child.child_id, &before, &summary, performed_by, now) {
    tx.record_audit(&entry)?;
  }
  Ok(Child {
    is_sponsored: summary.is_sponsored,
    sponsor_id: summary.sponsor_id,
    sponsor_name: summary.sponsor_name,
    updated_at: now,
    ..child.clone()
  })
}

/// Plan the fan-out for `event` and write it to the outbox.
fn emit(
  tx: &mut dyn LedgerTx,
  event: &LifecycleEvent,
  actor: &Sponsor,
  now: DateTime<Utc>,
) -> Result<Vec<Uuid>> {
  let staff = tx.list_staff()?;
  let kind = event.kind();
  let mut ids = Vec::new();
  for delivery in fanout::plan(event, actor, &staff) {
    let entry = OutboxEntry::new(kind, delivery, now);
    tx.enqueue(&entry)?;
    ids.push(entry.outbox_id);
  }
  Ok(ids)
}
