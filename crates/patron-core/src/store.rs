//! The storage seams: [`LedgerTx`] for work inside one transaction, and the
//! [`SponsorshipStore`] trait for everything else.
//!
//! The traits are implemented by storage backends (e.g.
//! `patron-store-sqlite`). The lifecycle engine and the HTTP layer depend on
//! this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Result,
  audit::AuditEntry,
  child::{Child, ChildView, NewChild, SponsorshipSummary},
  notification::{Message, NewMessage, NewNotification, Notification},
  outbox::{AttemptFailure, OutboxEntry, OutboxStatus},
  request::{
    ChildAssignmentRequest, NewChildAssignmentRequest, NewSponsorshipRequest,
    RequestStatus, Review, SponsorshipRequest,
  },
  sponsor::{NewSponsor, Role, Sponsor},
  sponsorship::{Ending, Sponsorship, SponsorshipQuery},
};

// ─── Transaction ─────────────────────────────────────────────────────────────

/// Reads and writes available to a lifecycle transition.
///
/// Every call made through one `&mut dyn LedgerTx` belongs to the same
/// transaction: it commits only if the closure passed to
/// [`SponsorshipStore::transact`] returns `Ok`.
pub trait LedgerTx {
  // ── Children ──────────────────────────────────────────────────────────

  fn get_child(&mut self, child_id: Uuid) -> Result<Option<Child>>;

  /// Overwrite the denormalised sponsorship fields of a child.
  fn set_child_sponsorship(
    &mut self,
    child_id: Uuid,
    summary: &SponsorshipSummary,
    at: DateTime<Utc>,
  ) -> Result<()>;

  // ── Sponsors ──────────────────────────────────────────────────────────

  fn get_sponsor(&mut self, sponsor_id: Uuid) -> Result<Option<Sponsor>>;

  /// Look up an account by its normalised email.
  fn find_sponsor_by_email(&mut self, email: &str) -> Result<Option<Sponsor>>;

  fn insert_sponsor(&mut self, sponsor: &Sponsor) -> Result<()>;

  /// All assistants and admins.
  fn list_staff(&mut self) -> Result<Vec<Sponsor>>;

  // ── Ledger ────────────────────────────────────────────────────────────

  fn get_sponsorship(&mut self, sponsorship_id: Uuid) -> Result<Option<Sponsorship>>;

  /// Every row for `child_id` with status `active`.
  fn active_sponsorships(&mut self, child_id: Uuid) -> Result<Vec<Sponsorship>>;

  /// Append a ledger row. Inserting a second active row for a child fails
  /// with [`crate::Error::ConflictNeedsTransfer`].
  fn insert_sponsorship(&mut self, sponsorship: &Sponsorship) -> Result<()>;

  /// End an active row. Returns `false` (and writes nothing) if the row is
  /// no longer active.
  fn end_sponsorship(&mut self, sponsorship_id: Uuid, ending: &Ending) -> Result<bool>;

  // ── Requests ──────────────────────────────────────────────────────────

  fn get_sponsorship_request(
    &mut self,
    request_id: Uuid,
  ) -> Result<Option<SponsorshipRequest>>;

  /// Resolve a pending request. Returns `false` if it was not pending.
  fn resolve_sponsorship_request(
    &mut self,
    request_id: Uuid,
    review: &Review,
  ) -> Result<bool>;

  fn get_assignment_request(
    &mut self,
    request_id: Uuid,
  ) -> Result<Option<ChildAssignmentRequest>>;

  /// Resolve a pending request. Returns `false` if it was not pending.
  fn resolve_assignment_request(
    &mut self,
    request_id: Uuid,
    review: &Review,
  ) -> Result<bool>;

  // ── Side effects ──────────────────────────────────────────────────────

  fn record_audit(&mut self, entry: &AuditEntry) -> Result<()>;

  fn enqueue(&mut self, entry: &OutboxEntry) -> Result<()>;
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Abstraction over a sponsorship store backend.
///
/// Ledger, child and request mutations happen only through
/// [`SponsorshipStore::transact`]. The remaining writes are intake (new
/// children, sponsors and requests), recipient-owned notification state, and
/// outbox bookkeeping.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait SponsorshipStore: Send + Sync {
  /// Run `f` inside a single serialised transaction. `Ok` commits every
  /// write made through the [`LedgerTx`]; `Err` rolls all of them back and
  /// is returned unchanged.
  fn transact<F, T>(&self, f: F) -> impl Future<Output = Result<T>> + Send + '_
  where
    F: FnOnce(&mut dyn LedgerTx) -> Result<T> + Send + 'static,
    T: Send + 'static;

  // ── Children ──────────────────────────────────────────────────────────

  /// Staff intake. New children are always unsponsored.
  fn add_child(&self, input: NewChild) -> impl Future<Output = Result<Child>> + Send + '_;

  fn get_child(
    &self,
    child_id: Uuid,
  ) -> impl Future<Output = Result<Option<Child>>> + Send + '_;

  /// List children, optionally filtered by their sponsorship flag.
  fn list_children(
    &self,
    sponsored: Option<bool>,
  ) -> impl Future<Output = Result<Vec<Child>>> + Send + '_;

  /// Materialise a [`ChildView`]. Returns `None` if the child does not exist.
  fn materialize_child(
    &self,
    child_id: Uuid,
  ) -> impl Future<Output = Result<Option<ChildView>>> + Send + '_;

  /// Audit entries for a child, oldest first.
  fn audit_trail(
    &self,
    child_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AuditEntry>>> + Send + '_;

  // ── Sponsors ──────────────────────────────────────────────────────────

  /// Create an account directly. Fails with a validation error if the email
  /// is already taken.
  fn add_sponsor(&self, input: NewSponsor) -> impl Future<Output = Result<Sponsor>> + Send + '_;

  fn get_sponsor(
    &self,
    sponsor_id: Uuid,
  ) -> impl Future<Output = Result<Option<Sponsor>>> + Send + '_;

  fn list_sponsors(
    &self,
    role: Option<Role>,
  ) -> impl Future<Output = Result<Vec<Sponsor>>> + Send + '_;

  // ── Requests ──────────────────────────────────────────────────────────

  fn submit_sponsorship_request(
    &self,
    input: NewSponsorshipRequest,
  ) -> impl Future<Output = Result<SponsorshipRequest>> + Send + '_;

  fn get_sponsorship_request(
    &self,
    request_id: Uuid,
  ) -> impl Future<Output = Result<Option<SponsorshipRequest>>> + Send + '_;

  fn list_sponsorship_requests(
    &self,
    status: Option<RequestStatus>,
  ) -> impl Future<Output = Result<Vec<SponsorshipRequest>>> + Send + '_;

  fn submit_assignment_request(
    &self,
    input: NewChildAssignmentRequest,
  ) -> impl Future<Output = Result<ChildAssignmentRequest>> + Send + '_;

  fn get_assignment_request(
    &self,
    request_id: Uuid,
  ) -> impl Future<Output = Result<Option<ChildAssignmentRequest>>> + Send + '_;

  fn list_assignment_requests(
    &self,
    status: Option<RequestStatus>,
  ) -> impl Future<Output = Result<Vec<ChildAssignmentRequest>>> + Send + '_;

  // ── Ledger reads ──────────────────────────────────────────────────────

  fn get_sponsorship(
    &self,
    sponsorship_id: Uuid,
  ) -> impl Future<Output = Result<Option<Sponsorship>>> + Send + '_;

  fn list_sponsorships<'a>(
    &'a self,
    query: &'a SponsorshipQuery,
  ) -> impl Future<Output = Result<Vec<Sponsorship>>> + Send + 'a;

  // ── Notifications & messages ──────────────────────────────────────────

  /// Insert a notification with a caller-chosen id. Inserting an id that
  /// already exists is a no-op, so redelivery never duplicates.
  fn insert_notification(
    &self,
    notification_id: Uuid,
    input: NewNotification,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Newest first.
  fn list_notifications(
    &self,
    recipient_id: Uuid,
    unread_only: bool,
  ) -> impl Future<Output = Result<Vec<Notification>>> + Send + '_;

  /// Fails with `NotFound` unless the notification belongs to `recipient_id`.
  fn set_notification_read(
    &self,
    notification_id: Uuid,
    recipient_id: Uuid,
    is_read: bool,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Fails with `NotFound` unless the notification belongs to `recipient_id`.
  fn delete_notification(
    &self,
    notification_id: Uuid,
    recipient_id: Uuid,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Same idempotency as [`SponsorshipStore::insert_notification`].
  fn insert_message(
    &self,
    message_id: Uuid,
    input: NewMessage,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Newest first.
  fn list_messages(
    &self,
    recipient_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Message>>> + Send + '_;

  fn mark_message_read(
    &self,
    message_id: Uuid,
    recipient_id: Uuid,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  // ── Outbox ────────────────────────────────────────────────────────────

  /// Claim the given entries if they are pending and due at `now`, pushing
  /// their `next_attempt_at` to `lease_until`. Entries claimed elsewhere are
  /// silently skipped.
  fn claim_outbox(
    &self,
    outbox_ids: Vec<Uuid>,
    now: DateTime<Utc>,
    lease_until: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<OutboxEntry>>> + Send + '_;

  /// Claim up to `limit` pending entries that are due at `now`, oldest first.
  fn claim_due_outbox(
    &self,
    now: DateTime<Utc>,
    lease_until: DateTime<Utc>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<OutboxEntry>>> + Send + '_;

  fn mark_outbox_delivered(
    &self,
    outbox_id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Count a failed attempt; a failure without `next_attempt_at` marks the
  /// entry dead.
  fn record_outbox_failure(
    &self,
    outbox_id: Uuid,
    failure: AttemptFailure,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  fn list_outbox(
    &self,
    status: Option<OutboxStatus>,
  ) -> impl Future<Output = Result<Vec<OutboxEntry>>> + Send + '_;
}
