//! [`SqliteStore`]: the SQLite implementation of [`SponsorshipStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use patron_core::{
  audit::AuditEntry,
  child::{Child, ChildView, NewChild},
  error::Entity,
  notification::{Message, NewMessage, NewNotification, Notification},
  outbox::{AttemptFailure, OutboxEntry, OutboxStatus},
  request::{
    ChildAssignmentRequest, NewChildAssignmentRequest, NewSponsorshipRequest,
    RequestStatus, SponsorshipRequest,
  },
  sponsor::{NewSponsor, Role, Sponsor},
  sponsorship::{Sponsorship, SponsorshipQuery},
  store::{LedgerTx, SponsorshipStore},
};
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use crate::{Error, Result, queries, schema::SCHEMA, tx::SqliteTx};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Patron store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Every call
/// runs on the connection's dedicated thread, so transactions never
/// interleave.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the connection thread outside an explicit transaction.
  async fn read<T, F>(&self, f: F) -> patron_core::Result<T>
  where
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    let out = self.conn.call(move |conn| Ok(f(conn))).await.map_err(Error::from)?;
    Ok(out?)
  }

  /// Run `f` inside `BEGIN IMMEDIATE`; `Err` rolls back.
  async fn write<T, F>(&self, f: F) -> patron_core::Result<T>
  where
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    let out = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx);
        if out.is_ok() {
          tx.commit()?;
        }
        Ok(out)
      })
      .await
      .map_err(Error::from)?;
    Ok(out?)
  }
}

// ─── SponsorshipStore impl ───────────────────────────────────────────────────

impl SponsorshipStore for SqliteStore {
  async fn transact<F, T>(&self, f: F) -> patron_core::Result<T>
  where
    F: FnOnce(&mut dyn LedgerTx) -> patron_core::Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&mut SqliteTx { conn: &tx });
        // Dropping an uncommitted transaction rolls it back.
        if out.is_ok() {
          tx.commit()?;
        }
        Ok(out)
      })
      .await
      .map_err(Error::from)?
  }

  // ── Children ──────────────────────────────────────────────────────────

  async fn add_child(&self, input: NewChild) -> patron_core::Result<Child> {
    let child = input.into_child(Utc::now())?;
    let row = child.clone();
    self.write(move |conn| queries::insert_child(conn, &row)).await?;
    Ok(child)
  }

  async fn get_child(&self, child_id: Uuid) -> patron_core::Result<Option<Child>> {
    self.read(move |conn| queries::child_by_id(conn, child_id)).await
  }

  async fn list_children(&self, sponsored: Option<bool>) -> patron_core::Result<Vec<Child>> {
    self.read(move |conn| queries::list_children(conn, sponsored)).await
  }

  async fn materialize_child(&self, child_id: Uuid) -> patron_core::Result<Option<ChildView>> {
    self
      .read(move |conn| {
        let Some(child) = queries::child_by_id(conn, child_id)? else {
          return Ok(None);
        };
        let history = queries::sponsorship_history(conn, child_id)?;
        let active = history.iter().find(|s| s.is_active()).cloned();
        Ok(Some(ChildView { child, active, history }))
      })
      .await
  }

  async fn audit_trail(&self, child_id: Uuid) -> patron_core::Result<Vec<AuditEntry>> {
    self.read(move |conn| queries::audit_for_child(conn, child_id)).await
  }

  // ── Sponsors ──────────────────────────────────────────────────────────

  async fn add_sponsor(&self, input: NewSponsor) -> patron_core::Result<Sponsor> {
    let sponsor = input.into_sponsor(Utc::now())?;
    let row = sponsor.clone();
    self.write(move |conn| queries::insert_sponsor(conn, &row)).await?;
    Ok(sponsor)
  }

  async fn get_sponsor(&self, sponsor_id: Uuid) -> patron_core::Result<Option<Sponsor>> {
    self.read(move |conn| queries::sponsor_by_id(conn, sponsor_id)).await
  }

  async fn list_sponsors(&self, role: Option<Role>) -> patron_core::Result<Vec<Sponsor>> {
    self.read(move |conn| queries::list_sponsors(conn, role)).await
  }

  // ── Requests ──────────────────────────────────────────────────────────

  async fn submit_sponsorship_request(
    &self,
    input: NewSponsorshipRequest,
  ) -> patron_core::Result<SponsorshipRequest> {
    let request = input.into_request(Utc::now())?;
    let row = request.clone();
    self
      .write(move |conn| {
        if let Some(child_id) = row.child_id {
          require_child(conn, child_id)?;
        }
        queries::insert_sponsorship_request(conn, &row)
      })
      .await?;
    Ok(request)
  }

  async fn get_sponsorship_request(
    &self,
    request_id: Uuid,
  ) -> patron_core::Result<Option<SponsorshipRequest>> {
    self.read(move |conn| queries::sponsorship_request_by_id(conn, request_id)).await
  }

  async fn list_sponsorship_requests(
    &self,
    status: Option<RequestStatus>,
  ) -> patron_core::Result<Vec<SponsorshipRequest>> {
    self.read(move |conn| queries::list_sponsorship_requests(conn, status)).await
  }

  async fn submit_assignment_request(
    &self,
    input: NewChildAssignmentRequest,
  ) -> patron_core::Result<ChildAssignmentRequest> {
    let request = input.into_request(Utc::now())?;
    let row = request.clone();
    self
      .write(move |conn| {
        require_child(conn, row.child_id)?;
        queries::insert_assignment_request(conn, &row)
      })
      .await?;
    Ok(request)
  }

  async fn get_assignment_request(
    &self,
    request_id: Uuid,
  ) -> patron_core::Result<Option<ChildAssignmentRequest>> {
    self.read(move |conn| queries::assignment_request_by_id(conn, request_id)).await
  }

  async fn list_assignment_requests(
    &self,
    status: Option<RequestStatus>,
  ) -> patron_core::Result<Vec<ChildAssignmentRequest>> {
    self.read(move |conn| queries::list_assignment_requests(conn, status)).await
  }

  // ── Ledger reads ──────────────────────────────────────────────────────

  async fn get_sponsorship(
    &self,
    sponsorship_id: Uuid,
  ) -> patron_core::Result<Option<Sponsorship>> {
    self.read(move |conn| queries::sponsorship_by_id(conn, sponsorship_id)).await
  }

  async fn list_sponsorships<'a>(
    &'a self,
    query: &'a SponsorshipQuery,
  ) -> patron_core::Result<Vec<Sponsorship>> {
    let query = query.clone();
    self.read(move |conn| queries::list_sponsorships(conn, &query)).await
  }

  // ── Notifications & messages ──────────────────────────────────────────

  async fn insert_notification(
    &self,
    notification_id: Uuid,
    input: NewNotification,
    at: DateTime<Utc>,
  ) -> patron_core::Result<()> {
    self
      .write(move |conn| queries::insert_notification(conn, notification_id, &input, at))
      .await
  }

  async fn list_notifications(
    &self,
    recipient_id: Uuid,
    unread_only: bool,
  ) -> patron_core::Result<Vec<Notification>> {
    self
      .read(move |conn| queries::list_notifications(conn, recipient_id, unread_only))
      .await
  }

  async fn set_notification_read(
    &self,
    notification_id: Uuid,
    recipient_id: Uuid,
    is_read: bool,
  ) -> patron_core::Result<()> {
    self
      .write(move |conn| {
        queries::set_notification_read(conn, notification_id, recipient_id, is_read)
      })
      .await
  }

  async fn delete_notification(
    &self,
    notification_id: Uuid,
    recipient_id: Uuid,
  ) -> patron_core::Result<()> {
    self
      .write(move |conn| queries::delete_notification(conn, notification_id, recipient_id))
      .await
  }

  async fn insert_message(
    &self,
    message_id: Uuid,
    input: NewMessage,
    at: DateTime<Utc>,
  ) -> patron_core::Result<()> {
    self.write(move |conn| queries::insert_message(conn, message_id, &input, at)).await
  }

  async fn list_messages(&self, recipient_id: Uuid) -> patron_core::Result<Vec<Message>> {
    self.read(move |conn| queries::list_messages(conn, recipient_id)).await
  }

  async fn mark_message_read(
    &self,
    message_id: Uuid,
    recipient_id: Uuid,
  ) -> patron_core::Result<()> {
    self
      .write(move |conn| queries::mark_message_read(conn, message_id, recipient_id))
      .await
  }

  // ── Outbox ────────────────────────────────────────────────────────────

  async fn claim_outbox(
    &self,
    outbox_ids: Vec<Uuid>,
    now: DateTime<Utc>,
    lease_until: DateTime<Utc>,
  ) -> patron_core::Result<Vec<OutboxEntry>> {
    self
      .write(move |conn| queries::claim_outbox(conn, &outbox_ids, now, lease_until))
      .await
  }

  async fn claim_due_outbox(
    &self,
    now: DateTime<Utc>,
    lease_until: DateTime<Utc>,
    limit: usize,
  ) -> patron_core::Result<Vec<OutboxEntry>> {
    self
      .write(move |conn| {
        let ids = queries::due_outbox_ids(conn, now, limit)?;
        queries::claim_outbox(conn, &ids, now, lease_until)
      })
      .await
  }

  async fn mark_outbox_delivered(
    &self,
    outbox_id: Uuid,
    at: DateTime<Utc>,
  ) -> patron_core::Result<()> {
    self.write(move |conn| queries::mark_outbox_delivered(conn, outbox_id, at)).await
  }

  async fn record_outbox_failure(
    &self,
    outbox_id: Uuid,
    failure: AttemptFailure,
  ) -> patron_core::Result<()> {
    self
      .write(move |conn| queries::record_outbox_failure(conn, outbox_id, &failure))
      .await
  }

  async fn list_outbox(
    &self,
    status: Option<OutboxStatus>,
  ) -> patron_core::Result<Vec<OutboxEntry>> {
    self.read(move |conn| queries::list_outbox(conn, status)).await
  }
}

fn require_child(conn: &Connection, child_id: Uuid) -> Result<()> {
  match queries::child_by_id(conn, child_id)? {
    Some(_) => Ok(()),
    None => Err(patron_core::Error::not_found(Entity::Child, child_id).into()),
  }
}
