//! [`LedgerTx`] over an open SQLite transaction.

use chrono::{DateTime, Utc};
use patron_core::{
  Result,
  audit::AuditEntry,
  child::{Child, SponsorshipSummary},
  outbox::OutboxEntry,
  request::{ChildAssignmentRequest, Review, SponsorshipRequest},
  sponsor::Sponsor,
  sponsorship::{Ending, Sponsorship},
  store::LedgerTx,
};
use rusqlite::Connection;
use uuid::Uuid;

use crate::queries;

/// Borrowed for the lifetime of one `BEGIN IMMEDIATE` transaction. The
/// caller commits or drops the transaction; this type never does.
pub(crate) struct SqliteTx<'a> {
  pub(crate) conn: &'a Connection,
}

impl LedgerTx for SqliteTx<'_> {
  fn get_child(&mut self, child_id: Uuid) -> Result<Option<Child>> {
    Ok(queries::child_by_id(self.conn, child_id)?)
  }

  fn set_child_sponsorship(
    &mut self,
    child_id: Uuid,
    summary: &SponsorshipSummary,
    at: DateTime<Utc>,
  ) -> Result<()> {
    Ok(queries::set_child_sponsorship(self.conn, child_id, summary, at)?)
  }

  fn get_sponsor(&mut self, sponsor_id: Uuid) -> Result<Option<Sponsor>> {
    Ok(queries::sponsor_by_id(self.conn, sponsor_id)?)
  }

  fn find_sponsor_by_email(&mut self, email: &str) -> Result<Option<Sponsor>> {
    Ok(queries::sponsor_by_email(self.conn, email)?)
  }

  fn insert_sponsor(&mut self, sponsor: &Sponsor) -> Result<()> {
    Ok(queries::insert_sponsor(self.conn, sponsor)?)
  }

  fn list_staff(&mut self) -> Result<Vec<Sponsor>> { Ok(queries::list_staff(self.conn)?) }

  fn get_sponsorship(&mut self, sponsorship_id: Uuid) -> Result<Option<Sponsorship>> {
    Ok(queries::sponsorship_by_id(self.conn, sponsorship_id)?)
  }

  fn active_sponsorships(&mut self, child_id: Uuid) -> Result<Vec<Sponsorship>> {
    Ok(queries::active_sponsorships(self.conn, child_id)?)
  }

  fn insert_sponsorship(&mut self, sponsorship: &Sponsorship) -> Result<()> {
    Ok(queries::insert_sponsorship(self.conn, sponsorship)?)
  }

  fn end_sponsorship(&mut self, sponsorship_id: Uuid, ending: &Ending) -> Result<bool> {
    Ok(queries::end_sponsorship(self.conn, sponsorship_id, ending)?)
  }

  fn get_sponsorship_request(&mut self, request_id: Uuid) -> Result<Option<SponsorshipRequest>> {
    Ok(queries::sponsorship_request_by_id(self.conn, request_id)?)
  }

  fn resolve_sponsorship_request(&mut self, request_id: Uuid, review: &Review) -> Result<bool> {
    Ok(queries::resolve_sponsorship_request(self.conn, request_id, review)?)
  }

  fn get_assignment_request(
    &mut self,
    request_id: Uuid,
  ) -> Result<Option<ChildAssignmentRequest>> {
    Ok(queries::assignment_request_by_id(self.conn, request_id)?)
  }

  fn resolve_assignment_request(&mut self, request_id: Uuid, review: &Review) -> Result<bool> {
    Ok(queries::resolve_assignment_request(self.conn, request_id, review)?)
  }

  fn record_audit(&mut self, entry: &AuditEntry) -> Result<()> {
    Ok(queries::insert_audit(self.conn, entry)?)
  }

  fn enqueue(&mut self, entry: &OutboxEntry) -> Result<()> {
    Ok(queries::insert_outbox(self.conn, entry)?)
  }
}
