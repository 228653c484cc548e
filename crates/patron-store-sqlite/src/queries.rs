//! Synchronous queries over a borrowed [`Connection`].
//!
//! Shared by [`crate::tx::SqliteTx`] (inside a ledger transaction) and by the
//! async [`crate::SqliteStore`] methods (inside `Connection::call`).

use chrono::{DateTime, Utc};
use patron_core::{
  audit::AuditEntry,
  child::{Child, SponsorshipSummary},
  error::Entity,
  notification::{Message, NewMessage, NewNotification, Notification},
  outbox::{AttemptFailure, OutboxEntry, OutboxStatus},
  request::{ChildAssignmentRequest, RequestStatus, Review, SponsorshipRequest},
  sponsor::{Role, Sponsor},
  sponsorship::{Ending, Sponsorship, SponsorshipQuery, SponsorshipStatus},
};
use rusqlite::{Connection, OptionalExtension, Params, Row, params};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    ASSIGNMENT_REQUEST_COLUMNS, AUDIT_COLUMNS, CHILD_COLUMNS, MESSAGE_COLUMNS,
    NOTIFICATION_COLUMNS, OUTBOX_COLUMNS, RawAssignmentRequest, RawAuditEntry, RawChild,
    RawMessage, RawNotification, RawOutboxEntry, RawSponsor, RawSponsorship,
    RawSponsorshipRequest, SPONSOR_COLUMNS, SPONSORSHIP_COLUMNS, SPONSORSHIP_REQUEST_COLUMNS,
    decode_uuid, encode_date, encode_dt, encode_uuid,
  },
};

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn first<R, T>(
  conn: &Connection,
  sql: &str,
  params: impl Params,
  from_row: fn(&Row<'_>) -> rusqlite::Result<R>,
  decode: fn(R) -> Result<T>,
) -> Result<Option<T>> {
  conn
    .prepare_cached(sql)?
    .query_row(params, from_row)
    .optional()?
    .map(decode)
    .transpose()
}

fn collect<R, T>(
  conn: &Connection,
  sql: &str,
  params: impl Params,
  from_row: fn(&Row<'_>) -> rusqlite::Result<R>,
  decode: fn(R) -> Result<T>,
) -> Result<Vec<T>> {
  let mut stmt = conn.prepare_cached(sql)?;
  let raws = stmt
    .query_map(params, from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(decode).collect()
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _)
      if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

// ─── Children ────────────────────────────────────────────────────────────────

pub fn child_by_id(conn: &Connection, child_id: Uuid) -> Result<Option<Child>> {
  first(
    conn,
    &format!("SELECT {CHILD_COLUMNS} FROM children WHERE child_id = ?1"),
    params![encode_uuid(child_id)],
    RawChild::from_row,
    RawChild::into_child,
  )
}

pub fn insert_child(conn: &Connection, child: &Child) -> Result<()> {
  conn.execute(
    "INSERT INTO children
       (child_id, name, is_sponsored, sponsor_id, sponsor_name, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    params![
      encode_uuid(child.child_id),
      child.name,
      child.is_sponsored,
      child.sponsor_id.map(encode_uuid),
      child.sponsor_name,
      encode_dt(child.created_at),
      encode_dt(child.updated_at),
    ],
  )?;
  Ok(())
}

pub fn set_child_sponsorship(
  conn: &Connection,
  child_id: Uuid,
  summary: &SponsorshipSummary,
  at: DateTime<Utc>,
) -> Result<()> {
  let changed = conn.execute(
    "UPDATE children
        SET is_sponsored = ?2, sponsor_id = ?3, sponsor_name = ?4, updated_at = ?5
      WHERE child_id = ?1",
    params![
      encode_uuid(child_id),
      summary.is_sponsored,
      summary.sponsor_id.map(encode_uuid),
      summary.sponsor_name,
      encode_dt(at),
    ],
  )?;
  if changed == 0 {
    return Err(patron_core::Error::not_found(Entity::Child, child_id).into());
  }
  Ok(())
}

pub fn list_children(conn: &Connection, sponsored: Option<bool>) -> Result<Vec<Child>> {
  collect(
    conn,
    &format!(
      "SELECT {CHILD_COLUMNS} FROM children
        WHERE (?1 IS NULL OR is_sponsored = ?1)
        ORDER BY name, created_at"
    ),
    params![sponsored],
    RawChild::from_row,
    RawChild::into_child,
  )
}

// ─── Sponsors ────────────────────────────────────────────────────────────────

pub fn sponsor_by_id(conn: &Connection, sponsor_id: Uuid) -> Result<Option<Sponsor>> {
  first(
    conn,
    &format!("SELECT {SPONSOR_COLUMNS} FROM sponsors WHERE sponsor_id = ?1"),
    params![encode_uuid(sponsor_id)],
    RawSponsor::from_row,
    RawSponsor::into_sponsor,
  )
}

pub fn sponsor_by_email(conn: &Connection, email: &str) -> Result<Option<Sponsor>> {
  first(
    conn,
    &format!("SELECT {SPONSOR_COLUMNS} FROM sponsors WHERE email = ?1"),
    params![email],
    RawSponsor::from_row,
    RawSponsor::into_sponsor,
  )
}

/// Fails with a validation error if the email is already registered.
pub fn insert_sponsor(conn: &Connection, sponsor: &Sponsor) -> Result<()> {
  let inserted = conn.execute(
    "INSERT INTO sponsors (sponsor_id, full_name, email, phone, role, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params![
      encode_uuid(sponsor.sponsor_id),
      sponsor.full_name,
      sponsor.email,
      sponsor.phone,
      sponsor.role.as_ref(),
      encode_dt(sponsor.created_at),
    ],
  );
  match inserted {
    Ok(_) => Ok(()),
    Err(e) if is_unique_violation(&e) => Err(
      patron_core::Error::Validation(format!("email {} is already registered", sponsor.email))
        .into(),
    ),
    Err(e) => Err(e.into()),
  }
}

pub fn list_sponsors(conn: &Connection, role: Option<Role>) -> Result<Vec<Sponsor>> {
  collect(
    conn,
    &format!(
      "SELECT {SPONSOR_COLUMNS} FROM sponsors
        WHERE (?1 IS NULL OR role = ?1)
        ORDER BY full_name, created_at"
    ),
    params![role.as_ref().map(AsRef::<str>::as_ref)],
    RawSponsor::from_row,
    RawSponsor::into_sponsor,
  )
}

pub fn list_staff(conn: &Connection) -> Result<Vec<Sponsor>> {
  collect(
    conn,
    &format!(
      "SELECT {SPONSOR_COLUMNS} FROM sponsors
        WHERE role IN ('assistant', 'admin')
        ORDER BY full_name"
    ),
    [],
    RawSponsor::from_row,
    RawSponsor::into_sponsor,
  )
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

pub fn sponsorship_by_id(
  conn: &Connection,
  sponsorship_id: Uuid,
) -> Result<Option<Sponsorship>> {
  first(
    conn,
    &format!("SELECT {SPONSORSHIP_COLUMNS} FROM sponsorships WHERE sponsorship_id = ?1"),
    params![encode_uuid(sponsorship_id)],
    RawSponsorship::from_row,
    RawSponsorship::into_sponsorship,
  )
}

pub fn active_sponsorships(conn: &Connection, child_id: Uuid) -> Result<Vec<Sponsorship>> {
  collect(
    conn,
    &format!(
      "SELECT {SPONSORSHIP_COLUMNS} FROM sponsorships
        WHERE child_id = ?1 AND status = 'active'"
    ),
    params![encode_uuid(child_id)],
    RawSponsorship::from_row,
    RawSponsorship::into_sponsorship,
  )
}

/// A unique-index violation on the active-row index becomes
/// `ConflictNeedsTransfer` naming the row that won.
pub fn insert_sponsorship(conn: &Connection, s: &Sponsorship) -> Result<()> {
  let inserted = conn.execute(
    "INSERT INTO sponsorships
       (sponsorship_id, child_id, sponsor_id, status, kind, start_date, end_date,
        termination_reason, ended_by, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    params![
      encode_uuid(s.sponsorship_id),
      encode_uuid(s.child_id),
      encode_uuid(s.sponsor_id),
      s.status.as_ref(),
      s.kind.as_ref(),
      encode_date(s.start_date),
      s.end_date.map(encode_date),
      s.termination_reason,
      s.ended_by.map(encode_uuid),
      encode_dt(s.created_at),
      encode_dt(s.updated_at),
    ],
  );
  match inserted {
    Ok(_) => Ok(()),
    Err(e) if is_unique_violation(&e) => match current_holder(conn, s.child_id)? {
      Some((sponsorship_id, current_sponsor_id, current_sponsor_name)) => {
        Err(Error::Core(patron_core::Error::ConflictNeedsTransfer {
          child_id: s.child_id,
          sponsorship_id,
          current_sponsor_id,
          current_sponsor_name,
        }))
      }
      None => Err(e.into()),
    },
    Err(e) => Err(e.into()),
  }
}

fn current_holder(conn: &Connection, child_id: Uuid) -> Result<Option<(Uuid, Uuid, String)>> {
  let row = conn
    .query_row(
      "SELECT s.sponsorship_id, s.sponsor_id, sp.full_name
         FROM sponsorships s
         JOIN sponsors sp ON sp.sponsor_id = s.sponsor_id
        WHERE s.child_id = ?1 AND s.status = 'active'",
      params![encode_uuid(child_id)],
      |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)),
    )
    .optional()?;
  row
    .map(|(s, sp, name)| Ok((decode_uuid(&s)?, decode_uuid(&sp)?, name)))
    .transpose()
}

pub fn end_sponsorship(conn: &Connection, sponsorship_id: Uuid, ending: &Ending) -> Result<bool> {
  let changed = conn.execute(
    "UPDATE sponsorships
        SET status = ?2, end_date = ?3, termination_reason = ?4, ended_by = ?5,
            updated_at = ?6
      WHERE sponsorship_id = ?1 AND status = 'active'",
    params![
      encode_uuid(sponsorship_id),
      SponsorshipStatus::Ended.as_ref(),
      encode_date(ending.end_date),
      ending.reason,
      encode_uuid(ending.ended_by),
      encode_dt(ending.at),
    ],
  )?;
  Ok(changed == 1)
}

/// Every row for a child, oldest first.
pub fn sponsorship_history(conn: &Connection, child_id: Uuid) -> Result<Vec<Sponsorship>> {
  collect(
    conn,
    &format!(
      "SELECT {SPONSORSHIP_COLUMNS} FROM sponsorships
        WHERE child_id = ?1
        ORDER BY start_date, created_at"
    ),
    params![encode_uuid(child_id)],
    RawSponsorship::from_row,
    RawSponsorship::into_sponsorship,
  )
}

pub fn list_sponsorships(conn: &Connection, q: &SponsorshipQuery) -> Result<Vec<Sponsorship>> {
  collect(
    conn,
    &format!(
      "SELECT {SPONSORSHIP_COLUMNS} FROM sponsorships
        WHERE (?1 IS NULL OR child_id = ?1)
          AND (?2 IS NULL OR sponsor_id = ?2)
          AND (?3 IS NULL OR status = ?3)
        ORDER BY created_at"
    ),
    params![
      q.child_id.map(encode_uuid),
      q.sponsor_id.map(encode_uuid),
      q.status.as_ref().map(AsRef::<str>::as_ref),
    ],
    RawSponsorship::from_row,
    RawSponsorship::into_sponsorship,
  )
}

// ─── Requests ────────────────────────────────────────────────────────────────

pub fn sponsorship_request_by_id(
  conn: &Connection,
  request_id: Uuid,
) -> Result<Option<SponsorshipRequest>> {
  first(
    conn,
    &format!("SELECT {SPONSORSHIP_REQUEST_COLUMNS} FROM sponsorship_requests WHERE request_id = ?1"),
    params![encode_uuid(request_id)],
    RawSponsorshipRequest::from_row,
    RawSponsorshipRequest::into_request,
  )
}

pub fn insert_sponsorship_request(conn: &Connection, r: &SponsorshipRequest) -> Result<()> {
  conn.execute(
    "INSERT INTO sponsorship_requests
       (request_id, full_name, email, phone, city, facebook_url, motivation, child_id,
        sponsorship_type, terms_accepted, status, reviewed_by, reviewed_at, created_at,
        updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
    params![
      encode_uuid(r.request_id),
      r.full_name,
      r.email,
      r.phone,
      r.city,
      r.facebook_url,
      r.motivation,
      r.child_id.map(encode_uuid),
      r.sponsorship_type.as_ref(),
      r.terms_accepted,
      r.status.as_ref(),
      r.reviewed_by.map(encode_uuid),
      r.reviewed_at.map(encode_dt),
      encode_dt(r.created_at),
      encode_dt(r.updated_at),
    ],
  )?;
  Ok(())
}

pub fn resolve_sponsorship_request(
  conn: &Connection,
  request_id: Uuid,
  review: &Review,
) -> Result<bool> {
  let changed = conn.execute(
    "UPDATE sponsorship_requests
        SET status = ?2, reviewed_by = ?3, reviewed_at = ?4, updated_at = ?4
      WHERE request_id = ?1 AND status = 'pending'",
    params![
      encode_uuid(request_id),
      review.status.as_ref(),
      encode_uuid(review.reviewed_by),
      encode_dt(review.reviewed_at),
    ],
  )?;
  Ok(changed == 1)
}

pub fn list_sponsorship_requests(
  conn: &Connection,
  status: Option<RequestStatus>,
) -> Result<Vec<SponsorshipRequest>> {
  collect(
    conn,
    &format!(
      "SELECT {SPONSORSHIP_REQUEST_COLUMNS} FROM sponsorship_requests
        WHERE (?1 IS NULL OR status = ?1)
        ORDER BY created_at DESC"
    ),
    params![status.as_ref().map(AsRef::<str>::as_ref)],
    RawSponsorshipRequest::from_row,
    RawSponsorshipRequest::into_request,
  )
}

pub fn assignment_request_by_id(
  conn: &Connection,
  request_id: Uuid,
) -> Result<Option<ChildAssignmentRequest>> {
  first(
    conn,
    &format!("SELECT {ASSIGNMENT_REQUEST_COLUMNS} FROM assignment_requests WHERE request_id = ?1"),
    params![encode_uuid(request_id)],
    RawAssignmentRequest::from_row,
    RawAssignmentRequest::into_request,
  )
}

pub fn insert_assignment_request(conn: &Connection, r: &ChildAssignmentRequest) -> Result<()> {
  conn.execute(
    "INSERT INTO assignment_requests
       (request_id, name, requester_email, child_id, status, reviewed_by, reviewed_at,
        created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    params![
      encode_uuid(r.request_id),
      r.name,
      r.requester_email,
      encode_uuid(r.child_id),
      r.status.as_ref(),
      r.reviewed_by.map(encode_uuid),
      r.reviewed_at.map(encode_dt),
      encode_dt(r.created_at),
    ],
  )?;
  Ok(())
}

pub fn resolve_assignment_request(
  conn: &Connection,
  request_id: Uuid,
  review: &Review,
) -> Result<bool> {
  let changed = conn.execute(
    "UPDATE assignment_requests
        SET status = ?2, reviewed_by = ?3, reviewed_at = ?4
      WHERE request_id = ?1 AND status = 'pending'",
    params![
      encode_uuid(request_id),
      review.status.as_ref(),
      encode_uuid(review.reviewed_by),
      encode_dt(review.reviewed_at),
    ],
  )?;
  Ok(changed == 1)
}

pub fn list_assignment_requests(
  conn: &Connection,
  status: Option<RequestStatus>,
) -> Result<Vec<ChildAssignmentRequest>> {
  collect(
    conn,
    &format!(
      "SELECT {ASSIGNMENT_REQUEST_COLUMNS} FROM assignment_requests
        WHERE (?1 IS NULL OR status = ?1)
        ORDER BY created_at DESC"
    ),
    params![status.as_ref().map(AsRef::<str>::as_ref)],
    RawAssignmentRequest::from_row,
    RawAssignmentRequest::into_request,
  )
}

// ─── Audit ───────────────────────────────────────────────────────────────────

pub fn insert_audit(conn: &Connection, e: &AuditEntry) -> Result<()> {
  conn.execute(
    "INSERT INTO audit_log
       (audit_id, child_id, field, old_value, new_value, performed_by, recorded_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    params![
      encode_uuid(e.audit_id),
      encode_uuid(e.child_id),
      e.field,
      e.old_value,
      e.new_value,
      encode_uuid(e.performed_by),
      encode_dt(e.recorded_at),
    ],
  )?;
  Ok(())
}

pub fn audit_for_child(conn: &Connection, child_id: Uuid) -> Result<Vec<AuditEntry>> {
  collect(
    conn,
    &format!(
      "SELECT {AUDIT_COLUMNS} FROM audit_log
        WHERE child_id = ?1
        ORDER BY recorded_at, rowid"
    ),
    params![encode_uuid(child_id)],
    RawAuditEntry::from_row,
    RawAuditEntry::into_entry,
  )
}

// ─── Notifications & messages ────────────────────────────────────────────────

pub fn insert_notification(
  conn: &Connection,
  notification_id: Uuid,
  n: &NewNotification,
  at: DateTime<Utc>,
) -> Result<()> {
  conn.execute(
    "INSERT OR IGNORE INTO notifications
       (notification_id, recipient_id, kind, title, content, metadata, is_read, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
    params![
      encode_uuid(notification_id),
      encode_uuid(n.recipient_id),
      n.kind.as_ref(),
      n.title,
      n.content,
      serde_json::to_string(&n.metadata)?,
      encode_dt(at),
    ],
  )?;
  Ok(())
}

pub fn list_notifications(
  conn: &Connection,
  recipient_id: Uuid,
  unread_only: bool,
) -> Result<Vec<Notification>> {
  collect(
    conn,
    &format!(
      "SELECT {NOTIFICATION_COLUMNS} FROM notifications
        WHERE recipient_id = ?1 AND (?2 = 0 OR is_read = 0)
        ORDER BY created_at DESC, rowid DESC"
    ),
    params![encode_uuid(recipient_id), unread_only],
    RawNotification::from_row,
    RawNotification::into_notification,
  )
}

pub fn set_notification_read(
  conn: &Connection,
  notification_id: Uuid,
  recipient_id: Uuid,
  is_read: bool,
) -> Result<()> {
  let changed = conn.execute(
    "UPDATE notifications SET is_read = ?3 WHERE notification_id = ?1 AND recipient_id = ?2",
    params![encode_uuid(notification_id), encode_uuid(recipient_id), is_read],
  )?;
  if changed == 0 {
    return Err(patron_core::Error::not_found(Entity::Notification, notification_id).into());
  }
  Ok(())
}

pub fn delete_notification(
  conn: &Connection,
  notification_id: Uuid,
  recipient_id: Uuid,
) -> Result<()> {
  let changed = conn.execute(
    "DELETE FROM notifications WHERE notification_id = ?1 AND recipient_id = ?2",
    params![encode_uuid(notification_id), encode_uuid(recipient_id)],
  )?;
  if changed == 0 {
    return Err(patron_core::Error::not_found(Entity::Notification, notification_id).into());
  }
  Ok(())
}

pub fn insert_message(
  conn: &Connection,
  message_id: Uuid,
  m: &NewMessage,
  at: DateTime<Utc>,
) -> Result<()> {
  conn.execute(
    "INSERT OR IGNORE INTO messages
       (message_id, sender_id, recipient_id, subject, body, is_read, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
    params![
      encode_uuid(message_id),
      m.sender_id.map(encode_uuid),
      encode_uuid(m.recipient_id),
      m.subject,
      m.body,
      encode_dt(at),
    ],
  )?;
  Ok(())
}

pub fn list_messages(conn: &Connection, recipient_id: Uuid) -> Result<Vec<Message>> {
  collect(
    conn,
    &format!(
      "SELECT {MESSAGE_COLUMNS} FROM messages
        WHERE recipient_id = ?1
        ORDER BY created_at DESC, rowid DESC"
    ),
    params![encode_uuid(recipient_id)],
    RawMessage::from_row,
    RawMessage::into_message,
  )
}

pub fn mark_message_read(conn: &Connection, message_id: Uuid, recipient_id: Uuid) -> Result<()> {
  let changed = conn.execute(
    "UPDATE messages SET is_read = 1 WHERE message_id = ?1 AND recipient_id = ?2",
    params![encode_uuid(message_id), encode_uuid(recipient_id)],
  )?;
  if changed == 0 {
    return Err(patron_core::Error::not_found(Entity::Message, message_id).into());
  }
  Ok(())
}

// ─── Outbox ──────────────────────────────────────────────────────────────────

pub fn insert_outbox(conn: &Connection, e: &OutboxEntry) -> Result<()> {
  conn.execute(
    "INSERT INTO outbox
       (outbox_id, event, delivery, status, attempts, next_attempt_at, last_error,
        created_at, delivered_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    params![
      encode_uuid(e.outbox_id),
      e.event.as_ref(),
      serde_json::to_string(&e.delivery)?,
      e.status.as_ref(),
      e.attempts,
      encode_dt(e.next_attempt_at),
      e.last_error,
      encode_dt(e.created_at),
      e.delivered_at.map(encode_dt),
    ],
  )?;
  Ok(())
}

fn outbox_by_id(conn: &Connection, outbox_id: Uuid) -> Result<Option<OutboxEntry>> {
  first(
    conn,
    &format!("SELECT {OUTBOX_COLUMNS} FROM outbox WHERE outbox_id = ?1"),
    params![encode_uuid(outbox_id)],
    RawOutboxEntry::from_row,
    RawOutboxEntry::into_entry,
  )
}

/// Lease each id that is pending and due. Ids that are not are skipped.
pub fn claim_outbox(
  conn: &Connection,
  outbox_ids: &[Uuid],
  now: DateTime<Utc>,
  lease_until: DateTime<Utc>,
) -> Result<Vec<OutboxEntry>> {
  let (now, lease_until) = (encode_dt(now), encode_dt(lease_until));
  let mut claimed = Vec::with_capacity(outbox_ids.len());
  for &id in outbox_ids {
    let changed = conn.execute(
      "UPDATE outbox SET next_attempt_at = ?3
        WHERE outbox_id = ?1 AND status = 'pending' AND next_attempt_at <= ?2",
      params![encode_uuid(id), now, lease_until],
    )?;
    if changed == 1 {
      claimed.extend(outbox_by_id(conn, id)?);
    }
  }
  Ok(claimed)
}

pub fn due_outbox_ids(conn: &Connection, now: DateTime<Utc>, limit: usize) -> Result<Vec<Uuid>> {
  let mut stmt = conn.prepare_cached(
    "SELECT outbox_id FROM outbox
      WHERE status = 'pending' AND next_attempt_at <= ?1
      ORDER BY created_at
      LIMIT ?2",
  )?;
  let ids = stmt
    .query_map(params![encode_dt(now), limit as i64], |row| row.get::<_, String>(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  ids.iter().map(|s| decode_uuid(s)).collect()
}

pub fn mark_outbox_delivered(conn: &Connection, outbox_id: Uuid, at: DateTime<Utc>) -> Result<()> {
  conn.execute(
    "UPDATE outbox SET status = ?2, delivered_at = ?3 WHERE outbox_id = ?1",
    params![encode_uuid(outbox_id), OutboxStatus::Delivered.as_ref(), encode_dt(at)],
  )?;
  Ok(())
}

pub fn record_outbox_failure(
  conn: &Connection,
  outbox_id: Uuid,
  failure: &AttemptFailure,
) -> Result<()> {
  match failure.next_attempt_at {
    Some(next) => conn.execute(
      "UPDATE outbox
          SET attempts = attempts + 1, last_error = ?2, next_attempt_at = ?3
        WHERE outbox_id = ?1",
      params![encode_uuid(outbox_id), failure.error, encode_dt(next)],
    )?,
    None => conn.execute(
      "UPDATE outbox
          SET attempts = attempts + 1, last_error = ?2, status = ?3
        WHERE outbox_id = ?1",
      params![encode_uuid(outbox_id), failure.error, OutboxStatus::Dead.as_ref()],
    )?,
  };
  Ok(())
}

pub fn list_outbox(conn: &Connection, status: Option<OutboxStatus>) -> Result<Vec<OutboxEntry>> {
  collect(
    conn,
    &format!(
      "SELECT {OUTBOX_COLUMNS} FROM outbox
        WHERE (?1 IS NULL OR status = ?1)
        ORDER BY created_at, rowid"
    ),
    params![status.as_ref().map(AsRef::<str>::as_ref)],
    RawOutboxEntry::from_row,
    RawOutboxEntry::into_entry,
  )
}
