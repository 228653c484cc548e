//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`
//! suffix) so that lexical order matches chronological order. Calendar dates
//! are `YYYY-MM-DD`. Enums are stored as their snake_case names, and
//! notification metadata and outbox deliveries as compact JSON.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use patron_core::{
  audit::AuditEntry,
  child::Child,
  notification::{Message, Notification},
  outbox::OutboxEntry,
  request::{ChildAssignmentRequest, SponsorshipRequest},
  sponsor::Sponsor,
  sponsorship::Sponsorship,
};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── NaiveDate ────────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ────────────────────────────────────────────────────────────────────

/// Parse a strum-encoded enum column.
pub fn decode_enum<T: FromStr>(column: &'static str, s: &str) -> Result<T> {
  s.parse()
    .map_err(|_| Error::UnknownVariant { column, value: s.to_owned() })
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const CHILD_COLUMNS: &str =
  "child_id, name, is_sponsored, sponsor_id, sponsor_name, created_at, updated_at";

pub struct RawChild {
  pub child_id:     String,
  pub name:         String,
  pub is_sponsored: bool,
  pub sponsor_id:   Option<String>,
  pub sponsor_name: Option<String>,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawChild {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      child_id:     row.get(0)?,
      name:         row.get(1)?,
      is_sponsored: row.get(2)?,
      sponsor_id:   row.get(3)?,
      sponsor_name: row.get(4)?,
      created_at:   row.get(5)?,
      updated_at:   row.get(6)?,
    })
  }

  pub fn into_child(self) -> Result<Child> {
    Ok(Child {
      child_id:     decode_uuid(&self.child_id)?,
      name:         self.name,
      is_sponsored: self.is_sponsored,
      sponsor_id:   decode_opt_uuid(self.sponsor_id)?,
      sponsor_name: self.sponsor_name,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}

pub const SPONSOR_COLUMNS: &str = "sponsor_id, full_name, email, phone, role, created_at";

pub struct RawSponsor {
  pub sponsor_id: String,
  pub full_name:  String,
  pub email:      String,
  pub phone:      Option<String>,
  pub role:       String,
  pub created_at: String,
}

impl RawSponsor {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      sponsor_id: row.get(0)?,
      full_name:  row.get(1)?,
      email:      row.get(2)?,
      phone:      row.get(3)?,
      role:       row.get(4)?,
      created_at: row.get(5)?,
    })
  }

  pub fn into_sponsor(self) -> Result<Sponsor> {
    Ok(Sponsor {
      sponsor_id: decode_uuid(&self.sponsor_id)?,
      full_name:  self.full_name,
      email:      self.email,
      phone:      self.phone,
      role:       decode_enum("role", &self.role)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const SPONSORSHIP_COLUMNS: &str = "sponsorship_id, child_id, sponsor_id, status, kind, \
                                       start_date, end_date, termination_reason, ended_by, \
                                       created_at, updated_at";

pub struct RawSponsorship {
  pub sponsorship_id:     String,
  pub child_id:           String,
  pub sponsor_id:         String,
  pub status:             String,
  pub kind:               String,
  pub start_date:         String,
  pub end_date:           Option<String>,
  pub termination_reason: Option<String>,
  pub ended_by:           Option<String>,
  pub created_at:         String,
  pub updated_at:         String,
}

impl RawSponsorship {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      sponsorship_id:     row.get(0)?,
      child_id:           row.get(1)?,
      sponsor_id:         row.get(2)?,
      status:             row.get(3)?,
      kind:               row.get(4)?,
      start_date:         row.get(5)?,
      end_date:           row.get(6)?,
      termination_reason: row.get(7)?,
      ended_by:           row.get(8)?,
      created_at:         row.get(9)?,
      updated_at:         row.get(10)?,
    })
  }

  pub fn into_sponsorship(self) -> Result<Sponsorship> {
    Ok(Sponsorship {
      sponsorship_id:     decode_uuid(&self.sponsorship_id)?,
      child_id:           decode_uuid(&self.child_id)?,
      sponsor_id:         decode_uuid(&self.sponsor_id)?,
      status:             decode_enum("status", &self.status)?,
      kind:               decode_enum("kind", &self.kind)?,
      start_date:         decode_date(&self.start_date)?,
      end_date:           self.end_date.as_deref().map(decode_date).transpose()?,
      termination_reason: self.termination_reason,
      ended_by:           decode_opt_uuid(self.ended_by)?,
      created_at:         decode_dt(&self.created_at)?,
      updated_at:         decode_dt(&self.updated_at)?,
    })
  }
}

pub const SPONSORSHIP_REQUEST_COLUMNS: &str = "request_id, full_name, email, phone, city, \
                                               facebook_url, motivation, child_id, \
                                               sponsorship_type, terms_accepted, status, \
                                               reviewed_by, reviewed_at, created_at, updated_at";

pub struct RawSponsorshipRequest {
  pub request_id:       String,
  pub full_name:        String,
  pub email:            String,
  pub phone:            Option<String>,
  pub city:             Option<String>,
  pub facebook_url:     Option<String>,
  pub motivation:       Option<String>,
  pub child_id:         Option<String>,
  pub sponsorship_type: String,
  pub terms_accepted:   bool,
  pub status:           String,
  pub reviewed_by:      Option<String>,
  pub reviewed_at:      Option<String>,
  pub created_at:       String,
  pub updated_at:       String,
}

impl RawSponsorshipRequest {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      request_id:       row.get(0)?,
      full_name:        row.get(1)?,
      email:            row.get(2)?,
      phone:            row.get(3)?,
      city:             row.get(4)?,
      facebook_url:     row.get(5)?,
      motivation:       row.get(6)?,
      child_id:         row.get(7)?,
      sponsorship_type: row.get(8)?,
      terms_accepted:   row.get(9)?,
      status:           row.get(10)?,
      reviewed_by:      row.get(11)?,
      reviewed_at:      row.get(12)?,
      created_at:       row.get(13)?,
      updated_at:       row.get(14)?,
    })
  }

  pub fn into_request(self) -> Result<SponsorshipRequest> {
    Ok(SponsorshipRequest {
      request_id:       decode_uuid(&self.request_id)?,
      full_name:        self.full_name,
      email:            self.email,
      phone:            self.phone,
      city:             self.city,
      facebook_url:     self.facebook_url,
      motivation:       self.motivation,
      child_id:         decode_opt_uuid(self.child_id)?,
      sponsorship_type: decode_enum("sponsorship_type", &self.sponsorship_type)?,
      terms_accepted:   self.terms_accepted,
      status:           decode_enum("status", &self.status)?,
      reviewed_by:      decode_opt_uuid(self.reviewed_by)?,
      reviewed_at:      decode_opt_dt(self.reviewed_at)?,
      created_at:       decode_dt(&self.created_at)?,
      updated_at:       decode_dt(&self.updated_at)?,
    })
  }
}

pub const ASSIGNMENT_REQUEST_COLUMNS: &str =
  "request_id, name, requester_email, child_id, status, reviewed_by, reviewed_at, created_at";

pub struct RawAssignmentRequest {
  pub request_id:      String,
  pub name:            String,
  pub requester_email: String,
  pub child_id:        String,
  pub status:          String,
  pub reviewed_by:     Option<String>,
  pub reviewed_at:     Option<String>,
  pub created_at:      String,
}

impl RawAssignmentRequest {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      request_id:      row.get(0)?,
      name:            row.get(1)?,
      requester_email: row.get(2)?,
      child_id:        row.get(3)?,
      status:          row.get(4)?,
      reviewed_by:     row.get(5)?,
      reviewed_at:     row.get(6)?,
      created_at:      row.get(7)?,
    })
  }

  pub fn into_request(self) -> Result<ChildAssignmentRequest> {
    Ok(ChildAssignmentRequest {
      request_id:      decode_uuid(&self.request_id)?,
      name:            self.name,
      requester_email: self.requester_email,
      child_id:        decode_uuid(&self.child_id)?,
      status:          decode_enum("status", &self.status)?,
      reviewed_by:     decode_opt_uuid(self.reviewed_by)?,
      reviewed_at:     decode_opt_dt(self.reviewed_at)?,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

pub const AUDIT_COLUMNS: &str =
  "audit_id, child_id, field, old_value, new_value, performed_by, recorded_at";

pub struct RawAuditEntry {
  pub audit_id:     String,
  pub child_id:     String,
  pub field:        String,
  pub old_value:    Option<String>,
  pub new_value:    Option<String>,
  pub performed_by: String,
  pub recorded_at:  String,
}

impl RawAuditEntry {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      audit_id:     row.get(0)?,
      child_id:     row.get(1)?,
      field:        row.get(2)?,
      old_value:    row.get(3)?,
      new_value:    row.get(4)?,
      performed_by: row.get(5)?,
      recorded_at:  row.get(6)?,
    })
  }

  pub fn into_entry(self) -> Result<AuditEntry> {
    Ok(AuditEntry {
      audit_id:     decode_uuid(&self.audit_id)?,
      child_id:     decode_uuid(&self.child_id)?,
      field:        self.field,
      old_value:    self.old_value,
      new_value:    self.new_value,
      performed_by: decode_uuid(&self.performed_by)?,
      recorded_at:  decode_dt(&self.recorded_at)?,
    })
  }
}

pub const NOTIFICATION_COLUMNS: &str =
  "notification_id, recipient_id, kind, title, content, metadata, is_read, created_at";

pub struct RawNotification {
  pub notification_id: String,
  pub recipient_id:    String,
  pub kind:            String,
  pub title:           String,
  pub content:         String,
  pub metadata:        String,
  pub is_read:         bool,
  pub created_at:      String,
}

impl RawNotification {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      notification_id: row.get(0)?,
      recipient_id:    row.get(1)?,
      kind:            row.get(2)?,
      title:           row.get(3)?,
      content:         row.get(4)?,
      metadata:        row.get(5)?,
      is_read:         row.get(6)?,
      created_at:      row.get(7)?,
    })
  }

  pub fn into_notification(self) -> Result<Notification> {
    Ok(Notification {
      notification_id: decode_uuid(&self.notification_id)?,
      recipient_id:    decode_uuid(&self.recipient_id)?,
      kind:            decode_enum("kind", &self.kind)?,
      title:           self.title,
      content:         self.content,
      metadata:        serde_json::from_str(&self.metadata)?,
      is_read:         self.is_read,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

pub const MESSAGE_COLUMNS: &str =
  "message_id, sender_id, recipient_id, subject, body, is_read, created_at";

pub struct RawMessage {
  pub message_id:   String,
  pub sender_id:    Option<String>,
  pub recipient_id: String,
  pub subject:      String,
  pub body:         String,
  pub is_read:      bool,
  pub created_at:   String,
}

impl RawMessage {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      message_id:   row.get(0)?,
      sender_id:    row.get(1)?,
      recipient_id: row.get(2)?,
      subject:      row.get(3)?,
      body:         row.get(4)?,
      is_read:      row.get(5)?,
      created_at:   row.get(6)?,
    })
  }

  pub fn into_message(self) -> Result<Message> {
    Ok(Message {
      message_id:   decode_uuid(&self.message_id)?,
      sender_id:    decode_opt_uuid(self.sender_id)?,
      recipient_id: decode_uuid(&self.recipient_id)?,
      subject:      self.subject,
      body:         self.body,
      is_read:      self.is_read,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub const OUTBOX_COLUMNS: &str = "outbox_id, event, delivery, status, attempts, \
                                  next_attempt_at, last_error, created_at, delivered_at";

pub struct RawOutboxEntry {
  pub outbox_id:       String,
  pub event:           String,
  pub delivery:        String,
  pub status:          String,
  pub attempts:        u32,
  pub next_attempt_at: String,
  pub last_error:      Option<String>,
  pub created_at:      String,
  pub delivered_at:    Option<String>,
}

impl RawOutboxEntry {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      outbox_id:       row.get(0)?,
      event:           row.get(1)?,
      delivery:        row.get(2)?,
      status:          row.get(3)?,
      attempts:        row.get(4)?,
      next_attempt_at: row.get(5)?,
      last_error:      row.get(6)?,
      created_at:      row.get(7)?,
      delivered_at:    row.get(8)?,
    })
  }

  pub fn into_entry(self) -> Result<OutboxEntry> {
    Ok(OutboxEntry {
      outbox_id:       decode_uuid(&self.outbox_id)?,
      event:           decode_enum("event", &self.event)?,
      delivery:        serde_json::from_str(&self.delivery)?,
      status:          decode_enum("status", &self.status)?,
      attempts:        self.attempts,
      next_attempt_at: decode_dt(&self.next_attempt_at)?,
      last_error:      self.last_error,
      created_at:      decode_dt(&self.created_at)?,
      delivered_at:    decode_opt_dt(self.delivered_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;

  #[test]
  fn timestamps_sort_lexically() {
    let a = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let b = a + Duration::milliseconds(500);
    let c = a + Duration::seconds(1);
    let (ea, eb, ec) = (encode_dt(a), encode_dt(b), encode_dt(c));
    assert!(ea < eb && eb < ec);
    assert_eq!(decode_dt(&eb).unwrap(), b);
  }

  #[test]
  fn unknown_enum_value_is_reported() {
    let err = decode_enum::<patron_core::sponsorship::SponsorshipStatus>("status", "paused")
      .unwrap_err();
    assert!(matches!(err, Error::UnknownVariant { column: "status", .. }));
  }
}
