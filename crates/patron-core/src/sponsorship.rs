//! Sponsorship ledger rows: the source of truth for who sponsors whom, when.
//!
//! Rows are never deleted. Ending a sponsorship (termination or transfer)
//! stamps `end_date` and flips the status; a transfer then appends a new row.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

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
pub enum SponsorshipStatus {
  Active,
  /// Reserved; no lifecycle transition creates a pending row.
  Pending,
  Ended,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::AsRefStr,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SponsorshipType {
  #[default]
  LongTerm,
  OneTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sponsorship {
  pub sponsorship_id:     Uuid,
  pub child_id:           Uuid,
  pub sponsor_id:         Uuid,
  pub status:             SponsorshipStatus,
  pub kind:               SponsorshipType,
  pub start_date:         NaiveDate,
  /// Set if and only if `status` is [`SponsorshipStatus::Ended`].
  pub end_date:           Option<NaiveDate>,
  pub termination_reason: Option<String>,
  /// Staff member who ended the row, by termination or transfer.
  pub ended_by:           Option<Uuid>,
  pub created_at:         DateTime<Utc>,
  pub updated_at:         DateTime<Utc>,
}

impl Sponsorship {
  /// A fresh active row starting on `start_date`.
  pub fn activate(
    child_id: Uuid,
    sponsor_id: Uuid,
    kind: SponsorshipType,
    start_date: NaiveDate,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      sponsorship_id: Uuid::new_v4(),
      child_id,
      sponsor_id,
      status: SponsorshipStatus::Active,
      kind,
      start_date,
      end_date: None,
      termination_reason: None,
      ended_by: None,
      created_at: now,
      updated_at: now,
    }
  }

  pub fn is_active(&self) -> bool { self.status == SponsorshipStatus::Active }
}

/// How an active row is closed by [`crate::store::LedgerTx::end_sponsorship`].
#[derive(Debug, Clone)]
pub struct Ending {
  pub end_date: NaiveDate,
  pub reason:   Option<String>,
  pub ended_by: Uuid,
  pub at:       DateTime<Utc>,
}

/// Parameters for [`crate::store::SponsorshipStore::list_sponsorships`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SponsorshipQuery {
  pub child_id:   Option<Uuid>,
  pub sponsor_id: Option<Uuid>,
  pub status:     Option<SponsorshipStatus>,
}
