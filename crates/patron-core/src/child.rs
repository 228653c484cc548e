//! Child: the record a sponsorship attaches to.
//!
//! The sponsorship summary (`is_sponsored`, `sponsor_id`, `sponsor_name`) is a
//! denormalised cache of the ledger. It is written only by the lifecycle
//! transitions, in the same transaction as the ledger row it mirrors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, sponsor::Sponsor, sponsorship::Sponsorship};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Child {
  pub child_id:     Uuid,
  pub name:         String,
  pub is_sponsored: bool,
  pub sponsor_id:   Option<Uuid>,
  /// Cached display name of the current sponsor.
  pub sponsor_name: Option<String>,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}

impl Child {
  pub fn summary(&self) -> SponsorshipSummary {
    SponsorshipSummary {
      is_sponsored: self.is_sponsored,
      sponsor_id:   self.sponsor_id,
      sponsor_name: self.sponsor_name.clone(),
    }
  }
}

/// Input to [`crate::store::SponsorshipStore::add_child`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewChild {
  pub name: String,
}

impl NewChild {
  /// New children always start unsponsored.
  pub fn into_child(self, now: DateTime<Utc>) -> Result<Child> {
    let name = self.name.trim().to_owned();
    if name.is_empty() {
      return Err(Error::Validation("child name is required".into()));
    }
    Ok(Child {
      child_id: Uuid::new_v4(),
      name,
      is_sponsored: false,
      sponsor_id: None,
      sponsor_name: None,
      created_at: now,
      updated_at: now,
    })
  }
}

/// The three denormalised sponsorship fields of a [`Child`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SponsorshipSummary {
  pub is_sponsored: bool,
  pub sponsor_id:   Option<Uuid>,
  pub sponsor_name: Option<String>,
}

impl SponsorshipSummary {
  pub fn unsponsored() -> Self { Self::default() }

  pub fn sponsored_by(sponsor: &Sponsor) -> Self {
    Self {
      is_sponsored: true,
      sponsor_id:   Some(sponsor.sponsor_id),
      sponsor_name: Some(sponsor.full_name.clone()),
    }
  }
}

/// The computed read model for a child. Never stored, always derived from
/// the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildView {
  pub child:   Child,
  /// The single active ledger row, if any.
  pub active:  Option<Sponsorship>,
  /// Every ledger row for the child, oldest first.
  pub history: Vec<Sponsorship>,
}
