//! Request intake: asks captured before any ledger entry exists.
//!
//! Both request kinds are terminal once approved or rejected. Approval is the
//! only path from a request to a ledger row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, sponsor::normalize_email, sponsorship::SponsorshipType};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::AsRefStr,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RequestStatus {
  Pending,
  Approved,
  Rejected,
}

impl RequestStatus {
  pub fn is_pending(self) -> bool { self == Self::Pending }
}

// ─── Sponsorship request ─────────────────────────────────────────────────────

/// A cold request from the public form to become a sponsor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SponsorshipRequest {
  pub request_id:       Uuid,
  pub full_name:        String,
  pub email:            String,
  pub phone:            Option<String>,
  pub city:             Option<String>,
  pub facebook_url:     Option<String>,
  pub motivation:       Option<String>,
  /// `None` means "let us choose"; the reviewer picks the child on approval.
  pub child_id:         Option<Uuid>,
  pub sponsorship_type: SponsorshipType,
  pub terms_accepted:   bool,
  pub status:           RequestStatus,
  pub reviewed_by:      Option<Uuid>,
  pub reviewed_at:      Option<DateTime<Utc>>,
  pub created_at:       DateTime<Utc>,
  pub updated_at:       DateTime<Utc>,
}

/// Input to [`crate::store::SponsorshipStore::submit_sponsorship_request`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewSponsorshipRequest {
  pub full_name:        String,
  pub email:            String,
  pub phone:            Option<String>,
  pub city:             Option<String>,
  pub facebook_url:     Option<String>,
  pub motivation:       Option<String>,
  pub child_id:         Option<Uuid>,
  #[serde(default)]
  pub sponsorship_type: SponsorshipType,
  #[serde(default)]
  pub terms_accepted:   bool,
}

impl NewSponsorshipRequest {
  /// Validate the submission and build the pending request.
  pub fn into_request(self, now: DateTime<Utc>) -> Result<SponsorshipRequest> {
    if !self.terms_accepted {
      return Err(Error::Validation("terms must be accepted".into()));
    }
    let full_name = self.full_name.trim().to_owned();
    if full_name.is_empty() {
      return Err(Error::Validation("full name is required".into()));
    }
    Ok(SponsorshipRequest {
      request_id: Uuid::new_v4(),
      full_name,
      email: normalize_email(&self.email)?,
      phone: blank_to_none(self.phone),
      city: blank_to_none(self.city),
      facebook_url: blank_to_none(self.facebook_url),
      motivation: blank_to_none(self.motivation),
      child_id: self.child_id,
      sponsorship_type: self.sponsorship_type,
      terms_accepted: true,
      status: RequestStatus::Pending,
      reviewed_by: None,
      reviewed_at: None,
      created_at: now,
      updated_at: now,
    })
  }
}

// ─── Child-assignment request ────────────────────────────────────────────────

/// A sponsor asking to record a relationship with a specific, known child.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildAssignmentRequest {
  pub request_id:      Uuid,
  pub name:            String,
  pub requester_email: String,
  pub child_id:        Uuid,
  pub status:          RequestStatus,
  pub reviewed_by:     Option<Uuid>,
  pub reviewed_at:     Option<DateTime<Utc>>,
  pub created_at:      DateTime<Utc>,
}

/// Input to [`crate::store::SponsorshipStore::submit_assignment_request`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewChildAssignmentRequest {
  pub name:            String,
  pub requester_email: String,
  pub child_id:        Uuid,
}

impl NewChildAssignmentRequest {
  pub fn into_request(self, now: DateTime<Utc>) -> Result<ChildAssignmentRequest> {
    let name = self.name.trim().to_owned();
    if name.is_empty() {
      return Err(Error::Validation("name is required".into()));
    }
    Ok(ChildAssignmentRequest {
      request_id: Uuid::new_v4(),
      name,
      requester_email: normalize_email(&self.requester_email)?,
      child_id: self.child_id,
      status: RequestStatus::Pending,
      reviewed_by: None,
      reviewed_at: None,
      created_at: now,
    })
  }
}

/// Who reviewed a request and when; stamped by the resolving transition.
#[derive(Debug, Clone)]
pub struct Review {
  pub status:      RequestStatus,
  pub reviewed_by: Uuid,
  pub reviewed_at: DateTime<Utc>,
}

fn blank_to_none(s: Option<String>) -> Option<String> {
  s.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn form() -> NewSponsorshipRequest {
    NewSponsorshipRequest {
      full_name:        "Ana Novak".into(),
      email:            "Ana@Example.com".into(),
      phone:            Some("  ".into()),
      city:             Some("Split".into()),
      facebook_url:     None,
      motivation:       None,
      child_id:         None,
      sponsorship_type: SponsorshipType::OneTime,
      terms_accepted:   true,
    }
  }

  #[test]
  fn accepted_form_becomes_pending_request() {
    let req = form().into_request(Utc::now()).unwrap();
    assert_eq!(req.status, RequestStatus::Pending);
    assert_eq!(req.email, "ana@example.com");
    assert_eq!(req.phone, None);
    assert_eq!(req.city.as_deref(), Some("Split"));
    assert_eq!(req.sponsorship_type, SponsorshipType::OneTime);
  }

  #[test]
  fn terms_must_be_accepted() {
    let mut f = form();
    f.terms_accepted = false;
    assert!(matches!(f.into_request(Utc::now()), Err(Error::Validation(_))));
  }

  #[test]
  fn assignment_request_requires_name() {
    let input = NewChildAssignmentRequest {
      name:            " ".into(),
      requester_email: "a@b.org".into(),
      child_id:        Uuid::new_v4(),
    };
    assert!(matches!(input.into_request(Utc::now()), Err(Error::Validation(_))));
  }
}
