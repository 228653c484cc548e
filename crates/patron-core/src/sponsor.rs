//! Sponsor accounts and roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  #[default]
  Sponsor,
  Assistant,
  Admin,
}

impl Role {
  /// Assistants and admins may review requests and mutate the ledger.
  pub fn is_staff(self) -> bool { matches!(self, Self::Assistant | Self::Admin) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sponsor {
  pub sponsor_id: Uuid,
  pub full_name:  String,
  /// Normalised with [`normalize_email`]; unique across accounts.
  pub email:      String,
  pub phone:      Option<String>,
  pub role:       Role,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::SponsorshipStore::add_sponsor`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewSponsor {
  pub full_name: String,
  pub email:     String,
  pub phone:     Option<String>,
  #[serde(default)]
  pub role:      Role,
}

impl NewSponsor {
  pub fn into_sponsor(self, now: DateTime<Utc>) -> Result<Sponsor> {
    let full_name = self.full_name.trim().to_owned();
    if full_name.is_empty() {
      return Err(Error::Validation("full name is required".into()));
    }
    Ok(Sponsor {
      sponsor_id: Uuid::new_v4(),
      full_name,
      email: normalize_email(&self.email)?,
      phone: self.phone,
      role: self.role,
      created_at: now,
    })
  }
}

/// Trim and lowercase an email address, rejecting obviously malformed input.
///
/// Email is the natural key used to link an approved request to an account,
/// so every write and lookup goes through this.
pub fn normalize_email(raw: &str) -> Result<String> {
  let email = raw.trim().to_lowercase();
  let valid = match email.split_once('@') {
    Some((local, domain)) => {
      !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
    }
    None => false,
  };
  if !valid {
    return Err(Error::Validation(format!("invalid email address: {raw:?}")));
  }
  Ok(email)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn normalize_email_lowercases_and_trims() {
    assert_eq!(normalize_email("  E1@X.com ").unwrap(), "e1@x.com");
  }

  #[test]
  fn normalize_email_rejects_garbage() {
    for bad in ["", "no-at-sign", "@x.com", "a@nodot", "a@.com", "a b@x.com"] {
      assert!(normalize_email(bad).is_err(), "accepted {bad:?}");
    }
  }

  #[test]
  fn only_assistants_and_admins_are_staff() {
    assert!(!Role::Sponsor.is_staff());
    assert!(Role::Assistant.is_staff());
    assert!(Role::Admin.is_staff());
  }
}
