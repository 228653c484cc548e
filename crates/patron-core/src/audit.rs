//! Field-level audit trail for the denormalised child sponsorship fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::child::SponsorshipSummary;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
  pub audit_id:     Uuid,
  pub child_id:     Uuid,
  pub field:        String,
  pub old_value:    Option<String>,
  pub new_value:    Option<String>,
  pub performed_by: Uuid,
  pub recorded_at:  DateTime<Utc>,
}

/// One entry per field that differs between `old` and `new`. Unchanged fields
/// produce nothing.
pub fn diff_summary(
  child_id: Uuid,
  old: &SponsorshipSummary,
  new: &SponsorshipSummary,
  performed_by: Uuid,
  at: DateTime<Utc>,
) -> Vec<AuditEntry> {
  let fields = [
    (
      "is_sponsored",
      Some(old.is_sponsored.to_string()),
      Some(new.is_sponsored.to_string()),
    ),
    (
      "sponsor_id",
      old.sponsor_id.map(|id| id.to_string()),
      new.sponsor_id.map(|id| id.to_string()),
    ),
    ("sponsor_name", old.sponsor_name.clone(), new.sponsor_name.clone()),
  ];

  fields
    .into_iter()
    .filter(|(_, before, after)| before != after)
    .map(|(field, old_value, new_value)| AuditEntry {
      audit_id: Uuid::new_v4(),
      child_id,
      field: field.to_owned(),
      old_value,
      new_value,
      performed_by,
      recorded_at: at,
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn transfer_diffs_id_and_name_only() {
    let a = SponsorshipSummary {
      is_sponsored: true,
      sponsor_id:   Some(Uuid::new_v4()),
      sponsor_name: Some("A".into()),
    };
    let b = SponsorshipSummary {
      is_sponsored: true,
      sponsor_id:   Some(Uuid::new_v4()),
      sponsor_name: Some("B".into()),
    };
    let entries = diff_summary(Uuid::nil(), &a, &b, Uuid::nil(), Utc::now());
    let fields: Vec<_> = entries.iter().map(|e| e.field.as_str()).collect();
    assert_eq!(fields, ["sponsor_id", "sponsor_name"]);
    assert_eq!(entries[1].old_value.as_deref(), Some("A"));
    assert_eq!(entries[1].new_value.as_deref(), Some("B"));
  }

  #[test]
  fn unchanged_summary_produces_nothing() {
    let s = SponsorshipSummary::unsponsored();
    assert!(diff_summary(Uuid::nil(), &s, &s, Uuid::nil(), Utc::now()).is_empty());
  }
}
