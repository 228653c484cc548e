//! Conflict detection shared by every path that creates an active row.

use tracing::error;
use uuid::Uuid;

use crate::{Error, Result, sponsorship::Sponsorship};

/// Who currently holds a child, according to the ledger.
#[derive(Debug, Clone)]
pub enum Resolution {
  /// No active row; a new one may be created directly.
  Vacant,
  /// Exactly one active row.
  Held(Sponsorship),
}

/// Classify the active rows for `child_id`. More than one active row is an
/// invariant violation; it is logged and refused, never repaired.
pub fn resolve(child_id: Uuid, mut active: Vec<Sponsorship>) -> Result<Resolution> {
  match active.len() {
    0 => Ok(Resolution::Vacant),
    1 => Ok(Resolution::Held(active.remove(0))),
    n => {
      let ids: Vec<Uuid> = active.iter().map(|s| s.sponsorship_id).collect();
      error!(
        %child_id,
        active_rows = n,
        sponsorship_ids = ?ids,
        "multiple active sponsorships; manual reconciliation required"
      );
      Err(Error::DataIntegrity { child_id, active_rows: n })
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::sponsorship::SponsorshipType;

  fn row(child_id: Uuid) -> Sponsorship {
    let now = Utc::now();
    Sponsorship::activate(
      child_id,
      Uuid::new_v4(),
      SponsorshipType::LongTerm,
      now.date_naive(),
      now,
    )
  }

  #[test]
  fn no_rows_is_vacant() {
    assert!(matches!(resolve(Uuid::nil(), vec![]), Ok(Resolution::Vacant)));
  }

  #[test]
  fn one_row_is_held() {
    let child = Uuid::new_v4();
    let held = row(child);
    let id = held.sponsorship_id;
    match resolve(child, vec![held]).unwrap() {
      Resolution::Held(s) => assert_eq!(s.sponsorship_id, id),
      Resolution::Vacant => panic!("expected held"),
    }
  }

  #[test]
  fn two_rows_is_integrity_error() {
    let child = Uuid::new_v4();
    let err = resolve(child, vec![row(child), row(child)]).unwrap_err();
    assert!(matches!(err, Error::DataIntegrity { active_rows: 2, .. }));
  }
}
