//! Integration tests for `SqliteStore` and the lifecycle engine against an
//! in-memory database.

use std::{
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
  },
  time::Duration,
};

use chrono::Utc;
use patron_core::{
  Error, LifecycleEngine,
  child::{Child, NewChild},
  mail::{MailError, Mailer, OutboundEmail},
  notification::{NewNotification, NotificationKind},
  outbox::{Delivery, OutboxEntry, OutboxStatus, RetryPolicy},
  request::{NewChildAssignmentRequest, NewSponsorshipRequest, RequestStatus},
  sponsor::{NewSponsor, Role, Sponsor},
  sponsorship::{Sponsorship, SponsorshipQuery, SponsorshipStatus, SponsorshipType},
  store::SponsorshipStore,
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

/// Records every email; fails while `failing` is set.
#[derive(Default)]
struct TestMailer {
  sent:    Mutex<Vec<OutboundEmail>>,
  failing: AtomicBool,
}

impl TestMailer {
  fn fail(&self, on: bool) { self.failing.store(on, Ordering::SeqCst); }

  fn sent_to(&self) -> Vec<String> {
    self.sent.lock().unwrap().iter().map(|e| e.to.clone()).collect()
  }
}

impl Mailer for TestMailer {
  async fn send<'a>(&'a self, email: &'a OutboundEmail) -> Result<(), MailError> {
    if self.failing.load(Ordering::SeqCst) {
      return Err(MailError::Unreachable("connection refused".into()));
    }
    self.sent.lock().unwrap().push(email.clone());
    Ok(())
  }
}

struct Fixture {
  store:  Arc<SqliteStore>,
  mailer: Arc<TestMailer>,
  engine: LifecycleEngine<SqliteStore, TestMailer>,
  admin:  Sponsor,
}

async fn fixture() -> Fixture { fixture_with(RetryPolicy::default()).await }

async fn fixture_with(policy: RetryPolicy) -> Fixture {
  let store = Arc::new(store().await);
  let mailer = Arc::new(TestMailer::default());
  let engine = LifecycleEngine::new(Arc::clone(&store), Arc::clone(&mailer), policy);
  let admin = account(&store, "Ada Admin", Role::Admin).await;
  Fixture { store, mailer, engine, admin }
}

async fn account(s: &SqliteStore, name: &str, role: Role) -> Sponsor {
  s.add_sponsor(NewSponsor {
    full_name: name.into(),
    email: format!("{}@example.org", name.to_lowercase().replace(' ', ".")),
    phone: None,
    role,
  })
  .await
  .unwrap()
}

async fn child(s: &SqliteStore, name: &str) -> Child {
  s.add_child(NewChild { name: name.into() }).await.unwrap()
}

fn request(child_id: Option<Uuid>, full_name: &str, email: &str) -> NewSponsorshipRequest {
  NewSponsorshipRequest {
    full_name:        full_name.into(),
    email:            email.into(),
    phone:            Some("+385 91 000 0000".into()),
    city:             Some("Zagreb".into()),
    facebook_url:     None,
    motivation:       Some("  ".into()),
    child_id,
    sponsorship_type: SponsorshipType::LongTerm,
    terms_accepted:   true,
  }
}

async fn ledger(s: &SqliteStore, child_id: Uuid) -> Vec<Sponsorship> {
  s.list_sponsorships(&SponsorshipQuery { child_id: Some(child_id), ..Default::default() })
    .await
    .unwrap()
}

// ─── Intake ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_child_starts_unsponsored() {
  let s = store().await;
  let c = child(&s, "  Mia ").await;
  assert_eq!(c.name, "Mia");

  let fetched = s.get_child(c.child_id).await.unwrap().unwrap();
  assert!(!fetched.is_sponsored);
  assert_eq!(fetched.sponsor_id, None);
  assert_eq!(s.list_children(Some(false)).await.unwrap().len(), 1);
  assert!(s.list_children(Some(true)).await.unwrap().is_empty());
}

#[tokio::test]
async fn add_child_requires_a_name() {
  let s = store().await;
  let err = s.add_child(NewChild { name: "   ".into() }).await.unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn sponsor_emails_are_normalised_and_unique() {
  let s = store().await;
  let first = account(&s, "Ana", Role::Sponsor).await;
  assert_eq!(first.email, "ana@example.org");

  let err = s
    .add_sponsor(NewSponsor {
      full_name: "Ana Again".into(),
      email:     "  ANA@Example.org ".into(),
      phone:     None,
      role:      Role::Sponsor,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation(_)));

  let staff = s.list_sponsors(Some(Role::Sponsor)).await.unwrap();
  assert_eq!(staff.len(), 1);
}

#[tokio::test]
async fn request_for_unknown_child_is_not_found() {
  let s = store().await;
  let err = s
    .submit_sponsorship_request(request(Some(Uuid::new_v4()), "Ivo", "ivo@example.org"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn request_blank_fields_become_none() {
  let s = store().await;
  let c = child(&s, "Mia").await;
  let r = s
    .submit_sponsorship_request(request(Some(c.child_id), "Ivo", "Ivo@Example.org"))
    .await
    .unwrap();

  let fetched = s.get_sponsorship_request(r.request_id).await.unwrap().unwrap();
  assert_eq!(fetched.email, "ivo@example.org");
  assert_eq!(fetched.motivation, None);
  assert_eq!(fetched.city.as_deref(), Some("Zagreb"));
  assert_eq!(fetched.status, RequestStatus::Pending);
}

// ─── Transactions ────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_transaction_rolls_back_every_write() {
  let s = store().await;
  let sponsor = Sponsor {
    sponsor_id: Uuid::new_v4(),
    full_name:  "Ghost".into(),
    email:      "ghost@example.org".into(),
    phone:      None,
    role:       Role::Sponsor,
    created_at: Utc::now(),
  };
  let id = sponsor.sponsor_id;

  let err = s
    .transact(move |tx| {
      tx.insert_sponsor(&sponsor)?;
      Err::<(), _>(Error::Validation("abort".into()))
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
  assert!(s.get_sponsor(id).await.unwrap().is_none());
}

#[tokio::test]
async fn second_active_row_is_rejected_by_the_index() {
  let s = store().await;
  let c = child(&s, "Mia").await;
  let a = account(&s, "Ana", Role::Sponsor).await;
  let b = account(&s, "Ben", Role::Sponsor).await;
  let (child_id, a_id, b_id) = (c.child_id, a.sponsor_id, b.sponsor_id);

  let err = s
    .transact(move |tx| {
      let now = Utc::now();
      let today = now.date_naive();
      tx.insert_sponsorship(&Sponsorship::activate(child_id, a_id, SponsorshipType::LongTerm, today, now))?;
      tx.insert_sponsorship(&Sponsorship::activate(child_id, b_id, SponsorshipType::LongTerm, today, now))?;
      Ok(())
    })
    .await
    .unwrap_err();

  match err {
    Error::ConflictNeedsTransfer { current_sponsor_id, current_sponsor_name, .. } => {
      assert_eq!(current_sponsor_id, a_id);
      assert_eq!(current_sponsor_name, "Ana");
    }
    other => panic!("expected ConflictNeedsTransfer, got {other:?}"),
  }
  assert!(ledger(&s, child_id).await.is_empty());
}

// ─── Notifications & messages ────────────────────────────────────────────────

#[tokio::test]
async fn notifications_belong_to_their_recipient() {
  let s = store().await;
  let owner = account(&s, "Ana", Role::Sponsor).await;
  let other = account(&s, "Ben", Role::Sponsor).await;
  let id = Uuid::new_v4();
  let input = NewNotification {
    recipient_id: owner.sponsor_id,
    kind:         NotificationKind::SponsorshipCreated,
    title:        "New sponsorship".into(),
    content:      "You are now the sponsor of Mia.".into(),
    metadata:     serde_json::json!({ "child_id": Uuid::new_v4() }),
  };

  s.insert_notification(id, input.clone(), Utc::now()).await.unwrap();
  // Redelivery with the same id is a no-op.
  s.insert_notification(id, input, Utc::now()).await.unwrap();
  assert_eq!(s.list_notifications(owner.sponsor_id, false).await.unwrap().len(), 1);

  let err = s.set_notification_read(id, other.sponsor_id, true).await.unwrap_err();
  assert!(matches!(err, Error::NotFound { .. }));
  let err = s.delete_notification(id, other.sponsor_id).await.unwrap_err();
  assert!(matches!(err, Error::NotFound { .. }));

  s.set_notification_read(id, owner.sponsor_id, true).await.unwrap();
  assert!(s.list_notifications(owner.sponsor_id, true).await.unwrap().is_empty());
  s.set_notification_read(id, owner.sponsor_id, false).await.unwrap();
  assert_eq!(s.list_notifications(owner.sponsor_id, true).await.unwrap().len(), 1);

  s.delete_notification(id, owner.sponsor_id).await.unwrap();
  assert!(s.list_notifications(owner.sponsor_id, false).await.unwrap().is_empty());
}

#[tokio::test]
async fn outbox_entries_are_claimed_once() {
  let s = store().await;
  let entry = OutboxEntry::new(
    NotificationKind::SponsorshipCreated,
    Delivery::Email(OutboundEmail {
      to:        "ana@example.org".into(),
      subject:   "New sponsorship".into(),
      html_body: "<p>hi</p>".into(),
    }),
    Utc::now(),
  );
  let id = entry.outbox_id;
  s.transact(move |tx| tx.enqueue(&entry)).await.unwrap();

  let now = Utc::now();
  let lease = now + chrono::Duration::seconds(60);
  let first = s.claim_outbox(vec![id], now, lease).await.unwrap();
  assert_eq!(first.len(), 1);
  assert_eq!(first[0].delivery.channel(), "email");

  let second = s.claim_outbox(vec![id], now, lease).await.unwrap();
  assert!(second.is_empty());
  assert!(s.claim_due_outbox(now, lease, 10).await.unwrap().is_empty());

  s.mark_outbox_delivered(id, now).await.unwrap();
  let delivered = s.list_outbox(Some(OutboxStatus::Delivered)).await.unwrap();
  assert_eq!(delivered.len(), 1);
  assert!(delivered[0].delivered_at.is_some());
}

// ─── Request approval ────────────────────────────────────────────────────────

#[tokio::test]
async fn approval_creates_sponsor_sponsorship_and_updates_child() {
  let f = fixture().await;
  let c = child(&f.store, "Mia").await;
  let r = f
    .store
    .submit_sponsorship_request(request(Some(c.child_id), "Ivo Ivić", "ivo@example.org"))
    .await
    .unwrap();

  let outcome = f
    .engine
    .approve_sponsorship_request(r.request_id, f.admin.sponsor_id, None)
    .await
    .unwrap();
  assert!(outcome.is_clean());
  let approval = outcome.value;
  assert!(approval.account_created);
  assert_eq!(approval.request.status, RequestStatus::Approved);
  assert_eq!(approval.request.reviewed_by, Some(f.admin.sponsor_id));
  assert_eq!(approval.sponsorship.status, SponsorshipStatus::Active);

  let sponsor = f.store.get_sponsor(approval.sponsor.sponsor_id).await.unwrap().unwrap();
  assert_eq!(sponsor.role, Role::Sponsor);
  assert_eq!(sponsor.email, "ivo@example.org");

  let updated = f.store.get_child(c.child_id).await.unwrap().unwrap();
  assert!(updated.is_sponsored);
  assert_eq!(updated.sponsor_id, Some(sponsor.sponsor_id));
  assert_eq!(updated.sponsor_name.as_deref(), Some("Ivo Ivić"));

  let stored = f.store.get_sponsorship_request(r.request_id).await.unwrap().unwrap();
  assert_eq!(stored.status, RequestStatus::Approved);
  assert!(stored.reviewed_at.is_some());

  let rows = ledger(&f.store, c.child_id).await;
  assert_eq!(rows.len(), 1);
  assert!(rows[0].is_active());

  let audit = f.store.audit_trail(c.child_id).await.unwrap();
  let fields: Vec<_> = audit.iter().map(|e| e.field.as_str()).collect();
  assert_eq!(fields.len(), 3);
  assert!(fields.contains(&"is_sponsored"));
  assert!(audit.iter().all(|e| e.performed_by == f.admin.sponsor_id));

  assert_eq!(f.mailer.sent_to(), ["ivo@example.org"]);
  let inbox = f.store.list_notifications(sponsor.sponsor_id, false).await.unwrap();
  assert_eq!(inbox.len(), 1);
  assert_eq!(inbox[0].kind, NotificationKind::SponsorshipApproved);
  let messages = f.store.list_messages(sponsor.sponsor_id).await.unwrap();
  assert_eq!(messages.len(), 1);
  assert_eq!(messages[0].sender_id, Some(f.admin.sponsor_id));
  assert!(f.store.list_outbox(Some(OutboxStatus::Pending)).await.unwrap().is_empty());
}

#[tokio::test]
async fn second_approval_is_already_resolved() {
  let f = fixture().await;
  let c = child(&f.store, "Mia").await;
  let r = f
    .store
    .submit_sponsorship_request(request(Some(c.child_id), "Ivo", "ivo@example.org"))
    .await
    .unwrap();

  f.engine
    .approve_sponsorship_request(r.request_id, f.admin.sponsor_id, None)
    .await
    .unwrap();
  let outbox_before = f.store.list_outbox(None).await.unwrap().len();

  let err = f
    .engine
    .approve_sponsorship_request(r.request_id, f.admin.sponsor_id, None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::AlreadyResolved { status: RequestStatus::Approved, .. }));

  let err = f
    .engine
    .reject_sponsorship_request(r.request_id, f.admin.sponsor_id)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::AlreadyResolved { status: RequestStatus::Approved, .. }));

  assert_eq!(ledger(&f.store, c.child_id).await.len(), 1);
  assert_eq!(f.store.list_outbox(None).await.unwrap().len(), outbox_before);
}

#[tokio::test]
async fn approval_links_existing_account_by_email() {
  let f = fixture().await;
  let c = child(&f.store, "Mia").await;
  let existing = account(&f.store, "Ana", Role::Sponsor).await;
  let r = f
    .store
    .submit_sponsorship_request(request(Some(c.child_id), "Ana Anić", "ANA@example.org"))
    .await
    .unwrap();

  let approval = f
    .engine
    .approve_sponsorship_request(r.request_id, f.admin.sponsor_id, None)
    .await
    .unwrap()
    .value;
  assert!(!approval.account_created);
  assert_eq!(approval.sponsor.sponsor_id, existing.sponsor_id);
  assert_eq!(f.store.list_sponsors(Some(Role::Sponsor)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn open_request_needs_a_chosen_child() {
  let f = fixture().await;
  let c = child(&f.store, "Mia").await;
  let r = f
    .store
    .submit_sponsorship_request(request(None, "Ivo", "ivo@example.org"))
    .await
    .unwrap();

  let err = f
    .engine
    .approve_sponsorship_request(r.request_id, f.admin.sponsor_id, None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
  let still = f.store.get_sponsorship_request(r.request_id).await.unwrap().unwrap();
  assert_eq!(still.status, RequestStatus::Pending);

  let approval = f
    .engine
    .approve_sponsorship_request(r.request_id, f.admin.sponsor_id, Some(c.child_id))
    .await
    .unwrap()
    .value;
  assert_eq!(approval.request.child_id, Some(c.child_id));
  assert_eq!(approval.sponsorship.child_id, c.child_id);
}

#[tokio::test]
async fn approval_for_sponsored_child_conflicts_and_stays_pending() {
  let f = fixture().await;
  let c = child(&f.store, "Mia").await;
  let holder = account(&f.store, "Ana", Role::Sponsor).await;
  f.engine
    .create_association(c.child_id, holder.sponsor_id, f.admin.sponsor_id)
    .await
    .unwrap();

  let r = f
    .store
    .submit_sponsorship_request(request(Some(c.child_id), "Ivo", "ivo@example.org"))
    .await
    .unwrap();
  let err = f
    .engine
    .approve_sponsorship_request(r.request_id, f.admin.sponsor_id, None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ConflictNeedsTransfer { current_sponsor_id, .. } if current_sponsor_id == holder.sponsor_id));

  let still = f.store.get_sponsorship_request(r.request_id).await.unwrap().unwrap();
  assert_eq!(still.status, RequestStatus::Pending);
  // No account is created for a rolled-back approval.
  assert_eq!(f.store.list_sponsors(Some(Role::Sponsor)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn rejection_emails_the_requester_only() {
  let f = fixture().await;
  let c = child(&f.store, "Mia").await;
  let r = f
    .store
    .submit_sponsorship_request(request(Some(c.child_id), "Ivo", "ivo@example.org"))
    .await
    .unwrap();

  let outcome = f
    .engine
    .reject_sponsorship_request(r.request_id, f.admin.sponsor_id)
    .await
    .unwrap();
  assert_eq!(outcome.value.status, RequestStatus::Rejected);
  assert_eq!(f.mailer.sent_to(), ["ivo@example.org"]);
  assert!(ledger(&f.store, c.child_id).await.is_empty());
  assert!(!f.store.get_child(c.child_id).await.unwrap().unwrap().is_sponsored);

  let err = f
    .engine
    .approve_sponsorship_request(r.request_id, f.admin.sponsor_id, None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::AlreadyResolved { status: RequestStatus::Rejected, .. }));
}

#[tokio::test]
async fn assignment_requests_approve_and_reject() {
  let f = fixture().await;
  let mia = child(&f.store, "Mia").await;
  let leo = child(&f.store, "Leo").await;

  let approve = f
    .store
    .submit_assignment_request(NewChildAssignmentRequest {
      name:            "Ana".into(),
      requester_email: "ana@example.org".into(),
      child_id:        mia.child_id,
    })
    .await
    .unwrap();
  let reject = f
    .store
    .submit_assignment_request(NewChildAssignmentRequest {
      name:            "Ben".into(),
      requester_email: "ben@example.org".into(),
      child_id:        leo.child_id,
    })
    .await
    .unwrap();

  let approval = f
    .engine
    .approve_child_assignment_request(approve.request_id, f.admin.sponsor_id)
    .await
    .unwrap()
    .value;
  assert!(approval.account_created);
  assert_eq!(approval.sponsorship.kind, SponsorshipType::LongTerm);
  assert!(f.store.get_child(mia.child_id).await.unwrap().unwrap().is_sponsored);

  let rejected = f
    .engine
    .reject_child_assignment_request(reject.request_id, f.admin.sponsor_id)
    .await
    .unwrap()
    .value;
  assert_eq!(rejected.status, RequestStatus::Rejected);
  assert!(!f.store.get_child(leo.child_id).await.unwrap().unwrap().is_sponsored);

  let pending = f.store.list_assignment_requests(Some(RequestStatus::Pending)).await.unwrap();
  assert!(pending.is_empty());
}

// ─── Direct staff actions ────────────────────────────────────────────────────

#[tokio::test]
async fn association_conflict_changes_nothing() {
  let f = fixture().await;
  let c = child(&f.store, "Mia").await;
  let a = account(&f.store, "Ana", Role::Sponsor).await;
  let b = account(&f.store, "Ben", Role::Sponsor).await;

  f.engine
    .create_association(c.child_id, a.sponsor_id, f.admin.sponsor_id)
    .await
    .unwrap();
  let outbox_before = f.store.list_outbox(None).await.unwrap().len();
  let audit_before = f.store.audit_trail(c.child_id).await.unwrap().len();

  let err = f
    .engine
    .create_association(c.child_id, b.sponsor_id, f.admin.sponsor_id)
    .await
    .unwrap_err();
  match err {
    Error::ConflictNeedsTransfer { current_sponsor_id, current_sponsor_name, .. } => {
      assert_eq!(current_sponsor_id, a.sponsor_id);
      assert_eq!(current_sponsor_name, "Ana");
    }
    other => panic!("expected ConflictNeedsTransfer, got {other:?}"),
  }

  assert_eq!(ledger(&f.store, c.child_id).await.len(), 1);
  let after = f.store.get_child(c.child_id).await.unwrap().unwrap();
  assert_eq!(after.sponsor_id, Some(a.sponsor_id));
  assert_eq!(f.store.list_outbox(None).await.unwrap().len(), outbox_before);
  assert_eq!(f.store.audit_trail(c.child_id).await.unwrap().len(), audit_before);
}

#[tokio::test]
async fn concurrent_associations_have_a_single_winner() {
  let f = fixture().await;
  let c = child(&f.store, "Mia").await;
  let a = account(&f.store, "Ana", Role::Sponsor).await;
  let b = account(&f.store, "Ben", Role::Sponsor).await;

  let (ra, rb) = tokio::join!(
    f.engine.create_association(c.child_id, a.sponsor_id, f.admin.sponsor_id),
    f.engine.create_association(c.child_id, b.sponsor_id, f.admin.sponsor_id),
  );
  let wins = [ra.is_ok(), rb.is_ok()].iter().filter(|ok| **ok).count();
  assert_eq!(wins, 1);
  let loser = if ra.is_ok() { rb.unwrap_err() } else { ra.unwrap_err() };
  assert!(matches!(loser, Error::ConflictNeedsTransfer { .. }));

  let active: Vec<_> = ledger(&f.store, c.child_id)
    .await
    .into_iter()
    .filter(Sponsorship::is_active)
    .collect();
  assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn non_staff_actors_are_forbidden() {
  let f = fixture().await;
  let c = child(&f.store, "Mia").await;
  let a = account(&f.store, "Ana", Role::Sponsor).await;

  let err = f
    .engine
    .create_association(c.child_id, a.sponsor_id, a.sponsor_id)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Forbidden { actor_id } if actor_id == a.sponsor_id));

  let err = f
    .engine
    .create_association(c.child_id, a.sponsor_id, Uuid::new_v4())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Forbidden { .. }));
  assert!(ledger(&f.store, c.child_id).await.is_empty());
}

#[tokio::test]
async fn other_staff_are_notified_but_not_the_actor() {
  let f = fixture().await;
  let helper = account(&f.store, "Hana Helper", Role::Assistant).await;
  let c = child(&f.store, "Mia").await;
  let a = account(&f.store, "Ana", Role::Sponsor).await;

  f.engine
    .create_association(c.child_id, a.sponsor_id, f.admin.sponsor_id)
    .await
    .unwrap();

  let helper_inbox = f.store.list_notifications(helper.sponsor_id, false).await.unwrap();
  assert_eq!(helper_inbox.len(), 1);
  assert_eq!(helper_inbox[0].kind, NotificationKind::SponsorshipCreated);
  assert!(f.store.list_notifications(f.admin.sponsor_id, false).await.unwrap().is_empty());
}

// ─── Transfer ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn transfer_ends_old_row_and_activates_new() {
  let f = fixture().await;
  let c = child(&f.store, "Mia").await;
  let a = account(&f.store, "Ana", Role::Sponsor).await;
  let b = account(&f.store, "Ben", Role::Sponsor).await;
  f.engine
    .create_association(c.child_id, a.sponsor_id, f.admin.sponsor_id)
    .await
    .unwrap();

  let transfer = f
    .engine
    .transfer_child(c.child_id, a.sponsor_id, b.sponsor_id, f.admin.sponsor_id)
    .await
    .unwrap()
    .value;
  assert_eq!(transfer.ended.sponsor_id, a.sponsor_id);
  assert_eq!(transfer.ended.status, SponsorshipStatus::Ended);
  assert_eq!(transfer.started.sponsor_id, b.sponsor_id);
  assert_eq!(transfer.child.sponsor_name.as_deref(), Some("Ben"));

  let stored = f.store.get_sponsorship(transfer.ended.sponsorship_id).await.unwrap().unwrap();
  assert_eq!(stored.status, SponsorshipStatus::Ended);
  assert_eq!(stored.end_date, Some(Utc::now().date_naive()));
  assert_eq!(stored.ended_by, Some(f.admin.sponsor_id));

  let view = f.store.materialize_child(c.child_id).await.unwrap().unwrap();
  assert_eq!(view.history.len(), 2);
  assert_eq!(view.active.map(|s| s.sponsor_id), Some(b.sponsor_id));
  assert_eq!(view.child.sponsor_id, Some(b.sponsor_id));

  let old_inbox = f.store.list_notifications(a.sponsor_id, false).await.unwrap();
  let transferred = old_inbox
    .iter()
    .find(|n| n.kind == NotificationKind::SponsorshipTransferred)
    .expect("previous sponsor notified");
  assert_eq!(transferred.metadata["new"]["sponsor_name"], "Ben");
  let new_inbox = f.store.list_notifications(b.sponsor_id, false).await.unwrap();
  assert_eq!(new_inbox.len(), 1);
}

#[tokio::test]
async fn stale_transfer_is_refused() {
  let f = fixture().await;
  let c = child(&f.store, "Mia").await;
  let a = account(&f.store, "Ana", Role::Sponsor).await;
  let b = account(&f.store, "Ben", Role::Sponsor).await;
  let z = account(&f.store, "Zoe", Role::Sponsor).await;

  // Vacant child.
  let err = f
    .engine
    .transfer_child(c.child_id, a.sponsor_id, b.sponsor_id, f.admin.sponsor_id)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::StaleTransfer { .. }));

  // Held by someone other than `from`.
  f.engine
    .create_association(c.child_id, z.sponsor_id, f.admin.sponsor_id)
    .await
    .unwrap();
  let err = f
    .engine
    .transfer_child(c.child_id, a.sponsor_id, b.sponsor_id, f.admin.sponsor_id)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::StaleTransfer { child_id } if child_id == c.child_id));

  let rows = ledger(&f.store, c.child_id).await;
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].sponsor_id, z.sponsor_id);
}

#[tokio::test]
async fn transfer_to_same_sponsor_is_invalid() {
  let f = fixture().await;
  let c = child(&f.store, "Mia").await;
  let a = account(&f.store, "Ana", Role::Sponsor).await;
  f.engine
    .create_association(c.child_id, a.sponsor_id, f.admin.sponsor_id)
    .await
    .unwrap();

  let err = f
    .engine
    .transfer_child(c.child_id, a.sponsor_id, a.sponsor_id, f.admin.sponsor_id)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
}

// ─── Termination ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn backdated_termination_is_rejected_before_any_write() {
  let f = fixture().await;
  let c = child(&f.store, "Mia").await;
  let a = account(&f.store, "Ana", Role::Sponsor).await;
  let row = f
    .engine
    .create_association(c.child_id, a.sponsor_id, f.admin.sponsor_id)
    .await
    .unwrap()
    .value;

  let yesterday = Utc::now().date_naive().pred_opt().unwrap();
  let err = f
    .engine
    .terminate_sponsorship(row.sponsorship_id, "moved away".into(), yesterday, f.admin.sponsor_id)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation(_)));

  let err = f
    .engine
    .terminate_sponsorship(row.sponsorship_id, "  ".into(), Utc::now().date_naive(), f.admin.sponsor_id)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation(_)));

  let still = f.store.get_sponsorship(row.sponsorship_id).await.unwrap().unwrap();
  assert!(still.is_active());
  assert!(f.store.get_child(c.child_id).await.unwrap().unwrap().is_sponsored);
}

#[tokio::test]
async fn termination_clears_the_child() {
  let f = fixture().await;
  let c = child(&f.store, "Mia").await;
  let a = account(&f.store, "Ana", Role::Sponsor).await;
  let row = f
    .engine
    .create_association(c.child_id, a.sponsor_id, f.admin.sponsor_id)
    .await
    .unwrap()
    .value;

  let today = Utc::now().date_naive();
  let ended = f
    .engine
    .terminate_sponsorship(row.sponsorship_id, " moved away ".into(), today, f.admin.sponsor_id)
    .await
    .unwrap()
    .value;
  assert_eq!(ended.status, SponsorshipStatus::Ended);
  assert_eq!(ended.end_date, Some(today));
  assert_eq!(ended.termination_reason.as_deref(), Some("moved away"));

  let after = f.store.get_child(c.child_id).await.unwrap().unwrap();
  assert!(!after.is_sponsored);
  assert_eq!(after.sponsor_id, None);
  assert_eq!(after.sponsor_name, None);

  let err = f
    .engine
    .terminate_sponsorship(row.sponsorship_id, "again".into(), today, f.admin.sponsor_id)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotActive(id) if id == row.sponsorship_id));

  // The child is vacant again and can be re-linked without a transfer.
  f.engine
    .create_association(c.child_id, a.sponsor_id, f.admin.sponsor_id)
    .await
    .unwrap();
}

#[tokio::test]
async fn terminating_unknown_sponsorship_is_not_found() {
  let f = fixture().await;
  let err = f
    .engine
    .terminate_sponsorship(Uuid::new_v4(), "gone".into(), Utc::now().date_naive(), f.admin.sponsor_id)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound { .. }));
}

// ─── Delivery ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delivery_failure_is_a_warning_and_is_retried() {
  let f = fixture_with(RetryPolicy {
    initial_backoff: Duration::ZERO,
    max_backoff: Duration::ZERO,
    ..RetryPolicy::default()
  })
  .await;
  let c = child(&f.store, "Mia").await;
  let a = account(&f.store, "Ana", Role::Sponsor).await;

  f.mailer.fail(true);
  let outcome = f
    .engine
    .create_association(c.child_id, a.sponsor_id, f.admin.sponsor_id)
    .await
    .unwrap();
  assert_eq!(outcome.warnings.len(), 1);
  let warning = &outcome.warnings[0];
  assert_eq!(warning.channel, "email");
  assert_eq!(warning.recipient, "ana@example.org");
  assert!(warning.will_retry);

  // The lifecycle change stands; in-app artifacts were delivered.
  assert!(f.store.get_child(c.child_id).await.unwrap().unwrap().is_sponsored);
  assert_eq!(f.store.list_notifications(a.sponsor_id, false).await.unwrap().len(), 1);

  let pending = f.store.list_outbox(Some(OutboxStatus::Pending)).await.unwrap();
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].attempts, 1);
  assert!(pending[0].last_error.is_some());

  f.mailer.fail(false);
  let report = f.engine.dispatcher().drain_due().await.unwrap();
  assert_eq!(report.attempted, 1);
  assert_eq!(report.failed, 0);
  assert_eq!(f.mailer.sent_to(), ["ana@example.org"]);
  assert!(f.store.list_outbox(Some(OutboxStatus::Pending)).await.unwrap().is_empty());
}

#[tokio::test]
async fn exhausted_deliveries_are_marked_dead() {
  let f = fixture_with(RetryPolicy { max_attempts: 1, ..RetryPolicy::default() }).await;
  let c = child(&f.store, "Mia").await;
  let a = account(&f.store, "Ana", Role::Sponsor).await;

  f.mailer.fail(true);
  let outcome = f
    .engine
    .create_association(c.child_id, a.sponsor_id, f.admin.sponsor_id)
    .await
    .unwrap();
  assert_eq!(outcome.warnings.len(), 1);
  assert!(!outcome.warnings[0].will_retry);

  let dead = f.store.list_outbox(Some(OutboxStatus::Dead)).await.unwrap();
  assert_eq!(dead.len(), 1);
  assert_eq!(dead[0].attempts, 1);

  let report = f.engine.dispatcher().drain_due().await.unwrap();
  assert_eq!(report.attempted, 0);
}
