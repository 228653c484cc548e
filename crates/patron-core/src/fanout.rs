//! Fan-out planning: a committed lifecycle event → recipient artifacts.
//!
//! Planning is pure. The lifecycle transaction writes the planned deliveries
//! to the outbox; the dispatcher performs them after commit.

use chrono::NaiveDate;
use serde_json::{Value, json};

use crate::{
  child::Child,
  mail::{OutboundEmail, escape_html},
  notification::{NewMessage, NewNotification, NotificationKind},
  outbox::Delivery,
  request::{ChildAssignmentRequest, SponsorshipRequest},
  sponsor::Sponsor,
};

/// A committed lifecycle transition, with everything recipients need to know.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
  SponsorshipApproved {
    child:           Child,
    sponsor:         Sponsor,
    account_created: bool,
  },
  SponsorshipRejected {
    request: SponsorshipRequest,
    /// Existing account for the requester's email, if any.
    account: Option<Sponsor>,
  },
  AssignmentApproved {
    child:           Child,
    sponsor:         Sponsor,
    account_created: bool,
  },
  AssignmentRejected {
    request: ChildAssignmentRequest,
    account: Option<Sponsor>,
  },
  SponsorshipCreated {
    child:   Child,
    sponsor: Sponsor,
  },
  SponsorshipTransferred {
    child: Child,
    from:  Sponsor,
    to:    Sponsor,
  },
  SponsorshipTerminated {
    child:    Child,
    sponsor:  Sponsor,
    end_date: NaiveDate,
    reason:   String,
  },
}

impl LifecycleEvent {
  pub fn kind(&self) -> NotificationKind {
    match self {
      Self::SponsorshipApproved { .. } => NotificationKind::SponsorshipApproved,
      Self::SponsorshipRejected { .. } => NotificationKind::SponsorshipRejected,
      Self::AssignmentApproved { .. } => NotificationKind::AssignmentApproved,
      Self::AssignmentRejected { .. } => NotificationKind::AssignmentRejected,
      Self::SponsorshipCreated { .. } => NotificationKind::SponsorshipCreated,
      Self::SponsorshipTransferred { .. } => NotificationKind::SponsorshipTransferred,
      Self::SponsorshipTerminated { .. } => NotificationKind::SponsorshipTerminated,
    }
  }
}

/// Plan every delivery for `event`. `actor` is the staff member who performed
/// the transition; staff notifications go to everyone in `staff` but them.
pub fn plan(event: &LifecycleEvent, actor: &Sponsor, staff: &[Sponsor]) -> Vec<Delivery> {
  let kind = event.kind();
  let mut out = Vec::new();

  match event {
    LifecycleEvent::SponsorshipApproved { child, sponsor, account_created }
    | LifecycleEvent::AssignmentApproved { child, sponsor, account_created } => {
      let (title, intro) = if kind == NotificationKind::SponsorshipApproved {
        ("Sponsorship approved", "Your sponsorship request has been approved")
      } else {
        ("Child assignment approved", "Your child assignment request has been approved")
      };
      let meta = json!({
        "child_id": child.child_id,
        "sponsor_id": sponsor.sponsor_id,
        "account_created": account_created,
      });
      notify(&mut out, kind, sponsor, title, format!("{intro}: you now sponsor {}.", child.name), meta.clone());
      message(&mut out, actor, sponsor, title, format!(
        "Dear {}, thank you! {intro}. You are now the sponsor of {}.",
        sponsor.full_name, child.name
      ));
      email(&mut out, &sponsor.email, title, &format!(
        "Dear {}, {intro}. You are now the sponsor of {}.{}",
        sponsor.full_name,
        child.name,
        if *account_created { " An account has been created for this email address." } else { "" },
      ));
      notify_staff(&mut out, kind, actor, staff, title, format!(
        "{} approved {} as sponsor of {}.",
        actor.full_name, sponsor.full_name, child.name
      ), meta);
    }

    LifecycleEvent::SponsorshipRejected { request, account } => {
      let title = "Sponsorship request declined";
      let meta = json!({ "request_id": request.request_id, "child_id": request.child_id });
      if let Some(account) = account {
        notify(&mut out, kind, account, title, "Your sponsorship request was not approved.".into(), meta.clone());
      }
      email(&mut out, &request.email, title, &format!(
        "Dear {}, unfortunately we are unable to approve your sponsorship request at this time.",
        request.full_name
      ));
      notify_staff(&mut out, kind, actor, staff, title, format!(
        "{} declined the sponsorship request from {}.",
        actor.full_name, request.full_name
      ), meta);
    }

    LifecycleEvent::AssignmentRejected { request, account } => {
      let title = "Child assignment request declined";
      let meta = json!({ "request_id": request.request_id, "child_id": request.child_id });
      if let Some(account) = account {
        notify(&mut out, kind, account, title, "Your child assignment request was not approved.".into(), meta.clone());
      }
      email(&mut out, &request.requester_email, title, &format!(
        "Dear {}, unfortunately we could not confirm the requested child assignment.",
        request.name
      ));
      notify_staff(&mut out, kind, actor, staff, title, format!(
        "{} declined the assignment request from {}.",
        actor.full_name, request.name
      ), meta);
    }

    LifecycleEvent::SponsorshipCreated { child, sponsor } => {
      let title = "New sponsorship";
      let meta = json!({ "child_id": child.child_id, "sponsor_id": sponsor.sponsor_id });
      notify(&mut out, kind, sponsor, title, format!("You are now the sponsor of {}.", child.name), meta.clone());
      message(&mut out, actor, sponsor, title, format!(
        "Dear {}, you have been registered as the sponsor of {}.",
        sponsor.full_name, child.name
      ));
      email(&mut out, &sponsor.email, title, &format!(
        "Dear {}, you have been registered as the sponsor of {}.",
        sponsor.full_name, child.name
      ));
      notify_staff(&mut out, kind, actor, staff, title, format!(
        "{} linked {} to {}.",
        actor.full_name, sponsor.full_name, child.name
      ), meta);
    }

    LifecycleEvent::SponsorshipTransferred { child, from, to } => {
      let title = "Sponsorship transferred";
      let meta = json!({
        "child_id": child.child_id,
        "previous": { "sponsor_id": from.sponsor_id, "sponsor_name": from.full_name },
        "new": { "sponsor_id": to.sponsor_id, "sponsor_name": to.full_name },
      });
      notify(&mut out, kind, from, title, format!("Your sponsorship of {} has ended.", child.name), meta.clone());
      email(&mut out, &from.email, title, &format!(
        "Dear {}, your sponsorship of {} has been transferred to another sponsor. Thank you for your support.",
        from.full_name, child.name
      ));
      notify(&mut out, kind, to, title, format!("You are now the sponsor of {}.", child.name), meta.clone());
      message(&mut out, actor, to, title, format!(
        "Dear {}, you are now the sponsor of {}.",
        to.full_name, child.name
      ));
      email(&mut out, &to.email, title, &format!(
        "Dear {}, you are now the sponsor of {}.",
        to.full_name, child.name
      ));
      notify_staff(&mut out, kind, actor, staff, title, format!(
        "{} transferred {} from {} to {}.",
        actor.full_name, child.name, from.full_name, to.full_name
      ), meta);
    }

    LifecycleEvent::SponsorshipTerminated { child, sponsor, end_date, reason } => {
      let title = "Sponsorship ended";
      let meta = json!({
        "child_id": child.child_id,
        "sponsor_id": sponsor.sponsor_id,
        "end_date": end_date,
        "reason": reason,
      });
      notify(&mut out, kind, sponsor, title, format!(
        "Your sponsorship of {} ends on {end_date}.", child.name
      ), meta.clone());
      email(&mut out, &sponsor.email, title, &format!(
        "Dear {}, your sponsorship of {} ends on {end_date}. Reason: {reason}",
        sponsor.full_name, child.name
      ));
      notify_staff(&mut out, kind, actor, staff, title, format!(
        "{} ended the sponsorship of {} by {} ({reason}).",
        actor.full_name, child.name, sponsor.full_name
      ), meta);
    }
  }

  out
}

fn notify(
  out: &mut Vec<Delivery>,
  kind: NotificationKind,
  recipient: &Sponsor,
  title: &str,
  content: String,
  metadata: Value,
) {
  out.push(Delivery::Notification(NewNotification {
    recipient_id: recipient.sponsor_id,
    kind,
    title: title.to_owned(),
    content,
    metadata,
  }));
}

fn notify_staff(
  out: &mut Vec<Delivery>,
  kind: NotificationKind,
  actor: &Sponsor,
  staff: &[Sponsor],
  title: &str,
  content: String,
  metadata: Value,
) {
  for member in staff.iter().filter(|s| s.sponsor_id != actor.sponsor_id) {
    notify(out, kind, member, title, content.clone(), metadata.clone());
  }
}

fn message(out: &mut Vec<Delivery>, sender: &Sponsor, recipient: &Sponsor, subject: &str, body: String) {
  out.push(Delivery::Message(NewMessage {
    sender_id: Some(sender.sponsor_id),
    recipient_id: recipient.sponsor_id,
    subject: subject.to_owned(),
    body,
  }));
}

fn email(out: &mut Vec<Delivery>, to: &str, subject: &str, text: &str) {
  out.push(Delivery::Email(OutboundEmail {
    to:        to.to_owned(),
    subject:   subject.to_owned(),
    html_body: format!("<p>{}</p>", escape_html(text)),
  }));
}
