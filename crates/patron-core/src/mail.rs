//! The outbound email collaborator.
//!
//! Called only from the outbox dispatcher, never from inside a lifecycle
//! transaction.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEmail {
  pub to:        String,
  pub subject:   String,
  pub html_body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
  #[error("email provider unreachable: {0}")]
  Unreachable(String),

  #[error("email provider rejected the message ({status}): {body}")]
  Rejected { status: u16, body: String },
}

/// An email provider backend.
pub trait Mailer: Send + Sync {
  fn send<'a>(
    &'a self,
    email: &'a OutboundEmail,
  ) -> impl Future<Output = Result<(), MailError>> + Send + 'a;
}

/// Escape text for interpolation into an HTML email body.
pub fn escape_html(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      c => out.push(c),
    }
  }
  out
}
