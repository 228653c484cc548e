//! [`Mailer`] backends selected by `[mail] backend` in the config.

use std::time::Duration;

use patron_core::mail::{MailError, Mailer, OutboundEmail};
use serde::Serialize;
use tracing::info;

use crate::{
  MailBackend, MailConfig,
  error::{Error, Result},
};

// ─── Log ──────────────────────────────────────────────────────────────────────

/// Writes each email to the log instead of sending it.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

impl Mailer for LogMailer {
  async fn send<'a>(&'a self, email: &'a OutboundEmail) -> Result<(), MailError> {
    info!(to = %email.to, subject = %email.subject, "email (log backend)");
    Ok(())
  }
}

// ─── HTTP ─────────────────────────────────────────────────────────────────────

/// Posts each email as JSON to a transactional-mail HTTP endpoint,
/// authenticated with a bearer key.
#[derive(Debug, Clone)]
pub struct HttpMailer {
  client:   reqwest::Client,
  endpoint: String,
  api_key:  String,
  from:     String,
}

#[derive(Serialize)]
struct SendBody<'a> {
  from:    &'a str,
  to:      [&'a str; 1],
  subject: &'a str,
  html:    &'a str,
}

impl HttpMailer {
  pub fn new(endpoint: String, api_key: String, from: String) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(15))
      .build()?;
    Ok(Self { client, endpoint, api_key, from })
  }
}

impl Mailer for HttpMailer {
  async fn send<'a>(&'a self, email: &'a OutboundEmail) -> Result<(), MailError> {
    let body = SendBody {
      from:    &self.from,
      to:      [&email.to],
      subject: &email.subject,
      html:    &email.html_body,
    };
    let res = self
      .client
      .post(&self.endpoint)
      .bearer_auth(&self.api_key)
      .json(&body)
      .send()
      .await
      .map_err(|e| MailError::Unreachable(e.to_string()))?;

    let status = res.status();
    if status.is_success() {
      return Ok(());
    }
    let body = res.text().await.unwrap_or_default();
    Err(MailError::Rejected { status: status.as_u16(), body })
  }
}

// ─── Selection ────────────────────────────────────────────────────────────────

/// The backend chosen at startup.
#[derive(Debug, Clone)]
pub enum ServerMailer {
  Log(LogMailer),
  Http(HttpMailer),
}

impl ServerMailer {
  pub fn from_config(config: &MailConfig) -> Result<Self> {
    match config.backend {
      MailBackend::Log => Ok(Self::Log(LogMailer)),
      MailBackend::Http => {
        let endpoint = config
          .endpoint
          .clone()
          .ok_or_else(|| Error::Config("mail.endpoint is required for the http backend".into()))?;
        let api_key = config
          .api_key
          .clone()
          .ok_or_else(|| Error::Config("mail.api_key is required for the http backend".into()))?;
        Ok(Self::Http(HttpMailer::new(endpoint, api_key, config.from.clone())?))
      }
    }
  }
}

impl Mailer for ServerMailer {
  async fn send<'a>(&'a self, email: &'a OutboundEmail) -> Result<(), MailError> {
    match self {
      Self::Log(m) => m.send(email).await,
      Self::Http(m) => m.send(email).await,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn email() -> OutboundEmail {
    OutboundEmail {
      to:        "ivo@example.org".into(),
      subject:   "Welcome".into(),
      html_body: "<p>Hi</p>".into(),
    }
  }

  #[tokio::test]
  async fn log_backend_always_succeeds() {
    let mailer = ServerMailer::from_config(&MailConfig::default()).unwrap();
    assert!(matches!(mailer, ServerMailer::Log(_)));
    assert!(mailer.send(&email()).await.is_ok());
  }

  #[test]
  fn http_backend_needs_endpoint_and_key() {
    let config = MailConfig { backend: MailBackend::Http, ..Default::default() };
    assert!(matches!(ServerMailer::from_config(&config), Err(Error::Config(_))));

    let config = MailConfig {
      backend:  MailBackend::Http,
      endpoint: Some("https://mail.example.org/emails".into()),
      api_key:  Some("key".into()),
      ..Default::default()
    };
    assert!(matches!(ServerMailer::from_config(&config), Ok(ServerMailer::Http(_))));
  }

  #[test]
  fn request_body_has_a_single_recipient() {
    let email = email();
    let body = SendBody {
      from:    "Patron <noreply@example.org>",
      to:      [&email.to],
      subject: &email.subject,
      html:    &email.html_body,
    };
    let json = serde_json::to_value(&body).unwrap();
    assert_eq!(json["to"], serde_json::json!(["ivo@example.org"]));
    assert_eq!(json["html"], "<p>Hi</p>");
  }
}
