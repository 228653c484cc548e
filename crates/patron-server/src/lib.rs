//! HTTP server for Patron.
//!
//! Wraps the [`patron_api`] router in service authentication and request
//! tracing, and carries the deserialised runtime configuration.

pub mod auth;
pub mod error;
pub mod mailer;

pub use error::Error;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{Router, middleware, routing::get};
use patron_api::Engine;
use patron_core::{mail::Mailer, outbox::RetryPolicy, store::SponsorshipStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::AuthConfig;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `PATRON_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  pub store_path:         PathBuf,
  pub auth_username:      String,
  pub auth_password_hash: String,
  #[serde(default)]
  pub mail:               MailConfig,
  #[serde(default)]
  pub dispatcher:         DispatcherConfig,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailBackend {
  #[default]
  Log,
  Http,
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct MailConfig {
  pub backend:  MailBackend,
  pub endpoint: Option<String>,
  pub api_key:  Option<String>,
  pub from:     String,
}

impl Default for MailConfig {
  fn default() -> Self {
    Self {
      backend:  MailBackend::Log,
      endpoint: None,
      api_key:  None,
      from:     "Patron <noreply@localhost>".to_string(),
    }
  }
}

/// Outbox dispatcher tuning. All durations are in seconds.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DispatcherConfig {
  pub poll_interval_secs:   u64,
  pub max_attempts:         u32,
  pub initial_backoff_secs: u64,
  pub max_backoff_secs:     u64,
  pub lease_secs:           u64,
  pub batch_size:           usize,
}

impl Default for DispatcherConfig {
  fn default() -> Self {
    let policy = RetryPolicy::default();
    Self {
      poll_interval_secs:   15,
      max_attempts:         policy.max_attempts,
      initial_backoff_secs: policy.initial_backoff.as_secs(),
      max_backoff_secs:     policy.max_backoff.as_secs(),
      lease_secs:           policy.lease.as_secs(),
      batch_size:           policy.batch_size,
    }
  }
}

impl DispatcherConfig {
  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy {
      max_attempts:    self.max_attempts.max(1),
      initial_backoff: Duration::from_secs(self.initial_backoff_secs),
      max_backoff:     Duration::from_secs(self.max_backoff_secs),
      lease:           Duration::from_secs(self.lease_secs),
      batch_size:      self.batch_size.max(1),
    }
  }

  pub fn poll_interval(&self) -> Duration {
    Duration::from_secs(self.poll_interval_secs.max(1))
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router: `/health` is open, everything under
/// `/api` requires the service credential.
pub fn router<S, M>(engine: Engine<S, M>, credentials: Arc<AuthConfig>) -> Router
where
  S: SponsorshipStore + 'static,
  M: Mailer + 'static,
{
  let api = patron_api::api_router(engine)
    .layer(middleware::from_fn_with_state(credentials, auth::require_auth));

  Router::new()
    .route("/health", get(|| async { "ok" }))
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}
