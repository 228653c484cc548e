//! Server-level errors: service authentication and startup configuration.

use axum::{
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,
  #[error("invalid configuration: {0}")]
  Config(String),
  #[error("http client error: {0}")]
  Http(#[from] reqwest::Error),
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    match self {
      Error::Unauthorized => {
        let mut res = (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"patron\""),
        );
        res
      }
      other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response(),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
