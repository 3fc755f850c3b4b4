//! Error taxonomy for the answer pipeline and its HTTP mapping.
//!
//! Per-database failures never leave `external.rs`; AI failures reach the
//! resolver as `AskError` and are mapped to a JSON error body here.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;

/// Rejections raised while building or validating a `QuestionQuery`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueryError {
  #[error("question title must not be empty")]
  EmptyTitle,

  #[error("{field} exceeds the maximum length of {max} characters")]
  TooLong { field: &'static str, max: usize },

  #[error("{field} contains disallowed content")]
  Disallowed { field: &'static str },

  #[error("unsupported question type: {0}")]
  UnknownType(String),

  #[error("{0}")]
  Malformed(&'static str),
}

/// Failure of a single external database call. Swallowed by the fan-out.
#[derive(Debug, thiserror::Error)]
pub enum ExternalDbError {
  #[error("network error: {0}")]
  Network(String),

  #[error("timed out after {0:?}")]
  Timeout(std::time::Duration),

  #[error("HTTP status {0}")]
  Status(u16),

  #[error("malformed body: {0}")]
  Malformed(String),

  #[error("no answer in response")]
  Empty,
}

/// Distinct failure kinds of an AI provider call.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum AskError {
  #[error("provider network error: {0}")]
  Network(String),

  #[error("provider call timed out")]
  Timeout,

  #[error("provider HTTP {status}: {message}")]
  Status { status: u16, message: String },

  #[error("provider blocked the prompt: {0}")]
  Blocked(String),

  #[error("provider returned no candidates")]
  NoCandidates,

  #[error("malformed provider response: {0}")]
  Malformed(String),

  #[error("provider returned an empty answer")]
  EmptyAnswer,

  #[error("no valid answer in provider output")]
  NoValidAnswer,
}

impl From<reqwest::Error> for AskError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      AskError::Timeout
    } else if err.is_decode() {
      AskError::Malformed(err.to_string())
    } else {
      AskError::Network(err.to_string())
    }
  }
}

/// Terminal failure of a resolution.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
  #[error("AI fallback failed: {0}")]
  Ai(#[from] AskError),
}

/// Startup configuration problems.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("unsupported AI provider '{0}', expected one of: openai, gemini")]
  UnknownProvider(String),

  #[error("{0} must be set for the selected AI provider")]
  MissingKey(&'static str),

  #[error("invalid value for {key}: {reason}")]
  Invalid { key: &'static str, reason: String },

  #[error("failed to read {path}: {source}")]
  Io { path: String, #[source] source: std::io::Error },

  #[error("failed to parse {path}: {reason}")]
  Parse { path: String, reason: String },

  #[error("failed to build HTTP client: {0}")]
  Client(String),
}

/// Errors surfaced by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
  #[error(transparent)]
  Query(#[from] QueryError),

  #[error(transparent)]
  Resolve(#[from] ResolveError),
}

#[derive(Serialize)]
struct ErrorBody {
  found: bool,
  error: String,
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let status = match &self {
      AppError::Query(_) => StatusCode::BAD_REQUEST,
      AppError::Resolve(ResolveError::Ai(AskError::Timeout)) => StatusCode::GATEWAY_TIMEOUT,
      AppError::Resolve(_) => StatusCode::BAD_GATEWAY,
    };
    let body = Json(ErrorBody { found: false, error: self.to_string() });
    (status, body).into_response()
  }
}
